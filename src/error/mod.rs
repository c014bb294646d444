use std::time::Duration;
use thiserror::Error;

/// Result type for integration operations
pub type Result<T> = std::result::Result<T, IntegrationError>;

/// Integration error types
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Client error: {0}")]
    Transport(String),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Circuit breaker is open for service: {0}")]
    CircuitOpen(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response body: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntegrationError {
    /// Whether an idempotent call that failed with this error may be retried
    pub fn is_retryable(&self) -> bool {
        match self {
            IntegrationError::Transport(_) | IntegrationError::Timeout(_) => true,
            IntegrationError::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, IntegrationError::Timeout(_))
    }

    /// HTTP status carried by a protocol error
    pub fn status_code(&self) -> Option<u16> {
        match self {
            IntegrationError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for IntegrationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured duration
            IntegrationError::Timeout(Duration::ZERO)
        } else {
            IntegrationError::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for IntegrationError {
    fn from(err: serde_json::Error) -> Self {
        IntegrationError::Decode(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(IntegrationError::Transport("refused".to_string()).is_retryable());
        assert!(IntegrationError::Timeout(Duration::from_secs(10)).is_retryable());
        assert!(IntegrationError::Http {
            status: 503,
            body: "busy".to_string()
        }
        .is_retryable());
        assert!(!IntegrationError::Http {
            status: 400,
            body: "bad".to_string()
        }
        .is_retryable());
        assert!(!IntegrationError::CircuitOpen("order".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = IntegrationError::Http {
            status: 502,
            body: "upstream down".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 502: upstream down");
        assert_eq!(err.status_code(), Some(502));

        let err = IntegrationError::CircuitOpen("inventory".to_string());
        assert_eq!(
            err.to_string(),
            "Circuit breaker is open for service: inventory"
        );
        assert_eq!(err.status_code(), None);
    }
}
