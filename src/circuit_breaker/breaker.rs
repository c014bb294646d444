use super::types::{CircuitBreakerConfig, CircuitBreakerMetrics, CircuitSnapshot, CircuitState};
use crate::error::{IntegrationError, Result};
use crate::metrics;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker guarding a single backend service.
///
/// State transitions are check-then-act sequences, so the whole record sits
/// behind one mutex. No lock is held across an await point.
#[derive(Debug)]
pub struct CircuitBreaker {
    /// Configuration
    config: CircuitBreakerConfig,
    /// Current state
    state: Mutex<State>,
    /// Service identifier
    service: String,
}

/// Ticket for an admitted call.
///
/// Outcomes only move the circuit when the ticket was issued in the current
/// state epoch. Anything older updates metrics and nothing else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    generation: u64,
    trial: bool,
}

impl Admission {
    /// Whether this call is the half-open trial
    pub fn is_trial(&self) -> bool {
        self.trial
    }
}

#[derive(Debug)]
struct State {
    /// Current circuit state
    circuit_state: CircuitState,
    /// Bumped on every transition
    generation: u64,
    /// Number of consecutive failures since the last success
    consecutive_failures: u32,
    /// Time of the most recent recorded failure
    last_failure_at: Option<Instant>,
    /// Whether the half-open trial call is in flight
    trial_in_flight: bool,
    /// Metrics
    metrics: CircuitBreakerMetrics,
}

impl State {
    fn is_current(&self, admission: Admission) -> bool {
        admission.generation == self.generation
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        let service = service.into();
        info!(
            service = %service,
            failure_threshold = config.failure_threshold,
            cool_down_secs = config.cool_down_secs,
            "Creating circuit breaker"
        );

        Self {
            config,
            state: Mutex::new(State {
                circuit_state: CircuitState::Closed,
                generation: 0,
                consecutive_failures: 0,
                last_failure_at: None,
                trial_in_flight: false,
                metrics: CircuitBreakerMetrics::default(),
            }),
            service,
        }
    }

    /// Run `operation` under breaker protection.
    ///
    /// Returns [`IntegrationError::CircuitOpen`] without invoking the
    /// operation when the circuit rejects the call. Any error returned by the
    /// operation counts as a failure.
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(admission) = self.try_admit() else {
            return Err(IntegrationError::CircuitOpen(self.service.clone()));
        };

        let mut guard = AdmissionGuard {
            breaker: self,
            admission,
            settled: false,
        };
        let outcome = operation().await;
        guard.settled = true;

        match &outcome {
            Ok(_) => self.record_success(admission),
            Err(e) if e.is_timeout() => self.record_timeout(admission),
            Err(_) => self.record_failure(admission),
        }

        outcome
    }

    /// Admit a call, moving open -> half-open once the cool-down elapsed.
    /// `None` means the call is rejected.
    pub fn try_admit(&self) -> Option<Admission> {
        let mut state = self.lock();

        match state.circuit_state {
            CircuitState::Closed => {
                state.metrics.total_requests += 1;
                Some(Admission {
                    generation: state.generation,
                    trial: false,
                })
            }
            CircuitState::Open => {
                let cooled_down = state
                    .last_failure_at
                    .map(|at| at.elapsed() > self.config.cool_down())
                    .unwrap_or(true);

                if cooled_down {
                    self.transition_to_half_open(&mut state);
                    Some(self.admit_trial(&mut state))
                } else {
                    state.metrics.rejected_requests += 1;
                    debug!(service = %self.service, "Circuit breaker open, rejecting call");
                    None
                }
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    state.metrics.rejected_requests += 1;
                    debug!(
                        service = %self.service,
                        "Half-open trial already in flight, rejecting"
                    );
                    None
                } else {
                    debug!(service = %self.service, "Allowing half-open trial call");
                    Some(self.admit_trial(&mut state))
                }
            }
        }
    }

    /// Record a successful call
    pub fn record_success(&self, admission: Admission) {
        let mut state = self.lock();
        state.metrics.successful_requests += 1;

        if !state.is_current(admission) {
            debug!(service = %self.service, "Ignoring success from an earlier circuit state");
            return;
        }

        match state.circuit_state {
            CircuitState::Closed => {
                state.consecutive_failures = 0;
            }
            CircuitState::HalfOpen if admission.trial => {
                debug!(service = %self.service, "Half-open trial call succeeded");
                self.transition_to_closed(&mut state);
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    /// Record a failed call
    pub fn record_failure(&self, admission: Admission) {
        let mut state = self.lock();
        state.metrics.failed_requests += 1;

        if !state.is_current(admission) {
            debug!(service = %self.service, "Ignoring failure from an earlier circuit state");
            return;
        }

        match state.circuit_state {
            CircuitState::Closed => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_failure_at = Some(Instant::now());
                debug!(
                    service = %self.service,
                    consecutive_failures = state.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "Call failed in closed state"
                );

                if state.consecutive_failures >= self.config.failure_threshold {
                    self.transition_to_open(&mut state);
                }
            }
            CircuitState::HalfOpen if admission.trial => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.last_failure_at = Some(Instant::now());
                warn!(
                    service = %self.service,
                    "Half-open trial call failed, reopening circuit"
                );
                self.transition_to_open(&mut state);
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    /// Record a timeout
    pub fn record_timeout(&self, admission: Admission) {
        self.lock().metrics.timeout_count += 1;
        self.record_failure(admission);
    }

    /// Get current state
    pub fn state(&self) -> CircuitState {
        self.lock().circuit_state
    }

    /// Get the full state record
    pub fn snapshot(&self) -> CircuitSnapshot {
        let state = self.lock();
        CircuitSnapshot {
            state: state.circuit_state,
            consecutive_failures: state.consecutive_failures,
            last_failure_at: state.last_failure_at,
            failure_threshold: self.config.failure_threshold,
            cool_down: self.config.cool_down(),
        }
    }

    /// Get metrics
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.lock().metrics.clone()
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn admit_trial(&self, state: &mut State) -> Admission {
        state.trial_in_flight = true;
        state.metrics.total_requests += 1;
        Admission {
            generation: state.generation,
            trial: true,
        }
    }

    /// Free the half-open slot held by a trial that was dropped before it settled
    fn release_abandoned(&self, admission: Admission) {
        let mut state = self.lock();
        if admission.trial
            && state.is_current(admission)
            && state.circuit_state == CircuitState::HalfOpen
            && state.trial_in_flight
        {
            debug!(service = %self.service, "Half-open trial abandoned, releasing slot");
            state.trial_in_flight = false;
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Transition to open state
    fn transition_to_open(&self, state: &mut State) {
        info!(
            service = %self.service,
            consecutive_failures = state.consecutive_failures,
            "Circuit breaker opening"
        );

        let from = state.circuit_state;
        state.circuit_state = CircuitState::Open;
        state.generation += 1;
        state.trial_in_flight = false;
        state.metrics.circuit_opened_count += 1;
        metrics::record_circuit_breaker_transition(&self.service, from, CircuitState::Open);
    }

    /// Transition to half-open state
    fn transition_to_half_open(&self, state: &mut State) {
        info!(
            service = %self.service,
            cool_down = ?self.config.cool_down(),
            "Circuit breaker transitioning to half-open"
        );

        state.circuit_state = CircuitState::HalfOpen;
        state.generation += 1;
        state.trial_in_flight = false;
        state.metrics.circuit_half_opened_count += 1;
        metrics::record_circuit_breaker_transition(
            &self.service,
            CircuitState::Open,
            CircuitState::HalfOpen,
        );
    }

    /// Transition to closed state
    fn transition_to_closed(&self, state: &mut State) {
        info!(service = %self.service, "Circuit breaker closing");

        state.circuit_state = CircuitState::Closed;
        state.generation += 1;
        state.consecutive_failures = 0;
        state.last_failure_at = None;
        state.trial_in_flight = false;
        state.metrics.circuit_closed_count += 1;
        metrics::record_circuit_breaker_transition(
            &self.service,
            CircuitState::HalfOpen,
            CircuitState::Closed,
        );
    }
}

/// Releases a half-open slot when the admitted call future is dropped early
struct AdmissionGuard<'a> {
    breaker: &'a CircuitBreaker,
    admission: Admission,
    settled: bool,
}

impl Drop for AdmissionGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.release_abandoned(self.admission);
        }
    }
}
