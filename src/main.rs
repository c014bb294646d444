use retail_integration::{config::IntegrationConfig, init_server, init_tracing};
use std::env;
use std::path::PathBuf;
use std::process;

#[tokio::main]
async fn main() {
    // Config file is optional; CHATBOT_* variables apply either way
    let config_path = env::args().nth(1).map(PathBuf::from);

    let config = match IntegrationConfig::load(config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            eprintln!("Usage: retail-integration [config_file]");
            process::exit(1);
        }
    };

    init_tracing(config.log_format);

    if let Err(e) = init_server(config).await {
        eprintln!("Integration service error: {}", e);
        process::exit(1);
    }
}
