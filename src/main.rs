//! Word Vector Server Main
//!
//! Entry point for the word vector HTTP server

use std::path::Path;
use tracing::info;
use word_vector_server::{ServerConfig, WordVectorServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::var("W2V_CONFIG").unwrap_or_else(|_| "config.toml".to_string());

    // Load configuration
    let config = ServerConfig::load(&config_path)?;

    // Initialize tracing
    let log_level = config.monitoring.log_filter();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .init();

    if Path::new(&config_path).exists() {
        info!("📄 Configuration read from {}", config_path);
    } else {
        info!("📄 No configuration file at {}, using defaults", config_path);
    }

    println!("🚀 Word Vector Server");
    println!("📊 Log Level: {}", config.monitoring.log_level);
    println!("===============================");

    let server = WordVectorServer::new(config);

    println!("📡 Loading word vectors in the background");
    println!("🛑 Press Ctrl+C to stop");

    server.start().await?;

    Ok(())
}
