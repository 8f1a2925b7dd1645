use std::sync::Arc;

use clap::Parser;
use config::ConfigError;
use relaymq::config::{DEFAULT_CONFIG_FILE, Settings, load_config_from};
use relaymq::router::Router;
use relaymq::transport::websocket::{shared_secret, start_websocket_server};
use relaymq::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "relaymq", about = "In-memory pub/sub router over WebSockets")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    config: String,

    /// Overrides `logging.level` from the configuration
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = run_server(cli).await {
        error!("Server failed: {}", e);
        std::process::exit(1);
    }
}

/// Loads the configuration and installs logging. Logging is set up even when
/// loading fails, so the error reaches the log.
fn bootstrap(cli: &Cli) -> Result<Settings, ConfigError> {
    match load_config_from(&cli.config) {
        Ok(config) => {
            logging::init(cli.log_level.as_deref().unwrap_or(&config.logging.level));
            Ok(config)
        }
        Err(e) => {
            logging::init(cli.log_level.as_deref().unwrap_or("info"));
            error!("Failed to load configuration from {}: {}", cli.config, e);
            Err(e)
        }
    }
}

async fn run_server(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = bootstrap(&cli)?;

    let router = Arc::new(Router::new(config.router.queue_capacity));
    let dispatcher = tokio::spawn({
        let router = router.clone();
        async move { router.run().await }
    });

    let addr = config.server.addr();
    let authenticator = shared_secret(config.server.credential.clone());

    tokio::select! {
        result = start_websocket_server(&addr, router.clone(), authenticator) => {
            if let Err(e) = result {
                error!("WebSocket server exited: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    router.close();
    dispatcher.await??;
    Ok(())
}
