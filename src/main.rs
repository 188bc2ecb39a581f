use clap::Parser;
use log::{error, info};

use evm_transfer_indexer::config::AppConfig;
use evm_transfer_indexer::logging::{init_logging, ErrorLogger, LogContext};
use evm_transfer_indexer::IngestionLoop;

#[derive(Parser)]
#[command(name = "transfer-indexer")]
#[command(about = "Streams native and token transfers from an EVM chain to an event sink")]
#[command(version)]
struct Args {
    /// Configuration file (defaults to $CONFIG_FILE or ./config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Print a sample configuration and exit
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if args.print_config {
        println!("{}", AppConfig::generate_sample_config()?);
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };

    init_logging(&config.logging, config.log_file_path().as_deref())?;

    LogContext::new("main", "startup")
        .with_network(&config.network.id)
        .with_metadata("rpc_endpoint", serde_json::json!(config.active_rpc_endpoint()))
        .with_metadata("topic", serde_json::json!(config.sink.topic))
        .info(&format!("Starting transfer indexer for {}", config.network.id));

    let mut ingestion = match IngestionLoop::from_config(&config) {
        Ok(ingestion) => ingestion,
        Err(e) => {
            ErrorLogger::log_error(&e, Some(LogContext::new("main", "startup")));
            return Err(e.into());
        }
    };

    ingestion.listen_for_shutdown();

    if let Err(e) = ingestion.run().await {
        error!("Ingestion stopped: {}", e);
        return Err(e.into());
    }

    info!("Transfer indexer stopped");
    Ok(())
}
