use anyhow::Result;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod exporter;
mod forwarder;
mod scheduler;
mod telemetry;
#[cfg(test)]
mod test_support;

use crate::config::Config;
use crate::forwarder::KafkaPublisherFactory;
use crate::scheduler::RoundScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded ({}), using the process environment", e);
    }

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    info!("Configuration loaded, forwarding to {}", config.kafka.brokers);

    telemetry::install(&config.telemetry)?;

    let factory = KafkaPublisherFactory::new(&config.kafka);
    let scheduler = RoundScheduler::new(config.clone(), factory)?;

    info!("Starting metric relay");
    tokio::select! {
        _ = scheduler.start_scheduling_loop() => {}
        result = signal::ctrl_c() => {
            result?;
            info!("Shutdown signal received, stopping");
        }
    }

    Ok(())
}
