use anyhow::{Context, Result};
use chronostream::prelude::*;
use chronostream::ENGINE_NAME;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration from an optional TOML path and the environment.
    let path = std::env::args().nth(1).map(PathBuf::from);
    let config = ProducerConfig::load(path.as_deref())
        .with_context(|| format!("failed to load configuration from {:?}", path))?;

    // 2. Initialize structured logging.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // 3. Build the producer; one stream per configured frequency.
    let mut producer = Producer::from_config(config, Arc::new(SystemTimeSource::new()))?;

    // 4. Drain every stream on its own task.
    spawn_drainers(&producer);

    info!("{} running. Press Ctrl+C to shut down.", ENGINE_NAME);
    tokio::signal::ctrl_c().await?;

    // 5. Stop the streams; buffered events are still drained by the tasks.
    producer.shutdown().await;
    info!("{} has shut down.", ENGINE_NAME);
    Ok(())
}

/// Spawns one task per stream that logs each event as it is drained.
fn spawn_drainers<T: TimeSource>(producer: &Producer<T>) {
    for status in producer.streams() {
        let Some(events) = producer.events(status.id) else {
            continue;
        };
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                info!(
                    id = %event.id,
                    frequency = %event.frequency,
                    sequence = event.sequence,
                    seed = event.seed,
                    at = %event.occurred_at(),
                    "[EVENT]"
                );
            }
        });
    }
}
