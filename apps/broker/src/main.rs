//! Resource service broker
//!
//! Loads `.env`, builds the configuration from the environment and serves
//! the broker API until the process is stopped.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use rsbroker_core::{
    BrokerConfig, DefaultBackend, InMemoryInstanceRepository, LifecycleEngine, ServiceCatalog,
};
use rsbroker_gateway::BrokerServer;
use tracing::info;

/// Log file name prefix, e.g. `rsbroker.2026-10-19.log`
const LOG_PREFIX: &str = "rsbroker";

/// Initialize tracing with console and optional file logging
///
/// - Console: colored, compact format
/// - File: daily rotation in `BROKER_LOG_DIR`, when set
fn init_tracing() -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    use tracing_appender::rolling::{RollingFileAppender, Rotation};
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    // RUST_LOG takes precedence
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("info")
            .add_directive("rsbroker=debug".parse()?)
            .add_directive("rsbroker_core=debug".parse()?)
            .add_directive("rsbroker_gateway=debug".parse()?),
    };

    let console_layer = fmt::layer()
        .with_ansi(true)
        .compact()
        .with_thread_names(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true);

    let (file_layer, guard) = match std::env::var_os("BROKER_LOG_DIR").map(PathBuf::from) {
        Some(logs_dir) => {
            std::fs::create_dir_all(&logs_dir).with_context(|| {
                format!("Failed to create log directory {}", logs_dir.display())
            })?;

            let file_appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(LOG_PREFIX)
                .filename_suffix("log")
                .build(&logs_dir)
                .context("Failed to create log file appender")?;
            let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

            let layer = fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Kept alive for the life of the process so buffered lines are flushed
    let _guard = init_tracing()?;

    let config = Arc::new(BrokerConfig::from_env().context("Invalid broker configuration")?);
    info!(?config, "[Broker] Configuration loaded");

    let catalog = Arc::new(ServiceCatalog::from_config(&config)?);
    let engine = LifecycleEngine::new(
        config.clone(),
        catalog.clone(),
        Arc::new(InMemoryInstanceRepository::new()),
        Arc::new(DefaultBackend),
    );

    BrokerServer::new(config, catalog, engine)?.run().await
}
