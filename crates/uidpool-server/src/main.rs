#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use server::config::{CliArgs, ServerConfig};
use server::handler::{AppState, router};
use server::reports::drain_reports;
use server::source::RedisRangeSource;
use server::telemetry::{init_telemetry, shutdown_telemetry};
use tokio::net::TcpListener;
use tokio::signal;
use uidpool::{BackgroundMaintainer, Pool, RedisStore};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry()?;

    let store = RedisStore::connect(&config.redis_url).await?;
    let source = RedisRangeSource::new(
        store.connection(),
        config.counter_key.clone(),
        config.batch_size,
    );
    let pool = Pool::new(config.pool.clone(), store, source);

    let (background, reports) = BackgroundMaintainer::spawn(pool.maintainer().clone());
    let drain = tokio::spawn(drain_reports(reports));

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config);

    let served = axum::serve(listener, router(AppState::new(pool)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // 1. HTTP is down; stop refilling. Dropping the maintainer closes the
    // report channel, which ends the drain task.
    background.shutdown().await;
    if let Err(e) = drain.await {
        tracing::error!("report drain task failed: {e}");
    }

    // 2. Flush whatever telemetry is still buffered.
    tracing::info!("Service shut down successfully");
    shutdown_telemetry(providers);

    served?;
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting uidpool server on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting uidpool server on {} for pool `{}` (threshold {}, batch {})",
            config.server_addr,
            config.pool.pool_key(),
            config.pool.threshold(),
            config.batch_size
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
}
