//! HTTP front end for `pi-spigot`.
//!
//! Serves `POST /calculate` (`{"x": cycles, "n": digits}` in, `{"pi": ...}`
//! out) and `GET /health` on top of a single fixed worker pool created at
//! startup.

mod server;

use clap::Parser;
use pi_spigot::{Bbp, DigitEngine, WorkerPool};
use server::config::{CliArgs, ServerConfig};
use server::handler::{AppState, router};
use server::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

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

    init_telemetry()?;

    let pool = Arc::new(WorkerPool::new(config.pool.clone(), Bbp)?);
    let state = AppState::new(Arc::clone(&pool), config.max_digits);

    let listener = TcpListener::bind(&config.server_addr).await?;
    log_startup_info(&config);

    axum::serve(listener, router(state.clone()))
        .with_graceful_shutdown(shutdown_signal(state))
        .await?;

    // In-flight requests have drained; the workers can go.
    if let Err(e) = pool.shutdown().await {
        tracing::error!("Error during worker pool shutdown: {e}");
    }

    tracing::info!("Service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "Starting pi service on {} with full config: {:#?}",
            config.server_addr,
            config
        );
    } else {
        tracing::info!(
            "Starting pi service on {} with {} workers",
            config.server_addr,
            config.pool.size
        );
    }
}

async fn shutdown_signal<E: DigitEngine>(state: AppState<E>) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("Received SIGTERM signal");
        },
    }

    tracing::info!("Shutdown signal received, terminating gracefully...");
    state.mark_not_serving();
}
