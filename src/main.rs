//! linekv server
//!
//! Sets up logging, restores the command log if one is configured, then
//! accepts client connections until Ctrl+C.

use anyhow::{anyhow, Context};
use clap::Parser;
use linekv::cmdlog::{CmdlogError, CommandLog};
use linekv::commands::CommandHandler;
use linekv::config::Config;
use linekv::connection::{handle_connection, ConnectionStats};
use linekv::storage::{ExpiryReaper, StorageEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for the command log writer to drain
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!(version = linekv::VERSION, "Starting linekv");

    let storage = Arc::new(StorageEngine::new());

    // Restore-then-serve: nothing is accepted until replay finishes
    let (logger, writer) = match &config.cmdlog {
        Some(path) => {
            let mut log = CommandLog::open(path).await?;

            match log.restore(Arc::clone(&storage)).await {
                Ok(_) => {}
                Err(e @ CmdlogError::Replay { .. }) => {
                    error!(error = %e, "Command log replay aborted, serving partially restored data");
                }
                Err(e) => return Err(e).context("failed to read command log"),
            }

            let (logger, writer) = log.start();
            (Some(logger), Some(writer))
        }
        None => {
            info!("Command log disabled");
            (None, None)
        }
    };

    let reaper = ExpiryReaper::start(Arc::clone(&storage), config.expiry());
    let stats = Arc::new(ConnectionStats::new());
    let handler = CommandHandler::with_logger(storage, logger);

    let listener = TcpListener::bind(&config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    info!(addr = %config.addr, "Listening");

    let mut writer = writer;
    let writer_exit = {
        let watch_writer = async {
            match writer.as_mut() {
                Some(handle) => Some(handle.await),
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = accept_loop(listener, handler.clone(), Arc::clone(&stats)) => None,
            _ = shutdown_signal() => None,
            exit = watch_writer => exit,
        }
    };

    // A writer that stops while serving means appends are failing
    if let Some(exit) = writer_exit {
        return match exit {
            Ok(Err(e)) => Err(e).context("command log writer failed"),
            Ok(Ok(())) => Err(anyhow!("command log writer stopped unexpectedly")),
            Err(e) => Err(e).context("command log writer panicked"),
        };
    }

    drop(reaper);
    drop(handler);
    stats.log_summary();

    if let Some(handle) = writer {
        match tokio::time::timeout(WRITER_DRAIN_TIMEOUT, handle).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => error!(error = %e, "Command log writer failed during shutdown"),
            Ok(Err(e)) => error!(error = %e, "Command log writer panicked"),
            // Connections still open hold the logger; flushed records are already on disk
            Err(_) => warn!("Command log writer still busy, exiting anyway"),
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Accepts connections and spawns one task per client.
async fn accept_loop(listener: TcpListener, handler: CommandHandler, stats: Arc<ConnectionStats>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let handler = handler.clone();
                let stats = Arc::clone(&stats);

                tokio::spawn(async move {
                    handle_connection(stream, addr, handler, stats).await;
                });
            }
            Err(e) => {
                error!(error = %e, "Failed to accept connection");
            }
        }
    }
}

async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, stopping server..."),
        Err(e) => {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}
