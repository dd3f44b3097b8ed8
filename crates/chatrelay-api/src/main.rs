//! chatrelay HTTP server entry point.
//!
//! Binary name: `chatrelay`
//!
//! Parses CLI arguments, loads configuration and credentials, wires the
//! services, then serves the chat trigger until Ctrl+C or SIGTERM. On
//! shutdown the persistence queue is drained before the process exits.

mod cli;
mod http;
mod state;

use anyhow::Context;
use clap::Parser;

use chatrelay_infra::config::{AppSecrets, load_service_config};
use chatrelay_observe::tracing_setup::{LoggingConfig, init_tracing, shutdown_tracing};
use chatrelay_types::config::ServiceConfig;

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_service_config(&cli.config).await;

    let logging = LoggingConfig {
        level: cli
            .level_override()
            .map(str::to_string)
            .unwrap_or_else(|| config.logging.level.clone()),
        json: config.logging.json,
        otel: config.logging.otel,
    };
    init_tracing(&logging).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = match cli.command {
        Commands::Serve { port, host } => serve(config, host, port).await,
    };

    shutdown_tracing();
    result
}

async fn serve(config: ServiceConfig, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let secrets = AppSecrets::from_env().context("reading credentials from the environment")?;
    let (state, worker) = AppState::init(&config, &secrets).await?;

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(%addr, "chatrelay listening");

    let router = http::router::build_router(state);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router (and with it the queue sender) is gone; wait for the drain.
    let stats = worker.await?;
    tracing::info!(saved = stats.saved, failed = stats.failed, "server stopped");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}
