mod api;
mod config;
mod core;
mod error;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use poem::{listener::TcpListener, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::ServiceConfig;

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if dotenv.is_err() {
        info!("no .env file found");
    }

    let config = Arc::new(ServiceConfig::from_env());
    let addr = config.bind_addr();
    info!("starting server on {addr}");
    info!("max file size: {} bytes", config.max_file_size);
    info!("default quality: {}", config.default_quality.get());

    let app = api::build_app(config);

    Server::new(TcpListener::bind(addr.as_str()))
        .run_with_graceful_shutdown(app, shutdown_signal(), Some(SHUTDOWN_GRACE))
        .await
        .with_context(|| format!("failed to serve on {addr}"))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}
