use anyhow::{Context, Result};
use simplan_pipeline::{app, config::Config, scheduler};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (ignored in production)
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("simplan_pipeline=info".parse()?),
        )
        .init();

    info!("Starting multilingual content pipeline");

    // Configuration errors are fatal before any work starts
    let config = Arc::new(Config::from_env()?);
    info!(
        "Environment: {}, target languages: {}",
        config.environment,
        config
            .target_languages
            .iter()
            .map(|l| l.code())
            .collect::<Vec<_>>()
            .join(",")
    );

    let state = app::AppState::initialize(&config).await?;

    let mut job_scheduler = scheduler::start_scheduler(Arc::clone(&config), state.clone()).await?;

    let router = app::app_router(state.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("✓ Listening on http://{}", addr);

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    info!("Shutting down");
    if let Err(e) = job_scheduler.shutdown().await {
        error!("Failed to stop scheduler: {}", e);
    }
    state.shutdown().await;

    served.context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
