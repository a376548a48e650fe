use alert_scheduler::{app, config::Config, AppState};
use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "alert_scheduler=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET is not set, /v1 routes accept any caller");
    }

    let state = AppState::new(&config).await?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(environment = %config.environment, "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state)).await?;

    Ok(())
}
