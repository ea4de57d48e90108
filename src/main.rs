use anyhow::Context;
use coupon_service_rust::config::{AppConfig, LogFormat};
use coupon_service_rust::coupons::AppState;
use coupon_service_rust::router::create_app_router;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn init_logging(config: &AppConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);

    match config.logging.format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Pretty => builder.pretty().init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    init_logging(&config);

    let addr = config.socket_addr()?;

    // Initialize application state
    let state = Arc::new(AppState::new(config));

    // Build application router with all routes and middleware
    let app = create_app_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, "coupon service listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
