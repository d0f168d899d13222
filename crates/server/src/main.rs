use anyhow::Context;
use taxlens_server::config::Config;
use taxlens_server::{routes, telemetry, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    telemetry::init(config.log_format, config.default_log_filter())?;

    let state = AppState::from_config(&config)?;
    if config.jwt_secret.is_empty() {
        tracing::warn!("AUTH_JWT_SECRET is empty; /api/tax/calculate will reject every request");
    }
    let provider = config
        .ai
        .as_ref()
        .map(|a| a.provider.to_string())
        .unwrap_or_else(|| "none".to_string());
    tracing::info!(
        port = config.port,
        environment = %config.environment,
        ai_provider = %provider,
        ai_enabled = state.classifier.ai_enabled(),
        "starting taxlens server"
    );

    let app = routes::router(state, &config.cors_origins);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("binding port {}", config.port))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
    }
}
