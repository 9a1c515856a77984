use std::sync::Arc;

use anyhow::Context;

use crate::api;
use crate::config::AppConfig;
use crate::platform::Platform;

pub async fn handle(config: &AppConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Captify in {:?} mode", config.environment);
    if config.security.jwt_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set; every request will be treated as anonymous");
    }

    let platform = Platform::bootstrap(config).context("refusing to serve with an inconsistent route table")?;
    let app = api::app(Arc::new(platform), config);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("Captify listening on http://{}", bind_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Captify stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
