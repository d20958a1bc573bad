use std::sync::Arc;

use anyhow::Context;

use plantcare_api::app;
use plantcare_infra::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    plantcare_observability::init();

    let config = AppConfig::from_env().context("reading configuration")?;
    let services = Arc::new(app::services::build_services(&config)?);
    let router = app::build_app(Arc::clone(&services));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            tracing::info!("shutdown requested");
        })
        .await
        .context("http server failed")?;

    services.shutdown().await;
    Ok(())
}
