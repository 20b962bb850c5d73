use std::sync::Arc;

use clinic_api::config::AppConfig;
use clinic_api::AppState;
use clinic_shared::clients::db;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    clinic_shared::middleware::init_tracing("clinic-api");

    let config = AppConfig::load()?;
    let port = config.port;

    let db = db::create_pool(&config.database_url, config.db_pool_size)?;
    let metrics_handle = clinic_shared::middleware::init_metrics()?;

    let state = Arc::new(AppState {
        db,
        config,
        metrics_handle: Some(metrics_handle),
    });

    let app = clinic_api::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "clinic-api starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown signal received");
}
