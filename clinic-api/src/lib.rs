pub mod config;
pub mod formats;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;

use axum::routing::get;
use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use clinic_shared::clients::db::DbPool;
use clinic_shared::middleware::metrics_middleware;
use clinic_shared::types::auth::TokenSecret;

use config::AppConfig;

pub struct AppState {
    pub db: DbPool,
    pub config: AppConfig,
    /// Absent when no Prometheus recorder is installed (tests).
    pub metrics_handle: Option<PrometheusHandle>,
}

impl TokenSecret for AppState {
    fn jwt_secret(&self) -> &str {
        &self.config.jwt_secret
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .nest("/user", routes::users::router())
        .nest("/doctor", routes::doctors::router())
        .nest("/medical-records", routes::medical_records::router())
        .nest("/admin", routes::admin::router());

    Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/metrics", get(routes::health::metrics))
        .nest("/api/v1", api)
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
