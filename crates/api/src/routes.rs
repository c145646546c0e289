//! API route definitions

use crate::handlers;
use crate::SharedState;
use axum::{routing::get, Router};
use std::path::PathBuf;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
};

/// Create the main application router
pub fn create_router(state: SharedState, static_dir: Option<PathBuf>) -> Router {
    let api_routes = Router::new()
        .route("/", get(handlers::health_check))
        .route("/health", get(handlers::health_check))
        .route("/reports", get(handlers::list_reports))
        .route("/total-assets", get(handlers::total_assets))
        .route("/active-assets", get(handlers::active_assets))
        .route("/assets-department", get(handlers::assets_by_department))
        .route("/total-vulnerabilities", get(handlers::total_vulnerabilities))
        .route("/vulnerabilities-severity", get(handlers::vulnerabilities_by_severity))
        .route("/average-risk", get(handlers::average_risk_score))
        .route("/assets-monthly", get(handlers::assets_by_month))
        .route("/assets-type-donut", get(handlers::assets_by_type_donut))
        .route("/latest-vulnerabilities", get(handlers::latest_vulnerabilities))
        .route("/most-critical-asset", get(handlers::most_critical_asset))
        .with_state(state);

    // The dashboard is served from its own origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = api_routes.layer(cors).layer(CompressionLayer::new());

    // Serve the built dashboard if a directory is provided
    if let Some(dir) = static_dir {
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }

    app
}
