//! Web API router construction and shared response utilities.

use axum::{
    Router,
    http::HeaderValue,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
};
use std::time::Duration;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, timeout::TimeoutLayer};

use crate::state::AppState;
use crate::web::middleware::request_id::RequestIdLayer;
use crate::web::{scan, status, vehicles};

/// Cache-Control presets.
pub mod cache {
    /// Inventory reads; a scan can change them at any time.
    pub const LISTING: &str = "private, max-age=15";
    /// Scan progress and on-demand scrapes.
    pub const NO_STORE: &str = "private, no-store, must-revalidate";
}

/// Wraps a JSON response with a `Cache-Control` header.
pub fn with_cache_control<T: serde::Serialize>(value: T, header: &'static str) -> Response {
    let mut response = Json(value).into_response();
    response.headers_mut().insert(
        axum::http::header::CACHE_CONTROL,
        HeaderValue::from_static(header),
    );
    response
}

/// Creates the web server router
pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/health", get(status::health))
        .route("/status", get(status::status))
        .route(
            "/vehicles",
            get(vehicles::list_vehicles).post(vehicles::upsert_vehicle),
        )
        .route("/vehicles/by-url", get(vehicles::get_vehicle_by_url))
        .route("/vehicles/{id}", get(vehicles::get_vehicle))
        .route("/vehicles/{id}/status", put(vehicles::set_vehicle_status))
        .route("/vehicles/{id}/services", post(vehicles::add_service_item))
        .route("/vehicles/{id}/pricing", get(vehicles::get_pricing))
        .route("/scan/urls", get(scan::scan_urls))
        .route("/scan/detail", get(scan::scan_detail))
        .route("/scan/refresh", post(scan::trigger_refresh))
        .route("/scan/status", get(scan::scan_status))
        .with_state(app_state);

    Router::new().nest("/api", api_router).layer((
        // Outermost: per-request ID span + severity-proportional response logging.
        RequestIdLayer,
        CorsLayer::permissive(),
        CompressionLayer::new()
            .br(true)
            .gzip(true)
            .quality(tower_http::CompressionLevel::Fastest),
        // A single-URL scrape can take up to the detail timeout.
        TimeoutLayer::new(Duration::from_secs(60)),
    ))
}
