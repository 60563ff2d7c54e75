//! On-demand scan endpoints.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use tracing::info;
use ts_rs::TS;

use crate::config::{MAX_PAGES_RANGE, PAGE_SIZE_RANGE, check_range};
use crate::data::models::Candidate;
use crate::dealer::listings::{EnumerateOptions, collect_active_urls};
use crate::dealer::{DealerError, scrape_listing};
use crate::scraper::batch::ScanStatus;
use crate::state::AppState;
use crate::web::auth::Authorized;
use crate::web::error::ApiError;
use crate::web::routes::{cache, with_cache_control};

const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Default, Deserialize)]
pub struct ScanQuery {
    pub limit: Option<u32>,
    pub pages: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DetailQuery {
    pub url: String,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ScanUrlsResponse {
    pub total: usize,
    pub sample: Vec<String>,
    pub urls: Vec<String>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct RefreshResponse {
    /// False when a scan was already running.
    pub triggered: bool,
    pub status: ScanStatus,
}

/// Apply query overrides to the configured paging, rejecting out-of-range values.
fn enumerate_options(base: &EnumerateOptions, query: &ScanQuery) -> Result<EnumerateOptions, ApiError> {
    let mut options = base.clone();
    if let Some(limit) = query.limit {
        options.page_size =
            check_range("limit", limit, &PAGE_SIZE_RANGE).map_err(ApiError::bad_request)?;
    }
    if let Some(pages) = query.pages {
        options.max_pages =
            check_range("pages", pages, &MAX_PAGES_RANGE).map_err(ApiError::bad_request)?;
    }
    Ok(options)
}

fn dealer_error(e: DealerError) -> ApiError {
    match e {
        DealerError::InvalidUrl(url) => ApiError::bad_request(format!("invalid url '{url}'")),
        other => {
            tracing::warn!(error = %other, "dealer site request failed");
            ApiError::upstream(other.to_string())
        }
    }
}

/// `GET /api/scan/urls`: Enumerate active listings without touching the database.
pub async fn scan_urls(
    State(state): State<AppState>,
    Query(query): Query<ScanQuery>,
) -> Result<Response, ApiError> {
    let options = enumerate_options(&state.scan.options.enumerate, &query)?;
    let urls = collect_active_urls(state.dealer.as_ref(), &options)
        .await
        .map_err(dealer_error)?;

    Ok(with_cache_control(
        ScanUrlsResponse {
            total: urls.len(),
            sample: urls.iter().take(SAMPLE_SIZE).cloned().collect(),
            urls,
        },
        cache::NO_STORE,
    ))
}

/// `GET /api/scan/detail?url=`: Scrape one listing without persisting it.
pub async fn scan_detail(
    State(state): State<AppState>,
    Query(query): Query<DetailQuery>,
) -> Result<Json<Candidate>, ApiError> {
    let candidate = scrape_listing(state.dealer.as_ref(), query.url.trim())
        .await
        .map_err(dealer_error)?;
    Ok(Json(candidate))
}

/// `POST /api/scan/refresh`: Wake the scheduler for an immediate scan.
pub async fn trigger_refresh(_auth: Authorized, State(state): State<AppState>) -> Response {
    let status = state.scan.tracker.snapshot().await;
    let triggered = !status.phase.is_running();
    if triggered {
        info!("manual scan requested via API");
        state.scan.trigger.notify_one();
    }

    (
        StatusCode::ACCEPTED,
        Json(RefreshResponse { triggered, status }),
    )
        .into_response()
}

/// `GET /api/scan/status`
pub async fn scan_status(State(state): State<AppState>) -> Response {
    with_cache_control(state.scan.tracker.snapshot().await, cache::NO_STORE)
}
