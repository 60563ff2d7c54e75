//! Vehicle inventory handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{info, instrument};
use ts_rs::TS;

use crate::data::models::{Candidate, NewServiceItem, ServiceItem, Vehicle};
use crate::data::vehicles::VehicleListParams;
use crate::data::{service_items, vehicles};
use crate::pricing::{self, PricingEstimate, PricingInput};
use crate::scraper::reconcile::ReconcileOutcome;
use crate::state::AppState;
use crate::utils::log_if_slow;
use crate::web::auth::Authorized;
use crate::web::error::{ApiError, OptionNotFoundExt, db_error};
use crate::web::routes::{cache, with_cache_control};

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VehicleListResponse {
    pub vehicles: Vec<Vehicle>,
    #[ts(type = "number")]
    pub total: i64,
    #[ts(type = "number")]
    pub limit: i64,
    #[ts(type = "number")]
    pub offset: i64,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VehicleDetail {
    pub vehicle: Vehicle,
    pub services: Vec<ServiceItem>,
}

#[derive(Debug, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct UpsertResponse {
    pub vehicle: Vehicle,
    pub outcome: ReconcileOutcome,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

#[derive(Debug, Deserialize, TS)]
#[ts(export)]
pub struct StatusUpdate {
    pub status: String,
}

const MAX_STATUS_LEN: usize = 32;
const SLOW_LIST_THRESHOLD: Duration = Duration::from_millis(500);

/// Normalize a manually supplied lifecycle status.
fn normalize_status(raw: &str) -> Result<String, ApiError> {
    let status = raw.trim().to_lowercase();
    if status.is_empty() || status.len() > MAX_STATUS_LEN {
        return Err(ApiError::bad_request(format!(
            "status must be 1-{MAX_STATUS_LEN} characters"
        )));
    }
    Ok(status)
}

fn validate_service_item(item: &NewServiceItem) -> Result<(), ApiError> {
    if item.description.trim().is_empty() {
        return Err(ApiError::bad_request("description is required"));
    }
    let amounts = [item.parts_cost, item.labor_hours, item.labor_rate];
    if amounts.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return Err(ApiError::bad_request(
            "costs, hours and rates must be non-negative numbers",
        ));
    }
    Ok(())
}

/// `GET /api/vehicles`: Newest first, optional `q` search.
pub async fn list_vehicles(
    State(state): State<AppState>,
    Query(params): Query<VehicleListParams>,
) -> Result<Response, ApiError> {
    let start = Instant::now();
    let (rows, total) = vehicles::list(&state.db_pool, &params)
        .await
        .map_err(|e| db_error("Vehicle list", e))?;
    log_if_slow(start, SLOW_LIST_THRESHOLD, "vehicle_list");

    Ok(with_cache_control(
        VehicleListResponse {
            vehicles: rows,
            total,
            limit: params.effective_limit(),
            offset: params.effective_offset(),
        },
        cache::LISTING,
    ))
}

/// `GET /api/vehicles/{id}`: The vehicle and its service history.
pub async fn get_vehicle(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<VehicleDetail>, ApiError> {
    let vehicle = vehicles::find_by_id(&state.db_pool, id)
        .await
        .map_err(|e| db_error("Vehicle lookup", e))?
        .or_not_found("Vehicle", id)?;

    let services = service_items::list_for_vehicle(&state.db_pool, id)
        .await
        .map_err(|e| db_error("Service item list", e))?;

    Ok(Json(VehicleDetail { vehicle, services }))
}

/// `GET /api/vehicles/by-url?url=`
pub async fn get_vehicle_by_url(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<Vehicle>, ApiError> {
    let url = query.url.trim();
    let vehicle = vehicles::find_by_url(&state.db_pool, url)
        .await
        .map_err(|e| db_error("Vehicle lookup", e))?
        .or_not_found("Vehicle", url)?;
    Ok(Json(vehicle))
}

/// `POST /api/vehicles`: Manual entry, merged exactly like a scraped listing.
#[instrument(skip_all)]
pub async fn upsert_vehicle(
    _auth: Authorized,
    State(state): State<AppState>,
    Json(candidate): Json<Candidate>,
) -> Result<Response, ApiError> {
    if candidate.url.trim().is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }

    let reconciled = state
        .scan
        .reconciler
        .reconcile(&candidate)
        .await
        .map_err(|e| db_error("Vehicle upsert", e))?;

    let status = match reconciled.outcome {
        ReconcileOutcome::Created => StatusCode::CREATED,
        ReconcileOutcome::Updated => StatusCode::OK,
    };
    info!(
        id = reconciled.vehicle.id,
        url = %candidate.url,
        outcome = ?reconciled.outcome,
        "manual vehicle upsert"
    );

    Ok((
        status,
        Json(UpsertResponse {
            vehicle: reconciled.vehicle,
            outcome: reconciled.outcome,
        }),
    )
        .into_response())
}

/// `PUT /api/vehicles/{id}/status`
pub async fn set_vehicle_status(
    _auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<StatusUpdate>,
) -> Result<Json<Vehicle>, ApiError> {
    let status = normalize_status(&body.status)?;
    let vehicle = vehicles::set_status(&state.db_pool, id, &status)
        .await
        .map_err(|e| db_error("Vehicle status update", e))?
        .or_not_found("Vehicle", id)?;
    info!(id, status = %status, "vehicle status changed");
    Ok(Json(vehicle))
}

/// `POST /api/vehicles/{id}/services`
pub async fn add_service_item(
    _auth: Authorized,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(item): Json<NewServiceItem>,
) -> Result<(StatusCode, Json<ServiceItem>), ApiError> {
    validate_service_item(&item)?;

    vehicles::find_by_id(&state.db_pool, id)
        .await
        .map_err(|e| db_error("Vehicle lookup", e))?
        .or_not_found("Vehicle", id)?;

    let created = service_items::add(&state.db_pool, id, &item)
        .await
        .map_err(|e| db_error("Service item insert", e))?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/vehicles/{id}/pricing`
pub async fn get_pricing(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<PricingEstimate>, ApiError> {
    let vehicle = vehicles::find_by_id(&state.db_pool, id)
        .await
        .map_err(|e| db_error("Vehicle lookup", e))?
        .or_not_found("Vehicle", id)?;

    let estimate = pricing::estimate(&PricingInput::from(&vehicle), Utc::now().year());
    Ok(Json(estimate))
}
