//! Health and status handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use tracing::trace;
use ts_rs::TS;

use crate::state::{AppState, ServiceStatus};

#[derive(Serialize, TS)]
#[ts(export)]
pub struct ServiceInfo {
    name: String,
    status: ServiceStatus,
}

#[derive(Serialize, TS)]
#[ts(export)]
pub struct StatusResponse {
    status: ServiceStatus,
    version: String,
    commit: String,
    services: BTreeMap<String, ServiceInfo>,
}

/// Health check endpoint
pub(super) async fn health() -> Json<Value> {
    trace!("health check requested");
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Roll individual service states up into one.
fn overall_status<'a>(statuses: impl IntoIterator<Item = &'a ServiceStatus>) -> ServiceStatus {
    let statuses: Vec<_> = statuses.into_iter().collect();
    if statuses.is_empty() {
        ServiceStatus::Disabled
    } else if statuses.iter().any(|s| matches!(s, ServiceStatus::Error)) {
        ServiceStatus::Error
    } else if statuses.iter().any(|s| matches!(s, ServiceStatus::Starting)) {
        ServiceStatus::Starting
    } else {
        ServiceStatus::Active
    }
}

/// Status endpoint showing service states and build info
pub(super) async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let mut services = BTreeMap::new();
    for (name, svc_status) in state.service_statuses.all() {
        services.insert(
            name.clone(),
            ServiceInfo {
                name,
                status: svc_status,
            },
        );
    }

    Json(StatusResponse {
        status: overall_status(services.values().map(|s| &s.status)),
        version: env!("CARGO_PKG_VERSION").to_string(),
        commit: env!("GIT_COMMIT_HASH").to_string(),
        services,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overall_status() {
        assert_eq!(
            overall_status(Vec::<&ServiceStatus>::new()),
            ServiceStatus::Disabled
        );
        assert_eq!(
            overall_status([&ServiceStatus::Active, &ServiceStatus::Disabled]),
            ServiceStatus::Active
        );
        assert_eq!(
            overall_status([&ServiceStatus::Active, &ServiceStatus::Error]),
            ServiceStatus::Error
        );
        assert_eq!(
            overall_status([&ServiceStatus::Starting, &ServiceStatus::Active]),
            ServiceStatus::Starting
        );
    }
}
