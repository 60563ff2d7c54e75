//! Bearer-token guard for mutating routes.

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;

use crate::state::AppState;
use crate::web::error::ApiError;

/// Extractor that rejects the request unless it carries the configured token.
///
/// When no `API_TOKEN` is configured every request is allowed.
pub struct Authorized;

fn token_matches(header: Option<&str>, expected: &str) -> bool {
    header
        .and_then(|h| h.strip_prefix("Bearer "))
        .is_some_and(|token| token.trim() == expected)
}

impl FromRequestParts<AppState> for Authorized {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(expected) = state.api_token.as_deref() else {
            return Ok(Authorized);
        };

        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        if token_matches(header, expected) {
            Ok(Authorized)
        } else {
            tracing::debug!(path = %parts.uri.path(), "rejected request without valid token");
            Err(ApiError::unauthorized())
        }
    }
}
