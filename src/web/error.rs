//! JSON error responses for API handlers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use std::fmt;
use ts_rs::TS;

/// Machine-readable error codes returned alongside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[ts(export)]
pub enum ApiErrorCode {
    NotFound,
    BadRequest,
    Unauthorized,
    UpstreamFailed,
    InternalError,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiErrorCode::UpstreamFailed => StatusCode::BAD_GATEWAY,
            ApiErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, Serialize, TS)]
#[ts(export)]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::BadRequest, message)
    }

    pub fn unauthorized() -> Self {
        Self::new(ApiErrorCode::Unauthorized, "Unauthorized")
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::UpstreamFailed, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::InternalError, message)
    }

    pub fn status(&self) -> StatusCode {
        self.code.status()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Log a storage failure and hide its details from the client.
pub fn db_error(context: &str, error: impl fmt::Debug) -> ApiError {
    tracing::error!(error = ?error, context, "Database error");
    ApiError::internal_error(format!("{context} failed"))
}

/// Turn a missing row into a 404.
pub trait OptionNotFoundExt<T> {
    fn or_not_found(self, entity: &str, id: impl fmt::Display) -> Result<T, ApiError>;
}

impl<T> OptionNotFoundExt<T> for Option<T> {
    fn or_not_found(self, entity: &str, id: impl fmt::Display) -> Result<T, ApiError> {
        self.ok_or_else(|| ApiError::not_found(format!("{entity} '{id}' not found")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_map_to_status() {
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::upstream("x").status(), StatusCode::BAD_GATEWAY);
        assert_eq!(ApiError::unauthorized().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_or_not_found_message() {
        let err = None::<i32>.or_not_found("Vehicle", 42).unwrap_err();
        assert_eq!(err.code, ApiErrorCode::NotFound);
        assert_eq!(err.message, "Vehicle '42' not found");
    }

    #[test]
    fn test_serialized_code_is_screaming_snake() {
        let json = serde_json::to_value(ApiError::upstream("boom")).unwrap();
        assert_eq!(json["code"], "UPSTREAM_FAILED");
        assert_eq!(json["message"], "boom");
    }
}
