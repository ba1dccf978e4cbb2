//! Centralized error type for the API.
//!
//! Every failure a handler can surface is an `ApiError`. The HTTP mapping
//! mirrors the response contract of the service: a JSON body shaped
//! `{"detail": ...}` plus an `X-Error` header naming the error kind.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::HeaderName},
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Invalid token")]
    InvalidToken,
    #[error("This user has no permission to perform this action")]
    NoPermission,
    #[error("Invalid ID provided")]
    InvalidIdentifier,
    #[error("Invalid {0} is provided")]
    UnknownValue(&'static str),
    #[error("Invalid {0} is provided")]
    InvalidValue(&'static str),
    #[error("Invalid WKT string or type")]
    InvalidWktStringOrType,
    #[error("The SRID of the geometry is not 4326")]
    InvalidSrid4326,
    #[error("The geometry is not a valid Axis-Aligned Bounding Box")]
    InvalidAabb,
    #[error("Boundary area not within the prescribed limits")]
    InvalidBoundaryArea,
    #[error("The bus stop location is not within the landmark boundary")]
    BusStopOutsideLandmark,
    #[error("Route is not usable")]
    InvalidRoute,
    #[error("The account is not in active status")]
    InactiveAccount,
    #[error("Lock acquisition timed out")]
    LockAcquireTimeout,
    #[error("Maximum limit for {0} is exceeded")]
    ExceededMaxLimit(&'static str),
    #[error("{0}")]
    UniqueViolation(String),
    #[error("{0}")]
    ForeignKeyViolation(String),
    #[error("Invalid image provided")]
    InvalidImage,
    #[error("redis unavailable: {0}")]
    Redis(#[from] redis::RedisError),
    #[error(transparent)]
    Database(sqlx::Error),
    #[error("object storage failure: {0}")]
    Storage(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        use ApiError::*;
        match self {
            InvalidCredentials | InvalidToken => StatusCode::UNAUTHORIZED,
            NoPermission => StatusCode::FORBIDDEN,
            InvalidIdentifier | UnknownValue(_) => StatusCode::NOT_FOUND,
            InvalidValue(_)
            | InvalidWktStringOrType
            | InvalidSrid4326
            | InvalidAabb
            | InvalidBoundaryArea
            | BusStopOutsideLandmark
            | InvalidRoute
            | LockAcquireTimeout
            | ExceededMaxLimit(_)
            | InvalidImage => StatusCode::NOT_ACCEPTABLE,
            InactiveAccount => StatusCode::PRECONDITION_FAILED,
            UniqueViolation(_) => StatusCode::CONFLICT,
            ForeignKeyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Redis(_) => StatusCode::SERVICE_UNAVAILABLE,
            Database(_) | Storage(_) | Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Error kind reported in the `X-Error` response header.
    pub fn kind(&self) -> &'static str {
        use ApiError::*;
        match self {
            InvalidCredentials => "InvalidCredentials",
            InvalidToken => "InvalidToken",
            NoPermission => "NoPermission",
            InvalidIdentifier => "InvalidIdentifier",
            UnknownValue(_) => "UnknownValue",
            InvalidValue(_) => "InvalidValue",
            InvalidWktStringOrType => "InvalidWKTStringOrType",
            InvalidSrid4326 => "InvalidSRID4326",
            InvalidAabb => "InvalidAABB",
            InvalidBoundaryArea => "InvalidBoundaryArea",
            BusStopOutsideLandmark => "BusStopOutsideLandmark",
            InvalidRoute => "UnusableRoute",
            InactiveAccount => "InactiveAccount",
            LockAcquireTimeout => "LockAcquireTimeout",
            ExceededMaxLimit(_) => "ExceededMaxLimit",
            UniqueViolation(_) => "UniqueViolation",
            ForeignKeyViolation(_) => "ForeignKeyViolation",
            InvalidImage => "InvalidImage",
            Redis(_) => "RedisDBError",
            Database(_) | Storage(_) | Internal(_) => "InternalError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }
        let detail = if status.is_server_error() {
            // Do not leak internals to clients.
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        let mut response = (status, Json(json!({ "detail": detail }))).into_response();
        if let Ok(value) = HeaderValue::from_str(self.kind()) {
            response
                .headers_mut()
                .insert(HeaderName::from_static("x-error"), value);
        }
        response
    }
}

/// Classify constraint violations by SQLSTATE; everything else is a plain
/// database failure.
impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            let detail = db_err.message().to_string();
            match db_err.code().as_deref() {
                Some("23505") => return ApiError::UniqueViolation(detail),
                Some("23503") => return ApiError::ForeignKeyViolation(detail),
                _ => {}
            }
        }
        ApiError::Database(err)
    }
}

impl From<argon2::password_hash::Error> for ApiError {
    fn from(err: argon2::password_hash::Error) -> Self {
        ApiError::Internal(format!("password hashing failed: {}", err))
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_the_contract() {
        assert_eq!(ApiError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NoPermission.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::InvalidIdentifier.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::UniqueViolation("dup".into()).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::ForeignKeyViolation("fk".into()).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::InactiveAccount.status(),
            StatusCode::PRECONDITION_FAILED
        );
        assert_eq!(
            ApiError::InvalidAabb.status(),
            StatusCode::NOT_ACCEPTABLE
        );
    }

    #[test]
    fn kind_matches_the_wire_header_names() {
        assert_eq!(ApiError::InvalidWktStringOrType.kind(), "InvalidWKTStringOrType");
        assert_eq!(ApiError::InvalidSrid4326.kind(), "InvalidSRID4326");
        assert_eq!(ApiError::InvalidRoute.kind(), "UnusableRoute");
        assert_eq!(ApiError::LockAcquireTimeout.kind(), "LockAcquireTimeout");
    }

    #[test]
    fn response_carries_x_error_header_and_detail_body() {
        let response = ApiError::BusStopOutsideLandmark.into_response();
        assert_eq!(response.status(), StatusCode::NOT_ACCEPTABLE);
        assert_eq!(
            response.headers().get("x-error").unwrap(),
            "BusStopOutsideLandmark"
        );
    }
}
