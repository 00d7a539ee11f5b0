use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use jobboard_auth::PolicyError;
use jobboard_core::DomainError;
use jobboard_notifications::QueueError;

/// Request failure, rendered as `{"error", "message"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Misconfigured policy; already logged by the decision engine.
    #[error(transparent)]
    Policy(#[from] PolicyError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Forbidden(msg) => json_error(StatusCode::FORBIDDEN, "forbidden", msg),
            ApiError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, "bad_request", msg),
            ApiError::Domain(e) => domain_error_to_response(e),
            ApiError::Policy(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "policy_error", e.to_string()),
            ApiError::Queue(QueueError::NotFound(_)) => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
            ApiError::Queue(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "queue_error", e.to_string()),
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::InvariantViolation(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", msg)
        }
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::Forbidden("no".to_string()), StatusCode::FORBIDDEN),
            (ApiError::BadRequest("bad".to_string()), StatusCode::BAD_REQUEST),
            (ApiError::Domain(DomainError::NotFound), StatusCode::NOT_FOUND),
            (ApiError::Domain(DomainError::conflict("dup")), StatusCode::CONFLICT),
            (ApiError::Domain(DomainError::invalid_id("x")), StatusCode::BAD_REQUEST),
            (ApiError::Policy(PolicyError::AlreadyInstalled), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
