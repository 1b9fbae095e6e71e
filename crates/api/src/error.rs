use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use canvasgen_core::error::CoreError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] for domain errors and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `canvasgen_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A missing sub-resource (e.g. a reference on an existing node).
    #[error("Not found: {0}")]
    NotFound(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

/// HTTP status for a domain error.
fn core_status(err: &CoreError) -> StatusCode {
    match err {
        CoreError::ConcurrencyViolation { .. } => StatusCode::CONFLICT,
        CoreError::MissingPrerequisite(_) | CoreError::Validation(_) => StatusCode::BAD_REQUEST,
        CoreError::InsufficientCredit { .. } => StatusCode::PAYMENT_REQUIRED,
        CoreError::DispatchFailure(_) | CoreError::Upstream(_) => StatusCode::BAD_GATEWAY,
        CoreError::StaleNodeReference(_) => StatusCode::NOT_FOUND,
        CoreError::Storage(_) | CoreError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => {
                let status = core_status(core);
                let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
                    tracing::error!(error = %core, "Internal core error");
                    "An internal error occurred".to_string()
                } else {
                    core.to_string()
                };
                (status, core.code(), message)
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
