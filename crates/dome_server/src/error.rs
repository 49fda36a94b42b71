//! Maps [`dome_core::CoreError`] onto the minimal HTTP status/body contract
//! of §6/§7: `NotEligible` carries its machine-readable reason code,
//! `NotFound` is a bare 404, everything else collapses to 500 with the
//! error logged (never the raw message leaked to the caller), the same
//! "structured log, generic response" split the teacher's handlers use.

use axum::{http::StatusCode, response::IntoResponse, Json};
use dome_core::CoreError;
use serde::Serialize;
use tracing::error;

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    reason: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, reason) = match &self.0 {
            CoreError::NotFound(_) => (StatusCode::NOT_FOUND, None),
            CoreError::NotEligible(r) => {
                let status = match r {
                    dome_core::NotEligibleReason::InsufficientCredits | dome_core::NotEligibleReason::InsufficientGems => {
                        StatusCode::PAYMENT_REQUIRED
                    }
                    _ => StatusCode::CONFLICT,
                };
                (status, Some(r.code()))
            }
            CoreError::Conflict { .. } => (StatusCode::CONFLICT, None),
            CoreError::Transient(_) => (StatusCode::SERVICE_UNAVAILABLE, None),
            CoreError::Integrity(_) | CoreError::Fatal(_) => (StatusCode::INTERNAL_SERVER_ERROR, None),
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!(error = %self.0, "unhandled core error surfaced to HTTP layer");
        }

        (status, Json(ErrorBody { error: self.0.to_string(), reason })).into_response()
    }
}
