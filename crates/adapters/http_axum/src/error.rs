//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use sprinkler_app::commands::describe;
use sprinkler_domain::error::SprinklerError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    error: String,
}

/// Maps [`SprinklerError`] to an HTTP response with appropriate status code.
pub struct ApiError(SprinklerError);

impl From<SprinklerError> for ApiError {
    fn from(err: SprinklerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let (status, message) = match &self.0 {
            SprinklerError::InvalidArgument(_) => (StatusCode::BAD_REQUEST, describe(&self.0)),
            SprinklerError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            SprinklerError::InvalidState(_) | SprinklerError::NoMemory(_) => {
                (StatusCode::CONFLICT, describe(&self.0))
            }
            SprinklerError::Timeout => (StatusCode::SERVICE_UNAVAILABLE, self.0.to_string()),
            SprinklerError::Storage(_) | SprinklerError::Output(_) => {
                tracing::error!(error = %describe(&self.0), "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { code, error: message })).into_response()
    }
}
