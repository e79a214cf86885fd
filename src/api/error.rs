//! HTTP mapping of scoring errors

use crate::error::ScoringError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub struct ApiError(pub ScoringError);

impl From<ScoringError> for ApiError {
    fn from(err: ScoringError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            ScoringError::MalformedInput { field, reason } => (
                StatusCode::BAD_REQUEST,
                json!({
                    "error": reason,
                    "field": field,
                    "status": StatusCode::BAD_REQUEST.as_u16(),
                }),
            ),
            other => {
                tracing::error!(error = %other, "Scoring failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({
                        "error": "Internal server error",
                        "status": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                    }),
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
