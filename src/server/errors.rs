use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use log::error;

use crate::collector::CollectError;
use crate::schema::ErrorResponse;

/// Message used for every failed collection.
pub const COLLECT_FAILED: &str = "Failed to retrieve character data";

/// Errors a handler can return.
///
/// Every variant renders as a JSON `{error, details}` body, so callers
/// always receive a well-formed response.
#[derive(Debug)]
pub enum AppError {
    /// The collection run failed at subscription level.
    Collect(CollectError),
}

impl From<CollectError> for AppError {
    fn from(err: CollectError) -> Self {
        AppError::Collect(err)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Collect(err) => {
                error!("Collection failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: COLLECT_FAILED.to_string(),
                        details: err.feed_error().to_string(),
                    },
                )
            }
        };

        (status, Json(body)).into_response()
    }
}
