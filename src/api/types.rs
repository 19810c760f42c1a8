//! API request and error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, RequestError};

/// Optional JSON body of `POST /clearsky/...`.
///
/// Timestamps are RFC 3339. Both must be given, or neither.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindowBody {
    pub start: Option<DateTime<FixedOffset>>,
    pub end: Option<DateTime<FixedOffset>>,
}

/// JSON error body.
///
/// `columns` and `table` are only present for an incomplete result table.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
}

/// Error returned by a handler: status code plus JSON body.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                columns: None,
                table: None,
            },
        }
    }
}

impl From<RequestError> for ApiError {
    fn from(e: RequestError) -> Self {
        Self::new(StatusCode::BAD_REQUEST, e.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::Request(e) => e.into(),
            PipelineError::PlantNotFound(e) => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            PipelineError::Incomplete(e) => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: ErrorResponse {
                    error: e.to_string(),
                    columns: Some(e.columns),
                    table: Some(e.table),
                },
            },
            PipelineError::Cancelled => Self::new(StatusCode::GATEWAY_TIMEOUT, "forecast cancelled"),
            e @ (PipelineError::Table(_) | PipelineError::WorkerPool(_)) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
