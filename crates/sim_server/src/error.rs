//! Request-facing error type
//!
//! Only lookups of unknown symbols, models and strategies reach the caller;
//! everything else is logged where it happens.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sim_core::{RecordKind, StoreError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("Symbol not found")]
    SymbolNotFound,

    #[error("Model not found")]
    ModelNotFound,

    #[error("Strategy not found")]
    StrategyNotFound,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::SymbolNotFound | ApiError::ModelNotFound | ApiError::StrategyNotFound => {
                StatusCode::NOT_FOUND
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err.kind() {
            RecordKind::Strategy => ApiError::StrategyNotFound,
            RecordKind::Model => ApiError::ModelNotFound,
        }
    }
}

/// Error body, `{"detail": "..."}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
