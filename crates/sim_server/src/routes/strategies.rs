//! Strategy table and toggling
//!
//! A toggle through HTTP has the same effect as a `toggle_strategy` control
//! message on the push channel: the full table is broadcast afterwards.

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use sim_core::StrategyRecord;

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategiesResponse {
    pub strategies: Vec<StrategyRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleRequest {
    pub enabled: bool,
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/strategies", get(list_handler))
        .route("/api/strategies/{id}/toggle", post(toggle_handler))
}

/// GET /api/strategies
async fn list_handler(State(state): State<AppState>) -> Json<StrategiesResponse> {
    Json(StrategiesResponse {
        strategies: state.store.strategies().snapshot(),
    })
}

/// POST /api/strategies/{id}/toggle
async fn toggle_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<ToggleRequest>,
) -> Result<Json<StrategyRecord>, ApiError> {
    let record = state
        .hub
        .toggle_strategy(&state.store, &id, request.enabled)?;

    Ok(Json(record))
}
