//! Free-form bot commands

use axum::{response::Json, routing::post, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub command: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub command: String,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

pub fn routes() -> Router<AppState> {
    Router::new().route("/api/command", post(command_handler))
}

/// POST /api/command - every command is acknowledged as executed
async fn command_handler(Json(request): Json<CommandRequest>) -> Json<CommandResponse> {
    info!(
        command = %request.command,
        parameters = %serde_json::Value::Object(request.parameters.clone()),
        "Command received"
    );

    Json(CommandResponse {
        message: format!("Command {} executed successfully", request.command),
        command: request.command,
        status: "executed".to_string(),
        timestamp: Utc::now(),
    })
}
