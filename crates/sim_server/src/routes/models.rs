//! Prediction, model metric, model status and training endpoints

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sim_core::{generator, registry, Event, ModelMetric, ModelStatus, Prediction};
use tracing::info;

use super::AppState;
use crate::error::ApiError;

fn default_timeframe() -> String {
    "1h".to_string()
}

/// POST /api/predict body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionRequest {
    pub model: String,
    pub symbol: String,
    /// Accepted for compatibility; does not affect the prediction
    #[serde(default = "default_timeframe")]
    pub timeframe: String,
}

/// POST /api/train body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRequest {
    pub model: String,
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelStatusResponse {
    pub model: String,
    pub status: ModelStatus,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResponse {
    pub model: String,
    pub status: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// Build the model routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/predict", post(predict_handler))
        .route("/api/metrics/{model}", get(metrics_handler))
        .route("/api/status/{model}", get(status_handler))
        .route("/api/train", post(train_handler))
}

/// POST /api/predict - generates a prediction and pushes it to every subscriber
async fn predict_handler(
    State(state): State<AppState>,
    Json(request): Json<PredictionRequest>,
) -> Result<Json<Prediction>, ApiError> {
    if !state.store.models().contains(&request.model) {
        return Err(ApiError::ModelNotFound);
    }
    let symbol = registry::normalize_symbol(&request.symbol);
    if !registry::is_known_symbol(&symbol) {
        return Err(ApiError::SymbolNotFound);
    }

    let prediction = generator::prediction(&request.model, &symbol, &mut rand::thread_rng());
    let report = state.hub.broadcast(&Event::prediction(&prediction));
    info!(
        model = %prediction.model,
        symbol = %prediction.symbol,
        timeframe = %request.timeframe,
        signal = prediction.signal.label(),
        delivered = report.delivered,
        "Prediction generated"
    );

    Ok(Json(prediction))
}

/// GET /api/metrics/{model}
async fn metrics_handler(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Result<Json<ModelMetric>, ApiError> {
    Ok(Json(state.store.models().get(&model)?))
}

/// GET /api/status/{model}
async fn status_handler(
    State(state): State<AppState>,
    Path(model): Path<String>,
) -> Result<Json<ModelStatusResponse>, ApiError> {
    let metric = state.store.models().get(&model)?;
    Ok(Json(ModelStatusResponse {
        model: metric.id,
        status: metric.status,
        last_updated: Utc::now(),
    }))
}

/// POST /api/train - acknowledges the request; no training runs
async fn train_handler(
    State(state): State<AppState>,
    Json(request): Json<TrainingRequest>,
) -> Result<Json<TrainingResponse>, ApiError> {
    if !state.store.models().contains(&request.model) {
        return Err(ApiError::ModelNotFound);
    }

    info!(
        model = %request.model,
        parameters = %serde_json::Value::Object(request.parameters.clone()),
        "Training requested"
    );

    Ok(Json(TrainingResponse {
        message: format!("Training started for {}", request.model),
        model: request.model,
        status: "training_started".to_string(),
        timestamp: Utc::now(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use sim_core::Signal;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        AppState::new(Arc::new(ServerConfig::default()))
    }

    async fn send(state: AppState, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = routes().with_state(state).oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_predict_returns_and_broadcasts() {
        let state = create_test_state();
        let mut sub = state.hub.register();

        let (status, json) = send(
            state.clone(),
            post("/api/predict", r#"{"model":"cnn1d","symbol":"eth"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let prediction: Prediction = serde_json::from_value(json).unwrap();
        assert_eq!(prediction.model, "cnn1d");
        assert_eq!(prediction.symbol, "ETH");
        assert!(Signal::ALL.contains(&prediction.signal));
        assert!((60..=95).contains(&prediction.confidence));

        match sub.try_recv() {
            Some(Event::ModelPrediction { model, symbol, .. }) => {
                assert_eq!(model, "cnn1d");
                assert_eq!(symbol, "ETH");
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_predict_unknown_model_is_404_without_broadcast() {
        let state = create_test_state();
        let mut sub = state.hub.register();

        let (status, json) = send(
            state,
            post("/api/predict", r#"{"model":"doesnotexist","symbol":"ETH"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "Model not found");
        assert_eq!(sub.try_recv(), None);
    }

    #[tokio::test]
    async fn test_predict_unknown_symbol_is_404() {
        let (status, json) = send(
            create_test_state(),
            post("/api/predict", r#"{"model":"lstm","symbol":"DOGE","timeframe":"4h"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "Symbol not found");
    }

    #[tokio::test]
    async fn test_predict_rejects_malformed_body() {
        let (status, _) = send(create_test_state(), post("/api/predict", r#"{"model":1}"#)).await;
        assert!(status.is_client_error());
    }

    #[tokio::test]
    async fn test_metrics_for_known_model() {
        let (status, json) = send(create_test_state(), get("/api/metrics/transformer")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["model"], "transformer");
        assert_eq!(json["accuracy"], 96.1);
        assert_eq!(json["status"], "Active");
    }

    #[tokio::test]
    async fn test_metrics_unknown_model_is_404() {
        let (status, json) = send(create_test_state(), get("/api/metrics/gpt")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["detail"], "Model not found");
    }

    #[tokio::test]
    async fn test_status_for_known_model() {
        let (status, json) = send(create_test_state(), get("/api/status/xgboost")).await;
        assert_eq!(status, StatusCode::OK);

        let response: ModelStatusResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.model, "xgboost");
        assert_eq!(response.status, ModelStatus::Active);
    }

    #[tokio::test]
    async fn test_train_acknowledges() {
        let (status, json) = send(
            create_test_state(),
            post("/api/train", r#"{"model":"lightgbm","parameters":{"epochs":5}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "training_started");
        assert_eq!(json["message"], "Training started for lightgbm");
    }

    #[tokio::test]
    async fn test_train_unknown_model_is_404() {
        let request = post("/api/train", r#"{"model":"nope"}"#);
        let (status, _) = send(create_test_state(), request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
