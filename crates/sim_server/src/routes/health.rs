//! Health check and readiness endpoints

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AppState;

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Always "healthy" while the process serves requests
    pub status: String,
    /// Server version
    pub version: String,
    /// Server uptime in seconds
    pub uptime_secs: u64,
    /// Connected push-channel subscribers
    pub subscribers: usize,
    pub timestamp: DateTime<Utc>,
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadyResponse {
    /// Ready status
    pub ready: bool,
}

/// Build the health routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/ready", get(ready_handler))
}

/// GET /api/health
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let response = HealthResponse {
        status: "healthy".to_string(),
        version: crate::VERSION.to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        subscribers: state.hub.subscriber_count(),
        timestamp: Utc::now(),
    };

    (StatusCode::OK, Json(response))
}

/// GET /ready
async fn ready_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(ReadyResponse { ready: true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use axum::body::Body;
    use axum::http::Request;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> AppState {
        AppState::new(Arc::new(ServerConfig::default()))
    }

    async fn get_health(router: Router) -> HealthResponse {
        let response = router
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint_returns_json() {
        let health = get_health(routes().with_state(create_test_state())).await;

        assert_eq!(health.status, "healthy");
        assert_eq!(health.version, crate::VERSION);
        assert_eq!(health.subscribers, 0);
    }

    #[tokio::test]
    async fn test_health_counts_subscribers() {
        let state = create_test_state();
        let _sub = state.hub.register();

        let health = get_health(routes().with_state(state)).await;
        assert_eq!(health.subscribers, 1);
    }

    #[tokio::test]
    async fn test_health_uptime_increases() {
        let state = create_test_state();
        let router = routes().with_state(state);

        let first = get_health(router.clone()).await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let second = get_health(router).await;

        assert!(second.uptime_secs >= first.uptime_secs);
        assert!(second.timestamp >= first.timestamp);
    }

    #[tokio::test]
    async fn test_ready_endpoint_returns_json() {
        let router = routes().with_state(create_test_state());

        let response = router
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let ready: ReadyResponse = serde_json::from_slice(&body).unwrap();
        assert!(ready.ready);
    }
}
