//! Route modules for the simulator server
//!
//! This module contains endpoint group-specific routers:
//! - health: Health check and readiness endpoints
//! - market: Symbol list and synthetic quotes
//! - models: Predictions, model metrics, status and training
//! - commands: Free-form bot commands
//! - strategies: Strategy table and toggling
//! - ws: WebSocket push channel

pub mod commands;
pub mod health;
pub mod market;
pub mod models;
pub mod strategies;
pub mod ws;

use axum::Router;
use sim_core::StateStore;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::ServerConfig;
use crate::hub::SubscriptionHub;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Server configuration
    pub config: Arc<ServerConfig>,
    /// Strategy and model records
    pub store: Arc<StateStore>,
    /// Live push-channel subscribers
    pub hub: Arc<SubscriptionHub>,
    /// Server start time for uptime calculation
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Create state with the default registries and a hub sized from `config`
    pub fn new(config: Arc<ServerConfig>) -> Self {
        let hub = Arc::new(SubscriptionHub::new(config.subscriber_queue_capacity));
        Self::with_parts(config, Arc::new(StateStore::with_defaults()), hub)
    }

    pub fn with_parts(
        config: Arc<ServerConfig>,
        store: Arc<StateStore>,
        hub: Arc<SubscriptionHub>,
    ) -> Self {
        Self {
            config,
            store,
            hub,
            start_time: std::time::Instant::now(),
        }
    }
}

/// Build the main application router by merging all route modules
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(market::routes())
        .merge(models::routes())
        .merge(commands::routes())
        .merge(strategies::routes())
        .merge(ws::routes())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
