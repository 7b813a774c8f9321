//! Symbol list and synthetic market quotes

use axum::{
    extract::Path,
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use sim_core::{generator, registry, MarketSnapshot};

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolsResponse {
    pub symbols: Vec<String>,
}

/// Build the market routes
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/symbols", get(symbols_handler))
        .route("/api/market/{symbol}", get(market_handler))
}

/// GET /api/symbols
async fn symbols_handler() -> impl IntoResponse {
    let symbols = registry::symbols().into_iter().map(str::to_string).collect();
    Json(SymbolsResponse { symbols })
}

/// GET /api/market/{symbol} - symbol matching is case-insensitive
async fn market_handler(Path(symbol): Path<String>) -> Result<Json<MarketSnapshot>, ApiError> {
    let symbol = registry::normalize_symbol(&symbol);
    if !registry::is_known_symbol(&symbol) {
        return Err(ApiError::SymbolNotFound);
    }

    let snapshot = generator::market_snapshot(&symbol, &mut rand::thread_rng());
    Ok(Json(snapshot))
}
