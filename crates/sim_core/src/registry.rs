//! Fixed registries of symbols, models and strategies.
//!
//! The simulator never adds or removes entries at runtime; the store is seeded
//! from these tables at startup.

use crate::records::{ModelMetric, StrategyRecord};

/// Base price used for a symbol with no registered price
pub const DEFAULT_BASE_PRICE: f64 = 100.0;

/// Tradable symbols and their base prices, in display order
pub const SYMBOLS: [(&str, f64); 13] = [
    ("BTC", 45_000.0),
    ("ETH", 3_000.0),
    ("AAPL", 150.0),
    ("TSLA", 250.0),
    ("GOOGL", 2_800.0),
    ("MSFT", 350.0),
    ("AMZN", 3_300.0),
    ("NFLX", 500.0),
    ("NQ", 15_000.0),
    ("ES", 4_500.0),
    ("YM", 35_000.0),
    ("GC", 2_000.0),
    ("CL", 80.0),
];

/// Model names in registry order
pub const MODEL_NAMES: [&str; 6] = [
    "cnn1d",
    "lstm",
    "transformer",
    "catboost",
    "lightgbm",
    "xgboost",
];

// (name, accuracy, precision, recall, f1_score)
const MODEL_SEED: [(&str, f64, f64, f64, f64); 6] = [
    ("cnn1d", 94.2, 91.8, 89.5, 90.6),
    ("lstm", 92.7, 89.3, 91.1, 90.2),
    ("transformer", 96.1, 94.7, 93.2, 93.9),
    ("catboost", 93.4, 91.7, 92.1, 91.9),
    ("lightgbm", 92.8, 90.5, 91.3, 90.9),
    ("xgboost", 93.1, 91.2, 92.0, 91.6),
];

// (name, win_rate, pnl)
const STRATEGY_SEED: [(&str, f64, &str); 11] = [
    ("cumulative_delta", 78.0, "+24.8%"),
    ("liquidation_detection", 71.0, "+19.2%"),
    ("momentum_breakout", 69.0, "+16.7%"),
    ("delta_divergence", 74.0, "+21.3%"),
    ("hvn_rejection", 66.0, "+14.5%"),
    ("liquidity_absorption", 72.0, "+18.9%"),
    ("liquidity_traps", 76.0, "+22.1%"),
    ("iceberg_detection", 70.0, "+17.4%"),
    ("stop_run_anticipation", 73.0, "+20.6%"),
    ("lvn_breakout", 67.0, "+15.8%"),
    ("volume_imbalance", 71.0, "+19.7%"),
];

/// All registered symbols in display order
pub fn symbols() -> Vec<&'static str> {
    SYMBOLS.iter().map(|(symbol, _)| *symbol).collect()
}

/// Canonical (upper-case) form of a user-supplied symbol
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Base price of a registered symbol. Expects the canonical form.
pub fn base_price(symbol: &str) -> Option<f64> {
    SYMBOLS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, price)| *price)
}

/// Whether `symbol` (canonical form) is registered
pub fn is_known_symbol(symbol: &str) -> bool {
    base_price(symbol).is_some()
}

/// Seed metrics for every registered model
pub fn default_models() -> Vec<ModelMetric> {
    MODEL_SEED
        .iter()
        .map(|(name, accuracy, precision, recall, f1)| {
            ModelMetric::new(*name, *accuracy, *precision, *recall, *f1)
        })
        .collect()
}

/// Seed records for every registered strategy
pub fn default_strategies() -> Vec<StrategyRecord> {
    STRATEGY_SEED
        .iter()
        .map(|(name, win_rate, pnl)| StrategyRecord::new(*name, *win_rate, *pnl))
        .collect()
}
