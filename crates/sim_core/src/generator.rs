//! Synthetic market and prediction payloads.
//!
//! These are pure functions of their inputs and a caller-supplied random
//! source. They touch no shared state, so a real data feed can replace them
//! without involving the store or the hub.
//!
//! ## Market snapshot
//!
//! price = base * (1 + u), u ~ U[-5%, 5%]; high/low are +/-2% of price and the
//! open is within 1% of it. All prices are rounded to two decimals.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::registry::{self, DEFAULT_BASE_PRICE};

/// Maximum relative move of a snapshot price from its base
pub const MAX_PRICE_MOVE: f64 = 0.05;
/// Inclusive confidence range of a prediction, in percent
pub const CONFIDENCE_RANGE: (u8, u8) = (60, 95);

/// Prediction signal emitted by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Signal {
    #[serde(rename = "Bullish Signal")]
    Bullish,
    #[serde(rename = "Bearish Signal")]
    Bearish,
    #[serde(rename = "Neutral Signal")]
    Neutral,
    #[serde(rename = "Strong Buy")]
    StrongBuy,
    #[serde(rename = "Buy Signal")]
    Buy,
    #[serde(rename = "Hold Signal")]
    Hold,
    #[serde(rename = "Weak Buy")]
    WeakBuy,
}

/// Direction implied by a signal, used to pick the target move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bias {
    /// Target above the current price
    Up,
    /// Target below the current price
    Down,
    /// Target within a narrow band around the current price
    Flat,
}

impl Signal {
    /// Every signal, in the order they are drawn from
    pub const ALL: [Signal; 7] = [
        Signal::Bullish,
        Signal::Bearish,
        Signal::Neutral,
        Signal::StrongBuy,
        Signal::Buy,
        Signal::Hold,
        Signal::WeakBuy,
    ];

    /// Display label, identical to the serialised form
    pub fn label(&self) -> &'static str {
        match self {
            Signal::Bullish => "Bullish Signal",
            Signal::Bearish => "Bearish Signal",
            Signal::Neutral => "Neutral Signal",
            Signal::StrongBuy => "Strong Buy",
            Signal::Buy => "Buy Signal",
            Signal::Hold => "Hold Signal",
            Signal::WeakBuy => "Weak Buy",
        }
    }

    /// Direction of the expected move
    pub fn bias(&self) -> Bias {
        match self {
            Signal::Bullish | Signal::StrongBuy | Signal::Buy | Signal::WeakBuy => Bias::Up,
            Signal::Bearish => Bias::Down,
            Signal::Neutral | Signal::Hold => Bias::Flat,
        }
    }
}

/// Synthetic quote for one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    /// Percent change from the base price
    pub change: f64,
    pub volume: u64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub timestamp: DateTime<Utc>,
}

/// Synthetic model prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub model: String,
    pub symbol: String,
    pub signal: Signal,
    /// Confidence in percent
    pub confidence: u8,
    /// Signed target move, e.g. `"+2.4%"`
    pub target: String,
    pub timestamp: DateTime<Utc>,
}

/// Round `value` to `places` decimal places
pub fn round_dp(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Generate a quote for `symbol`.
///
/// Unregistered symbols fall back to [`DEFAULT_BASE_PRICE`]; callers that must
/// reject them check the registry first.
pub fn market_snapshot<R: Rng + ?Sized>(symbol: &str, rng: &mut R) -> MarketSnapshot {
    let base = registry::base_price(symbol).unwrap_or(DEFAULT_BASE_PRICE);

    let change = rng.gen_range(-MAX_PRICE_MOVE..=MAX_PRICE_MOVE);
    let price = base * (1.0 + change);
    let open_drift = rng.gen_range(-0.01..=0.01);

    MarketSnapshot {
        symbol: symbol.to_string(),
        price: round_dp(price, 2),
        change: round_dp(change * 100.0, 2),
        volume: rng.gen_range(1_000_000..=10_000_000),
        high: round_dp(price * 1.02, 2),
        low: round_dp(price * 0.98, 2),
        open: round_dp(price * (1.0 + open_drift), 2),
        timestamp: Utc::now(),
    }
}

/// Generate a prediction from `model` for `symbol`
pub fn prediction<R: Rng + ?Sized>(model: &str, symbol: &str, rng: &mut R) -> Prediction {
    let signal = *Signal::ALL.choose(rng).unwrap_or(&Signal::Neutral);
    let confidence = rng.gen_range(CONFIDENCE_RANGE.0..=CONFIDENCE_RANGE.1);

    Prediction {
        model: model.to_string(),
        symbol: symbol.to_string(),
        signal,
        confidence,
        target: target_text(signal, rng),
        timestamp: Utc::now(),
    }
}

/// Pick a random registered symbol
pub fn random_symbol<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    registry::SYMBOLS
        .choose(rng)
        .map(|(symbol, _)| *symbol)
        .unwrap_or("BTC")
}

fn target_text<R: Rng + ?Sized>(signal: Signal, rng: &mut R) -> String {
    match signal.bias() {
        Bias::Up => format!("+{:.1}%", rng.gen_range(0.5..=5.0)),
        Bias::Down => format!("{:.1}%", rng.gen_range(-5.0..=-0.5)),
        Bias::Flat => format!("{:+.1}%", rng.gen_range(-1.0..=1.0)),
    }
}
