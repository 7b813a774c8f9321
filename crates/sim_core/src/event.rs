//! Push-channel message types.
//!
//! [`Event`] values flow out to subscribers; [`ControlMessage`] values arrive
//! from them. Both are JSON objects tagged by a snake_case `type` field.

use serde::{Deserialize, Deserializer, Serialize};

use crate::generator::{round_dp, Prediction, Signal};
use crate::records::{ModelMetric, Performance, StrategyRecord, StrategyStatus};

/// One row of the `strategy_status` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyStatusRow {
    pub name: String,
    pub status: StrategyStatus,
    pub error: Option<String>,
}

impl From<&StrategyRecord> for StrategyStatusRow {
    fn from(record: &StrategyRecord) -> Self {
        Self {
            name: record.id.clone(),
            status: record.status,
            error: record.last_error.clone(),
        }
    }
}

/// Change notification fanned out to subscribers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    ModelPrediction {
        model: String,
        symbol: String,
        signal: Signal,
        confidence: u8,
        target: String,
    },
    ModelMetrics {
        model: String,
        accuracy: f64,
        precision: f64,
        recall: f64,
        f1_score: f64,
    },
    StrategyStatus {
        strategies: Vec<StrategyStatusRow>,
    },
    StrategyPerformance {
        strategy: String,
        performance: Performance,
    },
    StrategyError {
        strategy: String,
        error: String,
    },
}

impl Event {
    /// Wire tag of this event
    pub fn kind(&self) -> &'static str {
        match self {
            Event::ModelPrediction { .. } => "model_prediction",
            Event::ModelMetrics { .. } => "model_metrics",
            Event::StrategyStatus { .. } => "strategy_status",
            Event::StrategyPerformance { .. } => "strategy_performance",
            Event::StrategyError { .. } => "strategy_error",
        }
    }

    /// `model_prediction` for a generated prediction
    pub fn prediction(prediction: &Prediction) -> Self {
        Event::ModelPrediction {
            model: prediction.model.clone(),
            symbol: prediction.symbol.clone(),
            signal: prediction.signal,
            confidence: prediction.confidence,
            target: prediction.target.clone(),
        }
    }

    /// `model_metrics` for a model; accuracy is reported to one decimal
    pub fn model_metrics(metric: &ModelMetric) -> Self {
        Event::ModelMetrics {
            model: metric.id.clone(),
            accuracy: round_dp(metric.accuracy, 1),
            precision: metric.precision,
            recall: metric.recall,
            f1_score: metric.f1_score,
        }
    }

    /// `strategy_status` carrying the full strategy table
    pub fn strategy_status(records: &[StrategyRecord]) -> Self {
        Event::StrategyStatus {
            strategies: records.iter().map(StrategyStatusRow::from).collect(),
        }
    }

    /// `strategy_performance` for one strategy
    pub fn strategy_performance(record: &StrategyRecord) -> Self {
        Event::StrategyPerformance {
            strategy: record.id.clone(),
            performance: record.performance.clone(),
        }
    }

    /// `strategy_error` for one strategy
    pub fn strategy_error(strategy: impl Into<String>, error: impl Into<String>) -> Self {
        Event::StrategyError {
            strategy: strategy.into(),
            error: error.into(),
        }
    }
}

/// Control message sent by a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMessage {
    /// Ask for the current metrics of every model
    Subscribe,
    /// Ask for the full strategy table
    GetStrategyStatus,
    /// Switch a strategy on or off
    ///
    /// `enabled` is read loosely: a nonzero number or non-empty string means
    /// on, while `0`, `""`, `null` or a missing field mean off.
    ToggleStrategy {
        strategy: String,
        #[serde(default, deserialize_with = "truthy")]
        enabled: bool,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

fn truthy<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        None => false,
        Some(Flag::Bool(flag)) => flag,
        Some(Flag::Int(n)) => n != 0,
        Some(Flag::Float(x)) => x != 0.0,
        Some(Flag::Text(text)) => !text.is_empty(),
    })
}
