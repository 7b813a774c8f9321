//! Mutable domain records held by the state store.
//!
//! Every record type implements [`Record`], whose `enforce_invariants` hook is
//! run by the store after each mutation. This keeps the clamp bounds below true
//! no matter which caller performed the update.

use serde::{Deserialize, Serialize};

use crate::error::RecordKind;

/// Lower bound for a strategy win rate after any update
pub const WIN_RATE_MIN: f64 = 50.0;
/// Upper bound for a strategy win rate after any update
pub const WIN_RATE_MAX: f64 = 95.0;
/// Lower bound for a model accuracy after any update
pub const ACCURACY_MIN: f64 = 85.0;
/// Upper bound for a model accuracy after any update
pub const ACCURACY_MAX: f64 = 98.0;

/// A keyed unit of mutable shared state.
pub trait Record: Clone + Send + Sync + 'static {
    /// Table this record type lives in
    const KIND: RecordKind;

    /// Unique identifier within its table
    fn id(&self) -> &str;

    /// Restore the record's invariants after a mutation.
    fn enforce_invariants(&mut self);
}

/// Strategy lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyStatus {
    /// Running and reporting performance
    Active,
    /// Switched off by an operator
    Inactive,
    /// Faulted by the simulation
    Error,
}

impl StrategyStatus {
    /// Status string as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyStatus::Active => "active",
            StrategyStatus::Inactive => "inactive",
            StrategyStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Headline performance numbers for a strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    /// Win rate in percent
    pub win_rate: f64,
    /// Signed cumulative PnL, e.g. `"+24.8%"`
    pub pnl: String,
}

/// Status and performance of one trading strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyRecord {
    /// Strategy identifier
    #[serde(rename = "name")]
    pub id: String,
    /// Current status
    pub status: StrategyStatus,
    /// Performance numbers
    pub performance: Performance,
    /// Message of the most recent simulated fault, cleared on recovery
    #[serde(rename = "error")]
    pub last_error: Option<String>,
}

impl StrategyRecord {
    /// Create an active strategy record
    pub fn new(id: impl Into<String>, win_rate: f64, pnl: impl Into<String>) -> Self {
        let mut record = Self {
            id: id.into(),
            status: StrategyStatus::Active,
            performance: Performance {
                win_rate,
                pnl: pnl.into(),
            },
            last_error: None,
        };
        record.enforce_invariants();
        record
    }

    /// Whether the strategy is currently active
    pub fn is_active(&self) -> bool {
        self.status == StrategyStatus::Active
    }

    /// Shift the win rate by `delta` percentage points.
    pub fn nudge_win_rate(&mut self, delta: f64) {
        self.performance.win_rate += delta;
        self.enforce_invariants();
    }

    /// Switch the strategy on or off, clearing any recorded fault.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.status = if enabled {
            StrategyStatus::Active
        } else {
            StrategyStatus::Inactive
        };
        self.last_error = None;
    }

    /// Move the strategy into the error state.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.status = StrategyStatus::Error;
        self.last_error = Some(message.into());
    }

    /// Return a faulted strategy to active.
    pub fn recover(&mut self) {
        self.status = StrategyStatus::Active;
        self.last_error = None;
    }
}

impl Record for StrategyRecord {
    const KIND: RecordKind = RecordKind::Strategy;

    fn id(&self) -> &str {
        &self.id
    }

    fn enforce_invariants(&mut self) {
        if self.performance.win_rate.is_nan() {
            self.performance.win_rate = WIN_RATE_MIN;
        }
        self.performance.win_rate = self.performance.win_rate.clamp(WIN_RATE_MIN, WIN_RATE_MAX);
    }
}

/// Model availability. Every registered model is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelStatus {
    /// Serving predictions
    Active,
}

impl ModelStatus {
    /// Status string as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Active => "Active",
        }
    }
}

/// Accuracy metrics for one prediction model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetric {
    /// Model identifier
    #[serde(rename = "model")]
    pub id: String,
    /// Accuracy in percent
    pub accuracy: f64,
    /// Precision in percent
    pub precision: f64,
    /// Recall in percent
    pub recall: f64,
    /// F1 score in percent
    pub f1_score: f64,
    /// Availability
    pub status: ModelStatus,
}

impl ModelMetric {
    /// Create an active model metric record
    pub fn new(
        id: impl Into<String>,
        accuracy: f64,
        precision: f64,
        recall: f64,
        f1_score: f64,
    ) -> Self {
        let mut metric = Self {
            id: id.into(),
            accuracy,
            precision,
            recall,
            f1_score,
            status: ModelStatus::Active,
        };
        metric.enforce_invariants();
        metric
    }

    /// Shift the accuracy by `delta` percentage points.
    pub fn nudge_accuracy(&mut self, delta: f64) {
        self.accuracy += delta;
        self.enforce_invariants();
    }
}

impl Record for ModelMetric {
    const KIND: RecordKind = RecordKind::Model;

    fn id(&self) -> &str {
        &self.id
    }

    fn enforce_invariants(&mut self) {
        if self.accuracy.is_nan() {
            self.accuracy = ACCURACY_MIN;
        }
        self.accuracy = self.accuracy.clamp(ACCURACY_MIN, ACCURACY_MAX);
    }
}
