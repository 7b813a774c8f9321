//! Periodic synthetic updates.
//!
//! Each tick emits one prediction per registered model and, with small
//! independent probabilities, drifts model accuracy and moves one strategy
//! through its active/error lifecycle. A failed or panicking tick is logged,
//! followed by a cooldown, and ticking resumes.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use sim_core::{generator, Event, StateStore, StoreError, StrategyStatus};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::config::ServerConfig;
use crate::hub::{BroadcastReport, SubscriptionHub};

/// Tick error types
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Tick panicked: {0}")]
    Panicked(String),
}

/// Probabilities and step sizes driving the simulation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulationParams {
    /// Chance per tick that every model's accuracy drifts
    pub metrics_drift_probability: f64,
    /// Accuracy moves by a uniform delta in `[-accuracy_step, accuracy_step]`
    pub accuracy_step: f64,
    /// Chance per tick that one strategy is visited
    pub strategy_event_probability: f64,
    /// Win rate moves by a uniform delta in `[-win_rate_step, win_rate_step]`
    pub win_rate_step: f64,
    /// Chance that a visited active strategy faults
    pub error_probability: f64,
    /// Chance that a visited faulted strategy recovers
    pub recovery_probability: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            metrics_drift_probability: 0.10,
            accuracy_step: 0.1,
            strategy_event_probability: 0.05,
            win_rate_step: 2.0,
            error_probability: 0.02,
            recovery_probability: 0.10,
        }
    }
}

/// What happened to the strategy visited by a tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "strategy", rename_all = "snake_case")]
pub enum StrategyOutcome {
    /// Active, win rate moved
    Performed(String),
    /// Active, win rate moved, then faulted
    Faulted(String),
    /// Faulted and recovered
    Recovered(String),
    /// Nothing changed
    Unchanged(String),
}

/// Summary of one tick
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub predictions: usize,
    pub metrics_drifted: bool,
    pub strategy: Option<StrategyOutcome>,
    pub deliveries: BroadcastReport,
}

impl TickReport {
    fn record(&mut self, report: BroadcastReport) {
        self.deliveries.delivered += report.delivered;
        self.deliveries.dropped += report.dropped;
    }
}

fn chance<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    rng.gen::<f64>() < probability
}

fn symmetric<R: Rng + ?Sized>(rng: &mut R, step: f64) -> f64 {
    if step > 0.0 {
        rng.gen_range(-step..=step)
    } else {
        0.0
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Background driver of synthetic updates
pub struct Scheduler {
    store: Arc<StateStore>,
    hub: Arc<SubscriptionHub>,
    params: SimulationParams,
    interval: Duration,
    cooldown: Duration,
}

impl Scheduler {
    pub fn new(
        store: Arc<StateStore>,
        hub: Arc<SubscriptionHub>,
        params: SimulationParams,
        interval: Duration,
        cooldown: Duration,
    ) -> Self {
        Self {
            store,
            hub,
            params,
            interval,
            cooldown,
        }
    }

    /// Scheduler with default parameters and the configured timings
    pub fn from_config(
        config: &ServerConfig,
        store: Arc<StateStore>,
        hub: Arc<SubscriptionHub>,
    ) -> Self {
        Self::new(
            store,
            hub,
            SimulationParams::default(),
            config.tick_interval(),
            config.tick_cooldown(),
        )
    }

    pub fn params(&self) -> &SimulationParams {
        &self.params
    }

    /// Run one tick with `rng` as the only source of randomness
    pub fn tick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TickReport, TickError> {
        let mut report = TickReport::default();

        for model in self.store.models().ids() {
            let symbol = generator::random_symbol(rng);
            let prediction = generator::prediction(model, symbol, rng);
            report.record(self.hub.broadcast(&Event::prediction(&prediction)));
            report.predictions += 1;
        }

        if chance(rng, self.params.metrics_drift_probability) {
            for model in self.store.models().ids() {
                let delta = symmetric(rng, self.params.accuracy_step);
                let metric = self.store.models().update(model, |m| m.nudge_accuracy(delta))?;
                report.record(self.hub.broadcast(&Event::model_metrics(&metric)));
            }
            report.metrics_drifted = true;
        }

        if chance(rng, self.params.strategy_event_probability) {
            if let Some(id) = self.store.strategies().ids().choose(rng) {
                report.strategy = Some(self.visit_strategy(id, rng, &mut report)?);
            }
        }

        Ok(report)
    }

    fn visit_strategy<R: Rng + ?Sized>(
        &self,
        id: &str,
        rng: &mut R,
        report: &mut TickReport,
    ) -> Result<StrategyOutcome, TickError> {
        let params = self.params;
        let mut outcome = StrategyOutcome::Unchanged(id.to_string());

        let record = self.store.strategies().update(id, |record| match record.status {
            StrategyStatus::Active => {
                record.nudge_win_rate(symmetric(rng, params.win_rate_step));
                if chance(rng, params.error_probability) {
                    record.mark_error(format!("Connection timeout for {} strategy", record.id));
                    outcome = StrategyOutcome::Faulted(record.id.clone());
                } else {
                    outcome = StrategyOutcome::Performed(record.id.clone());
                }
            }
            StrategyStatus::Error => {
                if chance(rng, params.recovery_probability) {
                    record.recover();
                    outcome = StrategyOutcome::Recovered(record.id.clone());
                }
            }
            StrategyStatus::Inactive => {}
        })?;

        match &outcome {
            StrategyOutcome::Performed(_) | StrategyOutcome::Recovered(_) => {
                report.record(self.hub.broadcast(&Event::strategy_performance(&record)));
            }
            StrategyOutcome::Faulted(_) => {
                report.record(self.hub.broadcast(&Event::strategy_performance(&record)));
                let message = record.last_error.clone().unwrap_or_default();
                report.record(self.hub.broadcast(&Event::strategy_error(&record.id, message)));
                info!(strategy = %record.id, "Strategy faulted");
            }
            StrategyOutcome::Unchanged(_) => {}
        }

        Ok(outcome)
    }

    /// [`tick`](Self::tick), with panics turned into [`TickError::Panicked`]
    pub fn run_tick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<TickReport, TickError> {
        match panic::catch_unwind(AssertUnwindSafe(|| self.tick(rng))) {
            Ok(result) => result,
            Err(payload) => Err(TickError::Panicked(panic_message(payload))),
        }
    }

    /// Tick forever; the first tick fires immediately
    pub async fn run(self) {
        self.run_with_rng(StdRng::from_entropy()).await
    }

    /// [`run`](Self::run) driven by a caller-supplied generator
    pub async fn run_with_rng<R: Rng + Send>(self, mut rng: R) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_secs = self.interval.as_secs(),
            cooldown_secs = self.cooldown.as_secs(),
            "Scheduler started"
        );

        loop {
            ticker.tick().await;

            match self.run_tick(&mut rng) {
                Ok(report) => {
                    metrics::counter!("scheduler_ticks_total").increment(1);
                    debug!(
                        predictions = report.predictions,
                        metrics_drifted = report.metrics_drifted,
                        strategy = ?report.strategy,
                        delivered = report.deliveries.delivered,
                        dropped = report.deliveries.dropped,
                        "Tick complete"
                    );
                }
                Err(e) => {
                    metrics::counter!("scheduler_tick_failures_total").increment(1);
                    error!(error = %e, "Tick failed, cooling down");
                    time::sleep(self.cooldown).await;
                    ticker.reset_immediately();
                }
            }
        }
    }

    /// Run on the current tokio runtime
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
