//! Subscriber registry and event fan-out.
//!
//! Every subscriber owns a bounded outbound queue. [`SubscriptionHub::broadcast`]
//! snapshots the subscriber set under a short lock, then offers the event to
//! each queue with `try_send`, so a slow or dead peer never holds up the
//! others or the producer. A full or closed queue unregisters its subscriber;
//! the connection task sees the queue close and ends the socket.
//!
//! Each queue's sender sits behind its own slot lock. Unregistering empties the
//! slot under that lock, so once [`SubscriptionHub::unregister`] returns no
//! in-flight broadcast can still enqueue for that subscriber.
//!
//! Strategy toggles hold a publication lock from the store write until the
//! `strategy_status` table has been offered to every queue, so the last table
//! a subscriber receives always matches the store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use sim_core::{ControlMessage, Event, StateStore, StoreError, StrategyRecord};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default outbound queue bound per subscriber
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Opaque subscriber identifier
pub type SubscriberId = Uuid;

/// Hub error types
#[derive(Debug, Error)]
pub enum HubError {
    #[error("Malformed control message: {0}")]
    MalformedMessage(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Queues that accepted the event
    pub delivered: usize,
    /// Queues that were full or closed; their subscribers were removed
    pub dropped: usize,
}

/// Receiving end handed to a connection
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    receiver: mpsc::Receiver<Event>,
}

impl Subscriber {
    /// Identifier to pass back to the hub
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued event; `None` once the hub has dropped this subscriber
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }

    /// Next queued event without waiting
    pub fn try_recv(&mut self) -> Option<Event> {
        self.receiver.try_recv().ok()
    }

    /// Split into the id and the raw queue receiver
    pub fn into_parts(self) -> (SubscriberId, mpsc::Receiver<Event>) {
        (self.id, self.receiver)
    }
}

enum Delivery {
    Sent,
    Full,
    Closed,
    Gone,
}

struct Outbox {
    slot: Mutex<Option<mpsc::Sender<Event>>>,
}

impl Outbox {
    fn new(sender: mpsc::Sender<Event>) -> Self {
        Self {
            slot: Mutex::new(Some(sender)),
        }
    }

    fn slot(&self) -> MutexGuard<'_, Option<mpsc::Sender<Event>>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, event: Event) -> Delivery {
        let slot = self.slot();
        match slot.as_ref() {
            None => Delivery::Gone,
            Some(sender) => match sender.try_send(event) {
                Ok(()) => Delivery::Sent,
                Err(TrySendError::Full(_)) => Delivery::Full,
                Err(TrySendError::Closed(_)) => Delivery::Closed,
            },
        }
    }

    fn close(&self) {
        self.slot().take();
    }
}

/// Registry of live subscribers
pub struct SubscriptionHub {
    subscribers: Mutex<HashMap<SubscriberId, Arc<Outbox>>>,
    status_lock: Mutex<()>,
    capacity: usize,
}

impl SubscriptionHub {
    /// Create a hub whose subscriber queues hold `capacity` events
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            status_lock: Mutex::new(()),
            capacity: capacity.max(1),
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<SubscriberId, Arc<Outbox>>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> Vec<(SubscriberId, Arc<Outbox>)> {
        self.registry()
            .iter()
            .map(|(id, outbox)| (*id, Arc::clone(outbox)))
            .collect()
    }

    fn record_count(count: usize) {
        metrics::gauge!("hub_subscribers").set(count as f64);
    }

    /// Add a subscriber with an empty queue
    pub fn register(&self) -> Subscriber {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4();

        let count = {
            let mut registry = self.registry();
            registry.insert(id, Arc::new(Outbox::new(sender)));
            registry.len()
        };
        Self::record_count(count);
        debug!(subscriber = %id, subscribers = count, "Subscriber registered");

        Subscriber { id, receiver }
    }

    /// Remove a subscriber; unknown ids are ignored
    pub fn unregister(&self, id: SubscriberId) {
        let (removed, count) = {
            let mut registry = self.registry();
            let removed = registry.remove(&id);
            (removed, registry.len())
        };

        if let Some(outbox) = removed {
            outbox.close();
            Self::record_count(count);
            debug!(subscriber = %id, subscribers = count, "Subscriber unregistered");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry().len()
    }

    pub fn is_registered(&self, id: SubscriberId) -> bool {
        self.registry().contains_key(&id)
    }

    /// Offer `event` to every subscriber registered when the call begins
    pub fn broadcast(&self, event: &Event) -> BroadcastReport {
        let mut report = BroadcastReport::default();

        for (id, outbox) in self.snapshot() {
            match outbox.deliver(event.clone()) {
                Delivery::Sent => report.delivered += 1,
                Delivery::Gone => {}
                Delivery::Full => {
                    warn!(
                        subscriber = %id,
                        event = event.kind(),
                        "Subscriber queue full, dropping subscriber"
                    );
                    self.unregister(id);
                    report.dropped += 1;
                }
                Delivery::Closed => {
                    debug!(subscriber = %id, event = event.kind(), "Subscriber queue closed");
                    self.unregister(id);
                    report.dropped += 1;
                }
            }
        }

        metrics::counter!("hub_broadcasts_total").increment(1);
        if report.dropped > 0 {
            metrics::counter!("hub_deliveries_dropped_total").increment(report.dropped as u64);
        }
        debug!(
            event = event.kind(),
            delivered = report.delivered,
            dropped = report.dropped,
            "Broadcast"
        );

        report
    }

    /// Offer `event` to one subscriber; returns whether it was enqueued
    pub fn send_to(&self, id: SubscriberId, event: Event) -> bool {
        let outbox = match self.registry().get(&id) {
            Some(outbox) => Arc::clone(outbox),
            None => return false,
        };

        let kind = event.kind();
        match outbox.deliver(event) {
            Delivery::Sent => true,
            Delivery::Gone => false,
            Delivery::Full | Delivery::Closed => {
                warn!(
                    subscriber = %id,
                    event = kind,
                    "Targeted delivery failed, dropping subscriber"
                );
                self.unregister(id);
                metrics::counter!("hub_deliveries_dropped_total").increment(1);
                false
            }
        }
    }

    /// Set a strategy's status and broadcast the resulting table
    ///
    /// Concurrent toggles publish their tables in the order their store writes
    /// happened. Only non-blocking `try_send`s run under the lock.
    pub fn toggle_strategy(
        &self,
        store: &StateStore,
        strategy: &str,
        enabled: bool,
    ) -> Result<StrategyRecord, StoreError> {
        let _publishing = self.status_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let record = store.toggle_strategy(strategy, enabled)?;
        info!(strategy = %record.id, status = %record.status, "Strategy toggled");
        self.broadcast(&Event::strategy_status(&store.strategies().snapshot()));

        Ok(record)
    }

    /// Parse and act on a control message from subscriber `id`
    pub fn handle_inbound(
        &self,
        store: &StateStore,
        id: SubscriberId,
        text: &str,
    ) -> Result<(), HubError> {
        let message: ControlMessage =
            serde_json::from_str(text).map_err(|e| HubError::MalformedMessage(e.to_string()))?;

        match message {
            ControlMessage::Subscribe => {
                for metric in store.models().snapshot() {
                    self.send_to(id, Event::model_metrics(&metric));
                }
            }
            ControlMessage::GetStrategyStatus => {
                let strategies = store.strategies().snapshot();
                self.send_to(id, Event::strategy_status(&strategies));
            }
            ControlMessage::ToggleStrategy { strategy, enabled } => {
                self.toggle_strategy(store, &strategy, enabled)?;
            }
        }

        Ok(())
    }

    /// Drop every subscriber; their connections observe a closed queue
    pub fn close_all(&self) {
        let drained: Vec<_> = self.registry().drain().collect();
        for (_, outbox) in &drained {
            outbox.close();
        }
        Self::record_count(0);
        if !drained.is_empty() {
            info!(subscribers = drained.len(), "Closed all subscribers");
        }
    }
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
