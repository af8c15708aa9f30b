//! **State publisher**: pushes a risk snapshot to every connected subscriber on a timer.
//!
//! Subscribers are bounded channels keyed by id. A subscriber whose receiver is gone
//! (connection closed) is removed on the next publish; one that is merely slow misses a
//! frame instead of stalling the rest.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::monitor::RiskMonitor;

/// Frames buffered per subscriber before it starts missing updates.
const SUBSCRIBER_BUFFER: usize = 4;

pub type SubscriberId = u64;

#[derive(Default)]
pub struct SubscriberHub {
    next_id: AtomicU64,
    subscribers: DashMap<SubscriberId, mpsc::Sender<String>>,
}

impl SubscriberHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber; frames arrive on the returned receiver as JSON text.
    pub fn subscribe(&self) -> (SubscriberId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.subscribers.insert(id, tx);
        debug!(target: "aegis::publisher", subscriber = id, "subscriber connected");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        if self.subscribers.remove(&id).is_some() {
            debug!(target: "aegis::publisher", subscriber = id, "subscriber disconnected");
        }
    }

    /// Drop every subscriber; their receivers see end-of-stream.
    pub fn close_all(&self) {
        self.subscribers.clear();
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Send `frame` to all subscribers. Returns how many received it.
    pub fn broadcast(&self, frame: &str) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();
        for entry in self.subscribers.iter() {
            match entry.value().try_send(frame.to_string()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(target: "aegis::publisher", subscriber = *entry.key(), "subscriber lagging; frame skipped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }
        for id in closed {
            self.unsubscribe(id);
        }
        delivered
    }
}

/// Serialize the current snapshot and broadcast it once.
pub fn publish_once(monitor: &RiskMonitor, hub: &SubscriberHub) -> usize {
    match serde_json::to_string(&monitor.snapshot()) {
        Ok(frame) => hub.broadcast(&frame),
        Err(e) => {
            error!(target: "aegis::publisher", error = %e, "Error serializing risk snapshot");
            0
        }
    }
}

/// Publish on `interval` until `cancel` fires. Tolerates zero subscribers.
pub async fn run_publisher(
    monitor: Arc<RiskMonitor>,
    hub: Arc<SubscriberHub>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    info!(target: "aegis::publisher", interval_ms = interval.as_millis() as u64, "state publisher started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                publish_once(&monitor, &hub);
            }
            _ = cancel.cancelled() => {
                info!(target: "aegis::publisher", "state publisher shutting down");
                break;
            }
        }
    }
}
