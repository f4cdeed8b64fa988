//! Dispatch Queue
//!
//! Bounded channel of task records waiting for their status handler, paired
//! with a de-duplication set of keys that are queued or being handled.
//!
//! ## Rules
//! - A key enters the set when it is enqueued and leaves it when its handler
//!   finishes, whatever the outcome. While it is in the set, further
//!   `enqueue` calls for that key are no-ops.
//! - `enqueue` waits for a free slot when the channel is full. The worker loop
//!   never waits on a handler, so the channel always drains.

use crate::storage::types::{TaskKey, TaskRecord};

use dashmap::DashSet;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::mpsc;

pub struct DispatchQueue {
    tx: mpsc::Sender<TaskRecord>,
    rx: Mutex<Option<mpsc::Receiver<TaskRecord>>>,
    /// Keys currently owned by the queue or by a running handler.
    in_flight: Arc<DashSet<TaskKey>>,
    capacity: usize,
}

impl DispatchQueue {
    pub fn new(capacity: usize) -> Arc<Self> {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        Arc::new(Self {
            tx,
            rx: Mutex::new(Some(rx)),
            in_flight: Arc::new(DashSet::new()),
            capacity,
        })
    }

    /// Queues `record` for its status handler.
    ///
    /// Returns `false` without queueing when the key is already in flight or
    /// the worker loop has shut down.
    pub async fn enqueue(&self, record: TaskRecord) -> bool {
        let key = record.key();
        // Dropped without `hand_off` if this future is cancelled mid-send.
        let Some(claim) = self.claim(&key) else {
            tracing::trace!("Task {} already in flight, skipping", key);
            return false;
        };

        if self.tx.send(record).await.is_err() {
            tracing::warn!("Dispatch loop is gone, dropping task {}", key);
            return false;
        }

        claim.hand_off();
        tracing::debug!("Queued task {}", key);
        true
    }

    /// Non-blocking `enqueue`; also returns `false` when the channel is full.
    pub fn try_enqueue(&self, record: TaskRecord) -> bool {
        let key = record.key();
        let Some(claim) = self.claim(&key) else {
            return false;
        };

        match self.tx.try_send(record) {
            Ok(()) => {
                claim.hand_off();
                true
            }
            Err(e) => {
                tracing::debug!("Cannot queue task {} now: {}", key, e);
                false
            }
        }
    }

    /// Marks `key` in flight without queueing it.
    ///
    /// Used by handlers that move a record to a new key and must keep the
    /// reconciler away from it until they are done.
    pub fn claim(&self, key: &TaskKey) -> Option<InFlightClaim> {
        if !self.in_flight.insert(key.clone()) {
            return None;
        }
        Some(InFlightClaim {
            key: key.clone(),
            in_flight: Arc::clone(&self.in_flight),
            armed: true,
        })
    }

    pub fn is_in_flight(&self, key: &TaskKey) -> bool {
        self.in_flight.contains(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub(crate) fn release(&self, key: &TaskKey) {
        self.in_flight.remove(key);
    }

    /// Hands the receiving end to the worker loop. Only the first call succeeds.
    pub(crate) fn take_receiver(&self) -> Option<mpsc::Receiver<TaskRecord>> {
        self.rx.lock().take()
    }
}

/// In-flight marker held outside the channel. Released on drop.
pub struct InFlightClaim {
    key: TaskKey,
    in_flight: Arc<DashSet<TaskKey>>,
    armed: bool,
}

impl InFlightClaim {
    pub fn key(&self) -> &TaskKey {
        &self.key
    }

    /// Leaves the key in the set; the worker loop releases it from now on.
    fn hand_off(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        if self.armed {
            self.in_flight.remove(&self.key);
        }
    }
}
