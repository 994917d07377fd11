//! Boundary for pushing sync notifications toward connected consumers.
//!
//! The sync engine treats the broadcaster as the authority on delivery: a
//! successful call means the operation reached the downstream transport and
//! may leave the queue; an error keeps it queued for retry.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::sync_event::SyncEvent;

/// Failure to hand a [`SyncEvent`] to the downstream transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BroadcastError {
    /// Transport unreachable (hub down, socket gone).
    #[error("broadcast target unavailable: {0}")]
    Unavailable(String),
    /// Transport reachable but the event was refused.
    #[error("broadcast rejected: {0}")]
    Rejected(String),
}

/// Downstream delivery seam for sync notifications.
pub trait SyncBroadcaster: Send + Sync {
    fn broadcast(&self, event: &SyncEvent) -> Result<(), BroadcastError>;
}

impl<B> SyncBroadcaster for Arc<B>
where
    B: SyncBroadcaster + ?Sized,
{
    fn broadcast(&self, event: &SyncEvent) -> Result<(), BroadcastError> {
        (**self).broadcast(event)
    }
}

/// Broadcaster that records everything it accepts. For tests/dev.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    accepted: Mutex<Vec<SyncEvent>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events accepted so far, in delivery order.
    pub fn accepted(&self) -> Vec<SyncEvent> {
        self.accepted.lock().map(|g| g.clone()).unwrap_or_default()
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted.lock().map(|g| g.len()).unwrap_or(0)
    }
}

impl SyncBroadcaster for RecordingBroadcaster {
    fn broadcast(&self, event: &SyncEvent) -> Result<(), BroadcastError> {
        let mut accepted = self
            .accepted
            .lock()
            .map_err(|_| BroadcastError::Unavailable("recorder lock poisoned".into()))?;
        accepted.push(event.clone());
        Ok(())
    }
}

/// Broadcaster that refuses deliveries. For tests/dev.
///
/// [`FailingBroadcaster::new`] refuses everything; [`FailingBroadcaster::failing_first`]
/// refuses the first `n` calls and accepts the rest, which is the shape retry
/// tests need.
#[derive(Debug)]
pub struct FailingBroadcaster {
    // None = refuse forever.
    remaining_failures: Mutex<Option<u32>>,
    accepted: Mutex<Vec<SyncEvent>>,
    attempts: AtomicU32,
}

impl FailingBroadcaster {
    pub fn new() -> Self {
        Self {
            remaining_failures: Mutex::new(None),
            accepted: Mutex::new(Vec::new()),
            attempts: AtomicU32::new(0),
        }
    }

    pub fn failing_first(n: u32) -> Self {
        Self {
            remaining_failures: Mutex::new(Some(n)),
            accepted: Mutex::new(Vec::new()),
            attempts: AtomicU32::new(0),
        }
    }

    /// Events accepted after the failure budget ran out.
    pub fn accepted(&self) -> Vec<SyncEvent> {
        self.accepted.lock().map(|g| g.clone()).unwrap_or_default()
    }

    /// Total deliveries attempted, refused or not.
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::Relaxed)
    }
}

impl Default for FailingBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncBroadcaster for FailingBroadcaster {
    fn broadcast(&self, event: &SyncEvent) -> Result<(), BroadcastError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        let mut remaining = self
            .remaining_failures
            .lock()
            .map_err(|_| BroadcastError::Unavailable("failure counter lock poisoned".into()))?;

        match remaining.as_mut() {
            None => Err(BroadcastError::Unavailable("simulated outage".into())),
            Some(0) => {
                drop(remaining);
                let mut accepted = self
                    .accepted
                    .lock()
                    .map_err(|_| BroadcastError::Unavailable("recorder lock poisoned".into()))?;
                accepted.push(event.clone());
                Ok(())
            }
            Some(n) => {
                *n -= 1;
                Err(BroadcastError::Unavailable("simulated outage".into()))
            }
        }
    }
}
