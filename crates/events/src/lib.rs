//! `tillsync-events` — change notifications and sync fan-out seams.
//!
//! This crate holds the event vocabulary shared by the offline queue and its
//! collaborators:
//!
//! - [`ChangeEvent`]: business mutations published by point-of-sale flows,
//!   consumed by the offline capture listener.
//! - [`EventBus`] / [`Subscription`]: the transport-agnostic pub/sub seam,
//!   with an in-memory implementation for tests/dev.
//! - [`SyncEvent`]: the transient record handed downstream when a queued
//!   operation finally syncs.
//! - [`SyncBroadcaster`]: the delivery boundary the sync engine drains into.

pub mod broadcast;
pub mod bus;
pub mod change;
pub mod in_memory_bus;
pub mod sync_event;

pub use broadcast::{BroadcastError, FailingBroadcaster, RecordingBroadcaster, SyncBroadcaster};
pub use bus::{EventBus, Subscription};
pub use change::{ChangeEvent, ChangeKind, OperationKind};
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
pub use sync_event::SyncEvent;
