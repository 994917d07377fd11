//! `tillsync-offline` — offline operation capture and sync drain.
//!
//! When a location loses connectivity, its business mutations (inventory
//! updates, transactions, customer edits) keep flowing: this crate captures
//! them as queued operations, persists them per tenant+location, and drains
//! them through a broadcast seam once the location comes back.
//!
//! The moving parts:
//!
//! - [`ConnectivityTracker`]: staleness-aware online/offline answers.
//! - [`OfflineQueueManager`]: capture, inspect, retry, clear; owns the queues.
//! - [`SyncEngine`]: one-at-a-time drain with per-queue guards.
//! - [`SyncWorker`] / [`ChangeListener`]: background threads for the periodic
//!   sweep and bus-driven capture.

pub mod config;
pub mod connectivity;
pub mod error;
pub mod operation;
pub mod queue;
pub mod sync;
pub mod worker;


pub use config::OfflineConfig;
pub use connectivity::{ConnectionStatus, ConnectivityTracker};
pub use error::OfflineError;
pub use operation::{OfflineOperation, OperationRequest, OperationStatus};
pub use queue::{OfflineQueueManager, QueueStatus, SyncPassSummary};
pub use sync::SyncEngine;
pub use worker::{ChangeListener, SyncWorker, WorkerHandle};
