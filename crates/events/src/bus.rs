//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus is the **distribution layer** for change notifications: upstream
//! flows persist their business records first, then publish a notification
//! here so interested consumers (the offline capture listener, dashboards,
//! audit sinks) can react.
//!
//! ## Design Philosophy
//!
//! The bus is intentionally lightweight and makes minimal assumptions:
//!
//! - **Transport-agnostic**: works with in-memory channels, Redis pub/sub,
//!   message queues, etc.
//! - **At-least-once delivery**: notifications may arrive more than once;
//!   consumers must be idempotent.
//! - **No persistence**: the bus distributes, it does not store. The records
//!   the notifications describe already live in their own stores, and queued
//!   operations live in the offline queue.
//!
//! A dropped notification therefore costs freshness, never data.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

/// A subscription to a notification stream.
///
/// Each subscription receives a copy of every message published after it was
/// created (broadcast semantics).
///
/// ## Usage Pattern
///
/// ```ignore
/// let bus: Arc<InMemoryEventBus<ChangeEvent>> = ...;
/// let subscription = bus.subscribe();
///
/// loop {
///     match subscription.recv_timeout(Duration::from_millis(200)) {
///         Ok(event) => capture(event),
///         Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue, // check shutdown
///         Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break, // bus closed
///     }
/// }
/// ```
///
/// Subscriptions are designed for single-threaded consumption; hand one to
/// exactly one consumer thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Domain-agnostic pub/sub contract.
///
/// `publish()` can fail (bus full, transport down). Callers decide whether to
/// retry; since the underlying records are already persisted, republishing is
/// always safe.
///
/// Implementations must be `Send + Sync` so multiple threads can publish
/// concurrently.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
