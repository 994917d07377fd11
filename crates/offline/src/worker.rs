//! Background workers: the periodic drain sweep and the capture listener.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use tillsync_events::{ChangeEvent, EventBus, SyncBroadcaster, Subscription};
use tillsync_storage::KvStore;

use crate::queue::OfflineQueueManager;

/// Handle to control and join a background worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Periodic sweep over every known queue.
///
/// Fires on the manager's configured `sync_interval` regardless of
/// connectivity events, so queues that missed their transition drain still
/// get flushed.
#[derive(Debug)]
pub struct SyncWorker;

impl SyncWorker {
    pub fn spawn<S, B>(manager: Arc<OfflineQueueManager<S, B>>) -> WorkerHandle
    where
        S: KvStore + 'static,
        B: SyncBroadcaster + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let interval = manager.config().sync_interval;

        let join = thread::Builder::new()
            .name("offline-sync".to_string())
            .spawn(move || sync_loop(manager, interval, shutdown_rx))
            .expect("failed to spawn sync worker thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn sync_loop<S, B>(
    manager: Arc<OfflineQueueManager<S, B>>,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
) where
    S: KvStore,
    B: SyncBroadcaster,
{
    info!(
        worker = "offline-sync",
        interval_ms = interval.as_millis() as u64,
        "sync worker started"
    );

    loop {
        match shutdown_rx.recv_timeout(interval) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => match manager.sync_all() {
                Ok(summary) => {
                    if summary.queues_visited > 0 {
                        debug!(
                            queues = summary.queues_visited,
                            synced = summary.operations_synced,
                            "sync pass complete"
                        );
                    }
                }
                Err(err) => error!(error = %err, "sync pass failed"),
            },
        }
    }

    info!(worker = "offline-sync", "sync worker stopped");
}

/// Subscribes to change notifications and captures them while offline.
///
/// The handler is idempotent-friendly: at-least-once delivery from the bus
/// can at worst queue a duplicate operation, which downstream consumers
/// already tolerate.
#[derive(Debug)]
pub struct ChangeListener;

impl ChangeListener {
    pub fn spawn<S, B, Bus>(bus: Bus, manager: Arc<OfflineQueueManager<S, B>>) -> WorkerHandle
    where
        S: KvStore + 'static,
        B: SyncBroadcaster + 'static,
        Bus: EventBus<ChangeEvent>,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub = bus.subscribe();

        let join = thread::Builder::new()
            .name("offline-capture".to_string())
            .spawn(move || listener_loop(sub, shutdown_rx, manager))
            .expect("failed to spawn change listener thread");

        WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        }
    }
}

fn listener_loop<S, B>(
    sub: Subscription<ChangeEvent>,
    shutdown_rx: mpsc::Receiver<()>,
    manager: Arc<OfflineQueueManager<S, B>>,
) where
    S: KvStore,
    B: SyncBroadcaster,
{
    info!(worker = "offline-capture", "change listener started");
    let tick = Duration::from_millis(250);

    loop {
        // Shutdown check (non-blocking)
        if shutdown_rx.try_recv().is_ok() {
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(event) => {
                let tenant_id = event.tenant_id;
                let location_id = event.location_id;

                match manager.handle_change(event) {
                    Ok(Some(operation_id)) => debug!(
                        operation_id = %operation_id,
                        tenant_id = %tenant_id,
                        location_id = %location_id,
                        "change captured offline"
                    ),
                    Ok(None) => {}
                    Err(err) => warn!(
                        tenant_id = %tenant_id,
                        location_id = %location_id,
                        error = %err,
                        "offline capture failed"
                    ),
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(worker = "offline-capture", "change listener stopped");
}
