//! StoreHandle - manages a store with isolated queue and worker task

use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DeviceKind, SampleStore, SensorSample};

use crate::csv_store::CsvStore;
use crate::error::PersistenceError;
use crate::metrics::StoreMetrics;

/// Cloneable, non-blocking producer side of a store queue
#[derive(Clone)]
pub struct StoreSender {
    name: Arc<str>,
    tx: mpsc::Sender<Vec<SensorSample>>,
    metrics: Arc<StoreMetrics>,
}

impl StoreSender {
    /// Store name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Queue a batch for the worker (non-blocking)
    ///
    /// Returns true if queued, false if the queue is full (batch dropped)
    /// or the worker is gone.
    pub fn try_send(&self, batch: Vec<SensorSample>) -> bool {
        match self.tx.try_send(batch) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(b)) => {
                self.metrics.inc_dropped_count();
                warn!(store = %self.name, rows = b.len(), "Queue full, batch dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(store = %self.name, "Store worker closed unexpectedly");
                false
            }
        }
    }

    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        &self.metrics
    }
}

/// Create a store queue without a worker
///
/// The receiver yields every batch passed to [`StoreSender::try_send`].
pub fn channel(
    name: impl Into<String>,
    capacity: usize,
) -> (StoreSender, mpsc::Receiver<Vec<SensorSample>>) {
    let (tx, rx) = mpsc::channel(capacity);
    let sender = StoreSender {
        name: Arc::from(name.into()),
        tx,
        metrics: Arc::new(StoreMetrics::new()),
    };
    (sender, rx)
}

/// Handle to a running store worker
pub struct StoreHandle {
    sender: StoreSender,
    close_tx: oneshot::Sender<()>,
    worker_handle: JoinHandle<()>,
}

impl StoreHandle {
    /// Create a new StoreHandle and spawn the worker task
    pub fn spawn<S: SampleStore + Send + 'static>(store: S, queue_capacity: usize) -> Self {
        let (sender, rx) = channel(store.name(), queue_capacity.max(1));

        let (close_tx, close_rx) = oneshot::channel();
        let worker_metrics = Arc::clone(&sender.metrics);
        let worker_name = sender.name().to_string();

        let worker_handle = tokio::spawn(async move {
            store_worker(store, rx, close_rx, worker_metrics, worker_name).await;
        });

        Self {
            sender,
            close_tx,
            worker_handle,
        }
    }

    /// Spawn a worker over the CSV file of `kind` inside `dir`
    pub fn spawn_csv(
        dir: &Path,
        kind: DeviceKind,
        queue_capacity: usize,
    ) -> Result<Self, PersistenceError> {
        let store = CsvStore::for_device_kind(dir, kind)
            .map_err(|e| PersistenceError::store_creation(format!("csv_{kind}"), e.to_string()))?;
        Ok(Self::spawn(store, queue_capacity))
    }

    /// Get store name
    pub fn name(&self) -> &str {
        self.sender.name()
    }

    /// Producer handle for drivers
    pub fn sender(&self) -> StoreSender {
        self.sender.clone()
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<StoreMetrics> {
        self.sender.metrics()
    }

    /// Shutdown the store worker gracefully
    ///
    /// Closes the queue to every outstanding [`StoreSender`], then waits for
    /// the worker to drain what was already queued, flush and close.
    #[instrument(name = "store_handle_shutdown", skip(self), fields(store = %self.sender.name))]
    pub async fn shutdown(self) {
        let name = self.sender.name().to_string();
        drop(self.sender);
        // worker may already have stopped when every sender was gone
        let _ = self.close_tx.send(());
        if let Err(e) = self.worker_handle.await {
            error!(store = %name, error = ?e, "Worker task panicked");
        }
        debug!(store = %name, "StoreHandle shutdown complete");
    }
}

/// Worker task that consumes batches and appends them to the store
#[instrument(name = "store_worker_loop", skip(store, rx, close_rx, metrics), fields(store = %name))]
async fn store_worker<S: SampleStore>(
    mut store: S,
    mut rx: mpsc::Receiver<Vec<SensorSample>>,
    mut close_rx: oneshot::Receiver<()>,
    metrics: Arc<StoreMetrics>,
    name: String,
) {
    debug!(store = %name, "Store worker started");

    loop {
        tokio::select! {
            batch = rx.recv() => match batch {
                Some(batch) => append_batch(&mut store, &batch, &metrics, &name).await,
                None => break,
            },
            _ = &mut close_rx => {
                rx.close();
                while let Some(batch) = rx.recv().await {
                    append_batch(&mut store, &batch, &metrics, &name).await;
                }
                break;
            }
        }
    }

    if let Err(e) = store.flush().await {
        error!(store = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = store.close().await {
        error!(store = %name, error = %e, "Close failed on shutdown");
    }

    debug!(store = %name, "Store worker stopped");
}

async fn append_batch<S: SampleStore>(
    store: &mut S,
    batch: &[SensorSample],
    metrics: &StoreMetrics,
    name: &str,
) {
    match store.append(batch).await {
        Ok(()) => metrics.record_batch(batch.len()),
        Err(e) => {
            metrics.inc_failure_count();
            error!(store = %name, rows = batch.len(), error = %e, "Append failed");
            // Continue processing - persistence is best-effort
        }
    }
}
