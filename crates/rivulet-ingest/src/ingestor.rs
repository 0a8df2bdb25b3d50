//! Polling Ingestor
//!
//! Runs a configurable number of worker tasks that each repeatedly borrow a
//! connection from a FIFO pool, pull one event batch, hand the converted
//! records to the store, and settle the batch with the source: ack when the
//! store succeeded, nack when anything failed after the batch was received.
//!
//! ## Per-iteration state machine
//!
//! ```text
//! IDLE ──borrow─→ POLLING ──batch ok──→ STORING ──ack─→ DONE
//!                    │                      │
//!                    ├─error batch─────────→ DONE (no ack, no nack)
//!                    └─failure───→ NACKING ──nack ok/failed──→ DONE
//! ```
//!
//! `DONE` always returns the connection: the borrow is held by a guard that
//! puts the connection back when it drops, so no exit path can leak one.
//! One failing iteration never affects the other workers.

use std::ops::Deref;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use rivulet_core::Record;

use crate::config::IngestorConfig;
use crate::error::{Error, Result};
use crate::source::{EventBatch, EventSource};
use crate::traits::BlockStore;

/// Outcome of one poll-store-settle attempt, matched by the worker loop.
enum PollOutcome {
    /// Batch stored and acked.
    Stored { sequence: String },
    /// The source answered with an error instead of events.
    ErrorBatch { message: String },
    /// A source call failed; `sequence` is set when a batch had been
    /// received (and should therefore be nacked).
    RpcFailed {
        sequence: Option<String>,
        error: Error,
    },
    /// The store rejected the batch.
    StoreFailed { sequence: String, error: Error },
    /// The shutdown signal fired mid-iteration.
    Interrupted { sequence: Option<String> },
}

/// Guard for one borrowed connection. Dropping it returns the connection to
/// the pool, whatever path the iteration took.
struct PooledConnection {
    conn: Arc<dyn EventSource>,
    slot: mpsc::Sender<Arc<dyn EventSource>>,
}

impl PooledConnection {
    fn new(conn: Arc<dyn EventSource>, slot: mpsc::Sender<Arc<dyn EventSource>>) -> Self {
        Self { conn, slot }
    }
}

impl Deref for PooledConnection {
    type Target = dyn EventSource;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // The pool is sized to the connection count and outlives the
        // workers, so the slot is always available.
        if self.slot.try_send(Arc::clone(&self.conn)).is_err() {
            tracing::error!(source = self.conn.name(), "failed to return connection to pool");
        }
    }
}

struct RunningWorkers {
    stop_tx: watch::Sender<bool>,
    workers: Vec<JoinHandle<()>>,
    pool_rx: Arc<Mutex<mpsc::Receiver<Arc<dyn EventSource>>>>,
    connection_count: usize,
}

/// Pulls event batches from a pool of sources and feeds them to a store
/// with at-least-once accounting.
pub struct PollingIngestor {
    config: IngestorConfig,
    store: Arc<dyn BlockStore>,
    running: Option<RunningWorkers>,
}

impl PollingIngestor {
    pub fn new(config: IngestorConfig, store: Arc<dyn BlockStore>) -> Self {
        Self {
            config,
            store,
            running: None,
        }
    }

    /// Pool the given connections and launch the worker tasks.
    pub async fn start(&mut self, sources: Vec<Arc<dyn EventSource>>) -> Result<()> {
        if self.running.is_some() {
            return Err(Error::Fatal("polling ingestor already started".to_string()));
        }
        if sources.is_empty() {
            return Err(Error::Source("no event sources configured".to_string()));
        }

        let connection_count = sources.len();
        let (pool_tx, pool_rx) = mpsc::channel(connection_count);
        for source in sources {
            pool_tx
                .send(source)
                .await
                .map_err(|_| Error::Fatal("connection pool closed".to_string()))?;
        }
        let pool_rx = Arc::new(Mutex::new(pool_rx));
        let (stop_tx, _) = watch::channel(false);

        let mut workers = Vec::with_capacity(self.config.parallelism);
        for worker in 0..self.config.parallelism {
            workers.push(tokio::spawn(run_worker(
                worker,
                Arc::clone(&self.store),
                pool_tx.clone(),
                Arc::clone(&pool_rx),
                stop_tx.subscribe(),
                self.config.max_batch_size,
            )));
        }

        tracing::info!(
            workers = self.config.parallelism,
            connections = connection_count,
            "polling ingestor started"
        );
        self.running = Some(RunningWorkers {
            stop_tx,
            workers,
            pool_rx,
            connection_count,
        });
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Signal the workers, wait for them, then close every pooled
    /// connection. Idempotent.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };
        tracing::info!("stopping polling ingestor");

        let _ = running.stop_tx.send(true);
        for handle in running.workers {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "ingest worker task failed");
            }
        }

        // With the workers joined, every borrow guard has dropped and all
        // connections are back in the pool.
        let mut closed = 0;
        let mut pool = running.pool_rx.lock().await;
        while let Ok(conn) = pool.try_recv() {
            if let Err(e) = conn.close().await {
                tracing::warn!(source = conn.name(), error = %e, "failed to close connection");
            }
            closed += 1;
        }
        if closed != running.connection_count {
            tracing::warn!(
                closed,
                expected = running.connection_count,
                "connection pool did not drain completely"
            );
        }

        tracing::info!(closed, "polling ingestor stopped");
        Ok(())
    }
}

async fn run_worker(
    worker: usize,
    store: Arc<dyn BlockStore>,
    pool_tx: mpsc::Sender<Arc<dyn EventSource>>,
    pool_rx: Arc<Mutex<mpsc::Receiver<Arc<dyn EventSource>>>>,
    mut stop_rx: watch::Receiver<bool>,
    max_batch_size: i32,
) {
    loop {
        let conn = tokio::select! {
            _ = stop_rx.changed() => break,
            taken = async { pool_rx.lock().await.recv().await } => match taken {
                Some(conn) => PooledConnection::new(conn, pool_tx.clone()),
                None => break,
            },
        };

        let outcome = poll_once(&conn, &store, max_batch_size, &mut stop_rx).await;

        match outcome {
            PollOutcome::Stored { sequence } => {
                tracing::debug!(worker, sequence = %sequence, "batch stored and acked");
            }
            PollOutcome::ErrorBatch { message } => {
                tracing::warn!(worker, message = %message, "source returned an error batch");
            }
            PollOutcome::RpcFailed { sequence, error } => {
                if error.is_fatal() {
                    tracing::error!(worker, error = %error, "fatal source error, worker exiting");
                    return;
                }
                tracing::warn!(worker, error = %error, "event source call failed");
                if let Some(sequence) = sequence {
                    send_nack(&conn, &sequence, worker).await;
                }
            }
            PollOutcome::StoreFailed { sequence, error } => {
                if error.is_fatal() {
                    tracing::error!(worker, error = %error, "fatal store error, worker exiting");
                    return;
                }
                tracing::warn!(worker, sequence = %sequence, error = %error, "failed to store batch");
                send_nack(&conn, &sequence, worker).await;
            }
            PollOutcome::Interrupted { sequence } => {
                if *stop_rx.borrow() {
                    break;
                }
                // Interrupted without a shutdown in progress: treat like any
                // other per-iteration failure.
                tracing::warn!(worker, "interrupted outside of shutdown");
                if let Some(sequence) = sequence {
                    send_nack(&conn, &sequence, worker).await;
                }
            }
        }
        // The connection guard drops here and the borrow returns to the
        // pool, on success and failure alike.
    }
    tracing::debug!(worker, "ingest worker exiting");
}

/// Run one poll-store-settle attempt against a borrowed connection.
async fn poll_once(
    conn: &PooledConnection,
    store: &Arc<dyn BlockStore>,
    max_batch_size: i32,
    stop_rx: &mut watch::Receiver<bool>,
) -> PollOutcome {
    let batch = tokio::select! {
        _ = stop_rx.changed() => return PollOutcome::Interrupted { sequence: None },
        result = conn.get_event_batch(max_batch_size) => result,
    };

    let (sequence, events) = match batch {
        Ok(EventBatch::Events {
            sequence_number,
            events,
        }) => (sequence_number, events),
        Ok(EventBatch::Error { message }) => return PollOutcome::ErrorBatch { message },
        // The batch was never received, so there is nothing to nack.
        Err(error) => {
            return PollOutcome::RpcFailed {
                sequence: None,
                error,
            }
        }
    };

    let records: Vec<Record> = events.into_iter().map(Record::from).collect();
    let stored = tokio::select! {
        _ = stop_rx.changed() => {
            return PollOutcome::Interrupted {
                sequence: Some(sequence),
            }
        }
        result = store.store(records) => result,
    };
    if let Err(error) = stored {
        return PollOutcome::StoreFailed { sequence, error };
    }

    match conn.ack(&sequence).await {
        Ok(()) => PollOutcome::Stored { sequence },
        Err(error) => PollOutcome::RpcFailed {
            sequence: Some(sequence),
            error,
        },
    }
}

async fn send_nack(conn: &PooledConnection, sequence: &str, worker: usize) {
    if let Err(e) = conn.nack(sequence).await {
        tracing::error!(
            worker,
            sequence = %sequence,
            error = %e,
            "nack failed, event source is likely unreachable"
        );
    }
}
