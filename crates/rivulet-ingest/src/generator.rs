//! Block Generator
//!
//! Accepts records from any number of concurrent producers, seals the
//! current buffer into a block on every interval boundary, and hands sealed
//! blocks to the listener on a dedicated pusher task.
//!
//! ## Data Flow
//!
//! ```text
//! producers ──append()──→ current_buffer
//!                             │ cut (every block_interval_ms)
//!                             ▼
//!                    bounded block queue ──→ pusher ──→ listener.on_push_block
//!                                                            │
//!                                                   pending callbacks fire
//! ```
//!
//! ## Backpressure
//!
//! The block queue is bounded. A cut that finds it full blocks on the put
//! while still holding the generator lock, so producers back up behind the
//! cut until the listener catches up. This is intentional: it is the only
//! throttle between fast producers and a slow consumer.
//!
//! The pending-callback map lives under its own lock so the pusher never
//! contends on the generator lock; a stalled cut must not be able to block
//! the very task that will drain the queue.
//!
//! ## Shutdown
//!
//! `stop` halts the timer, performs one final cut so records appended after
//! the last tick are not lost, then closes the queue. The pusher drains
//! everything still queued before exiting, so every sealed block reaches the
//! listener exactly once.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;

use rivulet_core::{Block, BlockId, Record};

use crate::config::BlockGeneratorConfig;
use crate::error::{Error, Result};
use crate::traits::{BlockCallback, BlockListener, BlockStore};

/// Current timestamp in milliseconds since epoch
fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

/// Buffer and block identity, guarded by the generator lock.
struct GeneratorState {
    current_buffer: Vec<Record>,
    current_block_id: BlockId,
}

/// Multi-producer, time-windowed record batcher.
pub struct BlockGenerator {
    receiver_id: u32,
    block_interval: Duration,
    listener: Arc<dyn BlockListener>,
    state: Mutex<GeneratorState>,
    // Lock order where both are held: state, then callbacks.
    pending_callbacks: Mutex<HashMap<BlockId, Vec<BlockCallback>>>,
    blocks_tx: Mutex<Option<mpsc::Sender<Block>>>,
    blocks_rx: Mutex<Option<mpsc::Receiver<Block>>>,
    stop_tx: watch::Sender<bool>,
    stopped: AtomicBool,
    timer_task: Mutex<Option<JoinHandle<()>>>,
    pusher_task: Mutex<Option<JoinHandle<()>>>,
}

impl BlockGenerator {
    pub fn new(config: BlockGeneratorConfig, listener: Arc<dyn BlockListener>) -> Self {
        let block_interval = Duration::from_millis(config.block_interval_ms);
        let initial_block_id = BlockId::new(
            config.receiver_id,
            now_ms() - config.block_interval_ms as i64,
        );
        let (blocks_tx, blocks_rx) = mpsc::channel(config.block_queue_size.max(1));
        let (stop_tx, _) = watch::channel(false);

        Self {
            receiver_id: config.receiver_id,
            block_interval,
            listener,
            state: Mutex::new(GeneratorState {
                current_buffer: Vec::new(),
                current_block_id: initial_block_id,
            }),
            pending_callbacks: Mutex::new(HashMap::new()),
            blocks_tx: Mutex::new(Some(blocks_tx)),
            blocks_rx: Mutex::new(Some(blocks_rx)),
            stop_tx,
            stopped: AtomicBool::new(false),
            timer_task: Mutex::new(None),
            pusher_task: Mutex::new(None),
        }
    }

    /// Launch the cut timer and the pusher task.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let rx = self
            .blocks_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| Error::Fatal("block generator already started".to_string()))?;

        let timer = Arc::clone(self);
        let stop_rx = self.stop_tx.subscribe();
        *self.timer_task.lock().await =
            Some(tokio::spawn(async move { timer.run_timer(stop_rx).await }));

        let pusher = Arc::clone(self);
        *self.pusher_task.lock().await =
            Some(tokio::spawn(async move { pusher.run_pusher(rx).await }));

        tracing::info!(
            receiver = self.receiver_id,
            interval_ms = self.block_interval.as_millis() as u64,
            "block generator started"
        );
        Ok(())
    }

    /// Append one record to the current buffer.
    ///
    /// Producers only contend on the short critical section; they block
    /// longer only when a cut is stalled on a full block queue.
    pub async fn append(&self, record: Record) -> Result<()> {
        self.ensure_running()?;
        let mut state = self.state.lock().await;
        state.current_buffer.push(record);
        Ok(())
    }

    /// Append a whole polled batch under one lock acquisition, preserving
    /// its order within the current block.
    pub async fn append_all(&self, records: Vec<Record>) -> Result<()> {
        self.ensure_running()?;
        let mut state = self.state.lock().await;
        state.current_buffer.extend(records);
        Ok(())
    }

    /// Append a record and register a callback against the block it lands
    /// in. The callback runs exactly once, after the listener has handled
    /// that block; if the block is empty at cut time the callback is
    /// dropped.
    pub async fn append_with_callback<F, Fut>(&self, record: Record, callback: F) -> Result<()>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.ensure_running()?;
        let mut state = self.state.lock().await;
        state.current_buffer.push(record);
        let block_id = state.current_block_id;
        self.pending_callbacks
            .lock()
            .await
            .entry(block_id)
            .or_default()
            .push(Box::new(move || Box::pin(callback())));
        Ok(())
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stop the timer, flush the buffer with a final cut, and drain the
    /// queue through the pusher. Idempotent.
    pub async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!(receiver = self.receiver_id, "stopping block generator");

        // Halt the timer first; an in-flight cut completes because the
        // queue sender stays alive until after the final cut below.
        let _ = self.stop_tx.send(true);
        if let Some(handle) = self.timer_task.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "cut timer task failed");
            }
        }

        // Final cut: records appended since the last tick are sealed and
        // delivered instead of being dropped.
        if let Err(e) = self.cut(now_ms()).await {
            self.listener.on_error("failed to cut final block", &e);
        }

        // Closing the queue lets the pusher drain what is left and exit.
        self.blocks_tx.lock().await.take();
        if let Some(handle) = self.pusher_task.lock().await.take() {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "block pusher task failed");
            }
        }

        let leftover = std::mem::take(&mut *self.pending_callbacks.lock().await);
        if !leftover.is_empty() {
            tracing::warn!(
                blocks = leftover.len(),
                "dropping callbacks for blocks that were never pushed"
            );
        }

        tracing::info!(receiver = self.receiver_id, "block generator stopped");
        Ok(())
    }

    fn ensure_running(&self) -> Result<()> {
        if self.is_stopped() {
            return Err(Error::GeneratorStopped);
        }
        Ok(())
    }

    /// Seal the current buffer into a block ending at `at_time_ms` and put
    /// it on the queue.
    async fn cut(&self, at_time_ms: i64) -> Result<()> {
        let tx_guard = self.blocks_tx.lock().await;
        let Some(tx) = tx_guard.as_ref() else {
            return Ok(());
        };

        let mut state = self.state.lock().await;
        let sealed_id = state.current_block_id;
        let interval_ms = self.block_interval.as_millis() as i64;
        state.current_block_id = BlockId::new(self.receiver_id, at_time_ms - interval_ms);

        if state.current_buffer.is_empty() {
            // No block to enqueue for this interval; callbacks keyed to it
            // can never fire.
            if let Some(dropped) = self.pending_callbacks.lock().await.remove(&sealed_id) {
                tracing::warn!(
                    block = %sealed_id,
                    callbacks = dropped.len(),
                    "dropping callbacks registered against an empty block"
                );
            }
            return Ok(());
        }

        let records = std::mem::take(&mut state.current_buffer);
        let block = Block::new(sealed_id, records);
        tracing::debug!(block = %block.id, records = block.len(), "block sealed");

        // The put happens with the generator lock held: a full queue stalls
        // this cut, and producers back up behind it until the pusher drains.
        tx.send(block)
            .await
            .map_err(|_| Error::Fatal("block queue closed".to_string()))?;
        Ok(())
    }

    async fn run_timer(self: Arc<Self>, mut stop_rx: watch::Receiver<bool>) {
        let interval_ms = self.block_interval.as_millis() as i64;
        loop {
            // Sleep to the next interval boundary instead of a fixed period
            // so ticks do not drift under scheduler hiccups.
            let now = now_ms();
            let next_boundary = (now / interval_ms + 1) * interval_ms;
            let sleep = Duration::from_millis((next_boundary - now) as u64);

            tokio::select! {
                _ = stop_rx.changed() => break,
                _ = tokio::time::sleep(sleep) => {
                    if let Err(e) = self.cut(next_boundary).await {
                        self.listener.on_error("failed to cut block", &e);
                        break;
                    }
                }
            }
        }
        tracing::debug!(receiver = self.receiver_id, "cut timer exiting");
    }

    async fn run_pusher(self: Arc<Self>, mut rx: mpsc::Receiver<Block>) {
        // recv() keeps yielding whatever is still queued after the sender
        // closes at stop, then returns None: the drain is built in.
        while let Some(block) = rx.recv().await {
            let block_id = block.id;
            let record_count = block.len();

            if let Err(e) = self.listener.on_push_block(block).await {
                self.listener.on_error("failed to push block", &e);
                return;
            }
            tracing::debug!(block = %block_id, records = record_count, "block pushed");

            let callbacks = self
                .pending_callbacks
                .lock()
                .await
                .remove(&block_id)
                .unwrap_or_default();
            for callback in callbacks {
                callback().await;
            }
        }
        tracing::debug!(receiver = self.receiver_id, "block pusher exiting");
    }
}

#[async_trait]
impl BlockStore for BlockGenerator {
    async fn store(&self, records: Vec<Record>) -> Result<()> {
        self.append_all(records).await
    }
}
