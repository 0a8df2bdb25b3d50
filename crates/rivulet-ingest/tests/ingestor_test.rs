//! Polling Ingestor Integration Tests
//!
//! Ack/nack accounting against scripted fake sources: acks exactly once on
//! success, nacks exactly once when storing fails, does neither for an
//! error batch, and never leaks a pooled connection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rivulet_core::Record;
use rivulet_ingest::{
    BlockStore, Error, EventBatch, EventSource, IngestorConfig, PollingIngestor, Result,
    SourceEvent,
};
use tokio::sync::Mutex;

/// Source that serves a scripted list of batches, then parks.
struct ScriptedSource {
    name: String,
    batches: Mutex<Vec<Result<EventBatch>>>,
    acks: Mutex<Vec<String>>,
    nacks: Mutex<Vec<String>>,
    nack_fails: bool,
    closes: AtomicUsize,
}

impl ScriptedSource {
    fn new(name: &str, batches: Vec<Result<EventBatch>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            batches: Mutex::new(batches),
            acks: Mutex::new(Vec::new()),
            nacks: Mutex::new(Vec::new()),
            nack_fails: false,
            closes: AtomicUsize::new(0),
        })
    }

    fn with_failing_nack(name: &str, batches: Vec<Result<EventBatch>>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            batches: Mutex::new(batches),
            acks: Mutex::new(Vec::new()),
            nacks: Mutex::new(Vec::new()),
            nack_fails: true,
            closes: AtomicUsize::new(0),
        })
    }

    fn events_batch(sequence: &str, bodies: &[&str]) -> EventBatch {
        EventBatch::Events {
            sequence_number: sequence.to_string(),
            events: bodies
                .iter()
                .map(|b| SourceEvent::new(b.as_bytes().to_vec(), HashMap::new()))
                .collect(),
        }
    }
}

#[async_trait]
impl EventSource for ScriptedSource {
    async fn get_event_batch(&self, _max_batch_size: i32) -> Result<EventBatch> {
        let next = self.batches.lock().await.pop();
        match next {
            Some(batch) => batch,
            None => {
                // Script exhausted: park until the worker is interrupted.
                std::future::pending::<()>().await;
                unreachable!()
            }
        }
    }

    async fn ack(&self, sequence_number: &str) -> Result<()> {
        self.acks.lock().await.push(sequence_number.to_string());
        Ok(())
    }

    async fn nack(&self, sequence_number: &str) -> Result<()> {
        self.nacks.lock().await.push(sequence_number.to_string());
        if self.nack_fails {
            return Err(Error::Source("nack transport down".to_string()));
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Store that records everything, optionally failing the first N calls.
struct RecordingStore {
    records: Mutex<Vec<Record>>,
    stores: AtomicUsize,
    failures_remaining: AtomicUsize,
}

impl RecordingStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            stores: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(0),
        })
    }

    fn failing_times(n: usize) -> Arc<Self> {
        Arc::new(Self {
            records: Mutex::new(Vec::new()),
            stores: AtomicUsize::new(0),
            failures_remaining: AtomicUsize::new(n),
        })
    }
}

#[async_trait]
impl BlockStore for RecordingStore {
    async fn store(&self, records: Vec<Record>) -> Result<()> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        if self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Store("buffer unavailable".to_string()));
        }
        self.records.lock().await.extend(records);
        Ok(())
    }
}

async fn wait_until(deadline_ms: u64, mut probe: impl FnMut() -> bool + Send) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(deadline_ms);
    while !probe() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

// ---------------------------------------------------------------
// Ack path
// ---------------------------------------------------------------

#[tokio::test]
async fn test_successful_batch_is_acked_exactly_once() {
    let source = ScriptedSource::new(
        "s1",
        vec![Ok(ScriptedSource::events_batch("S1", &["e1", "e2"]))],
    );
    let store = RecordingStore::new();
    let mut ingestor = PollingIngestor::new(IngestorConfig::default(), store.clone());
    ingestor.start(vec![source.clone()]).await.unwrap();

    wait_until(2_000, || {
        source.acks.try_lock().map(|a| !a.is_empty()).unwrap_or(false)
    })
    .await;
    ingestor.stop().await.unwrap();

    assert_eq!(*source.acks.lock().await, vec!["S1".to_string()]);
    assert!(source.nacks.lock().await.is_empty());
    assert_eq!(store.records.lock().await.len(), 2);
    assert_eq!(source.closes.load(Ordering::SeqCst), 1);
}

// ---------------------------------------------------------------
// Nack path
// ---------------------------------------------------------------

#[tokio::test]
async fn test_store_failure_triggers_exactly_one_nack() {
    let source = ScriptedSource::new(
        "s2",
        vec![Ok(ScriptedSource::events_batch("S2", &["e1", "e2"]))],
    );
    let store = RecordingStore::failing_times(1);
    let mut ingestor = PollingIngestor::new(IngestorConfig::default(), store.clone());
    ingestor.start(vec![source.clone()]).await.unwrap();

    wait_until(2_000, || {
        source.nacks.try_lock().map(|n| !n.is_empty()).unwrap_or(false)
    })
    .await;
    ingestor.stop().await.unwrap();

    assert_eq!(*source.nacks.lock().await, vec!["S2".to_string()]);
    assert!(source.acks.lock().await.is_empty());
    assert!(store.records.lock().await.is_empty());
    // The connection came back to the pool: stop() closed it.
    assert_eq!(source.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_failed_nack_is_terminal_for_the_iteration_only() {
    // Store fails for the first batch; the nack for it also fails. The
    // second batch must still be polled, stored, and acked.
    let source = ScriptedSource::with_failing_nack(
        "s3",
        vec![
            // Batches pop from the back of the vec.
            Ok(ScriptedSource::events_batch("S5", &["later"])),
            Ok(ScriptedSource::events_batch("S4", &["doomed"])),
        ],
    );
    let store = RecordingStore::failing_times(1);
    let mut ingestor = PollingIngestor::new(IngestorConfig::default(), store.clone());
    ingestor.start(vec![source.clone()]).await.unwrap();

    wait_until(2_000, || {
        source.acks.try_lock().map(|a| !a.is_empty()).unwrap_or(false)
    })
    .await;
    ingestor.stop().await.unwrap();

    assert_eq!(*source.nacks.lock().await, vec!["S4".to_string()]);
    assert_eq!(*source.acks.lock().await, vec!["S5".to_string()]);
    assert_eq!(store.records.lock().await.len(), 1);
}

// ---------------------------------------------------------------
// Error-batch path
// ---------------------------------------------------------------

#[tokio::test]
async fn test_error_batch_is_skipped_without_ack_or_nack() {
    let source = ScriptedSource::new(
        "s4",
        vec![
            // Popped last: proves the worker kept going after the error batch.
            Ok(ScriptedSource::events_batch("S6", &["after"])),
            Ok(EventBatch::Error {
                message: "busy".to_string(),
            }),
        ],
    );
    let store = RecordingStore::new();
    let mut ingestor = PollingIngestor::new(IngestorConfig::default(), store.clone());
    ingestor.start(vec![source.clone()]).await.unwrap();

    wait_until(2_000, || {
        source.acks.try_lock().map(|a| !a.is_empty()).unwrap_or(false)
    })
    .await;
    ingestor.stop().await.unwrap();

    assert_eq!(*source.acks.lock().await, vec!["S6".to_string()]);
    assert!(source.nacks.lock().await.is_empty());
    assert_eq!(store.records.lock().await.len(), 1);
}

// ---------------------------------------------------------------
// Rpc failure and pool conservation
// ---------------------------------------------------------------

#[tokio::test]
async fn test_get_batch_failure_does_not_nack() {
    let source = ScriptedSource::new(
        "s5",
        vec![
            Ok(ScriptedSource::events_batch("S7", &["ok"])),
            Err(Error::Source("connection reset".to_string())),
        ],
    );
    let store = RecordingStore::new();
    let mut ingestor = PollingIngestor::new(IngestorConfig::default(), store.clone());
    ingestor.start(vec![source.clone()]).await.unwrap();

    wait_until(2_000, || {
        source.acks.try_lock().map(|a| !a.is_empty()).unwrap_or(false)
    })
    .await;
    ingestor.stop().await.unwrap();

    // The failed poll received no batch, so nothing was nacked.
    assert!(source.nacks.lock().await.is_empty());
    assert_eq!(*source.acks.lock().await, vec!["S7".to_string()]);
}

#[tokio::test]
async fn test_every_connection_survives_a_busy_run() {
    // More workers than connections, a store that fails half the time: the
    // pool must still hold every connection at stop.
    let sources: Vec<Arc<ScriptedSource>> = (0..3)
        .map(|i| {
            ScriptedSource::new(
                &format!("pool-{}", i),
                (0..20)
                    .map(|j| Ok(ScriptedSource::events_batch(&format!("P{}-{}", i, j), &["e"])))
                    .collect(),
            )
        })
        .collect();
    let store = RecordingStore::failing_times(25);
    let config = IngestorConfig {
        parallelism: 5,
        max_batch_size: 10,
    };
    let mut ingestor = PollingIngestor::new(config, store.clone());
    ingestor
        .start(sources.iter().map(|s| s.clone() as Arc<dyn EventSource>).collect())
        .await
        .unwrap();

    wait_until(5_000, || store.stores.load(Ordering::SeqCst) >= 60).await;
    ingestor.stop().await.unwrap();

    // Each connection was returned on every iteration and closed once.
    for source in &sources {
        assert_eq!(source.closes.load(Ordering::SeqCst), 1);
    }
    let acked: usize = {
        let mut n = 0;
        for source in &sources {
            n += source.acks.lock().await.len();
        }
        n
    };
    let nacked: usize = {
        let mut n = 0;
        for source in &sources {
            n += source.nacks.lock().await.len();
        }
        n
    };
    assert_eq!(acked + nacked, 60, "every batch settled exactly once");
    assert_eq!(nacked, 25);
}

#[tokio::test]
async fn test_stop_unblocks_parked_workers() {
    // Script exhausted immediately: the worker parks inside get_event_batch
    // and must be interrupted by stop.
    let source = ScriptedSource::new("parked", vec![]);
    let store = RecordingStore::new();
    let mut ingestor = PollingIngestor::new(IngestorConfig::default(), store);
    ingestor.start(vec![source.clone()]).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    tokio::time::timeout(Duration::from_secs(2), ingestor.stop())
        .await
        .expect("stop must interrupt a parked worker")
        .unwrap();

    assert!(!ingestor.is_running());
    assert_eq!(source.closes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_start_requires_sources() {
    let store = RecordingStore::new();
    let mut ingestor = PollingIngestor::new(IngestorConfig::default(), store);
    let err = ingestor.start(vec![]).await.unwrap_err();
    assert!(matches!(err, Error::Source(_)));
}
