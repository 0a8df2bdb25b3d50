//! Remote Event-Source Boundary
//!
//! The polling ingestor consumes exactly three calls from a source:
//! `get_event_batch`, `ack`, and `nack`. Everything behind those calls
//! (transport, timeouts, reconnects) belongs to the implementation.
//!
//! A batch either carries events under a sequence number - the token later
//! handed back via ack/nack - or reports a source-side error. Acking tells
//! the source its events are durably stored and can be discarded; nacking
//! returns them to the source's buffer for redelivery.

use async_trait::async_trait;
use bytes::Bytes;
use rivulet_core::Record;
use std::collections::HashMap;

use crate::error::Result;

/// One event as delivered by a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEvent {
    /// Payload bytes.
    pub body: Bytes,
    /// Transport headers, preserved verbatim into the internal record.
    pub headers: HashMap<String, String>,
}

impl SourceEvent {
    pub fn new(body: impl Into<Bytes>, headers: HashMap<String, String>) -> Self {
        Self {
            body: body.into(),
            headers,
        }
    }
}

impl From<SourceEvent> for Record {
    fn from(event: SourceEvent) -> Self {
        Record::new(event.body, event.headers)
    }
}

/// Response to one `get_event_batch` call.
#[derive(Debug, Clone)]
pub enum EventBatch {
    /// Events plus the sequence number to ack or nack them under.
    Events {
        sequence_number: String,
        events: Vec<SourceEvent>,
    },
    /// The source could not produce a batch; no ack or nack applies.
    Error { message: String },
}

/// Client handle to one remote event source.
///
/// Handles are pooled by the ingestor; implementations must tolerate being
/// called from whichever worker currently holds them.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Pull at most `max_batch_size` events.
    async fn get_event_batch(&self, max_batch_size: i32) -> Result<EventBatch>;

    /// Confirm that the batch under `sequence_number` is durably stored.
    /// Idempotent on the source side.
    async fn ack(&self, sequence_number: &str) -> Result<()>;

    /// Return the batch under `sequence_number` to the source for
    /// redelivery.
    async fn nack(&self, sequence_number: &str) -> Result<()>;

    /// Tear down the transport. Called once when the ingestor stops.
    async fn close(&self) -> Result<()>;

    /// Human-readable identity of this source, for logs.
    fn name(&self) -> &str;
}
