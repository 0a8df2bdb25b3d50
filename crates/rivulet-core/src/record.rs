//! Record Data Structure
//!
//! This module defines the core `Record` type - the unit of data flowing
//! through the receiver.
//!
//! ## What is a Record?
//! A record is one opaque event pulled from a source, similar to:
//! - A Flume event
//! - A log line with transport metadata
//! - A message on an ingest queue
//!
//! ## Structure
//! Each record contains:
//! - **body**: The actual payload (arbitrary bytes, never parsed here)
//! - **headers**: String key-value metadata carried verbatim from the source
//!
//! ## Design Decisions
//! - Uses `bytes::Bytes` for zero-copy operations (no allocations when slicing)
//! - Implements `Serialize`/`Deserialize` so sealed blocks can be persisted
//! - The log layer treats the body as opaque; no validation happens here

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single record accepted by the receiver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Payload bytes
    pub body: Bytes,

    /// Transport metadata, preserved verbatim
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

impl Record {
    pub fn new(body: Bytes, headers: HashMap<String, String>) -> Self {
        Self { body, headers }
    }

    /// Build a record carrying only a payload
    pub fn from_body(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            headers: HashMap::new(),
        }
    }

    /// Estimate the in-memory size of this record in bytes
    pub fn estimated_size(&self) -> usize {
        self.body.len()
            + self
                .headers
                .iter()
                .map(|(k, v)| k.len() + v.len())
                .sum::<usize>()
    }
}
