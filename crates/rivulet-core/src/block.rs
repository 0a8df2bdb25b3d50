//! Block Identity and Grouping
//!
//! A block is one time-bounded, ordered group of records sealed by the block
//! generator. Its id pairs the receiver that produced it with the start of
//! the interval it covers, which makes ids strictly monotonic per receiver.

use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Identity of one sealed block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId {
    /// Receiver that produced the block
    pub receiver_id: u32,

    /// Start of the interval the block covers, in milliseconds since epoch
    pub timestamp_ms: i64,
}

impl BlockId {
    pub fn new(receiver_id: u32, timestamp_ms: i64) -> Self {
        Self {
            receiver_id,
            timestamp_ms,
        }
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "input-{}-{}", self.receiver_id, self.timestamp_ms)
    }
}

/// One sealed group of records, ordered by append time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: BlockId,
    pub records: Vec<Record>,
}

impl Block {
    pub fn new(id: BlockId, records: Vec<Record>) -> Self {
        Self { id, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
