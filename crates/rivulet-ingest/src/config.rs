//! Ingestion Configuration
//!
//! Two small configs: one for the block generator's batching window and
//! queue depth, one for the polling ingestor's fan-out and batch sizing.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::BlockGenerator`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockGeneratorConfig {
    /// Identity of the receiver this generator batches for; part of every
    /// block id it issues.
    pub receiver_id: u32,

    /// Width of the batching window: the buffer is sealed into a block on
    /// every interval boundary (default: 200ms).
    #[serde(default = "default_block_interval_ms")]
    pub block_interval_ms: u64,

    /// Capacity of the sealed-block queue. A full queue blocks the cut,
    /// which in turn blocks producers; this is the backpressure mechanism
    /// (default: 10).
    #[serde(default = "default_block_queue_size")]
    pub block_queue_size: usize,
}

impl Default for BlockGeneratorConfig {
    fn default() -> Self {
        Self {
            receiver_id: 0,
            block_interval_ms: default_block_interval_ms(),
            block_queue_size: default_block_queue_size(),
        }
    }
}

fn default_block_interval_ms() -> u64 {
    200
}

fn default_block_queue_size() -> usize {
    10
}

/// Configuration for [`crate::PollingIngestor`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestorConfig {
    /// Number of worker tasks pulling batches concurrently (default: 1).
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,

    /// Upper bound on events requested per poll (default: 1000).
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: i32,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            max_batch_size: default_max_batch_size(),
        }
    }
}

fn default_parallelism() -> usize {
    1
}

fn default_max_batch_size() -> i32 {
    1000
}
