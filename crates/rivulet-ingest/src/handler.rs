//! Write-Ahead Block Handler
//!
//! The canonical [`BlockListener`]: serializes each sealed block's records,
//! persists the bytes through a [`WalWriter`], and forwards the resulting
//! `(block id, segment)` pair to a downstream [`SegmentSink`]. A crash after
//! the sink call loses nothing: the segment can always be re-read from the
//! log.

use std::sync::Arc;

use async_trait::async_trait;
use rivulet_core::{Block, FileSegment, Record};
use rivulet_wal::{WalRandomReader, WalWriter};

use crate::error::{Error, Result};
use crate::traits::{BlockListener, SegmentSink};

/// Persists sealed blocks to a write-ahead log before handing them on.
pub struct WalBlockHandler {
    writer: WalWriter,
    sink: Arc<dyn SegmentSink>,
}

impl WalBlockHandler {
    pub fn new(writer: WalWriter, sink: Arc<dyn SegmentSink>) -> Self {
        Self { writer, sink }
    }

    /// Close the underlying log. Call after the generator has stopped.
    pub async fn close(&self) -> Result<()> {
        self.writer.close().await?;
        Ok(())
    }
}

#[async_trait]
impl BlockListener for WalBlockHandler {
    async fn on_push_block(&self, block: Block) -> Result<()> {
        let bytes =
            bincode::serialize(&block.records).map_err(|e| Error::Serialization(e.to_string()))?;
        let segment = self.writer.write(&bytes).await?;
        tracing::debug!(
            block = %block.id,
            segment = %segment,
            records = block.len(),
            "block persisted to write-ahead log"
        );
        self.sink.on_block_stored(block.id, segment).await
    }

    fn on_error(&self, message: &str, error: &Error) {
        tracing::error!(error = %error, "{}", message);
    }
}

/// Decode the records of one persisted block back out of the log.
pub async fn read_block_records(
    reader: &WalRandomReader,
    segment: &FileSegment,
) -> Result<Vec<Record>> {
    let bytes = reader.read(segment).await?;
    bincode::deserialize(&bytes).map_err(|e| Error::Serialization(e.to_string()))
}
