//! Capability traits at the crate's collaborator seams.
//!
//! The block generator calls out through [`BlockListener`], the polling
//! ingestor calls in through [`BlockStore`], and a persisting listener
//! forwards results through [`SegmentSink`]. Keeping these as object-safe
//! trait seams means neither half of the crate owns a back-reference to the
//! other.

use async_trait::async_trait;
use rivulet_core::{Block, BlockId, FileSegment, Record};
use std::future::Future;
use std::pin::Pin;

use crate::error::{Error, Result};

/// A deferred callback tied to one block, run after that block has been
/// pushed to the listener. The closure owns its argument.
pub type BlockCallback = Box<dyn FnOnce() -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// Consumer of sealed blocks.
///
/// The generator owns its listener for the generator's whole lifetime and
/// invokes it from the pusher task, one block at a time, in cut order.
#[async_trait]
pub trait BlockListener: Send + Sync {
    /// Handle one sealed block. An error here stops the pusher; it is
    /// reported through [`on_error`](Self::on_error) first.
    async fn on_push_block(&self, block: Block) -> Result<()>;

    /// Report a failure on the cut or push path. Must not swallow silently.
    fn on_error(&self, message: &str, error: &Error) {
        tracing::error!(error = %error, "{}", message);
    }
}

/// Upstream store entry point the polling ingestor feeds.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Accept one polled batch worth of records, preserving their order.
    async fn store(&self, records: Vec<Record>) -> Result<()>;
}

/// Downstream receiver of `(block id, segment)` pairs produced when a block's
/// bytes have been persisted to the write-ahead log.
#[async_trait]
pub trait SegmentSink: Send + Sync {
    async fn on_block_stored(&self, block_id: BlockId, segment: FileSegment) -> Result<()>;
}
