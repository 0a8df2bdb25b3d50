//! Ingestion Error Types
//!
//! One error enum covers both halves of the crate: the block generation path
//! (generator, listener, WAL persistence) and the polling path (event source
//! calls, store callback). `Fatal` is the only variant that aborts a worker;
//! everything else is per-iteration.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("block generator is stopped")]
    GeneratorStopped,

    #[error("listener error: {0}")]
    Listener(String),

    #[error("event source error: {0}")]
    Source(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("write-ahead log error: {0}")]
    Wal(#[from] rivulet_wal::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl Error {
    /// Fatal errors abort the worker that hit them; everything else is
    /// handled within the current iteration.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Fatal(_))
    }
}
