//! Write-Ahead Log Error Types
//!
//! All log operations return `Result<T>` aliased to `Result<T, Error>`, which
//! keeps `?`-propagation clean across the writer and the two readers.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("write-ahead log is closed: {0}")]
    LogClosed(String),

    #[error("truncated frame in {path} at offset {offset}")]
    FrameTruncated { path: String, offset: u64 },

    #[error("segment length mismatch: descriptor says {expected}, log has {found}")]
    SegmentMismatch { expected: u32, found: u32 },

    #[error("record of {size} bytes exceeds the frame length limit")]
    RecordTooLarge { size: usize },
}
