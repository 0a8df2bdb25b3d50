//! Write-Ahead Log for Receiver Durability
//!
//! This crate persists sealed record batches to an append-only log before the
//! receiver acknowledges them upstream, so a crash never loses data that was
//! already acked.
//!
//! ## Architecture
//!
//! ```text
//! Block bytes → WalWriter (append + flush) → log file
//!                   ↓
//!              FileSegment (path, offset, length)
//!                   ↓
//! WalRandomReader.read(segment)    ← one record, random access
//! WalReader.next_record()          ← every record, write order
//! ```
//!
//! ## File Format
//!
//! A log file is a plain sequence of frames with no header or trailer:
//!
//! ```text
//! ┌─────────────┬──────────────┬─────────────┬──────────────┬───
//! │ Length      │ Payload      │ Length      │ Payload      │ ...
//! │ (4 bytes BE)│ (N bytes)    │ (4 bytes BE)│ (M bytes)    │
//! └─────────────┴──────────────┴─────────────┴──────────────┴───
//! ```
//!
//! There is no checksum. The reader treats the log as lossy past the last
//! intact frame boundary: a clean EOF between frames ends the sequence, any
//! other truncation surfaces as [`Error::FrameTruncated`]. Downstream
//! integrity checking is out of scope for this crate.

pub mod config;
pub mod error;
pub mod fs;
pub mod random;
pub mod reader;
pub mod writer;

pub use config::WalConfig;
pub use error::{Error, Result};
pub use fs::AppendStream;
pub use random::WalRandomReader;
pub use reader::WalReader;
pub use writer::WalWriter;
