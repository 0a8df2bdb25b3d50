//! Rivulet Ingestion Layer
//!
//! This crate implements the two moving parts of the receiver's ingestion
//! path: batching records into time-bounded blocks, and polling remote event
//! sources with at-least-once accounting.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌──────────────────┐     get_event_batch / ack / nack
//! │ PollingIngestor  │ ◄──────────────────────────────► event sources
//! └────────┬─────────┘
//!          │ store(records)
//!          ▼
//! ┌──────────────────┐  cut every interval  ┌─────────────────┐
//! │  BlockGenerator  │ ───────────────────► │ bounded queue   │
//! └──────────────────┘                      └────────┬────────┘
//!          ▲ append() from any producer              │ pusher task
//!                                                    ▼
//!                                           ┌─────────────────┐
//!                                           │  BlockListener  │ e.g. WalBlockHandler
//!                                           └─────────────────┘
//! ```
//!
//! ## Main Components
//!
//! ### BlockGenerator
//! Accepts records from arbitrarily many producers, seals the buffer into a
//! block on every interval boundary, and pushes sealed blocks to the
//! listener in order. The bounded queue between cut and push is the
//! backpressure mechanism.
//!
//! ### PollingIngestor
//! Runs N workers over a FIFO pool of source connections. Each iteration
//! pulls one batch, stores it, and acks; any failure after the batch arrived
//! nacks it so the source redelivers. Connections are returned to the pool
//! on every exit path.
//!
//! ### WalBlockHandler
//! A `BlockListener` that makes blocks durable: serialize, append to the
//! write-ahead log, then forward the `(block id, segment)` pair downstream.

pub mod config;
pub mod error;
pub mod generator;
pub mod handler;
pub mod ingestor;
pub mod source;
pub mod traits;

pub use config::{BlockGeneratorConfig, IngestorConfig};
pub use error::{Error, Result};
pub use generator::BlockGenerator;
pub use handler::{read_block_records, WalBlockHandler};
pub use ingestor::PollingIngestor;
pub use source::{EventBatch, EventSource, SourceEvent};
pub use traits::{BlockCallback, BlockListener, BlockStore, SegmentSink};
