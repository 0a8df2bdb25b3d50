//! Write-Ahead Log Writer
//!
//! Appends length-prefixed records to one log file and hands back a
//! [`FileSegment`] descriptor for each. Every append is pushed to durable
//! storage before the descriptor is returned, so a descriptor in hand means
//! the bytes survive a crash.
//!
//! All of capture-offset, write-prefix, write-payload, flush, and
//! advance-position happen under the writer's mutex; concurrent callers see
//! whole frames only.

use bytes::{BufMut, BytesMut};
use rivulet_core::FileSegment;
use std::path::Path;
use tokio::sync::Mutex;

use crate::config::WalConfig;
use crate::error::{Error, Result};
use crate::fs::AppendStream;

/// Appends records to a single log file.
pub struct WalWriter {
    path: String,
    stream: Mutex<Option<AppendStream>>,
}

impl WalWriter {
    /// Open a writer on `path`, creating the file (or continuing it when
    /// `config.append_support` is set and it already exists).
    pub async fn open(path: impl AsRef<Path>, config: &WalConfig) -> Result<Self> {
        let stream = AppendStream::open(&path, config).await?;
        Ok(Self {
            path: path.as_ref().to_string_lossy().into_owned(),
            stream: Mutex::new(Some(stream)),
        })
    }

    /// Append one record and return the segment that locates it.
    ///
    /// The returned descriptor is immutable: reading it back through
    /// [`crate::WalRandomReader`] yields exactly the bytes passed here.
    pub async fn write(&self, payload: &[u8]) -> Result<FileSegment> {
        if payload.len() > u32::MAX as usize {
            return Err(Error::RecordTooLarge {
                size: payload.len(),
            });
        }

        let mut guard = self.stream.lock().await;
        let stream = guard
            .as_mut()
            .ok_or_else(|| Error::LogClosed(self.path.clone()))?;

        let offset = stream.position();

        let mut frame = BytesMut::with_capacity(4 + payload.len());
        frame.put_u32(payload.len() as u32);
        frame.put_slice(payload);

        stream.write_all(&frame).await?;
        stream.durable_flush().await?;

        tracing::trace!(
            path = %self.path,
            offset,
            length = payload.len(),
            "record appended"
        );

        Ok(FileSegment::new(
            self.path.clone(),
            offset,
            payload.len() as u32,
        ))
    }

    /// Byte position the next record will be written at.
    pub async fn position(&self) -> Result<u64> {
        let guard = self.stream.lock().await;
        let stream = guard
            .as_ref()
            .ok_or_else(|| Error::LogClosed(self.path.clone()))?;
        Ok(stream.position())
    }

    /// Flush and release the underlying stream. Idempotent; writes after
    /// close fail with [`Error::LogClosed`].
    pub async fn close(&self) -> Result<()> {
        let mut guard = self.stream.lock().await;
        if let Some(mut stream) = guard.take() {
            stream.durable_flush().await?;
            tracing::info!(path = %self.path, "write-ahead log closed");
        }
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}
