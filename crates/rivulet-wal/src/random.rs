//! Random-Access Write-Ahead Log Reader
//!
//! Reads exactly one record given the [`FileSegment`] descriptor its writer
//! issued. The stored length prefix is compared against the descriptor as a
//! cheap guard against a descriptor pointing into the middle of some other
//! frame.

use bytes::Bytes;
use rivulet_core::FileSegment;
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::fs;

/// Positional reader over one log file.
pub struct WalRandomReader {
    path: String,
    file: Mutex<File>,
}

impl WalRandomReader {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::open_read(&path).await?;
        Ok(Self {
            path: path.as_ref().to_string_lossy().into_owned(),
            file: Mutex::new(file),
        })
    }

    /// Read the record `segment` describes.
    ///
    /// Returns a buffer bit-identical to the one originally written.
    pub async fn read(&self, segment: &FileSegment) -> Result<Bytes> {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(segment.offset)).await?;

        let mut prefix = [0u8; 4];
        file.read_exact(&mut prefix).await.map_err(|e| {
            truncated_on_eof(e, &self.path, segment.offset)
        })?;

        let found = u32::from_be_bytes(prefix);
        if found != segment.length {
            return Err(Error::SegmentMismatch {
                expected: segment.length,
                found,
            });
        }

        let mut payload = vec![0u8; found as usize];
        file.read_exact(&mut payload).await.map_err(|e| {
            truncated_on_eof(e, &self.path, segment.offset)
        })?;

        Ok(Bytes::from(payload))
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

fn truncated_on_eof(e: std::io::Error, path: &str, offset: u64) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::FrameTruncated {
            path: path.to_string(),
            offset,
        }
    } else {
        Error::Io(e)
    }
}
