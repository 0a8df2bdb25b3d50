//! Sequential Write-Ahead Log Reader
//!
//! Lazy, single-pass iteration over a log file, yielding each record's
//! payload in write order. A clean EOF sitting exactly on a frame boundary
//! ends the sequence; EOF anywhere inside a frame means the tail was torn
//! and surfaces as [`Error::FrameTruncated`].

use bytes::Bytes;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, BufReader};

use crate::error::{Error, Result};
use crate::fs;

/// Reads every record of one log file, in write order.
pub struct WalReader {
    path: String,
    reader: BufReader<File>,
    position: u64,
    done: bool,
}

impl WalReader {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = fs::open_read(&path).await?;
        Ok(Self {
            path: path.as_ref().to_string_lossy().into_owned(),
            reader: BufReader::new(file),
            position: 0,
            done: false,
        })
    }

    /// Yield the next record's payload, or `None` once the log ends cleanly.
    ///
    /// After an error (or the clean end) the reader is exhausted and keeps
    /// returning `None`-equivalent results.
    pub async fn next_record(&mut self) -> Result<Option<Bytes>> {
        if self.done {
            return Ok(None);
        }

        let mut prefix = [0u8; 4];
        let filled = self.read_fully(&mut prefix).await?;
        if filled == 0 {
            // EOF on a frame boundary: the log ends here.
            self.done = true;
            return Ok(None);
        }
        if filled < prefix.len() {
            self.done = true;
            return Err(Error::FrameTruncated {
                path: self.path.clone(),
                offset: self.position,
            });
        }

        let length = u32::from_be_bytes(prefix) as usize;
        let mut payload = vec![0u8; length];
        let filled = self.read_fully(&mut payload).await?;
        if filled < length {
            self.done = true;
            return Err(Error::FrameTruncated {
                path: self.path.clone(),
                offset: self.position,
            });
        }

        self.position += 4 + length as u64;
        Ok(Some(Bytes::from(payload)))
    }

    /// Drain the remaining records into a vector.
    pub async fn read_all(&mut self) -> Result<Vec<Bytes>> {
        let mut records = Vec::new();
        while let Some(payload) = self.next_record().await? {
            records.push(payload);
        }
        Ok(records)
    }

    /// Read until `buf` is full or hard EOF; short reads are retried.
    async fn read_fully(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self.reader.read(&mut buf[filled..]).await.map_err(|e| {
                self.done = true;
                Error::Io(e)
            })?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}
