//! Durable File I/O
//!
//! Thin layer over `tokio::fs` that gives the writer and readers the three
//! primitives the log needs: open-for-append with optional continuation of an
//! existing file, open-for-read, and a flush that pushes written bytes to
//! durable storage.
//!
//! Namespace resolution (deciding create-vs-append and performing the open)
//! is serialized process-wide by a single mutex; the clustered file-system
//! clients this layer fronts do not tolerate concurrent namespace operations.

use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::config::WalConfig;
use crate::error::Result;

/// Serializes every path → handle resolution in the process.
static NAMESPACE_LOCK: Mutex<()> = Mutex::const_new(());

/// An open append stream for one log file.
///
/// Tracks the absolute write position so the writer can issue segment
/// descriptors without asking the file system.
pub struct AppendStream {
    path: PathBuf,
    file: File,
    position: u64,
    durable_sync: bool,
}

impl AppendStream {
    /// Open `path` for appending.
    ///
    /// If the file exists and `config.append_support` is set, the stream
    /// continues at the current end of file; otherwise the file is created
    /// fresh (truncating any previous contents).
    pub async fn open(path: impl AsRef<Path>, config: &WalConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let _namespace = NAMESPACE_LOCK.lock().await;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let exists = tokio::fs::try_exists(&path).await?;

        let (file, position) = if exists && config.append_support {
            let file = OpenOptions::new().append(true).open(&path).await?;
            let position = file.metadata().await?.len();
            (file, position)
        } else {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&path)
                .await?;
            (file, 0)
        };

        tracing::info!(
            path = %path.display(),
            position,
            append = exists && config.append_support,
            "log stream opened"
        );

        Ok(Self {
            path,
            file,
            position,
            durable_sync: config.durable_sync,
        })
    }

    /// Absolute byte position the next write lands at.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `buf` in full and advance the tracked position.
    pub async fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf).await?;
        self.position += buf.len() as u64;
        Ok(())
    }

    /// Push everything written so far to durable storage.
    ///
    /// Degrades to a buffer flush when the stream was opened on a file
    /// system without a durable-sync operation.
    pub async fn durable_flush(&mut self) -> Result<()> {
        self.file.flush().await?;
        if self.durable_sync {
            self.file.sync_data().await?;
        }
        Ok(())
    }
}

/// Open `path` for reading, under the same namespace serialization as the
/// append path.
pub async fn open_read(path: impl AsRef<Path>) -> Result<File> {
    let _namespace = NAMESPACE_LOCK.lock().await;
    Ok(File::open(path).await?)
}
