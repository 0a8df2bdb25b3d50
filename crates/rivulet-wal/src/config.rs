//! Write-Ahead Log Configuration

use serde::{Deserialize, Serialize};

/// Configuration shared by every log stream opened in this process.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalConfig {
    /// Reopen an existing log file in append mode instead of truncating it.
    ///
    /// Appending to an existing log lets a restarted receiver continue the
    /// same file; the default recreates the file, matching file systems
    /// where append-after-close is unreliable.
    #[serde(default = "default_append_support")]
    pub append_support: bool,

    /// Whether the underlying file system exposes a flush-to-durable-storage
    /// operation. When false, `durable_flush` degrades to a buffer flush.
    /// The capability is fixed when a stream is opened.
    #[serde(default = "default_durable_sync")]
    pub durable_sync: bool,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            append_support: default_append_support(),
            durable_sync: default_durable_sync(),
        }
    }
}

fn default_append_support() -> bool {
    false
}

fn default_durable_sync() -> bool {
    true
}
