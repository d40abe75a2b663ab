//! Advisory lock markers for cache tables
//!
//! A table is locked while `<table>.lock` exists in the namespace directory.
//! The marker is created with create-new semantics, so exactly one caller wins
//! even across processes sharing the directory. Everyone else polls.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use log::{debug, warn};

use crate::error::CacheError;

/// Lock polling behaviour.
///
/// Markers are not tied to a live process. A holder that crashes leaves its
/// marker behind, and with `timeout: None` every later writer on that table
/// waits until the file is removed by hand.
#[derive(Debug, Clone, Copy)]
pub struct LockPolicy {
    /// Delay between attempts while the marker exists
    pub poll_interval: Duration,
    /// Give up after this long; `None` waits forever
    pub timeout: Option<Duration>,
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: None,
        }
    }
}

/// Held lock on one cache table. The marker is removed on drop.
#[derive(Debug)]
pub struct TableLock {
    path: PathBuf,
}

impl TableLock {
    /// Spin until the marker for `table` can be created.
    pub async fn acquire(
        dir: &Path,
        table: &str,
        policy: LockPolicy,
    ) -> Result<Self, CacheError> {
        let path = dir.join(format!("{}.lock", table));
        let started = Instant::now();

        loop {
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if let Some(timeout) = policy.timeout {
                        if started.elapsed() >= timeout {
                            return Err(CacheError::LockTimeout {
                                table: table.to_string(),
                                marker: path,
                            });
                        }
                    }
                    debug!("Cache table '{}' is locked by {}, waiting", table, path.display());
                    tokio::time::sleep(policy.poll_interval).await;
                }
                Err(e) => {
                    return Err(CacheError::Io(format!(
                        "Failed to create lock marker {}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
    }
}

impl Drop for TableLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            warn!("Failed to release lock {}: {}", self.path.display(), e);
        }
    }
}
