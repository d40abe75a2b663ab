//! Storage-full cooldown marks
//!
//! A shard that answered "storage full" to an insert is skipped by later
//! inserts until its window passes or a delete frees room on it.

use std::path::Path;
use std::sync::Arc;

use log::{debug, warn};

use super::namespace_dir;
use crate::cache::{CacheStorage, LockPolicy};
use crate::clock::{Clock, SystemClock};
use crate::error::{CacheError, Result};

const FULL_SHARDS_TABLE: &str = "full_shards";

/// Default cooldown window in seconds
pub const DEFAULT_COOLDOWN_SECS: i64 = 3600;

/// Per-shard "last reported full" timestamps
pub struct CooldownTracker {
    cache: CacheStorage,
    clock: Arc<dyn Clock>,
    window: i64,
}

impl CooldownTracker {
    /// Tracker for the logical database named by `fingerprint`
    pub fn new(cache_root: &Path, fingerprint: &str, lock_policy: LockPolicy) -> Result<Self> {
        let cache = CacheStorage::open_at(&namespace_dir(cache_root, fingerprint))?
            .with_lock_policy(lock_policy);
        Ok(Self {
            cache,
            clock: Arc::new(SystemClock),
            window: DEFAULT_COOLDOWN_SECS,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_window(mut self, secs: i64) -> Self {
        self.window = secs;
        self
    }

    /// Whether inserts should skip `shard` right now. Drops expired marks.
    pub async fn is_cooling_down(&self, shard: &str) -> Result<bool> {
        let marked_at = match self.cache.get::<i64>(FULL_SHARDS_TABLE, shard).await {
            Ok(Some(marked_at)) => marked_at,
            Ok(None) | Err(CacheError::InvalidCacheTable(_)) => return Ok(false),
            Err(CacheError::CorruptedCacheTable { reason, .. }) => {
                warn!("Discarding unreadable cooldown table: {}", reason);
                self.cache.reset(FULL_SHARDS_TABLE).await?;
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if marked_at + self.window > self.clock.now() {
            debug!("Shard {} is cooling down", shard);
            return Ok(true);
        }

        self.drop_expired(shard, marked_at).await?;
        Ok(false)
    }

    /// Remove the mark read as `marked_at`, unless another process has
    /// re-marked the shard since.
    async fn drop_expired(&self, shard: &str, marked_at: i64) -> Result<()> {
        if !self.cache.delete_if(FULL_SHARDS_TABLE, shard, &marked_at).await? {
            debug!("Shard {} was re-marked; keeping the newer mark", shard);
        }
        Ok(())
    }

    /// Record that `shard` reported storage full now
    pub async fn mark_full(&self, shard: &str) -> Result<()> {
        warn!("Shard {} is full, skipping it for {}s", shard, self.window);
        self.cache
            .set(FULL_SHARDS_TABLE, shard, &self.clock.now())
            .await?;
        Ok(())
    }

    /// Forget any mark for `shard`
    pub async fn clear(&self, shard: &str) -> Result<()> {
        if self.cache.delete(FULL_SHARDS_TABLE, shard).await? {
            debug!("Cleared full mark on shard {}", shard);
        }
        Ok(())
    }
}
