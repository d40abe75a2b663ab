//! Shard bookkeeping for one logical database
//!
//! Both halves persist under `workbooks_cache/<names fingerprint>`: the
//! resolved shard list and the storage-full cooldown marks.

pub mod cooldown;
pub mod resolver;

use std::path::{Path, PathBuf};

pub use cooldown::CooldownTracker;
pub use resolver::{ShardResolver, ShardSet};

/// Namespace directory for a logical database
pub fn namespace_dir(cache_root: &Path, fingerprint: &str) -> PathBuf {
    cache_root.join("workbooks_cache").join(fingerprint)
}
