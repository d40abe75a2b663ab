//! Local persistent caches
//!
//! Generic locked table/key/value storage on disk, plus the fingerprints that
//! name each namespace. Tokens, shard sets and cooldown marks all live here.

pub mod key;
pub mod lock;
pub mod storage;

// Re-export main types
pub use key::{credentials_fingerprint, workbooks_fingerprint};
pub use lock::LockPolicy;
pub use storage::CacheStorage;
