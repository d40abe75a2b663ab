//! File-backed cache tables with per-table write locks
//!
//! Each table is one JSON object stored at `<namespace>/<table>.json`.
//! Writers hold the table's lock marker for the whole read-modify-write and
//! publish through a temp file + rename. Readers never lock.

use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use super::lock::{LockPolicy, TableLock};
use crate::error::CacheError;

type Result<T> = std::result::Result<T, CacheError>;

/// One cache namespace directory holding any number of tables
#[derive(Debug, Clone)]
pub struct CacheStorage {
    dir: PathBuf,
    lock_policy: LockPolicy,
}

impl CacheStorage {
    /// Get the default cache root (~/.cache/zohodb on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("zohodb"))
    }

    /// Open (creating if needed) a namespace directory
    pub fn open_at(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            lock_policy: LockPolicy::default(),
        })
    }

    /// Replace the lock polling behaviour
    pub fn with_lock_policy(mut self, policy: LockPolicy) -> Self {
        self.lock_policy = policy;
        self
    }

    /// Namespace directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Read one key. Does not take the table lock.
    pub async fn get<T: DeserializeOwned>(&self, table: &str, key: &str) -> Result<Option<T>> {
        let entries = self.read_table(table).await?;
        match entries.get(key) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone())
                .map(Some)
                .map_err(|e| CacheError::CorruptedCacheTable {
                    table: table.to_string(),
                    reason: format!("entry '{}': {}", key, e),
                }),
        }
    }

    /// Store one key, creating the table on first write
    pub async fn set<T: Serialize>(&self, table: &str, key: &str, value: &T) -> Result<bool> {
        let value = serde_json::to_value(value).map_err(|e| CacheError::Serialize(e.to_string()))?;

        let _lock = self.lock(table).await?;
        let mut entries = match self.read_table(table).await {
            Ok(entries) => entries,
            Err(CacheError::InvalidCacheTable(_)) => Map::new(),
            Err(e) => return Err(e),
        };
        entries.insert(key.to_string(), value);
        self.write_table(table, &entries).await?;
        Ok(true)
    }

    /// Remove one key. Returns whether anything was removed.
    pub async fn delete(&self, table: &str, key: &str) -> Result<bool> {
        let _lock = self.lock(table).await?;
        let mut entries = match self.read_table(table).await {
            Ok(entries) => entries,
            Err(CacheError::InvalidCacheTable(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if entries.remove(key).is_none() {
            return Ok(false);
        }
        self.write_table(table, &entries).await?;
        Ok(true)
    }

    /// Remove one key only while it still holds `expected`.
    ///
    /// Lets a reader drop a value it judged stale without clobbering a newer
    /// one written since its unlocked read.
    pub async fn delete_if<T: Serialize>(&self, table: &str, key: &str, expected: &T) -> Result<bool> {
        let expected =
            serde_json::to_value(expected).map_err(|e| CacheError::Serialize(e.to_string()))?;

        let _lock = self.lock(table).await?;
        let mut entries = match self.read_table(table).await {
            Ok(entries) => entries,
            Err(CacheError::InvalidCacheTable(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        if entries.get(key) != Some(&expected) {
            return Ok(false);
        }
        entries.remove(key);
        self.write_table(table, &entries).await?;
        Ok(true)
    }

    /// Drop a whole table, including a corrupted one
    pub async fn reset(&self, table: &str) -> Result<bool> {
        let path = self.table_path(table)?;
        let _lock = self.lock(table).await?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CacheError::Io(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn lock(&self, table: &str) -> Result<TableLock> {
        self.table_path(table)?;
        TableLock::acquire(&self.dir, table, self.lock_policy).await
    }

    fn table_path(&self, table: &str) -> Result<PathBuf> {
        if table.is_empty() || table.contains('/') || table.contains('\\') || table.contains("..")
        {
            return Err(CacheError::InvalidCacheTable(table.to_string()));
        }
        Ok(self.dir.join(format!("{}.json", table)))
    }

    async fn read_table(&self, table: &str) -> Result<Map<String, Value>> {
        let path = self.table_path(table)?;
        let contents = match tokio::fs::read(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::InvalidCacheTable(table.to_string()));
            }
            Err(e) => {
                return Err(CacheError::Io(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        match serde_json::from_slice::<Value>(&contents) {
            Ok(Value::Object(entries)) => Ok(entries),
            Ok(_) => Err(CacheError::CorruptedCacheTable {
                table: table.to_string(),
                reason: "top-level value is not an object".to_string(),
            }),
            Err(e) => Err(CacheError::CorruptedCacheTable {
                table: table.to_string(),
                reason: e.to_string(),
            }),
        }
    }

    /// Atomic write: temp file in the same directory, then rename over the table.
    /// Only called with the table lock held, so one temp name per table suffices.
    async fn write_table(&self, table: &str, entries: &Map<String, Value>) -> Result<()> {
        let path = self.table_path(table)?;
        let tmp_path = self.dir.join(format!(".{}.json.tmp", table));
        let data = serde_json::to_vec(entries).map_err(|e| CacheError::Serialize(e.to_string()))?;

        tokio::fs::write(&tmp_path, &data)
            .await
            .map_err(|e| CacheError::Io(format!("Failed to write {}: {}", tmp_path.display(), e)))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .map_err(|e| CacheError::Io(format!("Failed to replace {}: {}", path.display(), e)))?;
        Ok(())
    }
}
