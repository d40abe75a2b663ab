//! Configuration management for ZohoDB

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{CacheStorage, LockPolicy};
use crate::error::{ConfigError, Error, Result};

/// Zoho accounts (OAuth2) API base URL
pub const DEFAULT_OAUTH_BASE: &str = "https://accounts.zoho.com/oauth/v2";

/// Zoho Sheet data API base URL
pub const DEFAULT_SHEETS_BASE: &str = "https://sheet.zoho.com/api/v2";

/// Scopes requested during authorization
pub const DEFAULT_SCOPES: &str = "ZohoSheet.dataAPI.UPDATE,ZohoSheet.dataAPI.READ";

/// Configuration for one logical database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Workbook names making up the logical database, in priority order
    pub workbooks: Vec<String>,

    /// Maximum in-flight shard requests per operation
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Root of the persistent caches (defaults to the user cache dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default = "default_oauth_base")]
    pub oauth_base: String,

    #[serde(default = "default_sheets_base")]
    pub sheets_base: String,

    /// Redirect URI registered for the OAuth client
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    #[serde(default = "default_scopes")]
    pub scopes: String,

    /// Deadline for every HTTP call
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// How long a shard that reported "storage full" is skipped for inserts
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: i64,

    /// Poll interval while a cache table is locked by another writer
    #[serde(default = "default_lock_poll_millis")]
    pub lock_poll_millis: u64,

    /// Upper bound on waiting for a cache lock (unset: wait indefinitely).
    /// A crashed writer leaves its `<table>.lock` marker behind; without a
    /// bound, later writers block until that file is deleted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout_secs: Option<u64>,
}

fn default_max_concurrency() -> usize {
    24
}

fn default_oauth_base() -> String {
    DEFAULT_OAUTH_BASE.to_string()
}

fn default_sheets_base() -> String {
    DEFAULT_SHEETS_BASE.to_string()
}

fn default_redirect_uri() -> String {
    "https://example.com".to_string()
}

fn default_scopes() -> String {
    DEFAULT_SCOPES.to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cooldown_secs() -> i64 {
    3600
}

fn default_lock_poll_millis() -> u64 {
    1000
}

impl Config {
    /// Build a configuration with defaults for everything but credentials and workbooks
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        workbooks: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            workbooks,
            max_concurrency: default_max_concurrency(),
            cache_dir: None,
            oauth_base: default_oauth_base(),
            sheets_base: default_sheets_base(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            request_timeout_secs: default_request_timeout_secs(),
            cooldown_secs: default_cooldown_secs(),
            lock_poll_millis: default_lock_poll_millis(),
            lock_timeout_secs: None,
        }
    }

    /// Load configuration from a YAML file
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound.into());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&contents).map_err(ConfigError::from)?;
        config.validate()?;

        Ok(config)
    }

    /// Save configuration to a YAML file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents =
            serde_yaml::to_string(self).map_err(|e| ConfigError::SaveError(e.to_string()))?;

        std::fs::write(path, contents)?;

        // The file holds the client secret
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Validate that required configuration is present and sane
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(ConfigError::MissingCredentials.into());
        }
        if self.workbooks.is_empty() {
            return Err(Error::EmptyInput(
                "Couldn't find any workbook names to use".to_string(),
            ));
        }
        if self.workbooks.iter().any(|name| name.trim().is_empty()) {
            return Err(ConfigError::Invalid("workbook names must not be blank".to_string()).into());
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::Invalid("max_concurrency must be at least 1".to_string()).into());
        }
        if self.cooldown_secs < 0 {
            return Err(ConfigError::Invalid("cooldown_secs must not be negative".to_string()).into());
        }
        Ok(())
    }

    /// Cache root, falling back to the user cache directory
    pub fn cache_root(&self) -> Result<PathBuf> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(CacheStorage::cache_dir()?),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn lock_policy(&self) -> LockPolicy {
        LockPolicy {
            poll_interval: Duration::from_millis(self.lock_poll_millis),
            timeout: self.lock_timeout_secs.map(Duration::from_secs),
        }
    }
}
