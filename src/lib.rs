//! ZohoDB - use a set of Zoho Sheet workbooks as one sharded database
//!
//! Tables are worksheets, rows are sheet records, and every configured
//! workbook is a shard. Tokens, shard lists and full-shard marks are cached
//! on disk so repeated operations cost one HTTP call per shard.
//!
//! ```no_run
//! use serde_json::json;
//! use zohodb::{Config, Insert, Select, ZohoDb};
//!
//! # async fn run() -> zohodb::Result<()> {
//! let config = Config::new("1000.CLIENT", "secret", vec!["mydb".to_string()]);
//! let db = ZohoDb::connect(&config)?;
//!
//! db.insert(&Insert::new("users").row(json!({"username": "kaitlyn"})))
//!     .await?;
//! for record in db.select(&Select::new("users", "")).await? {
//!     println!("{} {:?}", record.shard_id, record.get("username"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod client;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod shards;

pub use auth::{AuthorizationPrompt, Credentials, TerminalPrompt, Token, TokenManager};
pub use cache::{CacheStorage, LockPolicy};
pub use client::{AuthApi, SheetsApi, ZohoClient};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{Delete, Insert, Select, ShardRecord, Update, ZohoDb, escape};
pub use error::{ApiError, CacheError, ConfigError, Error, Result};
pub use shards::{CooldownTracker, ShardResolver, ShardSet};
