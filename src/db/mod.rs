//! Sharded record operations
//!
//! [`ZohoDb`] is the entry point: it wires one token manager, one shard
//! resolver and one cooldown tracker together and runs select, insert,
//! update and delete across the resolved shards.

pub mod query;
pub mod record;

use std::sync::Arc;

use log::{debug, info, warn};

use crate::auth::{AuthorizationPrompt, TerminalPrompt, TokenManager};
use crate::client::{AuthApi, SheetRequest, SheetResponse, SheetsApi, ZohoClient, fan_out};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::Result;
use crate::shards::{CooldownTracker, ShardResolver};

pub use query::{Delete, Insert, Select, Update, escape};
pub use record::ShardRecord;

/// A logical database spread over one or more Zoho Sheet workbooks
pub struct ZohoDb<C: AuthApi + SheetsApi> {
    client: Arc<C>,
    tokens: TokenManager<C>,
    resolver: ShardResolver<C>,
    cooldown: CooldownTracker,
    max_concurrency: usize,
}

impl ZohoDb<ZohoClient> {
    /// Connect with the HTTP client, the terminal authorization prompt and
    /// the system clock
    pub fn connect(config: &Config) -> Result<Self> {
        let client = Arc::new(ZohoClient::new(config)?);
        Self::with_client(
            config,
            client,
            Arc::new(TerminalPrompt),
            Arc::new(SystemClock),
        )
    }
}

impl<C: AuthApi + SheetsApi> ZohoDb<C> {
    /// Build from explicit collaborators
    pub fn with_client(
        config: &Config,
        client: Arc<C>,
        prompt: Arc<dyn AuthorizationPrompt>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let cache_root = config.cache_root()?;
        let lock_policy = config.lock_policy();

        let tokens = TokenManager::new(config, client.clone(), prompt)?.with_clock(clock.clone());
        let resolver = ShardResolver::new(
            config.workbooks.clone(),
            &cache_root,
            lock_policy,
            client.clone(),
        )?;
        let cooldown = CooldownTracker::new(&cache_root, resolver.fingerprint(), lock_policy)?
            .with_clock(clock)
            .with_window(config.cooldown_secs);

        debug!(
            "Opened logical database over {:?} (cache {})",
            config.workbooks,
            cache_root.display()
        );

        Ok(Self {
            client,
            tokens,
            resolver,
            cooldown,
            max_concurrency: config.max_concurrency,
        })
    }

    /// Current shard ids, in discovery order
    pub async fn shard_ids(&self) -> Result<Vec<String>> {
        self.resolver.shard_ids(&self.tokens).await
    }

    /// Drop the cached shard list so the next call rediscovers it
    pub async fn invalidate_shards(&self) -> Result<()> {
        self.resolver.invalidate().await
    }

    /// Fetch matching rows from every shard.
    ///
    /// Rows come back in shard order, each tagged with its shard id. A failure
    /// from any shard fails the whole select.
    pub async fn select(&self, query: &Select) -> Result<Vec<ShardRecord>> {
        query.validate()?;
        let (shards, token) = self.prepare().await?;
        let request = SheetRequest::fetch(&query.table, &query.criteria, &query.columns);

        let responses = self.broadcast(&shards, &token, &request).await?;

        let mut records = Vec::new();
        for (shard, response) in shards.iter().zip(responses) {
            let mut response = response.ensure_success()?;
            records.extend(
                response
                    .take_records()?
                    .into_iter()
                    .map(|fields| ShardRecord::new(shard.as_str(), fields)),
            );
        }

        debug!(
            "Selected {} rows from {} on {} shards",
            records.len(),
            query.table,
            shards.len()
        );
        Ok(records)
    }

    /// Add rows to the first shard that accepts them.
    ///
    /// Returns `false` when every shard is full or cooling down.
    pub async fn insert(&self, query: &Insert) -> Result<bool> {
        query.validate()?;
        let (shards, token) = self.prepare().await?;
        let request = SheetRequest::add(&query.table, serde_json::to_string(&query.rows)?);

        for shard in &shards {
            if self.cooldown.is_cooling_down(shard).await? {
                debug!("Skipping shard {} for insert", shard);
                continue;
            }

            let response = self.call_shard(shard, &token, &request).await?;
            if response.is_storage_full() {
                self.cooldown.mark_full(shard).await?;
                continue;
            }

            response.ensure_success()?;
            debug!("Inserted {} rows into {} on {}", query.rows.len(), query.table, shard);
            return Ok(true);
        }

        warn!("No shard could take the insert into {}", query.table);
        Ok(false)
    }

    /// Update matching rows on the target shard, or on every shard.
    ///
    /// Returns `true` if any shard affected at least one row.
    pub async fn update(&self, query: &Update) -> Result<bool> {
        query.validate()?;
        let (shards, token) = self.prepare().await?;
        let request = SheetRequest::update(
            &query.table,
            &query.criteria,
            serde_json::to_string(&query.data)?,
        );

        let targets = targets(&shards, query.target_shard.as_deref());
        let responses = self.broadcast(&targets, &token, &request).await?;

        let mut updated = false;
        for response in responses {
            if response.ensure_success()?.affected_rows()? >= 1 {
                updated = true;
            }
        }
        Ok(updated)
    }

    /// Delete matching rows on the target shard, or on every shard.
    ///
    /// Returns `true` if any shard deleted at least one row. Shards that did
    /// lose rows have their full mark cleared, even when another shard
    /// failed; the first failure is returned after every answer is seen.
    pub async fn delete(&self, query: &Delete) -> Result<bool> {
        query.validate()?;
        let (shards, token) = self.prepare().await?;
        let request = SheetRequest::delete(&query.table, &query.criteria, query.row_array());

        let targets = targets(&shards, query.target_shard.as_deref());
        let responses = self.broadcast(&targets, &token, &request).await?;

        let mut deleted = false;
        let mut first_error = None;
        for (shard, response) in targets.iter().zip(responses) {
            match response.ensure_success().and_then(|r| r.deleted_rows()) {
                Ok(rows) if rows >= 1 => {
                    self.cooldown.clear(shard).await?;
                    deleted = true;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Delete on shard {} failed: {}", shard, e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(deleted),
        }
    }

    /// Shard list and token, both through their owners' caches
    async fn prepare(&self) -> Result<(Vec<String>, String)> {
        let shards = self.resolver.shard_ids(&self.tokens).await?;
        let token = self.tokens.token().await?;
        Ok((shards, token))
    }

    /// Same request to every shard in `shards`, answers in shard order
    async fn broadcast(
        &self,
        shards: &[String],
        token: &str,
        request: &SheetRequest,
    ) -> Result<Vec<SheetResponse>> {
        fan_out(
            shards,
            |shard| self.call_shard(shard, token, request),
            self.max_concurrency,
        )
        .await
    }

    async fn call_shard(
        &self,
        shard: &str,
        token: &str,
        request: &SheetRequest,
    ) -> Result<SheetResponse> {
        let client = &self.client;
        let response = self
            .tokens
            .authorized(token.to_string(), |token| async move {
                client.workbook_request(shard, &token, request).await
            })
            .await?;

        if response.is_failure() {
            info!(
                "Shard {} answered {} with code {:?}",
                shard,
                request.method(),
                response.error_code
            );
        }
        Ok(response)
    }
}

/// The explicit target, or every shard
fn targets(shards: &[String], target: Option<&str>) -> Vec<String> {
    match target {
        Some(shard) => vec![shard.to_string()],
        None => shards.to_vec(),
    }
}
