//! Workbook name to shard id resolution

use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::namespace_dir;
use crate::auth::TokenManager;
use crate::cache::{CacheStorage, LockPolicy, workbooks_fingerprint};
use crate::client::{AuthApi, SheetsApi};
use crate::error::{CacheError, ConfigError, Error, Result};

const SHARDS_TABLE: &str = "workbooks";
const SHARDS_KEY: &str = "shard_set";

/// Resolved shard ids for one configured name list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardSet {
    pub fingerprint: String,
    /// Discovery order
    pub shard_ids: Vec<String>,
}

/// Maps configured workbook names to shard ids, caching the answer on disk
pub struct ShardResolver<S: SheetsApi> {
    names: Vec<String>,
    fingerprint: String,
    api: Arc<S>,
    cache: CacheStorage,
}

impl<S: SheetsApi> ShardResolver<S> {
    pub fn new(
        names: Vec<String>,
        cache_root: &Path,
        lock_policy: LockPolicy,
        api: Arc<S>,
    ) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::EmptyInput(
                "at least one workbook name is required".to_string(),
            ));
        }

        let fingerprint = workbooks_fingerprint(&names);
        let cache = CacheStorage::open_at(&namespace_dir(cache_root, &fingerprint))?
            .with_lock_policy(lock_policy);

        Ok(Self {
            names,
            fingerprint,
            api,
            cache,
        })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Shard ids for the configured names.
    ///
    /// A cached non-empty set with a matching fingerprint is returned without
    /// touching the network; otherwise the workbooks are listed live.
    pub async fn shard_ids<A: AuthApi>(&self, tokens: &TokenManager<A>) -> Result<Vec<String>> {
        if let Some(cached) = self.cached().await? {
            debug!("Using {} cached shards", cached.shard_ids.len());
            return Ok(cached.shard_ids);
        }

        self.discover(tokens).await
    }

    /// Forget the cached shard set
    pub async fn invalidate(&self) -> Result<()> {
        self.cache.delete(SHARDS_TABLE, SHARDS_KEY).await?;
        Ok(())
    }

    async fn cached(&self) -> Result<Option<ShardSet>> {
        let set = match self.cache.get::<ShardSet>(SHARDS_TABLE, SHARDS_KEY).await {
            Ok(set) => set,
            Err(CacheError::InvalidCacheTable(_)) => None,
            Err(CacheError::CorruptedCacheTable { reason, .. }) => {
                warn!("Discarding unreadable shard cache: {}", reason);
                self.cache.reset(SHARDS_TABLE).await?;
                None
            }
            Err(e) => return Err(e.into()),
        };

        Ok(set.filter(|set| set.fingerprint == self.fingerprint && !set.shard_ids.is_empty()))
    }

    async fn discover<A: AuthApi>(&self, tokens: &TokenManager<A>) -> Result<Vec<String>> {
        info!("Discovering shards for workbooks {:?}", self.names);

        let api = &self.api;
        let token = tokens.token().await?;
        let mut response = tokens
            .authorized(token, |token| async move { api.list_workbooks(&token).await })
            .await?
            .ensure_success()?;

        let shard_ids: Vec<String> = response
            .take_workbooks()?
            .into_iter()
            .filter(|workbook| self.names.contains(&workbook.workbook_name))
            .map(|workbook| workbook.resource_id)
            .collect();

        if shard_ids.is_empty() {
            return Err(ConfigError::NoMatchingWorkbooks(self.names.join(", ")).into());
        }

        let set = ShardSet {
            fingerprint: self.fingerprint.clone(),
            shard_ids,
        };
        self.cache.set(SHARDS_TABLE, SHARDS_KEY, &set).await?;

        info!("Resolved {} shards", set.shard_ids.len());
        Ok(set.shard_ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthorizationPrompt, Credentials};
    use crate::client::{MockZohoClient, SheetResponse};
    use crate::error::ApiError;
    use std::time::Duration;
    use tempfile::TempDir;

    struct FixedPrompt;

    #[async_trait::async_trait]
    impl AuthorizationPrompt for FixedPrompt {
        async fn redirect_url(&self, _authorization_url: &str) -> Result<String> {
            Ok("https://example.com/?code=abc".to_string())
        }
    }

    fn policy() -> LockPolicy {
        LockPolicy {
            poll_interval: Duration::from_millis(1),
            timeout: Some(Duration::from_secs(5)),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn setup(
        dir: &TempDir,
        api: MockZohoClient,
        configured: &[&str],
    ) -> (
        ShardResolver<MockZohoClient>,
        TokenManager<MockZohoClient>,
        Arc<MockZohoClient>,
    ) {
        let api = Arc::new(api);
        let tokens = TokenManager::with_cache_root(
            Credentials::new("id", "secret").unwrap(),
            dir.path(),
            policy(),
            api.clone(),
            Arc::new(FixedPrompt),
        )
        .unwrap();
        let resolver =
            ShardResolver::new(names(configured), dir.path(), policy(), api.clone()).unwrap();
        (resolver, tokens, api)
    }

    async fn workbooks() -> MockZohoClient {
        MockZohoClient::new()
            .with_workbooks(vec![("A", "s1"), ("other", "x9"), ("B", "s2")])
            .await
    }

    #[tokio::test]
    async fn test_discovery_filters_and_keeps_order() {
        let dir = TempDir::new().unwrap();
        let (resolver, tokens, api) = setup(&dir, workbooks().await, &["B", "A"]);

        let ids = resolver.shard_ids(&tokens).await.unwrap();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(api.call_counts().await.list_workbooks, 1);
    }

    #[tokio::test]
    async fn test_cached_set_needs_no_network() {
        let dir = TempDir::new().unwrap();
        let (resolver, tokens, api) = setup(&dir, workbooks().await, &["A", "B"]);

        resolver.shard_ids(&tokens).await.unwrap();
        let before = api.call_counts().await.total();

        let ids = resolver.shard_ids(&tokens).await.unwrap();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert_eq!(api.call_counts().await.total(), before);
    }

    #[tokio::test]
    async fn test_reconfiguring_forces_rediscovery() {
        let dir = TempDir::new().unwrap();
        let (first, tokens, api) = setup(&dir, workbooks().await, &["A", "B"]);
        first.shard_ids(&tokens).await.unwrap();

        let second = ShardResolver::new(names(&["A"]), dir.path(), policy(), api.clone()).unwrap();
        assert_ne!(first.fingerprint(), second.fingerprint());

        let ids = second.shard_ids(&tokens).await.unwrap();
        assert_eq!(ids, vec!["s1"]);
        assert_eq!(api.call_counts().await.list_workbooks, 2);
    }

    #[tokio::test]
    async fn test_fingerprint_mismatch_rediscovers() {
        let dir = TempDir::new().unwrap();
        let (resolver, tokens, api) = setup(&dir, workbooks().await, &["A", "B"]);

        // A set stored under this namespace by some other name list
        resolver
            .cache
            .set(
                SHARDS_TABLE,
                SHARDS_KEY,
                &ShardSet {
                    fingerprint: "stale".to_string(),
                    shard_ids: vec!["old".to_string()],
                },
            )
            .await
            .unwrap();

        assert_eq!(resolver.shard_ids(&tokens).await.unwrap(), vec!["s1", "s2"]);
        assert_eq!(api.call_counts().await.list_workbooks, 1);
    }

    #[tokio::test]
    async fn test_empty_cached_set_rediscovers() {
        let dir = TempDir::new().unwrap();
        let (resolver, tokens, api) = setup(&dir, workbooks().await, &["A"]);
        resolver
            .cache
            .set(
                SHARDS_TABLE,
                SHARDS_KEY,
                &ShardSet {
                    fingerprint: resolver.fingerprint().to_string(),
                    shard_ids: vec![],
                },
            )
            .await
            .unwrap();

        assert_eq!(resolver.shard_ids(&tokens).await.unwrap(), vec!["s1"]);
        assert_eq!(api.call_counts().await.list_workbooks, 1);
    }

    #[tokio::test]
    async fn test_corrupted_cache_rediscovers() {
        let dir = TempDir::new().unwrap();
        let (resolver, tokens, _api) = setup(&dir, workbooks().await, &["A"]);
        std::fs::write(resolver.cache.dir().join("workbooks.json"), b"not json").unwrap();

        assert_eq!(resolver.shard_ids(&tokens).await.unwrap(), vec!["s1"]);
    }

    #[tokio::test]
    async fn test_invalidate() {
        let dir = TempDir::new().unwrap();
        let (resolver, tokens, api) = setup(&dir, workbooks().await, &["A"]);

        resolver.shard_ids(&tokens).await.unwrap();
        resolver.invalidate().await.unwrap();
        resolver.shard_ids(&tokens).await.unwrap();

        assert_eq!(api.call_counts().await.list_workbooks, 2);
    }

    #[tokio::test]
    async fn test_no_matching_workbooks() {
        let dir = TempDir::new().unwrap();
        let (resolver, tokens, _api) = setup(&dir, workbooks().await, &["missing"]);

        let result = resolver.shard_ids(&tokens).await;
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::NoMatchingWorkbooks(_)))
        ));
    }

    #[tokio::test]
    async fn test_discovery_failure_status() {
        let dir = TempDir::new().unwrap();
        let api = MockZohoClient::new()
            .with_list_response(SheetResponse::failure(2831, "no access"))
            .await;
        let (resolver, tokens, _api) = setup(&dir, api, &["A"]);

        let result = resolver.shard_ids(&tokens).await;
        match result {
            Err(Error::Api(ApiError::UnexpectedResponse { message, code })) => {
                assert_eq!(message, "no access");
                assert_eq!(code, Some(2831));
            }
            other => panic!("expected UnexpectedResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_discovery_retries_rejected_token() {
        let dir = TempDir::new().unwrap();
        let api = workbooks()
            .await
            .with_list_response(SheetResponse::failure(2401, "token expired"))
            .await;
        let (resolver, tokens, api) = setup(&dir, api, &["A"]);

        assert_eq!(resolver.shard_ids(&tokens).await.unwrap(), vec!["s1"]);
        assert_eq!(api.call_counts().await.refresh_token, 1);
        assert_eq!(api.call_counts().await.list_workbooks, 2);
    }

    #[test]
    fn test_empty_names_rejected() {
        let dir = TempDir::new().unwrap();
        let result = ShardResolver::new(
            Vec::new(),
            dir.path(),
            policy(),
            Arc::new(MockZohoClient::new()),
        );
        assert!(matches!(result, Err(Error::EmptyInput(_))));
    }
}
