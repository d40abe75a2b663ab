//! OAuth2 token lifecycle
//!
//! [`TokenManager`] owns one credential pair and answers a single question:
//! "what access token do I send right now?". It persists the token under the
//! credential fingerprint, refreshes it once expired, and falls back to the
//! interactive authorization flow when nothing usable is on disk.

pub mod prompt;

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::{CacheStorage, LockPolicy, credentials_fingerprint};
use crate::client::{AuthApi, SheetResponse};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{ApiError, CacheError, ConfigError, Result};

pub use prompt::{AuthorizationPrompt, TerminalPrompt, authorization_url, extract_code};

/// Cache table and key holding the persisted token
const TOKEN_TABLE: &str = "token";
const TOKEN_KEY: &str = "token";

/// OAuth client credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    client_id: String,
    client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Result<Self> {
        let client_id = client_id.into().trim().to_string();
        let client_secret = client_secret.into().trim().to_string();
        if client_id.is_empty() || client_secret.is_empty() {
            return Err(ConfigError::MissingCredentials.into());
        }
        Ok(Self {
            client_id,
            client_secret,
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    /// Name of this pair's token cache namespace
    pub fn fingerprint(&self) -> String {
        credentials_fingerprint(&self.client_id, &self.client_secret)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// A complete persisted token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in seconds, counted from `created_at`
    pub expires_in: i64,
    /// Unix seconds when `access_token` was issued
    pub created_at: i64,
}

impl Token {
    /// Valid iff `created_at + expires_in > now`
    pub fn is_valid_at(&self, now: i64) -> bool {
        self.created_at + self.expires_in > now
    }
}

/// On-disk shape; any missing field means "never authorized"
#[derive(Debug, Default, Deserialize)]
struct StoredToken {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
    created_at: Option<i64>,
}

impl StoredToken {
    fn complete(self) -> Option<Token> {
        Some(Token {
            access_token: self.access_token?,
            refresh_token: self.refresh_token?,
            expires_in: self.expires_in?,
            created_at: self.created_at?,
        })
    }
}

/// Owns one credential pair and its persisted token
pub struct TokenManager<A: AuthApi> {
    credentials: Credentials,
    api: Arc<A>,
    prompt: Arc<dyn AuthorizationPrompt>,
    cache: CacheStorage,
    clock: Arc<dyn Clock>,
    oauth_base: String,
    redirect_uri: String,
    scopes: String,
    /// Serializes load/refresh/authorize within this process
    guard: Mutex<()>,
}

impl<A: AuthApi> TokenManager<A> {
    /// Create a manager for the credentials in `config`
    pub fn new(config: &Config, api: Arc<A>, prompt: Arc<dyn AuthorizationPrompt>) -> Result<Self> {
        let credentials = Credentials::new(&config.client_id, &config.client_secret)?;
        Self::with_cache_root(
            credentials,
            &config.cache_root()?,
            config.lock_policy(),
            api,
            prompt,
        )
        .map(|manager| manager.with_endpoints(config))
    }

    /// Create a manager persisting under `<cache_root>/auth_cache/<fingerprint>`
    pub fn with_cache_root(
        credentials: Credentials,
        cache_root: &Path,
        lock_policy: LockPolicy,
        api: Arc<A>,
        prompt: Arc<dyn AuthorizationPrompt>,
    ) -> Result<Self> {
        let dir = cache_root
            .join("auth_cache")
            .join(credentials.fingerprint());
        let cache = CacheStorage::open_at(&dir)?.with_lock_policy(lock_policy);

        Ok(Self {
            credentials,
            api,
            prompt,
            cache,
            clock: Arc::new(SystemClock),
            oauth_base: crate::config::DEFAULT_OAUTH_BASE.to_string(),
            redirect_uri: "https://example.com".to_string(),
            scopes: crate::config::DEFAULT_SCOPES.to_string(),
            guard: Mutex::new(()),
        })
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn with_endpoints(mut self, config: &Config) -> Self {
        self.oauth_base = config.oauth_base.clone();
        self.redirect_uri = config.redirect_uri.clone();
        self.scopes = config.scopes.clone();
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Current valid access token.
    ///
    /// Cached and unexpired: returned with no I/O beyond reading the cache.
    /// Expired: refreshed and persisted. Missing or incomplete: interactive
    /// authorization, then persisted.
    pub async fn token(&self) -> Result<String> {
        let _guard = self.guard.lock().await;

        match self.load().await? {
            None => self.authorize().await,
            Some(token) if !token.is_valid_at(self.clock.now()) => self.refresh(token).await,
            Some(token) => {
                debug!("Using cached access token");
                Ok(token.access_token)
            }
        }
    }

    /// Replace a token the service rejected (error 2401).
    ///
    /// If a concurrent caller already swapped `stale` for a newer token, that
    /// token is returned instead of refreshing again.
    pub(crate) async fn refresh_after_rejection(&self, stale: &str) -> Result<String> {
        let _guard = self.guard.lock().await;

        match self.load().await? {
            None => self.authorize().await,
            Some(token) if token.access_token != stale && token.is_valid_at(self.clock.now()) => {
                Ok(token.access_token)
            }
            Some(token) => self.refresh(token).await,
        }
    }

    /// Run `call` with `token`, refreshing and retrying once on error 2401.
    pub(crate) async fn authorized<F, Fut>(&self, token: String, call: F) -> Result<SheetResponse>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<SheetResponse>>,
    {
        let mut token = token;
        let mut retried = false;

        loop {
            let response = call(token.clone()).await?;
            if !response.is_token_expired() {
                return Ok(response);
            }
            if retried {
                return Err(ApiError::TokenRejected.into());
            }

            info!("Zoho rejected the access token, refreshing");
            token = self.refresh_after_rejection(&token).await?;
            retried = true;
        }
    }

    async fn load(&self) -> Result<Option<Token>> {
        match self.cache.get::<StoredToken>(TOKEN_TABLE, TOKEN_KEY).await {
            Ok(stored) => Ok(stored.and_then(StoredToken::complete)),
            Err(CacheError::InvalidCacheTable(_)) => Ok(None),
            Err(CacheError::CorruptedCacheTable { reason, .. }) => {
                warn!("Discarding unreadable token cache: {}", reason);
                self.cache.reset(TOKEN_TABLE).await?;
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, token: &Token) -> Result<()> {
        self.cache.set(TOKEN_TABLE, TOKEN_KEY, token).await?;
        Ok(())
    }

    async fn authorize(&self) -> Result<String> {
        info!("No usable Zoho token on disk, starting authorization");

        let url = authorization_url(
            &self.oauth_base,
            self.credentials.client_id(),
            &self.scopes,
            &self.redirect_uri,
        )?;
        let redirect = self.prompt.redirect_url(&url).await?;
        let code = extract_code(&redirect)?;

        let created_at = self.clock.now();
        let grant = self
            .api
            .exchange_code(&self.credentials, &code, &self.redirect_uri)
            .await?;

        let refresh_token = grant.refresh_token.ok_or_else(|| {
            ApiError::unexpected("The authorization response did not include a refresh token")
        })?;

        let token = Token {
            access_token: grant.access_token,
            refresh_token,
            expires_in: grant.expires_in,
            created_at,
        };
        self.store(&token).await?;

        info!("Zoho authorization complete");
        Ok(token.access_token)
    }

    async fn refresh(&self, mut token: Token) -> Result<String> {
        info!("Refreshing expired Zoho access token");

        let created_at = self.clock.now();
        let grant = self
            .api
            .refresh_token(&self.credentials, &token.refresh_token)
            .await?;

        // refresh_token is kept as-is
        token.access_token = grant.access_token;
        token.expires_in = grant.expires_in;
        token.created_at = created_at;
        self.store(&token).await?;

        Ok(token.access_token)
    }
}
