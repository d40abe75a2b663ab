//! Mock Zoho API client for testing
//!
//! Implements both API traits with scripted answers so token, resolver and
//! dispatcher logic can be exercised without a network.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::api::{AuthApi, SheetsApi};
use super::models::{SheetRequest, SheetResponse, TokenGrant, Workbook};
use crate::auth::Credentials;
use crate::error::{ApiError, Result};

/// Mock API client for testing.
///
/// # Example
/// ```ignore
/// let mock = MockZohoClient::new()
///     .with_workbooks(vec![("A", "s1"), ("B", "s2")])
///     .await
///     .with_shard_response("s1", SheetResponse::success())
///     .await;
/// ```
#[derive(Default)]
pub struct MockZohoClient {
    /// Workbooks returned by list_workbooks
    workbooks: Arc<Mutex<Vec<Workbook>>>,
    /// Scripted list_workbooks answers, consumed before `workbooks` is used
    list_responses: Arc<Mutex<VecDeque<SheetResponse>>>,
    /// Scripted per-shard answers, consumed in order
    shard_responses: Arc<Mutex<HashMap<String, VecDeque<SheetResponse>>>>,
    /// Per-shard answer once the script runs out
    shard_defaults: Arc<Mutex<HashMap<String, SheetResponse>>>,
    /// Artificial per-shard latency
    shard_delays: Arc<Mutex<HashMap<String, Duration>>>,
    /// Grants returned by exchange_code / refresh_token, consumed in order
    grants: Arc<Mutex<VecDeque<TokenGrant>>>,
    /// Error to return (if any) - consumed on first use
    error: Arc<Mutex<Option<ApiError>>>,
    /// Track number of calls for verification
    call_count: Arc<Mutex<CallCounts>>,
    /// Captured workbook requests for test assertions
    captured_requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Tracks API call counts for test verification
#[derive(Default, Debug, Clone)]
pub struct CallCounts {
    pub exchange_code: usize,
    pub refresh_token: usize,
    pub list_workbooks: usize,
    pub workbook_request: usize,
}

impl CallCounts {
    /// Get total number of API calls made.
    pub fn total(&self) -> usize {
        self.exchange_code + self.refresh_token + self.list_workbooks + self.workbook_request
    }
}

/// A captured workbook request for test assertions.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub workbook_id: String,
    pub access_token: String,
    pub request: SheetRequest,
}

impl MockZohoClient {
    /// Create a new mock client with no scripted answers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the `(name, resource_id)` pairs list_workbooks reports.
    pub async fn with_workbooks(self, workbooks: Vec<(&str, &str)>) -> Self {
        *self.workbooks.lock().await = workbooks
            .into_iter()
            .map(|(name, id)| Workbook {
                workbook_name: name.to_string(),
                resource_id: id.to_string(),
            })
            .collect();
        self
    }

    /// Queue a raw list_workbooks answer (e.g. a failure).
    pub async fn with_list_response(self, response: SheetResponse) -> Self {
        self.list_responses.lock().await.push_back(response);
        self
    }

    /// Queue the next answer for a shard.
    pub async fn with_shard_response(self, shard: &str, response: SheetResponse) -> Self {
        self.push_shard_response(shard, response).await;
        self
    }

    /// Answer every request to `shard` with `response` once its queue is empty.
    pub async fn with_shard_default(self, shard: &str, response: SheetResponse) -> Self {
        self.shard_defaults
            .lock()
            .await
            .insert(shard.to_string(), response);
        self
    }

    /// Delay every answer from `shard`.
    pub async fn with_shard_delay(self, shard: &str, delay: Duration) -> Self {
        self.shard_delays
            .lock()
            .await
            .insert(shard.to_string(), delay);
        self
    }

    /// Queue a token grant for the next exchange or refresh.
    pub async fn with_grant(self, grant: TokenGrant) -> Self {
        self.grants.lock().await.push_back(grant);
        self
    }

    /// Configure an error to return on the next API call.
    /// The error is consumed after one use.
    pub async fn with_error(self, error: ApiError) -> Self {
        *self.error.lock().await = Some(error);
        self
    }

    /// Queue another answer after construction.
    pub async fn push_shard_response(&self, shard: &str, response: SheetResponse) {
        self.shard_responses
            .lock()
            .await
            .entry(shard.to_string())
            .or_default()
            .push_back(response);
    }

    /// Get the call counts for verification in tests.
    pub async fn call_counts(&self) -> CallCounts {
        self.call_count.lock().await.clone()
    }

    /// Get all captured workbook requests.
    pub async fn captured_requests(&self) -> Vec<CapturedRequest> {
        self.captured_requests.lock().await.clone()
    }

    /// Workbook ids targeted so far, in call order.
    pub async fn requested_shards(&self) -> Vec<String> {
        self.captured_requests
            .lock()
            .await
            .iter()
            .map(|r| r.workbook_id.clone())
            .collect()
    }

    async fn check_error(&self) -> Result<()> {
        if let Some(e) = self.error.lock().await.take() {
            return Err(e.into());
        }
        Ok(())
    }

    async fn next_grant(&self, fallback: TokenGrant) -> TokenGrant {
        self.grants.lock().await.pop_front().unwrap_or(fallback)
    }
}

// ============================================================================
// AuthApi Implementation
// ============================================================================

#[async_trait]
impl AuthApi for MockZohoClient {
    async fn exchange_code(
        &self,
        _credentials: &Credentials,
        code: &str,
        _redirect_uri: &str,
    ) -> Result<TokenGrant> {
        self.call_count.lock().await.exchange_code += 1;
        self.check_error().await?;

        Ok(self
            .next_grant(TokenGrant {
                access_token: format!("access-for-{}", code),
                refresh_token: Some("mock-refresh".to_string()),
                expires_in: 3600,
            })
            .await)
    }

    async fn refresh_token(
        &self,
        _credentials: &Credentials,
        refresh_token: &str,
    ) -> Result<TokenGrant> {
        let count = {
            let mut counts = self.call_count.lock().await;
            counts.refresh_token += 1;
            counts.refresh_token
        };
        self.check_error().await?;

        Ok(self
            .next_grant(TokenGrant {
                access_token: format!("refreshed-{}-{}", refresh_token, count),
                refresh_token: None,
                expires_in: 3600,
            })
            .await)
    }
}

// ============================================================================
// SheetsApi Implementation
// ============================================================================

#[async_trait]
impl SheetsApi for MockZohoClient {
    async fn list_workbooks(&self, _access_token: &str) -> Result<SheetResponse> {
        self.call_count.lock().await.list_workbooks += 1;
        self.check_error().await?;

        if let Some(response) = self.list_responses.lock().await.pop_front() {
            return Ok(response);
        }

        Ok(SheetResponse {
            status: "success".to_string(),
            workbooks: Some(self.workbooks.lock().await.clone()),
            ..Default::default()
        })
    }

    async fn workbook_request(
        &self,
        workbook_id: &str,
        access_token: &str,
        request: &SheetRequest,
    ) -> Result<SheetResponse> {
        self.call_count.lock().await.workbook_request += 1;
        self.captured_requests.lock().await.push(CapturedRequest {
            workbook_id: workbook_id.to_string(),
            access_token: access_token.to_string(),
            request: request.clone(),
        });
        self.check_error().await?;

        let delay = self.shard_delays.lock().await.get(workbook_id).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = self
            .shard_responses
            .lock()
            .await
            .get_mut(workbook_id)
            .and_then(|queue| queue.pop_front());
        if let Some(response) = scripted {
            return Ok(response);
        }

        let fallback = self.shard_defaults.lock().await.get(workbook_id).cloned();
        Ok(fallback.unwrap_or_else(|| {
            SheetResponse::failure(9999, &format!("no mock response for {}", workbook_id))
        }))
    }
}
