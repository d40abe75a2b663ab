//! Zoho API client implementation

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client as HttpClient, RequestBuilder, StatusCode};

use super::api::{AuthApi, SheetsApi};
use super::models::{SheetRequest, SheetResponse, TokenGrant};
use super::rate_limit::{EndpointCategory, RateLimiterSet};
use crate::auth::Credentials;
use crate::config::Config;
use crate::error::{ApiError, Result};

/// HTTP client for the Zoho accounts and Zoho Sheet APIs
pub struct ZohoClient {
    http: HttpClient,
    oauth_base: String,
    sheets_base: String,
    rate_limiter: RateLimiterSet,
}

impl ZohoClient {
    /// Create a client using the base URLs and deadline from `config`
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_bases(
            &config.oauth_base,
            &config.sheets_base,
            config.request_timeout(),
        )
    }

    /// Create a client against explicit base URLs (mock servers in tests)
    pub fn with_bases(oauth_base: &str, sheets_base: &str, timeout: Duration) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::HttpRequest(e.to_string()))?;

        Ok(Self {
            http,
            oauth_base: oauth_base.trim_end_matches('/').to_string(),
            sheets_base: sheets_base.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiterSet::new(),
        })
    }

    /// Send a request and return the raw body.
    ///
    /// Zoho reports most failures inside a JSON body with a 4xx/5xx status,
    /// so any status except 429 is handed back for the caller to decode.
    async fn send(&self, category: EndpointCategory, request: RequestBuilder) -> Result<String> {
        self.rate_limiter.wait_for(category).await;

        let response = request.send().await.map_err(ApiError::from)?;
        let status = response.status();
        debug!("Zoho {:?} request answered {}", category, status);

        if status == StatusCode::TOO_MANY_REQUESTS {
            self.rate_limiter.activate(category);
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(ApiError::RateLimit(Duration::from_secs(retry_after)).into());
        }

        let body = response.text().await.map_err(ApiError::from)?;
        Ok(body)
    }

    async fn token_request(&self, params: &[(&str, &str)]) -> Result<TokenGrant> {
        let url = format!("{}/token", self.oauth_base);
        let body = self
            .send(EndpointCategory::Token, self.http.post(&url).query(params))
            .await?;
        TokenGrant::from_body(&body)
    }
}

fn parse_sheet_response(body: &str) -> Result<SheetResponse> {
    serde_json::from_str(body).map_err(|e| {
        ApiError::InvalidJsonResponse(format!("Failed to parse Zoho Sheet response: {}", e)).into()
    })
}

#[async_trait]
impl AuthApi for ZohoClient {
    async fn exchange_code(
        &self,
        credentials: &Credentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant> {
        self.token_request(&[
            ("code", code),
            ("client_id", credentials.client_id()),
            ("client_secret", credentials.client_secret()),
            ("redirect_uri", redirect_uri),
            ("grant_type", "authorization_code"),
        ])
        .await
    }

    async fn refresh_token(
        &self,
        credentials: &Credentials,
        refresh_token: &str,
    ) -> Result<TokenGrant> {
        self.token_request(&[
            ("client_id", credentials.client_id()),
            ("client_secret", credentials.client_secret()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ])
        .await
    }
}

#[async_trait]
impl SheetsApi for ZohoClient {
    async fn list_workbooks(&self, access_token: &str) -> Result<SheetResponse> {
        let url = format!("{}/workbooks", self.sheets_base);
        let request = self
            .http
            .get(&url)
            .query(&[("method", "workbook.list")])
            .bearer_auth(access_token);

        let body = self.send(EndpointCategory::Workbooks, request).await?;
        parse_sheet_response(&body)
    }

    async fn workbook_request(
        &self,
        workbook_id: &str,
        access_token: &str,
        request: &SheetRequest,
    ) -> Result<SheetResponse> {
        let url = format!("{}/{}", self.sheets_base, workbook_id);
        let request = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .form(request.form());

        let body = self.send(EndpointCategory::Records, request).await?;
        parse_sheet_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = Config::new("id", "secret", vec!["db".to_string()]);
        assert!(ZohoClient::new(&config).is_ok());
    }

    #[test]
    fn test_base_urls_trimmed() {
        let client = ZohoClient::with_bases(
            "http://127.0.0.1:1/oauth/v2/",
            "http://127.0.0.1:1/api/v2/",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.oauth_base, "http://127.0.0.1:1/oauth/v2");
        assert_eq!(client.sheets_base, "http://127.0.0.1:1/api/v2");
    }

    #[test]
    fn test_parse_sheet_response_rejects_html() {
        assert!(matches!(
            parse_sheet_response("<html></html>"),
            Err(crate::error::Error::Api(ApiError::InvalidJsonResponse(_)))
        ));
    }
}
