//! OAuth token models

use serde_json::Value;

use crate::error::{ApiError, Result};

/// Lifetime Zoho assigns to access tokens when a response leaves it out
const DEFAULT_EXPIRES_IN: i64 = 3600;

/// Token endpoint answer for a code exchange or a refresh
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,

    /// Only present on the initial authorization-code exchange
    pub refresh_token: Option<String>,

    /// Seconds until `access_token` expires
    pub expires_in: i64,
}

impl TokenGrant {
    /// Parse a raw token endpoint body.
    ///
    /// A body that is not JSON is `InvalidJsonResponse`; JSON without an
    /// `access_token` (Zoho answers `{"error": "invalid_code"}` and similar)
    /// is `UnexpectedResponse`.
    pub fn from_body(body: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(body).map_err(|e| {
            ApiError::InvalidJsonResponse(format!("Failed to parse the token response: {}", e))
        })?;

        let access_token = match value.get("access_token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => token.to_string(),
            _ => {
                let reason = value
                    .get("error")
                    .and_then(Value::as_str)
                    .unwrap_or("no access_token in response");
                return Err(ApiError::unexpected(format!(
                    "Failed to obtain an access token: {}",
                    reason
                ))
                .into());
            }
        };

        let refresh_token = value
            .get("refresh_token")
            .and_then(Value::as_str)
            .map(str::to_string);

        // Zoho has sent expires_in both as a number and as a string
        let expires_in = match value.get("expires_in") {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.parse().ok(),
            _ => None,
        }
        .unwrap_or(DEFAULT_EXPIRES_IN);

        Ok(Self {
            access_token,
            refresh_token,
            expires_in,
        })
    }
}
