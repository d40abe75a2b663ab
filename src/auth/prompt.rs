//! Interactive OAuth2 authorization step
//!
//! The very first token for a credential pair needs a human: they open the
//! authorization URL, approve the app, and paste back the URL Zoho redirected
//! them to. The prompt is a trait so automated callers can script it.

use async_trait::async_trait;
use colored::Colorize;
use dialoguer::{Input, theme::ColorfulTheme};
use reqwest::Url;

use crate::error::{ConfigError, Error, Result};

/// Collects the post-authorization redirect URL from an operator
#[async_trait]
pub trait AuthorizationPrompt: Send + Sync {
    /// Present `authorization_url` and return the URL the browser landed on
    async fn redirect_url(&self, authorization_url: &str) -> Result<String>;
}

/// Terminal prompt: prints the URL, reads the redirect URL from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalPrompt;

#[async_trait]
impl AuthorizationPrompt for TerminalPrompt {
    async fn redirect_url(&self, authorization_url: &str) -> Result<String> {
        let url = authorization_url.to_string();

        tokio::task::spawn_blocking(move || -> Result<String> {
            println!("{}", "Zoho authorization required".bold().green());
            println!("Please visit this URL and approve access:\n");
            println!("  {}\n", url.cyan());

            let redirect: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt("Paste the URL you were redirected to (the code expires quickly)")
                .interact_text()?;
            Ok(redirect.trim().to_string())
        })
        .await
        .map_err(|e| Error::Prompt(e.to_string()))?
    }
}

/// Build the consent URL for the authorization-code flow
pub fn authorization_url(
    oauth_base: &str,
    client_id: &str,
    scopes: &str,
    redirect_uri: &str,
) -> Result<String> {
    let base = format!("{}/auth", oauth_base.trim_end_matches('/'));
    let url = Url::parse_with_params(
        &base,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("scope", scopes),
            ("redirect_uri", redirect_uri),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| ConfigError::Invalid(format!("bad OAuth base URL '{}': {}", oauth_base, e)))?;

    Ok(url.to_string())
}

/// Pull the `code` query parameter out of a redirect URL
pub fn extract_code(redirect_url: &str) -> Result<String> {
    let url = Url::parse(redirect_url.trim()).map_err(|e| {
        Error::InvalidType(format!("redirect URL '{}' is not a URL: {}", redirect_url, e))
    })?;

    url.query_pairs()
        .find(|(key, value)| key == "code" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
        .ok_or_else(|| {
            Error::MissingData("the redirect URL has no authorization code parameter".to_string())
        })
}
