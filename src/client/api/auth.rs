//! OAuth2 API trait

use async_trait::async_trait;

use crate::auth::Credentials;
use crate::client::models::TokenGrant;
use crate::error::Result;

/// Token endpoint operations of the Zoho accounts API
#[async_trait]
pub trait AuthApi: Send + Sync {
    /// Trade an authorization code for an access/refresh token pair
    async fn exchange_code(
        &self,
        credentials: &Credentials,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenGrant>;

    /// Get a fresh access token for a stored refresh token
    async fn refresh_token(
        &self,
        credentials: &Credentials,
        refresh_token: &str,
    ) -> Result<TokenGrant>;
}
