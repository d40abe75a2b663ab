//! Zoho Sheet data API trait

use async_trait::async_trait;

use crate::client::models::{SheetRequest, SheetResponse};
use crate::error::Result;

/// Workbook-level operations of the Zoho Sheet API.
///
/// Both methods hand back the decoded envelope even for `status=failure`, so
/// callers can act on error codes (token expiry, storage full). Only
/// transport problems and undecodable bodies are errors here.
#[async_trait]
pub trait SheetsApi: Send + Sync {
    /// `workbook.list`: every workbook the token can see
    async fn list_workbooks(&self, access_token: &str) -> Result<SheetResponse>;

    /// One worksheet call against one workbook (shard)
    async fn workbook_request(
        &self,
        workbook_id: &str,
        access_token: &str,
        request: &SheetRequest,
    ) -> Result<SheetResponse>;
}
