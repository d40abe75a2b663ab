//! API trait definitions split by responsibility
//!
//! - [`AuthApi`] - OAuth2 token endpoint
//! - [`SheetsApi`] - Workbook discovery and worksheet record operations

mod auth;
mod sheets;

pub use auth::AuthApi;
pub use sheets::SheetsApi;
