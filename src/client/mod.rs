//! Zoho API clients
//!
//! The dispatcher only talks to the remote service through [`AuthApi`] and
//! [`SheetsApi`]; [`ZohoClient`] is the HTTP implementation of both.

pub mod api;
#[cfg(test)]
pub mod mock;
pub mod models;
pub mod parallel;
pub mod rate_limit;
pub mod zoho;

pub use api::{AuthApi, SheetsApi};
#[cfg(test)]
pub use mock::MockZohoClient;
pub use models::{SheetRequest, SheetResponse, TokenGrant, Workbook};
pub use parallel::fan_out;
pub use zoho::ZohoClient;
