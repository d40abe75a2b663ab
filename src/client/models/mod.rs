//! Zoho API data models

mod auth;
mod sheet;

pub use auth::TokenGrant;
pub use sheet::{
    ERROR_STORAGE_FULL, ERROR_TOKEN_EXPIRED, SheetRequest, SheetResponse, Workbook,
};
