//! Zoho Sheet data API models

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ApiError, Result};

/// Error code Zoho returns for an expired or revoked access token
pub const ERROR_TOKEN_EXPIRED: i64 = 2401;

/// Error codes Zoho returns when a workbook cannot take more rows
pub const ERROR_STORAGE_FULL: [i64; 2] = [2870, 2872];

/// A workbook as listed by `workbook.list`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workbook {
    pub workbook_name: String,

    /// Workbook id; doubles as the shard id
    pub resource_id: String,
}

/// Envelope shared by every Zoho Sheet response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SheetResponse {
    /// `"success"` or `"failure"`
    #[serde(default)]
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,

    /// `worksheet.records.fetch`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<Vec<Map<String, Value>>>,

    /// `worksheet.records.update`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_of_affected_rows: Option<i64>,

    /// `worksheet.records.delete`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_of_rows_deleted: Option<i64>,

    /// `workbook.list`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workbooks: Option<Vec<Workbook>>,
}

impl SheetResponse {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    pub fn is_failure(&self) -> bool {
        self.status == "failure"
    }

    pub fn is_token_expired(&self) -> bool {
        self.error_code == Some(ERROR_TOKEN_EXPIRED)
    }

    pub fn is_storage_full(&self) -> bool {
        self.error_code
            .is_some_and(|code| ERROR_STORAGE_FULL.contains(&code))
    }

    /// Anything but `status=success` is an error. Failures carry the remote
    /// message; a missing or unknown status is reported as such.
    pub fn ensure_success(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        if !self.is_failure() {
            return Err(match self.status.as_str() {
                "" => missing_field("status"),
                other => ApiError::unexpected(format!("Unknown response status '{}'", other)),
            }
            .into());
        }
        Err(ApiError::UnexpectedResponse {
            message: self
                .error_message
                .unwrap_or_else(|| "The Zoho API reported a failure".to_string()),
            code: self.error_code,
        }
        .into())
    }

    pub fn take_records(&mut self) -> Result<Vec<Map<String, Value>>> {
        self.records
            .take()
            .ok_or_else(|| missing_field("records").into())
    }

    pub fn take_workbooks(&mut self) -> Result<Vec<Workbook>> {
        self.workbooks
            .take()
            .ok_or_else(|| missing_field("workbooks").into())
    }

    pub fn affected_rows(&self) -> Result<i64> {
        self.no_of_affected_rows
            .ok_or_else(|| missing_field("no_of_affected_rows").into())
    }

    pub fn deleted_rows(&self) -> Result<i64> {
        self.no_of_rows_deleted
            .ok_or_else(|| missing_field("no_of_rows_deleted").into())
    }
}

fn missing_field(field: &str) -> ApiError {
    ApiError::unexpected(format!("Response is missing the '{}' field", field))
}

/// Form body of a `POST {sheets_base}/{workbook_id}` call.
///
/// The bearer token travels separately, in the `Authorization` header.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRequest {
    fields: Vec<(&'static str, String)>,
}

impl SheetRequest {
    fn new(method: &str, worksheet: &str) -> Self {
        Self {
            fields: vec![
                ("method", method.to_string()),
                ("worksheet_name", worksheet.to_string()),
            ],
        }
    }

    fn with(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    /// `worksheet.records.fetch`; an empty column list returns every column
    pub fn fetch(worksheet: &str, criteria: &str, columns: &[String]) -> Self {
        Self::new("worksheet.records.fetch", worksheet)
            .with("criteria", criteria)
            .with("column_names", columns.join(","))
    }

    /// `worksheet.records.add`; `json_data` is a JSON array of row objects
    pub fn add(worksheet: &str, json_data: String) -> Self {
        Self::new("worksheet.records.add", worksheet).with("json_data", json_data)
    }

    /// `worksheet.records.update`; `data` is a JSON object of column values
    pub fn update(worksheet: &str, criteria: &str, data: String) -> Self {
        Self::new("worksheet.records.update", worksheet)
            .with("criteria", criteria)
            .with("data", data)
    }

    /// `worksheet.records.delete`; `row_array` is a JSON array or empty
    pub fn delete(worksheet: &str, criteria: &str, row_array: String) -> Self {
        Self::new("worksheet.records.delete", worksheet)
            .with("criteria", criteria)
            .with("row_array", row_array)
            .with("delete_rows", "true")
    }

    pub fn method(&self) -> &str {
        self.field("method").unwrap_or_default()
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn form(&self) -> &[(&'static str, String)] {
        &self.fields
    }
}

#[cfg(test)]
impl SheetResponse {
    pub fn success() -> Self {
        Self {
            status: "success".to_string(),
            ..Default::default()
        }
    }

    pub fn failure(code: i64, message: &str) -> Self {
        Self {
            status: "failure".to_string(),
            error_code: Some(code),
            error_message: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub fn with_records(mut self, records: Vec<Value>) -> Self {
        self.records = Some(
            records
                .into_iter()
                .filter_map(|r| match r {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect(),
        );
        self
    }

    pub fn with_affected_rows(mut self, rows: i64) -> Self {
        self.no_of_affected_rows = Some(rows);
        self
    }

    pub fn with_deleted_rows(mut self, rows: i64) -> Self {
        self.no_of_rows_deleted = Some(rows);
        self
    }
}
