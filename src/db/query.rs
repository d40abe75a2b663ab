//! Typed request descriptions for the four record operations

use std::fmt::Display;

use serde::Serialize;
use serde_json::Value;

use crate::error::{Error, Result};

/// `worksheet.records.fetch` across every shard
#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub(crate) table: String,
    pub(crate) criteria: String,
    pub(crate) columns: Vec<String>,
}

impl Select {
    /// Select rows of `table` matching `criteria` (empty matches every row)
    pub fn new(table: impl Into<String>, criteria: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            criteria: criteria.into(),
            columns: Vec::new(),
        }
    }

    /// Restrict the returned columns; none means all of them
    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_table(&self.table)
    }
}

/// `worksheet.records.add` on the first shard with room
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub(crate) table: String,
    pub(crate) rows: Vec<Value>,
}

impl Insert {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: Vec::new(),
        }
    }

    /// Append one row, a JSON object keyed by column name
    pub fn row(mut self, row: Value) -> Self {
        self.rows.push(row);
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Value>) -> Self {
        self.rows.extend(rows);
        self
    }

    /// Append rows from any serializable values
    pub fn records<T: Serialize>(mut self, records: &[T]) -> Result<Self> {
        for record in records {
            self.rows.push(serde_json::to_value(record)?);
        }
        Ok(self)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_table(&self.table)?;
        if self.rows.is_empty() {
            return Err(Error::EmptyInput("insert needs at least one row".to_string()));
        }
        if let Some(index) = self.rows.iter().position(|row| !row.is_object()) {
            return Err(Error::InvalidType(format!(
                "row {} must be a JSON object",
                index
            )));
        }
        Ok(())
    }
}

/// `worksheet.records.update` on one shard or all of them
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub(crate) table: String,
    pub(crate) criteria: String,
    pub(crate) data: Value,
    pub(crate) target_shard: Option<String>,
}

impl Update {
    pub fn new(table: impl Into<String>, criteria: impl Into<String>, data: Value) -> Self {
        Self {
            table: table.into(),
            criteria: criteria.into(),
            data,
            target_shard: None,
        }
    }

    /// Only touch this shard (usually a select result's `shard_id`)
    pub fn target_shard(mut self, shard: impl Into<String>) -> Self {
        self.target_shard = non_blank(shard.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_table(&self.table)?;
        match &self.data {
            Value::Object(map) if map.is_empty() => Err(Error::EmptyInput(
                "update data has no columns".to_string(),
            )),
            Value::Object(_) => Ok(()),
            _ => Err(Error::InvalidType(
                "update data must be a JSON object".to_string(),
            )),
        }
    }
}

/// `worksheet.records.delete` on one shard or all of them
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub(crate) table: String,
    pub(crate) criteria: String,
    pub(crate) target_shard: Option<String>,
    pub(crate) row_id: Option<u64>,
}

impl Delete {
    pub fn new(table: impl Into<String>, criteria: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            criteria: criteria.into(),
            target_shard: None,
            row_id: None,
        }
    }

    pub fn target_shard(mut self, shard: impl Into<String>) -> Self {
        self.target_shard = non_blank(shard.into());
        self
    }

    /// Delete one row by its shard-local row index
    pub fn row_id(mut self, row_id: u64) -> Self {
        self.row_id = Some(row_id);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        require_table(&self.table)?;
        if self.row_id == Some(0) {
            return Err(Error::InvalidType("row ids start at 1".to_string()));
        }
        Ok(())
    }

    /// `row_array` form value: a one-element JSON array, or empty
    pub(crate) fn row_array(&self) -> String {
        self.row_id
            .map(|id| format!("[{}]", id))
            .unwrap_or_default()
    }
}

/// Substitute placeholders in a criteria string.
///
/// Double quotes in values become single quotes so a value cannot close a
/// quoted literal. Placeholders are replaced in iteration order.
///
/// ```
/// let criteria = zohodb::escape(
///     r#""username" = "{name}""#,
///     [("{name}", r#"bob" or "1"="1"#)],
/// );
/// assert_eq!(criteria, r#""username" = "bob' or '1'='1""#);
/// ```
pub fn escape<I, K, V>(criteria: &str, params: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Display,
{
    params
        .into_iter()
        .fold(criteria.to_string(), |criteria, (key, value)| {
            let value = value.to_string().replace('"', "'");
            criteria.replace(key.as_ref().trim(), &value)
        })
}

fn require_table(table: &str) -> Result<()> {
    if table.trim().is_empty() {
        return Err(Error::MissingData("a table name is required".to_string()));
    }
    Ok(())
}

fn non_blank(value: String) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}
