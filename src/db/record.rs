//! Records returned by select, tagged with their shard

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row plus the shard it came from.
///
/// Serializes flat, with the shard id under `workbook_id` next to the
/// column values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardRecord {
    #[serde(rename = "workbook_id")]
    pub shard_id: String,

    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ShardRecord {
    pub fn new(shard_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            shard_id: shard_id.into(),
            fields,
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.fields.get(column)
    }

    /// Shard-local row index, as reported in `row_index`
    pub fn row_id(&self) -> Option<u64> {
        match self.fields.get("row_index")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}
