use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

// ── sObject names ─────────────────────────────────────────────────────────────

pub const USER_SOBJECT: &str = "User";
pub const DEBUG_LEVEL_SOBJECT: &str = "DebugLevel";
pub const TRACE_FLAG_SOBJECT: &str = "TraceFlag";

/// A single record as exchanged with the org: a JSON object keyed by field name.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Which API family a call is routed through.
///
/// `User` lives on the regular data API; `DebugLevel` and `TraceFlag` are
/// tooling objects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Surface {
    Data,
    Tooling,
}

impl Surface {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Tooling => "tooling",
        }
    }
}

// ── Query / save results ──────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub total_size: usize,
    #[serde(default = "default_done")]
    pub done: bool,
    #[serde(default)]
    pub records: Vec<Record>,
    /// Path of the next page when the org split the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

impl QueryResult {
    pub fn from_records(records: Vec<Record>) -> Self {
        Self {
            total_size: records.len(),
            done: true,
            records,
            next_records_url: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.total_size == 0 || self.records.is_empty()
    }

    /// First record, or `None` when the query matched nothing.
    pub fn first(&self) -> Option<&Record> {
        if self.total_size == 0 {
            return None;
        }
        self.records.first()
    }

    /// Decode the first record into a typed row.
    pub fn first_as<T: DeserializeOwned>(&self) -> Result<Option<T>, ApiError> {
        self.first().map(decode_record).transpose()
    }
}

/// Decode a raw record into a typed row.
pub fn decode_record<T: DeserializeOwned>(record: &Record) -> Result<T, ApiError> {
    serde_json::from_value(serde_json::Value::Object(record.clone()))
        .map_err(|err| ApiError::decode(err.to_string()))
}

/// Encode a typed row into a raw record.
pub fn encode_record<T: Serialize>(row: &T) -> Result<Record, ApiError> {
    match serde_json::to_value(row).map_err(|err| ApiError::decode(err.to_string()))? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(ApiError::decode(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct SaveResult {
    pub id: String,
    #[serde(default = "default_done")]
    pub success: bool,
}

// ── Typed rows ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct UserRow {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_preferences_user_debug_mode_pref: Option<bool>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct DebugLevelRow {
    pub id: String,
    pub developer_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apex_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_label: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct TraceFlagRow {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_level_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_tooling_query_payload() {
        let payload = json!({
            "size": 1,
            "totalSize": 1,
            "done": true,
            "records": [
                { "attributes": { "type": "TraceFlag" }, "Id": "7tf000000000001", "DebugLevelId": "7dl000000000001" }
            ]
        });
        let result: QueryResult = serde_json::from_value(payload).expect("decode");
        let row: TraceFlagRow = result.first_as().expect("row").expect("some");
        assert_eq!(row.id, "7tf000000000001");
        assert_eq!(row.debug_level_id.as_deref(), Some("7dl000000000001"));
    }

    #[test]
    fn empty_result_has_no_first_row() {
        let result = QueryResult::default();
        assert!(result.is_empty());
        assert!(result.first_as::<UserRow>().expect("decode").is_none());
    }

    #[test]
    fn encodes_rows_with_api_field_names() {
        let row = DebugLevelRow {
            id: "7dl".into(),
            developer_name: "SFDC_DevConsole".into(),
            apex_code: Some("FINE".into()),
            master_label: None,
        };
        let record = encode_record(&row).expect("encode");
        assert_eq!(record.get("DeveloperName"), Some(&json!("SFDC_DevConsole")));
        assert_eq!(record.get("ApexCode"), Some(&json!("FINE")));
        assert!(!record.contains_key("MasterLabel"));
    }
}
