//! Schema migrations for local store records
//!
//! Every record carries the schema version it was written with. Version 0
//! is the raw dashboard export: every value is a string, JSON documents are
//! stringified, analytics fields are camelCase, and flags and counters are
//! stored as text. Version 1 stores typed JSON with snake_case fields.

use crate::error::{MresearchError, Result};
use crate::storage::types::keys;
use chrono::Utc;
use serde_json::{Map, Value};

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// Bring `value` from `version` up to [`CURRENT_SCHEMA_VERSION`]
///
/// # Errors
///
/// Returns `MresearchError::Storage` if the record was written by a newer
/// build or a legacy value cannot be interpreted
pub fn migrate(key: &str, version: u32, value: Value) -> Result<Value> {
    if version > CURRENT_SCHEMA_VERSION {
        return Err(MresearchError::Storage(format!(
            "record '{}' has schema version {}, newer than supported version {}",
            key, version, CURRENT_SCHEMA_VERSION
        ))
        .into());
    }

    let mut current = version;
    let mut value = value;
    while current < CURRENT_SCHEMA_VERSION {
        value = match current {
            0 => v0_to_v1(key, value)?,
            other => {
                return Err(MresearchError::Storage(format!(
                    "no migration registered for schema version {}",
                    other
                ))
                .into())
            }
        };
        current += 1;
        tracing::debug!("Migrated record '{}' to schema version {}", key, current);
    }

    Ok(value)
}

fn v0_to_v1(key: &str, value: Value) -> Result<Value> {
    let raw = match value {
        Value::String(raw) => raw,
        // already structured; only field names may need fixing
        other => return Ok(rename_legacy_fields(key, other)),
    };

    let migrated = match key {
        keys::NOTIFICATIONS | keys::AUTO_REFRESH => Value::Bool(raw.trim() == "true"),
        keys::DOWNLOADS_COUNT => Value::from(raw.trim().parse::<u64>().unwrap_or(0)),
        keys::RESEARCH_ANALYTICS | keys::RESEARCH_HISTORY | keys::RESEARCH_REPORTS => {
            let parsed: Value = serde_json::from_str(&raw).map_err(|e| {
                MresearchError::Storage(format!("legacy record '{}' is not valid JSON: {}", key, e))
            })?;
            rename_legacy_fields(key, parsed)
        }
        _ => Value::String(raw),
    };

    Ok(migrated)
}

fn rename_legacy_fields(key: &str, value: Value) -> Value {
    match (key, value) {
        (keys::RESEARCH_ANALYTICS, Value::Object(map)) => Value::Object(legacy_analytics(map)),
        (keys::RESEARCH_REPORTS, Value::Array(items)) => {
            Value::Array(items.into_iter().map(legacy_report).collect())
        }
        (_, other) => other,
    }
}

fn legacy_analytics(map: Map<String, Value>) -> Map<String, Value> {
    const RENAMES: [(&str, &str); 5] = [
        ("totalReports", "total_reports"),
        ("completedReports", "completed_reports"),
        ("failedReports", "failed_reports"),
        ("averageCompletionTime", "average_completion_time"),
        ("recentActivity", "recent_activity"),
    ];

    map.into_iter()
        .map(|(k, v)| {
            let renamed = RENAMES
                .iter()
                .find(|(old, _)| *old == k)
                .map(|(_, new)| new.to_string())
                .unwrap_or(k);
            (renamed, v)
        })
        .collect()
}

/// Dashboard reports were bare job objects, optionally carrying the topic
fn legacy_report(item: Value) -> Value {
    match item {
        Value::Object(map) if !map.contains_key("job") => {
            let topic = map
                .get("research_topic")
                .and_then(Value::as_str)
                .unwrap_or("Untitled research")
                .to_string();
            let saved_at = map
                .get("completed_at")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| Utc::now().to_rfc3339());
            serde_json::json!({
                "job": Value::Object(map),
                "research_topic": topic,
                "saved_at": saved_at,
            })
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_current_version_is_untouched() {
        let value = json!({"total_reports": 1});
        let migrated = migrate(keys::RESEARCH_ANALYTICS, CURRENT_SCHEMA_VERSION, value.clone()).unwrap();
        assert_eq!(migrated, value);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let err = migrate(keys::USERNAME, CURRENT_SCHEMA_VERSION + 1, json!("x")).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_v0_flags_and_counters_are_typed() {
        assert_eq!(migrate(keys::NOTIFICATIONS, 0, json!("false")).unwrap(), json!(false));
        assert_eq!(migrate(keys::AUTO_REFRESH, 0, json!("true")).unwrap(), json!(true));
        assert_eq!(migrate(keys::DOWNLOADS_COUNT, 0, json!("7")).unwrap(), json!(7));
        assert_eq!(migrate(keys::DOWNLOADS_COUNT, 0, json!("NaN")).unwrap(), json!(0));
    }

    #[test]
    fn test_v0_plain_strings_survive() {
        assert_eq!(migrate(keys::AUTH_TOKEN, 0, json!("abc")).unwrap(), json!("abc"));
    }

    #[test]
    fn test_v0_analytics_fields_are_renamed() {
        let legacy = r#"{"totalReports":3,"completedReports":2,"failedReports":1,"averageCompletionTime":5000,"recentActivity":[]}"#;
        let migrated = migrate(keys::RESEARCH_ANALYTICS, 0, json!(legacy)).unwrap();
        assert_eq!(migrated["total_reports"], 3);
        assert_eq!(migrated["completed_reports"], 2);
        assert_eq!(migrated["failed_reports"], 1);
        assert_eq!(migrated["average_completion_time"], 5000);
        assert!(migrated["recent_activity"].as_array().unwrap().is_empty());
    }

    #[test]
    fn test_v0_reports_are_wrapped() {
        let legacy = r#"[{"research_id":"r1","status":"completed","research_topic":"EV","created_at":"2025-01-01T00:00:00","completed_at":"2025-01-01T00:02:00"}]"#;
        let migrated = migrate(keys::RESEARCH_REPORTS, 0, json!(legacy)).unwrap();
        let first = &migrated.as_array().unwrap()[0];
        assert_eq!(first["job"]["research_id"], "r1");
        assert_eq!(first["research_topic"], "EV");
        assert_eq!(first["saved_at"], "2025-01-01T00:02:00");
    }

    #[test]
    fn test_v0_invalid_json_is_an_error() {
        assert!(migrate(keys::RESEARCH_HISTORY, 0, json!("{not json")).is_err());
    }
}
