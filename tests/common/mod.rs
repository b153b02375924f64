use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::TempDir;

use mresearch::analytics::AnalyticsStore;
use mresearch::api::ApiClient;
use mresearch::config::ApiConfig;
use mresearch::research::ResearchStore;
use mresearch::storage::LocalStore;

#[allow(dead_code)]
pub fn create_temp_store() -> (LocalStore, TempDir) {
    let tmp = TempDir::new().expect("failed to create tempdir");
    let db_path = tmp.path().join("store.db");
    let storage = LocalStore::new_with_path(db_path).expect("failed to create local store");
    (storage, tmp)
}

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// API client pointed at a mock server
#[allow(dead_code)]
pub fn client_for(base_url: &str, token: &str) -> ApiClient {
    let config = ApiConfig {
        base_url: base_url.to_string(),
        timeout_seconds: 5,
        ..ApiConfig::default()
    };
    ApiClient::new(&config, token).expect("failed to build api client")
}

/// Research store backed by a real client and a temp store
#[allow(dead_code)]
pub fn research_store_for(base_url: &str, storage: &LocalStore, interval: Duration) -> ResearchStore {
    ResearchStore::new(
        Arc::new(client_for(base_url, "dev-token")),
        storage.clone(),
        Arc::new(AnalyticsStore::new(storage.clone())),
        interval,
    )
}

/// Job snapshot in the service's wire format (naive timestamps)
#[allow(dead_code)]
pub fn job_json(id: &str, status: &str) -> Value {
    let terminal = status == "completed" || status == "failed";
    json!({
        "research_id": id,
        "status": status,
        "result": if status == "completed" { json!("# Market Report") } else { Value::Null },
        "progress": {
            "current_phase": if terminal { "Done" } else { "Research" },
            "completed_tasks": [],
            "active_task": if terminal { Value::Null } else { json!("market_research") },
            "tasks": [],
            "progress_percentage": if terminal { 100 } else { 25 }
        },
        "error": if status == "failed" { json!("Agent crashed") } else { Value::Null },
        "created_at": "2025-03-01T10:00:00.000000",
        "completed_at": if terminal { json!("2025-03-01T10:02:00.000000") } else { Value::Null }
    })
}
