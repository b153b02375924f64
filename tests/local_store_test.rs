//! Local store integration tests
//!
//! Imports a dashboard `localStorage` export and reads it back through the
//! stores that consume it.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::create_temp_store;
use mresearch::analytics::AnalyticsStore;
use mresearch::api::fake::FakeBackend;
use mresearch::api::{JobStatus, ResearchHistoryItem};
use mresearch::research::ResearchStore;
use mresearch::storage::keys;

fn legacy_dump() -> serde_json::Value {
    let reports = json!([{
        "research_id": "r-legacy",
        "status": "completed",
        "result": "# EV Charging Report",
        "created_at": "2025-02-01T08:00:00.000000",
        "completed_at": "2025-02-01T08:03:00.000000",
        "research_topic": "EV charging"
    }]);
    let history = json!([{
        "research_id": "r-legacy",
        "research_topic": "EV charging",
        "status": "completed",
        "created_at": "2025-02-01T08:00:00",
        "completed_at": "2025-02-01T08:03:00"
    }]);
    let analytics = json!({
        "totalReports": 3,
        "completedReports": 2,
        "failedReports": 1,
        "averageCompletionTime": 90000,
        "recentActivity": [{
            "id": "r-legacy",
            "action": "Report Generated",
            "timestamp": "2025-02-01T08:03:00.000Z",
            "topic": "EV charging"
        }]
    });

    json!({
        "auth_token": "dashboard-token",
        "research_reports": reports.to_string(),
        "research_history": history.to_string(),
        "research_analytics": analytics.to_string(),
        "downloads_count": "5",
        "auto_refresh": "true",
        "username": "Analyst"
    })
}

#[tokio::test]
async fn test_dashboard_export_is_readable_by_every_store() {
    let (storage, _tmp) = create_temp_store();
    let dump = legacy_dump();
    assert_eq!(storage.import_legacy(dump.as_object().unwrap()).unwrap(), 7);

    let research = ResearchStore::new(
        Arc::new(FakeBackend::new()),
        storage.clone(),
        Arc::new(AnalyticsStore::new(storage.clone())),
        Duration::from_secs(2),
    );

    let reports = research.get_stored_reports().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].research_id(), "r-legacy");
    assert_eq!(reports[0].research_topic, "EV charging");
    assert_eq!(reports[0].job.duration_ms(), Some(180_000));
    assert_eq!(reports[0].pdf_file_name(), "EV-charging.pdf");

    let history = research.cached_history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].status, JobStatus::Completed);

    let analytics = AnalyticsStore::new(storage.clone()).get_analytics();
    assert_eq!(analytics.total_reports, 3);
    assert_eq!(analytics.completed_reports, 2);
    assert_eq!(analytics.average_completion_time, 90_000.0);
    assert_eq!(analytics.recent_activity.len(), 1);

    assert_eq!(storage.auth_token().unwrap(), "dashboard-token");
    assert_eq!(storage.downloads_count().unwrap(), 5);
    let prefs = storage.preferences().unwrap();
    assert!(prefs.auto_refresh);
    assert!(prefs.notifications);
    assert_eq!(prefs.username, "Analyst");
}

#[test]
fn test_migrated_analytics_keep_counting() {
    let (storage, _tmp) = create_temp_store();
    let dump = legacy_dump();
    storage.import_legacy(dump.as_object().unwrap()).unwrap();

    let analytics = AnalyticsStore::new(storage.clone());
    analytics
        .update_analytics("r-new", JobStatus::Completed, "Drones", Some(30_000))
        .unwrap();

    let current = analytics.get_analytics();
    assert_eq!(current.total_reports, 4);
    assert_eq!(current.completed_reports, 3);
    assert_eq!(current.average_completion_time, 60_000.0);
    assert_eq!(current.recent_activity[0].id, "r-new");
}

#[test]
fn test_clear_history_keeps_reports() {
    let (storage, _tmp) = create_temp_store();
    let dump = legacy_dump();
    storage.import_legacy(dump.as_object().unwrap()).unwrap();

    storage.clear_history().unwrap();

    let history: Option<Vec<ResearchHistoryItem>> = storage.get(keys::RESEARCH_HISTORY).unwrap();
    assert!(history.is_none());
    assert!(storage.get_value(keys::RESEARCH_REPORTS).unwrap().is_some());
}
