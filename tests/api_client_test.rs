//! ApiClient integration tests
//!
//! Exercises the reqwest client against a `wiremock` server: exact endpoint
//! paths, the bearer header, query parameters, multipart uploads, binary
//! downloads, and how `detail` error payloads surface.

mod common;

use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{client_for, job_json};
use mresearch::api::{JobStatus, KnowledgeBackend, ResearchBackend, ResearchRequest};
use mresearch::error::{user_message, MresearchError};

#[tokio::test]
async fn test_start_research_posts_request_with_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/research/start"))
        .and(header("authorization", "Bearer dev-token"))
        .and(body_json(json!({
            "research_topic": "EV charging",
            "research_request": "Analyze the EV charging market"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("r1", "pending")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "dev-token");
    let job = client
        .start_research(&ResearchRequest::new(
            "EV charging",
            "Analyze the EV charging market",
        ))
        .await
        .expect("start should succeed");

    assert_eq!(job.research_id, "r1");
    assert_eq!(job.status, JobStatus::Pending);
}

#[tokio::test]
async fn test_user_id_is_sent_when_present() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/research/start"))
        .and(body_string_contains("\"user_id\":\"analyst-7\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("r1", "running")))
        .expect(1)
        .mount(&server)
        .await;

    let mut request = ResearchRequest::new("EV charging", "Analyze the EV charging market");
    request.user_id = Some("analyst-7".to_string());

    let client = client_for(&server.uri(), "dev-token");
    client.start_research(&request).await.expect("start should succeed");
}

#[tokio::test]
async fn test_status_parses_naive_timestamps_and_duration() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/research/r1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_json("r1", "completed")))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "dev-token");
    let job = client.research_status("r1").await.unwrap();

    assert_eq!(job.status, JobStatus::Completed);
    assert_eq!(job.duration_ms(), Some(120_000));
    assert_eq!(job.progress_percentage(), 100);
    assert_eq!(job.result.as_deref(), Some("# Market Report"));
}

#[tokio::test]
async fn test_error_detail_reaches_user_message() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/research/missing/result"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"detail": "Research not found"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "dev-token");
    let err = client.research_result("missing").await.unwrap_err();

    match err.downcast_ref::<MresearchError>() {
        Some(MresearchError::Api { status, detail }) => {
            assert_eq!(*status, 404);
            assert_eq!(detail.as_deref(), Some("Research not found"));
        }
        other => panic!("expected api error, got {:?}", other),
    }
    assert_eq!(user_message(&err, "Failed to load result"), "Research not found");
}

#[tokio::test]
async fn test_error_without_detail_uses_fallback() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/knowledge/stats"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "dev-token");
    let err = client.knowledge_stats().await.unwrap_err();
    assert_eq!(
        user_message(&err, "Failed to load knowledge stats"),
        "Failed to load knowledge stats"
    );
}

#[tokio::test]
async fn test_history_sends_limit_and_offset() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/research/history"))
        .and(query_param("limit", "5"))
        .and(query_param("offset", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "history": [{
                "research_id": "r1",
                "research_topic": "EV charging",
                "status": "completed",
                "created_at": "2025-03-01T10:00:00",
                "completed_at": "2025-03-01T10:02:00"
            }],
            "total": 11,
            "limit": 5,
            "offset": 10
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "dev-token");
    let page = client.research_history(5, 10).await.unwrap();

    assert_eq!(page.total, 11);
    assert_eq!(page.history.len(), 1);
    assert_eq!(page.history[0].research_topic, "EV charging");
}

#[tokio::test]
async fn test_base_url_path_prefix_is_kept() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/research/r1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"message": "Research deleted"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&format!("{}/api", server.uri()), "dev-token");
    client.delete_research("r1").await.unwrap();
}

#[tokio::test]
async fn test_download_pdf_returns_raw_bytes() {
    let server = MockServer::start().await;
    let pdf = b"%PDF-1.4\n%\xe2\xe3\xcf\xd3\n".to_vec();

    Mock::given(method("GET"))
        .and(path("/research/r1/download-pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(pdf.clone(), "application/pdf"))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "dev-token");
    let bytes = client.download_pdf("r1").await.unwrap();
    assert_eq!(bytes.as_ref(), pdf.as_slice());
}

#[tokio::test]
async fn test_upload_sends_multipart_file_field() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/knowledge/upload"))
        .and(header("authorization", "Bearer prod-token"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"notes.md\""))
        .and(body_string_contains("# Competitor notes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "File notes.md uploaded successfully",
            "file_path": "knowledge/uploads/notes.md",
            "size": 18,
            "processed": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "prod-token");
    let response = client
        .upload_file("notes.md", b"# Competitor notes".to_vec())
        .await
        .unwrap();

    assert_eq!(response.file_path, "knowledge/uploads/notes.md");
    assert!(response.processed);
}

#[tokio::test]
async fn test_delete_file_escapes_name() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/knowledge/files/q1%20report.pdf"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "dev-token");
    client.delete_file("q1 report.pdf").await.unwrap();
}

#[tokio::test]
async fn test_list_files_and_reindex() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/knowledge/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{
                "name": "ev_market.md",
                "path": "knowledge/industry_reports/ev_market.md",
                "size": 2048,
                "modified": "2025-03-01T09:00:00",
                "category": "industry_reports"
            }],
            "total": 1,
            "categories": ["industry_reports"]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/knowledge/reindex"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "Knowledge base reindexed successfully"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "dev-token");
    let listing = client.list_files().await.unwrap();
    assert_eq!(listing.total, 1);
    assert_eq!(listing.files[0].category, "industry_reports");
    assert!(listing.files[0].modified.is_some());

    client.reindex().await.unwrap();
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "healthy",
            "timestamp": "2025-03-01T10:00:00.123456",
            "crew_initialized": true,
            "rag_initialized": false
        })))
        .mount(&server)
        .await;

    let client = client_for(&server.uri(), "dev-token");
    let health = client.health().await.unwrap();
    assert!(health.is_healthy());
    assert!(health.crew_initialized);
    assert!(!health.rag_initialized);
    assert!(health.knowledge_stats.is_none());
}
