//! In-process fake backend for store unit and integration tests
//!
//! [`FakeBackend`] implements both [`ResearchBackend`] and
//! [`KnowledgeBackend`] from scripted, in-memory responses. Status
//! responses are consumed from a queue in order; once the queue holds a
//! single entry that entry is repeated, so a test can script
//! `running, running, completed` and let polling settle on the last one.
//!
//! Every call is recorded so tests can assert how many requests a store
//! issued, for example to prove that polling stopped.
//!
//! # Example
//!
//! ```
//! use mresearch::api::fake::FakeBackend;
//! use mresearch::api::{JobStatus, ResearchBackend};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let backend = FakeBackend::new();
//! backend.push_status(FakeBackend::job("r1", JobStatus::Running));
//!
//! let job = backend.research_status("r1").await.unwrap();
//! assert_eq!(job.status, JobStatus::Running);
//! assert_eq!(backend.call_count("status"), 1);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use crate::api::{
    JobStatus, KnowledgeBackend, KnowledgeFile, KnowledgeFileList, KnowledgeStats,
    ResearchBackend, ResearchHistoryPage, ResearchJob, ResearchRequest, ResearchResult,
    UploadResponse,
};
use crate::error::{MresearchError, Result};

/// A scripted response: either a value or a backend failure
#[derive(Debug, Clone)]
pub enum Scripted<T> {
    /// Respond successfully with the value
    Ok(T),
    /// Respond with an API error carrying the given status and detail
    Err(u16, Option<String>),
}

impl<T: Clone> Scripted<T> {
    fn into_result(self) -> Result<T> {
        match self {
            Scripted::Ok(value) => Ok(value),
            Scripted::Err(status, detail) => Err(MresearchError::Api { status, detail }.into()),
        }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    start: Option<Scripted<ResearchJob>>,
    statuses: VecDeque<Scripted<ResearchJob>>,
    history: Option<Scripted<ResearchHistoryPage>>,
    stats: Option<Scripted<KnowledgeStats>>,
    files: Option<Scripted<KnowledgeFileList>>,
    fail_upload: Option<Scripted<UploadResponse>>,
    fail_delete_file: Option<(u16, Option<String>)>,
    fail_reindex: Option<(u16, Option<String>)>,
    pdf: Vec<u8>,
    calls: Vec<String>,
}

/// In-memory implementation of the service endpoints
#[derive(Debug, Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

impl FakeBackend {
    /// Create a fake with no scripted responses
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a job snapshot created one minute ago
    ///
    /// Completed jobs get a `completed_at` of now, so their duration is
    /// roughly sixty seconds.
    pub fn job(research_id: &str, status: JobStatus) -> ResearchJob {
        let now = Utc::now();
        ResearchJob {
            research_id: research_id.to_string(),
            status,
            result: (status == JobStatus::Completed).then(|| "# Report".to_string()),
            progress: None,
            error: (status == JobStatus::Failed).then(|| "Agent crashed".to_string()),
            created_at: now - chrono::Duration::seconds(60),
            completed_at: status.is_terminal().then_some(now),
        }
    }

    /// Build a knowledge stats snapshot with the given document total
    pub fn stats(total_documents: u64) -> KnowledgeStats {
        KnowledgeStats {
            total_documents,
            company_profiles: 0,
            industry_reports: total_documents,
            market_data: 0,
            user_preferences: 0,
            last_updated: Utc::now(),
        }
    }

    /// Script the response to `start_research`
    pub fn set_start(&self, response: Scripted<ResearchJob>) {
        self.lock().start = Some(response);
    }

    /// Queue a successful status response
    pub fn push_status(&self, job: ResearchJob) {
        self.lock().statuses.push_back(Scripted::Ok(job));
    }

    /// Queue a failing status response
    pub fn push_status_error(&self, status: u16) {
        self.lock().statuses.push_back(Scripted::Err(status, None));
    }

    /// Script the history page
    pub fn set_history(&self, response: Scripted<ResearchHistoryPage>) {
        self.lock().history = Some(response);
    }

    /// Script the knowledge stats response
    pub fn set_stats(&self, response: Scripted<KnowledgeStats>) {
        self.lock().stats = Some(response);
    }

    /// Script the knowledge file listing
    pub fn set_files(&self, response: Scripted<KnowledgeFileList>) {
        self.lock().files = Some(response);
    }

    /// Make uploads fail with the given status and detail
    pub fn fail_upload(&self, status: u16, detail: Option<String>) {
        self.lock().fail_upload = Some(Scripted::Err(status, detail));
    }

    /// Make knowledge file deletion fail
    pub fn fail_delete_file(&self, status: u16, detail: Option<String>) {
        self.lock().fail_delete_file = Some((status, detail));
    }

    /// Make reindexing fail
    pub fn fail_reindex(&self, status: u16, detail: Option<String>) {
        self.lock().fail_reindex = Some((status, detail));
    }

    /// Bytes returned by the PDF download endpoint
    pub fn set_pdf(&self, bytes: &[u8]) {
        self.lock().pdf = bytes.to_vec();
    }

    /// Number of recorded calls whose name equals `name`
    pub fn call_count(&self, name: &str) -> usize {
        self.lock().calls.iter().filter(|c| c.as_str() == name).count()
    }

    /// All recorded call names in order
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, name: &str) {
        self.lock().calls.push(name.to_string());
    }
}

fn not_scripted<T>(what: &str) -> Result<T> {
    Err(MresearchError::Api {
        status: 404,
        detail: Some(format!("{} not scripted", what)),
    }
    .into())
}

#[async_trait]
impl ResearchBackend for FakeBackend {
    async fn start_research(&self, _request: &ResearchRequest) -> Result<ResearchJob> {
        self.record("start");
        match self.lock().start.clone() {
            Some(scripted) => scripted.into_result(),
            None => not_scripted("start"),
        }
    }

    async fn research_status(&self, _research_id: &str) -> Result<ResearchJob> {
        self.record("status");
        let mut state = self.lock();
        let next = if state.statuses.len() > 1 {
            state.statuses.pop_front()
        } else {
            state.statuses.front().cloned()
        };
        drop(state);
        match next {
            Some(scripted) => scripted.into_result(),
            None => not_scripted("status"),
        }
    }

    async fn research_result(&self, research_id: &str) -> Result<ResearchResult> {
        self.record("result");
        Ok(ResearchResult {
            research_id: research_id.to_string(),
            result: Some("# Report".to_string()),
            completed_at: Some(Utc::now()),
        })
    }

    async fn research_history(&self, _limit: usize, _offset: usize) -> Result<ResearchHistoryPage> {
        self.record("history");
        match self.lock().history.clone() {
            Some(scripted) => scripted.into_result(),
            None => not_scripted("history"),
        }
    }

    async fn delete_research(&self, _research_id: &str) -> Result<()> {
        self.record("delete_research");
        Ok(())
    }

    async fn download_pdf(&self, _research_id: &str) -> Result<Bytes> {
        self.record("download_pdf");
        Ok(Bytes::from(self.lock().pdf.clone()))
    }
}

#[async_trait]
impl KnowledgeBackend for FakeBackend {
    async fn knowledge_stats(&self) -> Result<KnowledgeStats> {
        self.record("knowledge_stats");
        match self.lock().stats.clone() {
            Some(scripted) => scripted.into_result(),
            None => not_scripted("knowledge stats"),
        }
    }

    async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> Result<UploadResponse> {
        self.record("upload");
        if let Some(failure) = self.lock().fail_upload.clone() {
            return failure.into_result();
        }
        Ok(UploadResponse {
            message: format!("File {} uploaded successfully", file_name),
            file_path: format!("knowledge/uploads/{}", file_name),
            size: contents.len() as u64,
            processed: true,
        })
    }

    async fn list_files(&self) -> Result<KnowledgeFileList> {
        self.record("list_files");
        match self.lock().files.clone() {
            Some(scripted) => scripted.into_result(),
            None => Ok(KnowledgeFileList::default()),
        }
    }

    async fn delete_file(&self, file_name: &str) -> Result<()> {
        self.record("delete_file");
        let failure = self.lock().fail_delete_file.clone();
        if let Some((status, detail)) = failure {
            return Err(MresearchError::Api { status, detail }.into());
        }
        let mut state = self.lock();
        if let Some(Scripted::Ok(list)) = state.files.as_mut() {
            list.files.retain(|f: &KnowledgeFile| f.name != file_name);
            list.total = list.files.len();
        }
        Ok(())
    }

    async fn reindex(&self) -> Result<()> {
        self.record("reindex");
        let failure = self.lock().fail_reindex.clone();
        match failure {
            Some((status, detail)) => Err(MresearchError::Api { status, detail }.into()),
            None => Ok(()),
        }
    }
}
