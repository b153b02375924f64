//! Research coordination store
//!
//! [`ResearchStore`] holds the job being followed, drives a fixed-interval
//! status poll until the job reaches a terminal state, archives completed
//! jobs in the local store, and folds terminal events into analytics.
//!
//! # Polling
//!
//! A store owns at most one polling task. Starting a poll aborts the
//! previous one, so the last job asked for wins and nothing is queued.
//! The first fetch happens one period after the poll starts. A failed fetch
//! is logged and retried on the next tick. A `completed` or `failed` status
//! is archived and recorded, published, and then ends the task.
//!
//! Snapshots are published on a `tokio::sync::watch` channel so callers can
//! re-render whenever the followed job changes.

use crate::analytics::AnalyticsStore;
use crate::api::{JobStatus, ResearchBackend, ResearchJob, ResearchRequest, ResearchResult};
use crate::error::{user_message, Result};
use crate::storage::{keys, LocalStore, StoredReport};

use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub mod state;

pub use state::{filter_history, merge_completed, ReportSummary, ResearchState};

/// Topic recorded for jobs whose topic was never seen by this store
pub const UNKNOWN_TOPIC: &str = "Untitled research";

struct Shared {
    backend: Arc<dyn ResearchBackend>,
    storage: LocalStore,
    analytics: Arc<AnalyticsStore>,
    state: RwLock<ResearchState>,
    topics: Mutex<HashMap<String, String>>,
    poll_generation: AtomicU64,
    updates: watch::Sender<Option<ResearchJob>>,
}

impl Shared {
    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, ResearchState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, ResearchState> {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_topics(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.topics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record job topics in memory and in the local store
    ///
    /// Persisting lets a later process archive the job under its real topic.
    fn remember_topics<'a>(&self, pairs: impl IntoIterator<Item = (&'a str, &'a str)>) {
        let mut topics = self.lock_topics();
        let mut changed = false;
        for (research_id, topic) in pairs {
            let previous = topics.insert(research_id.to_string(), topic.to_string());
            changed |= previous.as_deref() != Some(topic);
        }
        if !changed {
            return;
        }
        let mut stored = self.stored_topics();
        stored.extend(topics.iter().map(|(id, topic)| (id.clone(), topic.clone())));
        if let Err(e) = self.storage.set(keys::RESEARCH_TOPICS, &stored) {
            tracing::warn!("Failed to persist research topics: {:#}", e);
        }
    }

    fn forget_topic(&self, research_id: &str) {
        self.lock_topics().remove(research_id);
        let mut stored = self.stored_topics();
        if stored.remove(research_id).is_some() {
            if let Err(e) = self.storage.set(keys::RESEARCH_TOPICS, &stored) {
                tracing::warn!("Failed to persist research topics: {:#}", e);
            }
        }
    }

    fn stored_topics(&self) -> BTreeMap<String, String> {
        match self.storage.get(keys::RESEARCH_TOPICS) {
            Ok(topics) => topics.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Failed to read research topics: {:#}", e);
                BTreeMap::new()
            }
        }
    }

    fn topic_for(&self, research_id: &str) -> String {
        if let Some(topic) = self.lock_topics().get(research_id) {
            return topic.clone();
        }
        self.stored_topics()
            .remove(research_id)
            .unwrap_or_else(|| UNKNOWN_TOPIC.to_string())
    }

    fn set_error(&self, message: String) {
        let mut state = self.write_state();
        state.error = Some(message);
        state.is_loading = false;
    }

    /// Replace the followed job wholesale and notify subscribers
    fn replace_current(&self, job: Option<ResearchJob>) {
        let mut state = self.write_state();
        state.current_research = job.clone();
        self.updates.send_replace(job);
    }

    /// Invalidate any running poll and return the generation for a new one
    ///
    /// Bumped under the state lock so a stale tick can never publish after
    /// the bump.
    fn next_poll_generation(&self) -> u64 {
        let _state = self.write_state();
        self.poll_generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current_poll(&self, generation: u64) -> bool {
        self.poll_generation.load(Ordering::SeqCst) == generation
    }

    /// Publish a polled snapshot unless the poll was superseded
    fn publish_polled(&self, generation: u64, job: ResearchJob) -> bool {
        let mut state = self.write_state();
        if !self.is_current_poll(generation) {
            return false;
        }
        state.current_research = Some(job.clone());
        self.updates.send_replace(Some(job));
        true
    }

    async fn poll_until_terminal(&self, research_id: &str, period: Duration, generation: u64) {
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match self.backend.research_status(research_id).await {
                Ok(job) => {
                    let terminal = job.status.is_terminal();
                    tracing::debug!(
                        "Polled research {}: status={}, progress={}%",
                        research_id,
                        job.status,
                        job.progress_percentage()
                    );
                    if terminal {
                        if !self.is_current_poll(generation) {
                            break;
                        }
                        // archived before the terminal snapshot is published
                        self.finish(&job);
                        self.publish_polled(generation, job);
                        break;
                    }
                    if !self.publish_polled(generation, job) {
                        break;
                    }
                }
                Err(e) => {
                    tracing::warn!("Polling error for research {}: {:#}", research_id, e);
                }
            }
        }

        tracing::info!("Stopped polling research {}", research_id);
    }

    /// Terminal bookkeeping: archive completed jobs and record analytics
    fn finish(&self, job: &ResearchJob) {
        let topic = self.topic_for(&job.research_id);
        match job.status {
            JobStatus::Completed => {
                if let Err(e) = save_report(&self.storage, job, &topic) {
                    tracing::error!("Failed to archive report {}: {:#}", job.research_id, e);
                }
                if let Err(e) = self.analytics.update_analytics(
                    &job.research_id,
                    JobStatus::Completed,
                    &topic,
                    job.duration_ms(),
                ) {
                    tracing::error!("Failed to record analytics: {:#}", e);
                }
                tracing::info!("Research {} completed", job.research_id);
            }
            JobStatus::Failed => {
                if let Err(e) =
                    self.analytics
                        .update_analytics(&job.research_id, JobStatus::Failed, &topic, None)
                {
                    tracing::error!("Failed to record analytics: {:#}", e);
                }
                tracing::warn!(
                    "Research {} failed: {}",
                    job.research_id,
                    job.error.as_deref().unwrap_or("no error message")
                );
            }
            JobStatus::Pending | JobStatus::Running => {}
        }
    }
}

/// Archive a job, replacing any earlier archive of the same identifier
fn save_report(storage: &LocalStore, job: &ResearchJob, topic: &str) -> Result<()> {
    let mut reports: Vec<StoredReport> = storage.get(keys::RESEARCH_REPORTS)?.unwrap_or_default();
    reports.retain(|r| r.job.research_id != job.research_id);
    reports.insert(
        0,
        StoredReport {
            job: job.clone(),
            research_topic: topic.to_string(),
            saved_at: Utc::now(),
        },
    );
    storage.set(keys::RESEARCH_REPORTS, &reports)
}

/// Coordination store for research jobs
///
/// Polling requires a running tokio runtime. Dropping the store aborts any
/// active polling task.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use mresearch::analytics::AnalyticsStore;
/// use mresearch::api::fake::{FakeBackend, Scripted};
/// use mresearch::api::{JobStatus, ResearchRequest};
/// use mresearch::research::ResearchStore;
/// use mresearch::storage::LocalStore;
///
/// # tokio_test::block_on(async {
/// let dir = tempfile::tempdir().unwrap();
/// let storage = LocalStore::new_with_path(dir.path().join("store.db")).unwrap();
/// let backend = Arc::new(FakeBackend::new());
/// backend.set_start(Scripted::Ok(FakeBackend::job("r1", JobStatus::Running)));
///
/// let store = ResearchStore::new(
///     backend,
///     storage.clone(),
///     Arc::new(AnalyticsStore::new(storage)),
///     Duration::from_secs(2),
/// );
/// let request = ResearchRequest::from_template("Remote work productivity tools");
/// let job = store.start_research(request).await.unwrap();
/// assert_eq!(job.status, JobStatus::Running);
/// assert!(store.is_polling());
///
/// store.set_current_research(None);
/// assert!(!store.is_polling());
/// # });
/// ```
pub struct ResearchStore {
    shared: Arc<Shared>,
    poll_interval: Duration,
    poller: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ResearchStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResearchStore")
            .field("poll_interval", &self.poll_interval)
            .field("is_polling", &self.is_polling())
            .finish()
    }
}

impl ResearchStore {
    /// Create a store polling every `poll_interval`
    pub fn new(
        backend: Arc<dyn ResearchBackend>,
        storage: LocalStore,
        analytics: Arc<AnalyticsStore>,
        poll_interval: Duration,
    ) -> Self {
        let (updates, _) = watch::channel(None);
        Self {
            shared: Arc::new(Shared {
                backend,
                storage,
                analytics,
                state: RwLock::new(ResearchState::default()),
                topics: Mutex::new(HashMap::new()),
                poll_generation: AtomicU64::new(0),
                updates,
            }),
            poll_interval,
            poller: Mutex::new(None),
        }
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> ResearchState {
        self.shared.read_state().clone()
    }

    /// Receiver notified every time the followed job is replaced
    pub fn subscribe(&self) -> watch::Receiver<Option<ResearchJob>> {
        self.shared.updates.subscribe()
    }

    /// Validate and submit a request, then follow the returned job
    ///
    /// Polling starts when the returned job is pending or running. A job
    /// that is already terminal is archived and recorded right away.
    ///
    /// # Errors
    ///
    /// Returns the validation error without touching the network when the
    /// request is too short, or the backend error. Both are also mirrored
    /// into the store's `error` string.
    pub async fn start_research(&self, request: ResearchRequest) -> Result<ResearchJob> {
        if let Err(e) = request.validate() {
            self.shared.set_error(user_message(&e, "Invalid research request"));
            return Err(e);
        }

        {
            let mut state = self.shared.write_state();
            state.is_loading = true;
            state.error = None;
        }

        let job = match self.shared.backend.start_research(&request).await {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("Failed to start research: {:#}", e);
                self.shared
                    .set_error(user_message(&e, "Failed to start research"));
                return Err(e);
            }
        };

        tracing::info!(
            "Research {} accepted with status {}",
            job.research_id,
            job.status
        );
        self.shared.remember_topics([(
            job.research_id.as_str(),
            request.research_topic.as_str(),
        )]);
        self.shared.write_state().is_loading = false;
        self.shared.replace_current(Some(job.clone()));

        if job.status.is_active() {
            self.poll_research_status(&job.research_id);
        } else {
            self.shared.finish(&job);
        }

        Ok(job)
    }

    /// Start polling `research_id`, cancelling any previous poll
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn poll_research_status(&self, research_id: &str) {
        let mut poller = self.lock_poller();
        if let Some(previous) = poller.take() {
            previous.abort();
        }

        let shared = Arc::clone(&self.shared);
        let generation = shared.next_poll_generation();
        let research_id = research_id.to_string();
        let period = self.poll_interval;
        tracing::info!(
            "Polling research {} every {}ms",
            research_id,
            period.as_millis()
        );
        *poller = Some(tokio::spawn(async move {
            shared
                .poll_until_terminal(&research_id, period, generation)
                .await;
        }));
    }

    /// Cancel the active poll, if any
    pub fn stop_polling(&self) {
        self.shared.next_poll_generation();
        if let Some(handle) = self.lock_poller().take() {
            handle.abort();
            tracing::debug!("Polling cancelled");
        }
    }

    /// Whether a polling task is still running
    pub fn is_polling(&self) -> bool {
        self.lock_poller()
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Replace the followed job; clearing it also stops polling
    pub fn set_current_research(&self, research: Option<ResearchJob>) {
        if research.is_none() {
            self.stop_polling();
        }
        self.shared.replace_current(research);
    }

    /// Fetch a page of history and replace the local list wholesale
    ///
    /// The page is also cached in the local store.
    pub async fn load_history(&self, limit: usize, offset: usize) -> Result<()> {
        match self.shared.backend.research_history(limit, offset).await {
            Ok(page) => {
                self.shared.remember_topics(
                    page.history
                        .iter()
                        .map(|item| (item.research_id.as_str(), item.research_topic.as_str())),
                );
                if let Err(e) = self.shared.storage.set(keys::RESEARCH_HISTORY, &page.history) {
                    tracing::warn!("Failed to cache research history: {:#}", e);
                }
                tracing::debug!("Loaded {} of {} history items", page.history.len(), page.total);
                self.shared.write_state().research_history = page.history;
                Ok(())
            }
            Err(e) => {
                self.shared
                    .write_state()
                    .error = Some(user_message(&e, "Failed to load history"));
                Err(e)
            }
        }
    }

    /// History cached by the last successful [`load_history`](Self::load_history)
    pub fn cached_history(&self) -> Result<Vec<crate::api::ResearchHistoryItem>> {
        Ok(self
            .shared
            .storage
            .get(keys::RESEARCH_HISTORY)?
            .unwrap_or_default())
    }

    /// Archive a job locally, replacing any older archive with the same id
    pub fn save_report_to_storage(&self, job: &ResearchJob, topic: &str) -> Result<()> {
        save_report(&self.shared.storage, job, topic)
    }

    /// Archived reports, most recently saved first
    pub fn get_stored_reports(&self) -> Result<Vec<StoredReport>> {
        Ok(self
            .shared
            .storage
            .get(keys::RESEARCH_REPORTS)?
            .unwrap_or_default())
    }

    /// Archived reports merged with completed entries of the loaded history
    pub fn completed_reports(&self) -> Result<Vec<ReportSummary>> {
        let stored = self.get_stored_reports()?;
        let state = self.shared.read_state();
        Ok(merge_completed(&stored, &state.research_history))
    }

    /// Fetch the final result of a completed job
    pub async fn get_result(&self, research_id: &str) -> Result<ResearchResult> {
        match self.shared.backend.research_result(research_id).await {
            Ok(result) => Ok(result),
            Err(e) => {
                self.shared.write_state().error = Some(user_message(&e, "Failed to load result"));
                Err(e)
            }
        }
    }

    /// Delete a job on the service and forget it locally
    pub async fn delete_research(&self, research_id: &str) -> Result<()> {
        if let Err(e) = self.shared.backend.delete_research(research_id).await {
            self.shared.write_state().error = Some(user_message(&e, "Failed to delete research"));
            return Err(e);
        }

        self.shared
            .write_state()
            .research_history
            .retain(|item| item.research_id != research_id);

        let mut cached = self.cached_history()?;
        cached.retain(|item| item.research_id != research_id);
        self.shared.storage.set(keys::RESEARCH_HISTORY, &cached)?;

        let mut reports = self.get_stored_reports()?;
        reports.retain(|r| r.job.research_id != research_id);
        self.shared.storage.set(keys::RESEARCH_REPORTS, &reports)?;
        self.shared.forget_topic(research_id);

        let following = self
            .shared
            .read_state()
            .current_research
            .as_ref()
            .map(|job| job.research_id == research_id)
            .unwrap_or(false);
        if following {
            self.set_current_research(None);
        }

        tracing::info!("Deleted research {}", research_id);
        Ok(())
    }

    /// Download the PDF export of a job to `path`
    ///
    /// Returns the number of bytes written. Successful downloads increment
    /// the local download counter.
    pub async fn download_pdf(&self, research_id: &str, path: &Path) -> Result<usize> {
        let bytes = match self.shared.backend.download_pdf(research_id).await {
            Ok(bytes) => bytes,
            Err(e) => {
                self.shared.write_state().error = Some(user_message(&e, "Failed to download PDF"));
                return Err(e);
            }
        };

        tokio::fs::write(path, &bytes).await?;
        let count = self.shared.storage.increment_downloads()?;
        tracing::info!(
            "Downloaded report {} to {} ({} downloads total)",
            research_id,
            path.display(),
            count
        );
        Ok(bytes.len())
    }

    /// Clear the store's error string
    pub fn clear_error(&self) {
        self.shared.write_state().error = None;
    }

    fn lock_poller(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.poller
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ResearchStore {
    fn drop(&mut self) {
        self.stop_polling();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::Analytics;
    use crate::api::fake::{FakeBackend, Scripted};
    use crate::api::{ResearchHistoryItem, ResearchHistoryPage};
    use tempfile::TempDir;

    const TICK: Duration = Duration::from_millis(20);

    struct Harness {
        store: ResearchStore,
        backend: Arc<FakeBackend>,
        storage: LocalStore,
        _dir: TempDir,
    }

    fn harness() -> Harness {
        let dir = TempDir::new().unwrap();
        let storage = LocalStore::new_with_path(dir.path().join("store.db")).unwrap();
        let backend = Arc::new(FakeBackend::new());
        let store = ResearchStore::new(
            backend.clone(),
            storage.clone(),
            Arc::new(AnalyticsStore::new(storage.clone())),
            TICK,
        );
        Harness {
            store,
            backend,
            storage,
            _dir: dir,
        }
    }

    fn request() -> ResearchRequest {
        ResearchRequest::new("EV charging", "Analyze the EV charging market")
    }

    async fn wait_until_idle(store: &ResearchStore) {
        for _ in 0..200 {
            if !store.is_polling() {
                return;
            }
            tokio::time::sleep(TICK / 2).await;
        }
        panic!("polling did not stop");
    }

    #[tokio::test]
    async fn test_short_request_rejected_before_network() {
        let h = harness();
        let err = h
            .store
            .start_research(ResearchRequest::new("EV", "Analyze the EV charging market"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Topic must be at least 3 characters"));

        let err = h
            .store
            .start_research(ResearchRequest::new("EV charging", "short"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Request must be at least 10 characters"));

        assert!(h.backend.calls().is_empty());
        assert!(!h.store.is_polling());
        assert_eq!(
            h.store.snapshot().error.as_deref(),
            Some("Request must be at least 10 characters")
        );
    }

    #[tokio::test]
    async fn test_start_failure_sets_error_without_timer() {
        let h = harness();
        h.backend.set_start(Scripted::Err(
            500,
            Some("Research crew not initialized".to_string()),
        ));

        assert!(h.store.start_research(request()).await.is_err());

        let state = h.store.snapshot();
        assert_eq!(state.error.as_deref(), Some("Research crew not initialized"));
        assert!(!state.is_loading);
        assert!(state.current_research.is_none());
        assert!(!h.store.is_polling());
    }

    #[tokio::test]
    async fn test_start_failure_without_detail_uses_fallback() {
        let h = harness();
        h.backend.set_start(Scripted::Err(502, None));

        assert!(h.store.start_research(request()).await.is_err());
        assert_eq!(
            h.store.snapshot().error.as_deref(),
            Some("Failed to start research")
        );
    }

    #[tokio::test]
    async fn test_running_job_polls_until_completed() {
        let h = harness();
        h.backend
            .set_start(Scripted::Ok(FakeBackend::job("r1", JobStatus::Pending)));
        h.backend.push_status(FakeBackend::job("r1", JobStatus::Running));
        h.backend
            .push_status(FakeBackend::job("r1", JobStatus::Completed));

        h.store.start_research(request()).await.unwrap();
        assert!(h.store.is_polling());

        wait_until_idle(&h.store).await;
        let polls = h.backend.call_count("status");
        assert_eq!(polls, 2);

        // no fetches after the terminal one
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(h.backend.call_count("status"), polls);

        let state = h.store.snapshot();
        assert_eq!(
            state.current_research.unwrap().status,
            JobStatus::Completed
        );

        let reports = h.store.get_stored_reports().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].research_topic, "EV charging");

        let analytics: Analytics = h.storage.get(keys::RESEARCH_ANALYTICS).unwrap().unwrap();
        assert_eq!(analytics.completed_reports, 1);
        assert!(analytics.average_completion_time > 0.0);
    }

    #[tokio::test]
    async fn test_failed_on_second_tick_stops_without_report() {
        let h = harness();
        h.backend
            .set_start(Scripted::Ok(FakeBackend::job("r1", JobStatus::Running)));
        h.backend.push_status(FakeBackend::job("r1", JobStatus::Running));
        h.backend.push_status(FakeBackend::job("r1", JobStatus::Failed));

        h.store.start_research(request()).await.unwrap();
        wait_until_idle(&h.store).await;
        tokio::time::sleep(TICK * 5).await;

        assert_eq!(h.backend.call_count("status"), 2);
        assert!(h.store.get_stored_reports().unwrap().is_empty());

        let analytics: Analytics = h.storage.get(keys::RESEARCH_ANALYTICS).unwrap().unwrap();
        assert_eq!(analytics.failed_reports, 1);
        assert_eq!(analytics.completed_reports, 0);
    }

    #[tokio::test]
    async fn test_poll_errors_are_swallowed_and_retried() {
        let h = harness();
        h.backend
            .set_start(Scripted::Ok(FakeBackend::job("r1", JobStatus::Running)));
        h.backend.push_status_error(503);
        h.backend.push_status_error(503);
        h.backend
            .push_status(FakeBackend::job("r1", JobStatus::Completed));

        h.store.start_research(request()).await.unwrap();
        wait_until_idle(&h.store).await;

        assert_eq!(h.backend.call_count("status"), 3);
        assert!(h.store.snapshot().error.is_none());
        assert_eq!(h.store.get_stored_reports().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_clearing_current_research_stops_polling() {
        let h = harness();
        h.backend
            .set_start(Scripted::Ok(FakeBackend::job("r1", JobStatus::Running)));
        h.backend.push_status(FakeBackend::job("r1", JobStatus::Running));

        h.store.start_research(request()).await.unwrap();
        assert!(h.store.is_polling());

        h.store.set_current_research(None);
        assert!(!h.store.is_polling());
        assert!(h.store.snapshot().current_research.is_none());

        let polls = h.backend.call_count("status");
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(h.backend.call_count("status"), polls);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cleared_job_is_not_republished_by_poller() {
        let h = harness();
        h.backend.push_status(FakeBackend::job("r1", JobStatus::Running));

        for _ in 0..5 {
            h.store.poll_research_status("r1");
            tokio::time::sleep(TICK + TICK / 2).await;
            h.store.set_current_research(None);
            tokio::time::sleep(TICK * 2).await;
            assert!(h.store.snapshot().current_research.is_none());
            assert!(h.store.subscribe().borrow().is_none());
        }
    }

    #[tokio::test]
    async fn test_topic_is_known_to_a_later_store() {
        let h = harness();
        h.backend
            .set_start(Scripted::Ok(FakeBackend::job("r1", JobStatus::Running)));
        h.store.start_research(request()).await.unwrap();
        h.store.stop_polling();

        // a second process watching the same job
        let watcher = ResearchStore::new(
            h.backend.clone(),
            h.storage.clone(),
            Arc::new(AnalyticsStore::new(h.storage.clone())),
            TICK,
        );
        h.backend
            .push_status(FakeBackend::job("r1", JobStatus::Completed));
        watcher.poll_research_status("r1");
        wait_until_idle(&watcher).await;

        let reports = watcher.get_stored_reports().unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].research_topic, "EV charging");

        let analytics: Analytics = h.storage.get(keys::RESEARCH_ANALYTICS).unwrap().unwrap();
        assert_eq!(analytics.recent_activity[0].topic, "EV charging");
    }

    #[tokio::test]
    async fn test_stop_polling_is_idempotent() {
        let h = harness();
        h.store.stop_polling();
        h.backend.push_status(FakeBackend::job("r1", JobStatus::Running));
        h.store.poll_research_status("r1");
        h.store.stop_polling();
        h.store.stop_polling();
        assert!(!h.store.is_polling());
    }

    #[tokio::test]
    async fn test_new_poll_replaces_previous_one() {
        let h = harness();
        h.backend.push_status(FakeBackend::job("r1", JobStatus::Running));

        h.store.poll_research_status("r1");
        h.store.poll_research_status("r2");
        tokio::time::sleep(TICK * 3 + TICK / 2).await;
        h.store.stop_polling();

        // a single timer at one fetch per tick; two timers would double this
        let polls = h.backend.call_count("status");
        assert!(polls >= 1 && polls <= 4, "unexpected poll count {}", polls);
    }

    #[tokio::test]
    async fn test_first_fetch_waits_one_period() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStore::new_with_path(dir.path().join("store.db")).unwrap();
        let backend = Arc::new(FakeBackend::new());
        backend.push_status(FakeBackend::job("r1", JobStatus::Running));
        let store = ResearchStore::new(
            backend.clone(),
            storage.clone(),
            Arc::new(AnalyticsStore::new(storage)),
            Duration::from_secs(60),
        );

        store.poll_research_status("r1");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.call_count("status"), 0);
        assert!(store.is_polling());
    }

    #[tokio::test]
    async fn test_subscribers_see_each_snapshot() {
        let h = harness();
        h.backend
            .set_start(Scripted::Ok(FakeBackend::job("r1", JobStatus::Running)));
        h.backend
            .push_status(FakeBackend::job("r1", JobStatus::Completed));

        let mut rx = h.store.subscribe();
        h.store.start_research(request()).await.unwrap();

        let status = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                rx.changed().await.unwrap();
                let status = rx.borrow_and_update().as_ref().map(|job| job.status);
                if let Some(status) = status.filter(|s| s.is_terminal()) {
                    return status;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_terminal_start_response_is_recorded_immediately() {
        let h = harness();
        h.backend
            .set_start(Scripted::Ok(FakeBackend::job("r1", JobStatus::Completed)));

        h.store.start_research(request()).await.unwrap();
        assert!(!h.store.is_polling());
        assert_eq!(h.store.get_stored_reports().unwrap().len(), 1);
    }

    #[test]
    fn test_save_report_deduplicates_by_id() {
        let h = harness();
        let mut first = FakeBackend::job("r1", JobStatus::Completed);
        first.result = Some("old".to_string());
        let mut second = first.clone();
        second.result = Some("new".to_string());

        h.store.save_report_to_storage(&first, "EV").unwrap();
        h.store
            .save_report_to_storage(&FakeBackend::job("r2", JobStatus::Completed), "Drones")
            .unwrap();
        h.store.save_report_to_storage(&second, "EV").unwrap();

        let reports = h.store.get_stored_reports().unwrap();
        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].research_id(), "r1");
        assert_eq!(reports[0].job.result.as_deref(), Some("new"));
        assert_eq!(reports[1].research_id(), "r2");
    }

    fn history_page() -> ResearchHistoryPage {
        let item = |id: &str, topic: &str, status| ResearchHistoryItem {
            research_id: id.to_string(),
            research_topic: topic.to_string(),
            status,
            created_at: Utc::now(),
            completed_at: None,
        };
        ResearchHistoryPage {
            history: vec![
                item("r1", "EV charging", JobStatus::Completed),
                item("r2", "Packaging", JobStatus::Failed),
            ],
            total: 2,
            limit: 10,
            offset: 0,
        }
    }

    #[tokio::test]
    async fn test_load_history_replaces_and_caches() {
        let h = harness();
        h.backend.set_history(Scripted::Ok(history_page()));

        h.store.load_history(10, 0).await.unwrap();
        assert_eq!(h.store.snapshot().research_history.len(), 2);
        assert_eq!(h.store.cached_history().unwrap().len(), 2);

        // topics learned from history are used for later terminal events
        h.backend
            .push_status(FakeBackend::job("r1", JobStatus::Completed));
        h.store.poll_research_status("r1");
        wait_until_idle(&h.store).await;
        assert_eq!(
            h.store.get_stored_reports().unwrap()[0].research_topic,
            "EV charging"
        );
    }

    #[tokio::test]
    async fn test_load_history_failure_sets_error() {
        let h = harness();
        h.backend.set_history(Scripted::Err(401, None));
        assert!(h.store.load_history(10, 0).await.is_err());
        assert_eq!(
            h.store.snapshot().error.as_deref(),
            Some("Failed to load history")
        );
        h.store.clear_error();
        assert!(h.store.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_delete_research_forgets_job_everywhere() {
        let h = harness();
        h.backend.set_history(Scripted::Ok(history_page()));
        h.store.load_history(10, 0).await.unwrap();
        h.store
            .save_report_to_storage(&FakeBackend::job("r1", JobStatus::Completed), "EV charging")
            .unwrap();
        h.store
            .set_current_research(Some(FakeBackend::job("r1", JobStatus::Completed)));

        h.store.delete_research("r1").await.unwrap();

        let state = h.store.snapshot();
        assert_eq!(state.research_history.len(), 1);
        assert!(state.current_research.is_none());
        assert_eq!(h.store.cached_history().unwrap().len(), 1);
        assert!(h.store.get_stored_reports().unwrap().is_empty());

        let topics: BTreeMap<String, String> =
            h.storage.get(keys::RESEARCH_TOPICS).unwrap().unwrap();
        assert!(!topics.contains_key("r1"));
    }

    #[tokio::test]
    async fn test_completed_reports_merges_history() {
        let h = harness();
        h.backend.set_history(Scripted::Ok(history_page()));
        h.store.load_history(10, 0).await.unwrap();

        let reports = h.store.completed_reports().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].stored);
    }

    #[tokio::test]
    async fn test_download_pdf_writes_file_and_counts() {
        let h = harness();
        h.backend.set_pdf(b"%PDF-1.4 test");
        let path = h._dir.path().join("report.pdf");

        let written = h.store.download_pdf("r1", &path).await.unwrap();
        assert_eq!(written, 13);
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4 test");
        assert_eq!(h.storage.downloads_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_dropping_store_aborts_poller() {
        let h = harness();
        h.backend.push_status(FakeBackend::job("r1", JobStatus::Running));
        h.store.poll_research_status("r1");
        let backend = h.backend.clone();
        drop(h);

        let polls = backend.call_count("status");
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(backend.call_count("status"), polls);
    }
}
