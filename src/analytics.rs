//! Research analytics aggregate
//!
//! Folds terminal job events into running counters and a bounded
//! recent-activity log, persisted under `research_analytics`.
//!
//! The average completion time is a two-point running average:
//! every new duration is averaged with the previous average, so recent
//! jobs weigh far more than old ones. It is not the arithmetic mean over
//! all completed jobs.

use crate::api::types::timestamp;
use crate::api::JobStatus;
use crate::error::Result;
use crate::storage::{keys, LocalStore};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;

/// Maximum number of entries kept in the recent-activity log
pub const MAX_RECENT_ACTIVITY: usize = 10;

/// One entry of the recent-activity log
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    /// Research job identifier
    pub id: String,
    /// Human label, e.g. "Report Generated"
    pub action: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub topic: String,
}

/// Aggregated research analytics
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Analytics {
    pub total_reports: u64,
    pub completed_reports: u64,
    pub failed_reports: u64,
    /// Two-point running average of completion durations (milliseconds)
    pub average_completion_time: f64,
    /// Newest first, never longer than [`MAX_RECENT_ACTIVITY`]
    #[serde(default)]
    pub recent_activity: Vec<ActivityEntry>,
}

impl Analytics {
    /// Share of finished jobs that completed, as a percentage
    pub fn success_rate(&self) -> f64 {
        let finished = self.completed_reports + self.failed_reports;
        if finished == 0 {
            0.0
        } else {
            self.completed_reports as f64 * 100.0 / finished as f64
        }
    }

    /// Apply one event to the aggregate
    ///
    /// # Examples
    ///
    /// ```
    /// use mresearch::analytics::Analytics;
    /// use mresearch::api::JobStatus;
    ///
    /// let mut analytics = Analytics::default();
    /// analytics.record("r1", JobStatus::Completed, "EV charging", Some(120_000));
    /// analytics.record("r2", JobStatus::Failed, "Packaging", None);
    ///
    /// assert_eq!(analytics.total_reports, 2);
    /// assert_eq!(analytics.completed_reports, 1);
    /// assert_eq!(analytics.failed_reports, 1);
    /// assert_eq!(analytics.average_completion_time, 60_000.0);
    /// assert_eq!(analytics.recent_activity[0].id, "r2");
    /// ```
    pub fn record(
        &mut self,
        research_id: &str,
        status: JobStatus,
        topic: &str,
        duration_ms: Option<u64>,
    ) {
        self.total_reports += 1;
        match status {
            JobStatus::Completed => self.completed_reports += 1,
            JobStatus::Failed => self.failed_reports += 1,
            JobStatus::Pending | JobStatus::Running => {}
        }

        // a zero duration counts as "not supplied"
        if let Some(duration) = duration_ms.filter(|d| *d > 0) {
            self.average_completion_time = (self.average_completion_time + duration as f64) / 2.0;
        }

        let action = if status == JobStatus::Completed {
            "Report Generated"
        } else {
            "Research Failed"
        };
        self.recent_activity.insert(
            0,
            ActivityEntry {
                id: research_id.to_string(),
                action: action.to_string(),
                timestamp: Utc::now(),
                topic: topic.to_string(),
            },
        );
        self.recent_activity.truncate(MAX_RECENT_ACTIVITY);
    }
}

/// In-memory analytics aggregate mirrored to the local store
#[derive(Debug)]
pub struct AnalyticsStore {
    storage: LocalStore,
    analytics: RwLock<Analytics>,
}

impl AnalyticsStore {
    /// Create a store seeded from the persisted aggregate
    ///
    /// Starts from the all-zero aggregate when nothing readable is stored,
    /// so a fresh process keeps counting where the previous one stopped.
    pub fn new(storage: LocalStore) -> Self {
        let initial = match storage.get::<Analytics>(keys::RESEARCH_ANALYTICS) {
            Ok(stored) => stored.unwrap_or_default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable analytics record: {:#}", e);
                Analytics::default()
            }
        };
        Self {
            storage,
            analytics: RwLock::new(initial),
        }
    }

    /// Fold a job event into the aggregate and persist the result
    ///
    /// The in-memory aggregate is updated even if persisting fails; the
    /// storage error is returned to the caller.
    pub fn update_analytics(
        &self,
        research_id: &str,
        status: JobStatus,
        topic: &str,
        duration_ms: Option<u64>,
    ) -> Result<()> {
        let snapshot = {
            let mut analytics = self
                .analytics
                .write()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            analytics.record(research_id, status, topic, duration_ms);
            analytics.clone()
        };

        tracing::debug!(
            "Analytics updated: research_id={}, status={}, total={}",
            research_id,
            status,
            snapshot.total_reports
        );
        self.storage.set(keys::RESEARCH_ANALYTICS, &snapshot)
    }

    /// Load the persisted aggregate, falling back to the in-memory one
    ///
    /// A persisted aggregate replaces the in-memory state. Unreadable
    /// records are logged and ignored.
    pub fn get_analytics(&self) -> Analytics {
        match self.storage.get::<Analytics>(keys::RESEARCH_ANALYTICS) {
            Ok(Some(stored)) => {
                let mut analytics = self
                    .analytics
                    .write()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                *analytics = stored.clone();
                stored
            }
            Ok(None) => self.current(),
            Err(e) => {
                tracing::error!("Failed to load analytics: {:#}", e);
                self.current()
            }
        }
    }

    /// Reset both the in-memory and the persisted aggregate
    pub fn reset(&self) -> Result<()> {
        *self
            .analytics
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Analytics::default();
        self.storage.remove(keys::RESEARCH_ANALYTICS)
    }

    fn current(&self) -> Analytics {
        self.analytics
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}
