//! Knowledge base coordination store
//!
//! Wraps the knowledge endpoints and keeps the latest stats and file
//! listing. Successful mutations refresh the state they affect: an upload
//! reloads stats and files, a delete reloads files and stats, and a reindex
//! reloads stats. A failed reload leaves its message in `error` without
//! failing the mutation that triggered it.

use crate::api::{read_upload, KnowledgeBackend, KnowledgeFileList, KnowledgeStats, UploadResponse};
use crate::error::{user_message, Result};

use std::path::Path;
use std::sync::{Arc, RwLock};

#[derive(Debug, Clone, Copy)]
enum Reload {
    Stats,
    Files,
}

/// Observable state of the knowledge store
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeState {
    pub stats: Option<KnowledgeStats>,
    pub files: KnowledgeFileList,
    pub is_loading: bool,
    pub error: Option<String>,
}

/// Coordination store for the knowledge base
pub struct KnowledgeStore {
    backend: Arc<dyn KnowledgeBackend>,
    state: RwLock<KnowledgeState>,
}

impl std::fmt::Debug for KnowledgeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KnowledgeStore")
            .field("state", &self.snapshot())
            .finish()
    }
}

impl KnowledgeStore {
    pub fn new(backend: Arc<dyn KnowledgeBackend>) -> Self {
        Self {
            backend,
            state: RwLock::new(KnowledgeState::default()),
        }
    }

    /// Current state snapshot
    pub fn snapshot(&self) -> KnowledgeState {
        self.state
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Fetch knowledge base statistics
    pub async fn load_stats(&self) -> Result<KnowledgeStats> {
        self.begin();
        match self.backend.knowledge_stats().await {
            Ok(stats) => {
                let mut state = self.write();
                state.stats = Some(stats.clone());
                state.is_loading = false;
                Ok(stats)
            }
            Err(e) => Err(self.fail(e, "Failed to load knowledge stats")),
        }
    }

    /// Upload a document from disk, then refresh stats and files
    pub async fn upload_file(&self, path: &Path) -> Result<UploadResponse> {
        self.begin();
        let uploaded = match read_upload(path) {
            Ok((file_name, contents)) => self.backend.upload_file(&file_name, contents).await,
            Err(e) => Err(e),
        };

        match uploaded {
            Ok(response) => {
                tracing::info!("Uploaded {} ({} bytes)", response.file_path, response.size);
                self.write().is_loading = false;
                self.refresh(&[Reload::Stats, Reload::Files]).await;
                Ok(response)
            }
            Err(e) => Err(self.fail(e, "Failed to upload file")),
        }
    }

    /// Fetch the document listing
    ///
    /// Does not toggle `is_loading`.
    pub async fn load_files(&self) -> Result<KnowledgeFileList> {
        match self.backend.list_files().await {
            Ok(files) => {
                if let Some(message) = &files.error {
                    tracing::warn!("Knowledge listing reported: {}", message);
                }
                self.write().files = files.clone();
                Ok(files)
            }
            Err(e) => Err(self.fail(e, "Failed to load files")),
        }
    }

    /// Delete a document, then refresh files and stats
    ///
    /// Does not toggle `is_loading`.
    pub async fn delete_file(&self, file_name: &str) -> Result<()> {
        if let Err(e) = self.backend.delete_file(file_name).await {
            return Err(self.fail(e, "Failed to delete file"));
        }
        tracing::info!("Deleted knowledge document {}", file_name);
        self.refresh(&[Reload::Files, Reload::Stats]).await;
        Ok(())
    }

    /// Rebuild the knowledge index, then refresh stats
    pub async fn reindex_knowledge(&self) -> Result<()> {
        self.begin();
        if let Err(e) = self.backend.reindex().await {
            return Err(self.fail(e, "Failed to reindex knowledge base"));
        }
        tracing::info!("Knowledge base reindexed");
        self.write().is_loading = false;
        self.refresh(&[Reload::Stats]).await;
        Ok(())
    }

    /// Reload state after a mutation the server already accepted
    ///
    /// Every reload runs even when an earlier one fails. The first failure
    /// stays in `error`; the mutation itself still counts as a success.
    async fn refresh(&self, reloads: &[Reload]) {
        let mut first_error = None;
        for reload in reloads {
            let failed = match reload {
                Reload::Stats => self.load_stats().await.is_err(),
                Reload::Files => self.load_files().await.is_err(),
            };
            if failed && first_error.is_none() {
                first_error = self.snapshot().error;
            }
        }
        if first_error.is_some() {
            self.write().error = first_error;
        }
    }

    pub fn clear_error(&self) {
        self.write().error = None;
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, KnowledgeState> {
        self.state
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin(&self) {
        let mut state = self.write();
        state.is_loading = true;
        state.error = None;
    }

    fn fail(&self, err: anyhow::Error, fallback: &str) -> anyhow::Error {
        tracing::error!("{}: {:#}", fallback, err);
        let mut state = self.write();
        state.error = Some(user_message(&err, fallback));
        state.is_loading = false;
        err
    }
}
