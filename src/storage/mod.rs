//! Local record store
//!
//! A small key/value store backed by SQLite that keeps everything the
//! client persists between runs: the auth token, cached history, archived
//! reports, the analytics aggregate, the download counter, and user
//! preferences. Every record is written with a schema version and migrated
//! on read when it is older than the running build (see [`migrate`]).

use crate::api::DEFAULT_AUTH_TOKEN;
use crate::error::{MresearchError, Result};
use anyhow::Context;
use chrono::Utc;
use directories::ProjectDirs;
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub mod migrate;
pub mod types;

pub use migrate::CURRENT_SCHEMA_VERSION;
pub use types::{keys, pdf_file_name, Preferences, StoredReport};

/// Versioned key/value store for client state
#[derive(Debug, Clone)]
pub struct LocalStore {
    db_path: PathBuf,
}

impl LocalStore {
    /// Open the store in the user's data directory
    ///
    /// The `MRESEARCH_STORE` environment variable overrides the location.
    pub fn new() -> Result<Self> {
        if let Ok(override_path) = std::env::var("MRESEARCH_STORE") {
            return Self::new_with_path(override_path);
        }

        let proj_dirs = ProjectDirs::from("com", "mresearch", "mresearch")
            .ok_or_else(|| MresearchError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| MresearchError::Storage(e.to_string()))?;

        let store = Self {
            db_path: data_dir.join("store.db"),
        };
        store.init()?;
        Ok(store)
    }

    /// Open the store at an explicit path, creating parent directories
    ///
    /// # Examples
    ///
    /// ```
    /// use mresearch::storage::LocalStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = LocalStore::new_with_path(dir.path().join("store.db")).unwrap();
    /// assert_eq!(store.auth_token().unwrap(), "dev-token");
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for store")
                .map_err(|e| MresearchError::Storage(e.to_string()))?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    /// Open the configured store, or the default one when no path is set
    pub fn open(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::new_with_path(path),
            None => Self::new(),
        }
    }

    /// Location of the SQLite file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Connection::open(&self.db_path)
            .context("Failed to open store")
            .map_err(|e| MresearchError::Storage(e.to_string()).into())
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                key TEXT PRIMARY KEY,
                schema_version INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                value TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| MresearchError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Read and deserialize a record, migrating it first when needed
    ///
    /// Returns `Ok(None)` when the key is absent.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(value) = self.get_value(key)? else {
            return Ok(None);
        };
        let typed = serde_json::from_value(value)
            .with_context(|| format!("Failed to decode record '{}'", key))
            .map_err(|e| MresearchError::Storage(format!("{:#}", e)))?;
        Ok(Some(typed))
    }

    /// Read a record as raw JSON at the current schema version
    pub fn get_value(&self, key: &str) -> Result<Option<Value>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT schema_version, value FROM records WHERE key = ?",
                params![key],
                |row| Ok((row.get::<_, u32>(0)?, raw_json(row.get_ref(1)?))),
            )
            .optional()
            .context("Failed to query record")
            .map_err(|e| MresearchError::Storage(e.to_string()))?;

        let Some((version, raw)) = row else {
            return Ok(None);
        };

        let stored: Value = serde_json::from_str(&raw)
            .with_context(|| format!("Record '{}' holds invalid JSON", key))
            .map_err(|e| MresearchError::Storage(format!("{:#}", e)))?;

        if version == CURRENT_SCHEMA_VERSION {
            return Ok(Some(stored));
        }

        let migrated = migrate::migrate(key, version, stored)?;
        write_value(&conn, key, CURRENT_SCHEMA_VERSION, &migrated)?;
        tracing::info!(
            "Migrated record '{}' from schema version {} to {}",
            key,
            version,
            CURRENT_SCHEMA_VERSION
        );
        Ok(Some(migrated))
    }

    /// Serialize and write a record at the current schema version
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let conn = self.connect()?;
        write_value(&conn, key, CURRENT_SCHEMA_VERSION, &value)
    }

    /// Delete a record; deleting an absent key is not an error
    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = self.connect()?;
        conn.execute("DELETE FROM records WHERE key = ?", params![key])
            .context("Failed to delete record")
            .map_err(|e| MresearchError::Storage(e.to_string()))?;
        Ok(())
    }

    /// All stored keys in alphabetical order
    pub fn keys(&self) -> Result<Vec<String>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT key FROM records ORDER BY key")
            .context("Failed to prepare statement")
            .map_err(|e| MresearchError::Storage(e.to_string()))?;
        let keys = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .context("Failed to query keys")
            .map_err(|e| MresearchError::Storage(e.to_string()))?
            .flatten()
            .collect();
        Ok(keys)
    }

    /// Ingest a dashboard `localStorage` dump as schema version 0 records
    ///
    /// Values are migrated lazily on their next read. Returns the number of
    /// records imported.
    pub fn import_legacy(&self, dump: &serde_json::Map<String, Value>) -> Result<usize> {
        let mut conn = self.connect()?;
        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| MresearchError::Storage(e.to_string()))?;

        for (key, value) in dump {
            write_value(&tx, key, 0, value)?;
        }

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| MresearchError::Storage(e.to_string()))?;

        tracing::info!("Imported {} legacy records", dump.len());
        Ok(dump.len())
    }

    /// Bearer token sent with every request, `dev-token` when unset
    pub fn auth_token(&self) -> Result<String> {
        Ok(self
            .get::<String>(keys::AUTH_TOKEN)?
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_AUTH_TOKEN.to_string()))
    }

    pub fn set_auth_token(&self, token: &str) -> Result<()> {
        self.set(keys::AUTH_TOKEN, token)
    }

    /// Number of PDF reports downloaded so far
    pub fn downloads_count(&self) -> Result<u64> {
        Ok(self.get::<u64>(keys::DOWNLOADS_COUNT)?.unwrap_or(0))
    }

    /// Increment the download counter and return the new value
    pub fn increment_downloads(&self) -> Result<u64> {
        let count = self.downloads_count()? + 1;
        self.set(keys::DOWNLOADS_COUNT, &count)?;
        Ok(count)
    }

    /// User preferences with defaults for unset keys
    pub fn preferences(&self) -> Result<Preferences> {
        let defaults = Preferences::default();
        Ok(Preferences {
            api_url: self.get(keys::API_URL)?,
            username: self.get(keys::USERNAME)?.unwrap_or(defaults.username),
            email: self.get(keys::EMAIL)?.unwrap_or(defaults.email),
            notifications: self
                .get(keys::NOTIFICATIONS)?
                .unwrap_or(defaults.notifications),
            auto_refresh: self
                .get(keys::AUTO_REFRESH)?
                .unwrap_or(defaults.auto_refresh),
        })
    }

    pub fn save_preferences(&self, prefs: &Preferences) -> Result<()> {
        match &prefs.api_url {
            Some(url) => self.set(keys::API_URL, url)?,
            None => self.remove(keys::API_URL)?,
        }
        self.set(keys::USERNAME, &prefs.username)?;
        self.set(keys::EMAIL, &prefs.email)?;
        self.set(keys::NOTIFICATIONS, &prefs.notifications)?;
        self.set(keys::AUTO_REFRESH, &prefs.auto_refresh)?;
        Ok(())
    }

    /// Drop the cached research history
    pub fn clear_history(&self) -> Result<()> {
        self.remove(keys::RESEARCH_HISTORY)
    }
}

/// JSON text of a stored value
///
/// Stores created before the column was declared `TEXT` kept bare numbers
/// with numeric affinity, so those are turned back into JSON text here.
fn raw_json(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) | ValueRef::Blob(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Null => "null".to_string(),
    }
}

fn write_value(conn: &Connection, key: &str, version: u32, value: &Value) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    conn.execute(
        "INSERT INTO records (key, schema_version, updated_at, value)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(key) DO UPDATE SET
            schema_version = excluded.schema_version,
            updated_at = excluded.updated_at,
            value = excluded.value",
        params![key, version, Utc::now().to_rfc3339(), raw],
    )
    .context("Failed to write record")
    .map_err(|e| MresearchError::Storage(e.to_string()))?;
    Ok(())
}
