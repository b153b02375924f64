//! mresearch - Market Research AI client library
//!
//! This library provides the client side of a multi-agent market research
//! service: starting research jobs and following them to completion,
//! archiving reports locally, aggregating analytics, and managing the
//! service's knowledge base.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `api`: HTTP client, wire types, and the backend traits
//! - `research`: research coordination store with job status polling
//! - `knowledge`: knowledge base coordination store
//! - `analytics`: analytics aggregate folded from terminal job events
//! - `storage`: versioned SQLite record store
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Command handlers used by the binary
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use mresearch::analytics::AnalyticsStore;
//! use mresearch::api::{ApiClient, ResearchRequest};
//! use mresearch::research::ResearchStore;
//! use mresearch::storage::LocalStore;
//! use mresearch::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/config.yaml", &Default::default())?;
//!     config.validate()?;
//!
//!     let storage = LocalStore::open(config.storage.path.as_deref())?;
//!     let client = Arc::new(ApiClient::new(&config.api, storage.auth_token()?)?);
//!     let research = ResearchStore::new(
//!         client,
//!         storage.clone(),
//!         Arc::new(AnalyticsStore::new(storage)),
//!         config.polling.interval(),
//!     );
//!
//!     let request = ResearchRequest::from_template("Sustainable packaging solutions");
//!     let job = research.start_research(request).await?;
//!     println!("started {}", job.research_id);
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod knowledge;
pub mod research;
pub mod storage;

// Re-export commonly used types
pub use analytics::{Analytics, AnalyticsStore};
pub use api::{ApiClient, JobStatus, ResearchJob, ResearchRequest};
pub use config::Config;
pub use error::{MresearchError, Result};
pub use knowledge::KnowledgeStore;
pub use research::ResearchStore;
pub use storage::LocalStore;
