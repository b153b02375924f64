//! HTTP client for the Market Research AI service
//!
//! This module wraps every endpoint the client consumes behind two traits,
//! [`ResearchBackend`] and [`KnowledgeBackend`], so the coordination stores
//! can be driven by the real [`ApiClient`] or by the in-process
//! [`fake::FakeBackend`] in tests.

use crate::config::ApiConfig;
use crate::error::{MresearchError, Result};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use url::Url;

pub mod fake;
pub mod types;

pub use types::{
    HealthStatus, JobStatus, KnowledgeFile, KnowledgeFileList, KnowledgeStats, MessageResponse,
    ResearchHistoryItem, ResearchHistoryPage, ResearchJob, ResearchProgress, ResearchRequest,
    ResearchResult, TaskProgress, TaskStatus, UploadResponse,
};

/// Token sent when no token has been stored locally
pub const DEFAULT_AUTH_TOKEN: &str = "dev-token";

/// Research endpoints of the service
#[async_trait]
pub trait ResearchBackend: Send + Sync {
    /// `POST /research/start`
    async fn start_research(&self, request: &ResearchRequest) -> Result<ResearchJob>;

    /// `GET /research/{id}/status`
    async fn research_status(&self, research_id: &str) -> Result<ResearchJob>;

    /// `GET /research/{id}/result`
    async fn research_result(&self, research_id: &str) -> Result<ResearchResult>;

    /// `GET /research/history?limit&offset`
    async fn research_history(&self, limit: usize, offset: usize) -> Result<ResearchHistoryPage>;

    /// `DELETE /research/{id}`
    async fn delete_research(&self, research_id: &str) -> Result<()>;

    /// `GET /research/{id}/download-pdf`
    async fn download_pdf(&self, research_id: &str) -> Result<Bytes>;
}

/// Knowledge base endpoints of the service
#[async_trait]
pub trait KnowledgeBackend: Send + Sync {
    /// `GET /knowledge/stats`
    async fn knowledge_stats(&self) -> Result<KnowledgeStats>;

    /// `POST /knowledge/upload` as multipart form field `file`
    async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> Result<UploadResponse>;

    /// `GET /knowledge/files`
    async fn list_files(&self) -> Result<KnowledgeFileList>;

    /// `DELETE /knowledge/files/{name}`
    async fn delete_file(&self, file_name: &str) -> Result<()>;

    /// `POST /knowledge/reindex`
    async fn reindex(&self) -> Result<()>;
}

/// reqwest-backed client for the research service
///
/// Every request carries `Authorization: Bearer <token>`. Non-success
/// responses are converted into [`MresearchError::Api`] carrying the
/// service's `detail` message when one is present.
///
/// # Examples
///
/// ```
/// use mresearch::api::ApiClient;
/// use mresearch::config::ApiConfig;
///
/// let client = ApiClient::new(&ApiConfig::default(), "dev-token").unwrap();
/// assert_eq!(client.base_url().as_str(), "http://localhost:8000/");
/// ```
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    /// Create a client for the configured base URL
    ///
    /// # Errors
    ///
    /// Returns error if the base URL does not parse or the HTTP client
    /// cannot be built
    pub fn new(config: &ApiConfig, token: impl Into<String>) -> Result<Self> {
        let base_url = normalize_base_url(&config.base_url)?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| MresearchError::Config(format!("Failed to create HTTP client: {}", e)))?;

        tracing::debug!("Initialized API client: base_url={}", base_url);

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Base URL every endpoint path is joined onto
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus> {
        let response = self.send(self.client.get(self.endpoint("health")?)).await?;
        decode(response).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MresearchError::Config(format!("Invalid endpoint path {}: {}", path, e)).into())
    }

    fn endpoint_segments(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MresearchError::Config(format!("Base URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        tracing::debug!("{} {}", status.as_u16(), response.url());

        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<types::ErrorPayload>(&body)
            .ok()
            .and_then(|payload| payload.message());
        Err(MresearchError::Api {
            status: status.as_u16(),
            detail,
        }
        .into())
    }
}

#[async_trait]
impl ResearchBackend for ApiClient {
    async fn start_research(&self, request: &ResearchRequest) -> Result<ResearchJob> {
        let url = self.endpoint("research/start")?;
        tracing::info!("Starting research on topic: {}", request.research_topic);
        let response = self.send(self.client.post(url).json(request)).await?;
        decode(response).await
    }

    async fn research_status(&self, research_id: &str) -> Result<ResearchJob> {
        let url = self.endpoint_segments(&["research", research_id, "status"])?;
        let response = self.send(self.client.get(url)).await?;
        decode(response).await
    }

    async fn research_result(&self, research_id: &str) -> Result<ResearchResult> {
        let url = self.endpoint_segments(&["research", research_id, "result"])?;
        let response = self.send(self.client.get(url)).await?;
        decode(response).await
    }

    async fn research_history(&self, limit: usize, offset: usize) -> Result<ResearchHistoryPage> {
        let url = self.endpoint("research/history")?;
        let request = self
            .client
            .get(url)
            .query(&[("limit", limit), ("offset", offset)]);
        let response = self.send(request).await?;
        decode(response).await
    }

    async fn delete_research(&self, research_id: &str) -> Result<()> {
        let url = self.endpoint_segments(&["research", research_id])?;
        let response = self.send(self.client.delete(url)).await?;
        acknowledge(response).await;
        Ok(())
    }

    async fn download_pdf(&self, research_id: &str) -> Result<Bytes> {
        let url = self.endpoint_segments(&["research", research_id, "download-pdf"])?;
        let response = self.send(self.client.get(url)).await?;
        Ok(response.bytes().await?)
    }
}

#[async_trait]
impl KnowledgeBackend for ApiClient {
    async fn knowledge_stats(&self) -> Result<KnowledgeStats> {
        let response = self
            .send(self.client.get(self.endpoint("knowledge/stats")?))
            .await?;
        decode(response).await
    }

    async fn upload_file(&self, file_name: &str, contents: Vec<u8>) -> Result<UploadResponse> {
        let part = reqwest::multipart::Part::bytes(contents).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new().part("file", part);
        tracing::info!("Uploading knowledge document: {}", file_name);
        let response = self
            .send(self.client.post(self.endpoint("knowledge/upload")?).multipart(form))
            .await?;
        decode(response).await
    }

    async fn list_files(&self) -> Result<KnowledgeFileList> {
        let response = self
            .send(self.client.get(self.endpoint("knowledge/files")?))
            .await?;
        decode(response).await
    }

    async fn delete_file(&self, file_name: &str) -> Result<()> {
        let url = self.endpoint_segments(&["knowledge", "files", file_name])?;
        let response = self.send(self.client.delete(url)).await?;
        acknowledge(response).await;
        Ok(())
    }

    async fn reindex(&self) -> Result<()> {
        let response = self
            .send(self.client.post(self.endpoint("knowledge/reindex")?))
            .await?;
        acknowledge(response).await;
        Ok(())
    }
}

/// Decode a JSON response body into `T`
async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Log the service's acknowledgement message; an empty or non-JSON body is fine
async fn acknowledge(response: Response) {
    match response.json::<MessageResponse>().await {
        Ok(ack) if !ack.message.is_empty() => tracing::debug!("Service: {}", ack.message),
        _ => {}
    }
}

/// Parse a base URL, forcing a trailing slash so relative joins keep any
/// path prefix (for example a reverse proxy mounting the API under `/api`)
pub fn normalize_base_url(raw: &str) -> Result<Url> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&with_slash)
        .map_err(|e| MresearchError::Config(format!("Invalid API URL {}: {}", raw, e)).into())
}

/// Read a file from disk for upload, returning its base name and contents
pub fn read_upload(path: &Path) -> Result<(String, Vec<u8>)> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| MresearchError::Validation(format!("Not a file path: {}", path.display())))?
        .to_string();
    let contents = std::fs::read(path)?;
    Ok((file_name, contents))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_for(base: &str) -> ApiClient {
        let config = ApiConfig {
            base_url: base.to_string(),
            ..ApiConfig::default()
        };
        ApiClient::new(&config, DEFAULT_AUTH_TOKEN).unwrap()
    }

    #[test]
    fn test_normalize_base_url_adds_trailing_slash() {
        let url = normalize_base_url("http://localhost:8000/api").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/");
    }

    #[test]
    fn test_normalize_base_url_rejects_garbage() {
        assert!(normalize_base_url("not a url").is_err());
    }

    #[test]
    fn test_endpoint_preserves_path_prefix() {
        let client = client_for("http://localhost:8000/api");
        let url = client.endpoint("research/start").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/research/start");
    }

    #[test]
    fn test_endpoint_segments_escape_file_names() {
        let client = client_for("http://localhost:8000");
        let url = client
            .endpoint_segments(&["knowledge", "files", "q1 report.pdf"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8000/knowledge/files/q1%20report.pdf"
        );
    }

    #[test]
    fn test_read_upload_returns_base_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "hello").unwrap();

        let (name, contents) = read_upload(&path).unwrap();
        assert_eq!(name, "notes.md");
        assert_eq!(contents, b"hello");
    }
}
