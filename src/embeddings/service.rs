//! Embedding service (§4.F): an async contract satisfied by either the HTTP
//! backend (Ollama-style `/api/embed`, `/api/show`, `/api/pull`,
//! `/api/version`) or the local ONNX model, bounded-concurrency batching,
//! and first-use model bootstrap with progress logging.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::embeddings::e5::{E5Config, E5Embeddings};
use crate::embeddings::EmbeddingModel;
use crate::error::{ConduitError, Result};

/// Async embedding contract; both backends (HTTP service, local ONNX) satisfy
/// this so callers never branch on which one is configured.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
    async fn health_check(&self) -> Result<()>;
    fn dimension(&self) -> usize;
}

// ---- HTTP backend --------------------------------------------------------

pub struct HttpEmbeddingService {
    client: reqwest::Client,
    host: String,
    model: String,
    dimension: usize,
    batch_size: usize,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Deserialize)]
struct ShowResponse {
    #[serde(default)]
    details: Option<serde_json::Value>,
}

impl HttpEmbeddingService {
    pub fn new(host: String, model: String, dimension: usize, batch_size: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("reqwest client"),
            host,
            model,
            dimension,
            batch_size,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), path)
    }

    /// Checks whether the model is already pulled (`/api/show`); if not,
    /// blocks on `/api/pull`, logging progress lines as they stream in (§4.F
    /// first-use bootstrap).
    pub async fn ensure_model_pulled(&self) -> Result<()> {
        let show = self
            .client
            .post(self.url("/api/show"))
            .json(&json!({ "model": self.model }))
            .send()
            .await;

        if let Ok(resp) = show {
            if resp.status().is_success() {
                let _: ShowResponse = resp.json().await.unwrap_or(ShowResponse { details: None });
                return Ok(());
            }
        }

        tracing::info!(model = %self.model, "embedding model not present locally, pulling");
        let mut stream = self
            .client
            .post(self.url("/api/pull"))
            .json(&json!({ "model": self.model, "stream": true }))
            .send()
            .await
            .map_err(dependency_error)?
            .bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(dependency_error)?;
            if let Ok(line) = std::str::from_utf8(&chunk) {
                if let Ok(v) = serde_json::from_str::<serde_json::Value>(line.trim()) {
                    if let Some(status) = v.get("status").and_then(|s| s.as_str()) {
                        tracing::info!(model = %self.model, status, "pulling embedding model");
                    }
                }
            }
        }
        Ok(())
    }

    async fn embed_raw(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({ "model": self.model, "input": texts });
        let resp: EmbedResponse = self
            .client
            .post(self.url("/api/embed"))
            .json(&body)
            .send()
            .await
            .map_err(dependency_error)?
            .error_for_status()
            .map_err(dependency_error)?
            .json()
            .await
            .map_err(dependency_error)?;
        Ok(resp.embeddings)
    }
}

fn dependency_error(e: reqwest::Error) -> ConduitError {
    ConduitError::UnavailableDependency {
        dependency: "embedding".to_string(),
        reason: e.to_string(),
    }
}

#[async_trait]
impl EmbeddingService for HttpEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut result = self.embed_raw(&[text.to_string()]).await?;
        result.pop().ok_or_else(|| ConduitError::MalformedResponse {
            source: "embedding".to_string(),
            reason: "empty embeddings array in response".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size.max(1)) {
            out.extend(self.embed_raw(chunk).await?);
        }
        Ok(out)
    }

    async fn health_check(&self) -> Result<()> {
        let v = self.embed("health check probe").await?;
        if v.len() != self.dimension {
            return Err(ConduitError::MalformedResponse {
                source: "embedding".to_string(),
                reason: format!(
                    "configured dimension {} does not match model output {}",
                    self.dimension,
                    v.len()
                ),
            });
        }
        self.client
            .get(self.url("/api/version"))
            .send()
            .await
            .map_err(dependency_error)?
            .error_for_status()
            .map_err(dependency_error)?;
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

// ---- Local ONNX backend adapter -----------------------------------------

/// Wraps the synchronous ONNX `EmbeddingModel` (§4.F "local_onnx") behind the
/// async contract via `spawn_blocking`, since `ort` inference is CPU-bound
/// and must not block the tokio reactor.
pub struct OnnxEmbeddingService {
    model: Arc<E5Embeddings>,
    batch_size: usize,
}

impl OnnxEmbeddingService {
    pub fn new(model_dir: &std::path::Path, batch_size: usize) -> Result<Self> {
        let config = E5Config::auto_detect(model_dir).ok_or_else(|| {
            ConduitError::UnavailableDependency {
                dependency: "embedding".to_string(),
                reason: format!("no ONNX embedding model found under {}", model_dir.display()),
            }
        })?;
        let model = E5Embeddings::new(config)
            .map_err(|e| ConduitError::Other(e.context("load local ONNX embedding model")))?;
        Ok(Self {
            model: Arc::new(model),
            batch_size,
        })
    }
}

#[async_trait]
impl EmbeddingService for OnnxEmbeddingService {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let text = text.to_string();
        tokio::task::spawn_blocking(move || model.embed_query(&text))
            .await
            .map_err(|e| ConduitError::Other(anyhow::anyhow!(e)))?
            .map_err(ConduitError::Other)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.batch_size.max(1);
        let results: Vec<Result<Vec<Vec<f32>>>> = stream::iter(texts.chunks(batch_size))
            .map(|chunk| {
                let model = self.model.clone();
                let owned: Vec<String> = chunk.to_vec();
                async move {
                    tokio::task::spawn_blocking(move || {
                        let refs: Vec<&str> = owned.iter().map(String::as_str).collect();
                        model.embed_documents(&refs)
                    })
                    .await
                    .map_err(|e| ConduitError::Other(anyhow::anyhow!(e)))?
                    .map_err(ConduitError::Other)
                }
            })
            .buffered(4)
            .collect()
            .await;

        let mut out = Vec::with_capacity(texts.len());
        for chunk in results {
            out.extend(chunk?);
        }
        Ok(out)
    }

    async fn health_check(&self) -> Result<()> {
        let v = self.embed("health check probe").await?;
        if v.len() != self.model.dimension() {
            return Err(ConduitError::MalformedResponse {
                source: "embedding".to_string(),
                reason: "local ONNX model dimension mismatch".to_string(),
            });
        }
        Ok(())
    }

    fn dimension(&self) -> usize {
        self.model.dimension()
    }
}
