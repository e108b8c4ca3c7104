pub mod e5;
pub mod service;
pub mod tokenizer;

pub use service::{EmbeddingService, HttpEmbeddingService, OnnxEmbeddingService};

use anyhow::Result;

/// Unified embedding model trait
pub trait EmbeddingModel: Send + Sync {
    /// Embed a search query (with appropriate prefix for the model)
    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a document/passage (with appropriate prefix for the model)
    fn embed_document(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch embed documents for ingestion
    fn embed_documents(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_document(t)).collect()
    }

    /// Embedding vector dimension
    fn dimension(&self) -> usize;
}

/// Builds the configured embedding backend (§4.F, §6 engine configuration).
pub async fn open_embedding_service(
    config: &crate::config::EmbeddingConfig,
) -> crate::error::Result<std::sync::Arc<dyn EmbeddingService>> {
    use crate::config::EmbeddingBackend;
    match config.backend {
        EmbeddingBackend::Http => {
            let svc = HttpEmbeddingService::new(
                config.host.clone(),
                config.model.clone(),
                config.dimension,
                config.batch_size,
            );
            svc.ensure_model_pulled().await?;
            Ok(std::sync::Arc::new(svc))
        }
        EmbeddingBackend::LocalOnnx => {
            let svc = OnnxEmbeddingService::new(&config.model_dir, config.batch_size)?;
            Ok(std::sync::Arc::new(svc))
        }
    }
}
