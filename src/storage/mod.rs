//! Storage layer: the relational store (single writer of truth, §4.B) and
//! the pluggable vector store backends (§4.E) behind a common trait.

pub mod lance_store;
pub mod qdrant_store;
pub mod relational;
pub mod vector_store;

pub use lance_store::LanceStore;
pub use qdrant_store::QdrantStore;
pub use relational::RelationalStore;
pub use vector_store::{VectorHit, VectorSearchOpts, VectorStore};

use std::sync::Arc;

use crate::config::{ConduitConfig, VectorStoreBackend};
use crate::error::Result;

/// Builds the configured vector store backend (§4.E, §6 engine configuration).
pub async fn open_vector_store(config: &ConduitConfig) -> Result<Arc<dyn VectorStore>> {
    match config.vector_store.backend {
        VectorStoreBackend::Embedded => {
            let path = config.data_dir.join("vectors");
            let store = LanceStore::new(
                path.to_string_lossy().as_ref(),
                config.vector_store.dimension,
                &config.vector_store.collection,
            )
            .await?;
            Ok(Arc::new(store))
        }
        VectorStoreBackend::Remote => {
            let supervisor = crate::supervisor::DependencySupervisor::new(
                config.data_dir.clone(),
                config.vector_store.clone(),
            );
            let store = supervisor.ensure_ready().await?;
            Ok(Arc::new(store))
        }
    }
}
