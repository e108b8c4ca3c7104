use async_trait::async_trait;

use crate::error::Result;
use crate::types::{MetadataFilter, VectorPayload};

/// A single vector point as returned by a similarity search (§3 Vector
/// point, §4.E).
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub point_id: String,
    pub score: f32,
    pub payload: VectorPayload,
}

/// Options accepted by `VectorStore::search` (§4.E). `filter` is the
/// structured predicate; each backend translates it into its own native
/// query form (SQL `only_if` for LanceDB, a filter DSL document for Qdrant).
#[derive(Debug, Clone, Default)]
pub struct VectorSearchOpts {
    pub limit: usize,
    pub offset: usize,
    pub filter: Option<MetadataFilter>,
    pub min_score: f32,
}

/// Cosine-similarity ANN over vectors of fixed dimension `D` (§4.E).
///
/// Two backends implement this trait: an embedded `LanceStore` (default, no
/// external process) and a remote `QdrantStore` (HTTP, brought up by the
/// Dependency Supervisor, §4.Q). Callers (the Indexer, the Semantic
/// Searcher) are backend-agnostic.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn upsert_batch(&self, points: Vec<(String, Vec<f32>, VectorPayload)>) -> Result<()>;
    async fn delete(&self, ids: &[String]) -> Result<usize>;
    async fn delete_by_document(&self, document_id: &str) -> Result<usize>;
    async fn delete_by_source(&self, source_id: &str) -> Result<usize>;
    async fn search(&self, query_vec: &[f32], opts: VectorSearchOpts) -> Result<Vec<VectorHit>>;
    async fn count(&self) -> Result<usize>;
    fn dimension(&self) -> usize;
}
