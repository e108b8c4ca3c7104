//! Daemon (Ambient Component R): the single injection root. Owns the
//! relational store and the data directory, and holds the optional semantic
//! and KAG collaborators behind a read-write lock so they can be attached or
//! detached at runtime without restarting the process.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::config::{ConduitConfig, GraphBackend};
use crate::embeddings::{open_embedding_service, EmbeddingService};
use crate::error::{ConduitError, Result};
use crate::graph::GraphStore;
use crate::indexing::Indexer;
use crate::kag::{Extractor, KagSearcher};
use crate::llm::provider::{HttpLlmProvider, LlmProvider};
use crate::search::{HybridSearcher, SemanticSearch, TextSearch};
use crate::source_manager::SourceManager;
use crate::storage::{open_vector_store, RelationalStore, VectorStore};

/// Collaborators that can be hot-attached: semantic search needs both an
/// embedding service and a vector store, so they travel together.
#[derive(Clone)]
struct SemanticStack {
    embeddings: Arc<dyn EmbeddingService>,
    vectors: Arc<dyn VectorStore>,
    searcher: Arc<SemanticSearch>,
}

#[derive(Clone)]
struct KagStack {
    extractor: Arc<Extractor>,
    searcher: Arc<KagSearcher>,
}

pub struct Daemon {
    config: ConduitConfig,
    data_dir: PathBuf,
    relational: Arc<RelationalStore>,
    lexical: Arc<TextSearch>,
    indexer: Arc<Indexer>,
    sources: Arc<SourceManager>,
    graph: Option<Arc<GraphStore>>,
    semantic: RwLock<Option<SemanticStack>>,
    kag: RwLock<Option<KagStack>>,
}

impl Daemon {
    /// Brings up the mandatory collaborators (relational store, lexical
    /// index, source manager) and, best-effort, the optional semantic and
    /// KAG stacks per the engine configuration (§6). A failure to bring up
    /// an optional stack degrades the daemon rather than failing startup.
    pub async fn start(config: ConduitConfig) -> Result<Self> {
        config
            .validate()
            .map_err(ConduitError::InvalidInput)?;

        std::fs::create_dir_all(&config.data_dir).map_err(ConduitError::Io)?;

        let relational = Arc::new(RelationalStore::open(&config.data_dir.join("conduit.db")).await?);
        let lexical = Arc::new(TextSearch::new(config.data_dir.to_string_lossy().as_ref())?);

        let graph = match config.graph.backend {
            GraphBackend::Neo4j => match GraphStore::connect(&config.graph).await {
                Ok(store) => Some(Arc::new(store)),
                Err(e) => {
                    tracing::warn!(error = %e, "graph store unavailable, continuing without it");
                    None
                }
            },
            GraphBackend::None => None,
        };

        let semantic_stack = match build_semantic_stack(&config, relational.clone()).await {
            Ok(stack) => Some(stack),
            Err(e) => {
                tracing::warn!(error = %e, "semantic search unavailable, continuing lexical-only");
                None
            }
        };

        let kag_stack = if config.kag.enabled {
            let reused_semantic = semantic_stack
                .as_ref()
                .map(|s| (s.vectors.clone(), s.embeddings.clone()));
            match build_kag_stack(&config, relational.clone(), graph.clone(), reused_semantic).await {
                Ok(stack) => Some(stack),
                Err(e) => {
                    tracing::warn!(error = %e, "KAG extraction unavailable, continuing without it");
                    None
                }
            }
        } else {
            None
        };

        let indexer = Arc::new(Indexer::with_graph(
            relational.clone(),
            lexical.clone(),
            semantic_stack.as_ref().map(|s| s.vectors.clone() as Arc<dyn VectorStore>),
            semantic_stack.as_ref().map(|s| s.embeddings.clone() as Arc<dyn EmbeddingService>),
            kag_stack.as_ref().map(|s| s.extractor.clone()),
            graph.clone(),
        ));

        let sources = Arc::new(SourceManager::new(relational.clone(), indexer.clone(), config.chunk.clone()));

        Ok(Self {
            data_dir: config.data_dir.clone(),
            config,
            relational,
            lexical,
            indexer,
            sources,
            graph,
            semantic: RwLock::new(semantic_stack),
            kag: RwLock::new(kag_stack),
        })
    }

    pub fn config(&self) -> &ConduitConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn relational(&self) -> Arc<RelationalStore> {
        self.relational.clone()
    }

    pub fn sources(&self) -> Arc<SourceManager> {
        self.sources.clone()
    }

    pub fn indexer(&self) -> Arc<Indexer> {
        self.indexer.clone()
    }

    pub fn graph(&self) -> Option<Arc<GraphStore>> {
        self.graph.clone()
    }

    pub fn is_semantic_attached(&self) -> bool {
        self.semantic.read().is_some()
    }

    pub fn is_kag_attached(&self) -> bool {
        self.kag.read().is_some()
    }

    /// Builds a `HybridSearcher` against whatever semantic stack is
    /// currently attached; lexical-only when none is.
    pub fn hybrid_searcher(&self) -> HybridSearcher {
        let semantic = self
            .semantic
            .read()
            .as_ref()
            .map(|s| s.searcher.clone())
            .unwrap_or_else(|| {
                Arc::new(SemanticSearch::new(
                    NullEmbeddingService::arc(),
                    NullVectorStore::arc(),
                    self.relational.clone(),
                ))
            });
        HybridSearcher::new(self.lexical.clone(), semantic)
    }

    pub fn kag_searcher(&self) -> Option<Arc<KagSearcher>> {
        self.kag.read().as_ref().map(|s| s.searcher.clone())
    }

    /// Attaches semantic search at runtime (§9 hot attach/detach). Replaces
    /// any existing stack.
    pub async fn attach_semantic(&self) -> Result<()> {
        let stack = build_semantic_stack(&self.config, self.relational.clone()).await?;
        *self.semantic.write() = Some(stack);
        Ok(())
    }

    pub fn detach_semantic(&self) {
        *self.semantic.write() = None;
    }

    pub async fn attach_kag(&self) -> Result<()> {
        let reused_semantic = self
            .semantic
            .read()
            .as_ref()
            .map(|s| (s.vectors.clone(), s.embeddings.clone()));
        let stack = build_kag_stack(&self.config, self.relational.clone(), self.graph.clone(), reused_semantic).await?;
        *self.kag.write() = Some(stack);
        Ok(())
    }

    pub async fn detach_kag(&self) {
        let previous = self.kag.write().take();
        if let Some(stack) = previous {
            stack.extractor.shutdown().await;
        }
    }
}

async fn build_semantic_stack(config: &ConduitConfig, relational: Arc<RelationalStore>) -> Result<SemanticStack> {
    let embeddings = open_embedding_service(&config.embedding).await?;
    let vectors = open_vector_store(config).await?;
    let searcher = Arc::new(SemanticSearch::new(embeddings.clone(), vectors.clone(), relational));
    Ok(SemanticStack {
        embeddings,
        vectors,
        searcher,
    })
}

async fn build_kag_stack(
    config: &ConduitConfig,
    relational: Arc<RelationalStore>,
    graph: Option<Arc<GraphStore>>,
    reused_semantic: Option<(Arc<dyn VectorStore>, Arc<dyn EmbeddingService>)>,
) -> Result<KagStack> {
    let host = config.kag.host.clone().unwrap_or_default();
    let provider: Arc<dyn LlmProvider> = Arc::new(HttpLlmProvider::new(
        config.kag.provider,
        host,
        config.kag.api_key.clone(),
        config.kag.model.clone(),
    ));
    let extractor = Extractor::spawn(provider, relational.clone(), graph, config.kag.extraction.clone());

    let (vectors, embeddings) = match reused_semantic {
        Some((vectors, embeddings)) => (Some(vectors), Some(embeddings)),
        None => (None, None),
    };
    let searcher = Arc::new(KagSearcher::new(relational, vectors, embeddings));

    Ok(KagStack { extractor, searcher })
}

/// Stand-ins used when no semantic stack is attached. `HybridSearcher`
/// always holds a semantic collaborator; these make every call into it fail,
/// which routes through the same degrade-to-lexical path `run_semantic`
/// already takes for a live backend that errors.
struct NullEmbeddingService;

impl NullEmbeddingService {
    fn arc() -> Arc<dyn EmbeddingService> {
        Arc::new(Self)
    }
}

#[async_trait]
impl EmbeddingService for NullEmbeddingService {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(ConduitError::UnavailableDependency {
            dependency: "embedding_service".to_string(),
            reason: "semantic search is not attached".to_string(),
        })
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(ConduitError::UnavailableDependency {
            dependency: "embedding_service".to_string(),
            reason: "semantic search is not attached".to_string(),
        })
    }

    async fn health_check(&self) -> Result<()> {
        Err(ConduitError::UnavailableDependency {
            dependency: "embedding_service".to_string(),
            reason: "semantic search is not attached".to_string(),
        })
    }

    fn dimension(&self) -> usize {
        0
    }
}

struct NullVectorStore;

impl NullVectorStore {
    fn arc() -> Arc<dyn VectorStore> {
        Arc::new(Self)
    }
}

#[async_trait]
impl VectorStore for NullVectorStore {
    async fn upsert_batch(&self, _points: Vec<(String, Vec<f32>, crate::types::VectorPayload)>) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _ids: &[String]) -> Result<usize> {
        Ok(0)
    }

    async fn delete_by_document(&self, _document_id: &str) -> Result<usize> {
        Ok(0)
    }

    async fn delete_by_source(&self, _source_id: &str) -> Result<usize> {
        Ok(0)
    }

    async fn search(
        &self,
        _query_vec: &[f32],
        _opts: crate::storage::VectorSearchOpts,
    ) -> Result<Vec<crate::storage::VectorHit>> {
        Ok(Vec::new())
    }

    async fn count(&self) -> Result<usize> {
        Ok(0)
    }

    fn dimension(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_vector_store_reports_empty_results() {
        let store = NullVectorStore;
        assert_eq!(store.dimension(), 0);
    }
}
