//! Indexer (§4.G): the single write entry point for getting a document and
//! its chunks into the relational store, the lexical index, the vector
//! store, and (best-effort) the knowledge-graph extraction queue.

use std::sync::Arc;

use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::graph::GraphStore;
use crate::kag::Extractor;
use crate::search::TextSearch;
use crate::storage::{RelationalStore, VectorStore};
use crate::types::{point_id_for_chunk, Chunk, Document, VectorPayload};

pub struct Indexer {
    relational: Arc<RelationalStore>,
    lexical: Arc<TextSearch>,
    vectors: Option<Arc<dyn VectorStore>>,
    embeddings: Option<Arc<dyn EmbeddingService>>,
    extractor: Option<Arc<Extractor>>,
    graph: Option<Arc<GraphStore>>,
}

#[derive(Debug, Clone, Default)]
pub struct IndexOutcome {
    pub chunks_indexed: usize,
    pub embedded: bool,
    pub embed_error: Option<String>,
    pub kag_enqueued: usize,
}

impl Indexer {
    pub fn new(
        relational: Arc<RelationalStore>,
        lexical: Arc<TextSearch>,
        vectors: Option<Arc<dyn VectorStore>>,
        embeddings: Option<Arc<dyn EmbeddingService>>,
        extractor: Option<Arc<Extractor>>,
    ) -> Self {
        Self::with_graph(relational, lexical, vectors, embeddings, extractor, None)
    }

    pub fn with_graph(
        relational: Arc<RelationalStore>,
        lexical: Arc<TextSearch>,
        vectors: Option<Arc<dyn VectorStore>>,
        embeddings: Option<Arc<dyn EmbeddingService>>,
        extractor: Option<Arc<Extractor>>,
        graph: Option<Arc<GraphStore>>,
    ) -> Self {
        Self {
            relational,
            lexical,
            vectors,
            embeddings,
            extractor,
            graph,
        }
    }

    /// `index(document, chunks)` (§4.G steps 1-6).
    pub async fn index(&self, document: &Document, chunks: &[Chunk]) -> Result<IndexOutcome> {
        // Steps 1-4: transactional relational write (the relational store
        // itself opens the transaction and deletes-then-inserts).
        self.relational.index_document(document, chunks).await?;

        // Mirror into the lexical index outside the transaction boundary —
        // Tantivy has no shared ACID scope with sqlite.
        self.lexical.delete_by_document(&document.document_id).ok();
        for chunk in chunks {
            self.lexical.index_chunk(
                &chunk.chunk_id,
                &document.document_id,
                &chunk.content,
                &document.title,
                &document.path,
                &document.source_id,
                &document.mime_type,
            )?;
        }
        self.lexical.commit()?;

        let mut outcome = IndexOutcome {
            chunks_indexed: chunks.len(),
            ..Default::default()
        };

        // Step 5: best-effort semantic indexing. Failures never roll back
        // the relational commit above.
        if let (Some(vectors), Some(embeddings)) = (&self.vectors, &self.embeddings) {
            match self.embed_and_upsert(document, chunks, vectors, embeddings).await {
                Ok(()) => outcome.embedded = true,
                Err(e) => {
                    tracing::warn!(
                        document_id = %document.document_id,
                        error = %e,
                        "semantic indexing failed, document degrades to lexical-only"
                    );
                    outcome.embed_error = Some(e.to_string());
                }
            }
        }

        // Step 6: best-effort KAG enqueue.
        if let Some(extractor) = &self.extractor {
            for chunk in chunks {
                if extractor.enqueue(document.clone(), chunk.clone()).await.is_ok() {
                    outcome.kag_enqueued += 1;
                }
            }
        }

        Ok(outcome)
    }

    async fn embed_and_upsert(
        &self,
        document: &Document,
        chunks: &[Chunk],
        vectors: &Arc<dyn VectorStore>,
        embeddings: &Arc<dyn EmbeddingService>,
    ) -> Result<()> {
        if chunks.is_empty() {
            return Ok(());
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vecs = embeddings.embed_batch(&texts).await?;

        let points = chunks
            .iter()
            .zip(vecs.into_iter())
            .map(|(chunk, vector)| {
                let point_id = point_id_for_chunk(&chunk.chunk_id).to_string();
                let payload = VectorPayload {
                    document_id: document.document_id.clone(),
                    chunk_id: chunk.chunk_id.clone(),
                    chunk_index: chunk.index,
                    path: document.path.clone(),
                    title: document.title.clone(),
                    content: chunk.content.clone(),
                    source_id: document.source_id.clone(),
                    mime_type: document.mime_type.clone(),
                };
                (point_id, vector, payload)
            })
            .collect();

        vectors.upsert_batch(points).await
    }

    /// Deletion mirrors indexing's order: FTS/chunks/document in one
    /// relational transaction, then vectors, then entities/relations (§4.G).
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        self.relational.delete_document(document_id).await?;
        self.lexical.delete_by_document(document_id).ok();
        self.lexical.commit().ok();
        if let Some(vectors) = &self.vectors {
            vectors.delete_by_document(document_id).await?;
        }
        self.relational.delete_entities_for_document(document_id).await?;
        if let Some(graph) = &self.graph {
            if let Err(e) = graph.delete_by_document(document_id).await {
                tracing::warn!(document_id, error = %e, "graph mirror cleanup failed, continuing");
            }
        }
        Ok(())
    }

    /// Deletes an entire source: the relational cascade first (§3 Ownership),
    /// then the derivative vector and graph mirrors per document, so the
    /// vector-store count drops by exactly the vectors owned by `source_id`
    /// (§8 Deletion cascade).
    pub async fn delete_source(&self, source_id: &str) -> Result<()> {
        let documents = self.relational.document_ids_for_source(source_id).await?;
        self.relational.delete_source(source_id).await?;
        self.lexical.delete_by_source(source_id).ok();
        self.lexical.commit().ok();
        if let Some(vectors) = &self.vectors {
            vectors.delete_by_source(source_id).await?;
        }
        if let Some(graph) = &self.graph {
            for (document_id, _path) in &documents {
                if let Err(e) = graph.delete_by_document(document_id).await {
                    tracing::warn!(document_id, error = %e, "graph mirror cleanup failed, continuing");
                }
            }
        }
        Ok(())
    }
}
