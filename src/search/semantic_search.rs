//! Semantic searcher (§4.J): embeds the query, runs ANN search against the
//! vector store, post-filters by `mime_type`, and attaches a confidence
//! bucket and a sentence/word-boundary snippet.

use std::sync::Arc;

use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::storage::{RelationalStore, VectorSearchOpts, VectorStore};
use crate::types::MetadataFilter;

const SNIPPET_MAX_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SemanticConfidence {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub chunk_id: String,
    pub document_id: String,
    pub score: f32,
    pub content: String,
    pub title: String,
    pub path: String,
    pub snippet: String,
    pub confidence: SemanticConfidence,
}

#[derive(Debug, Clone, Default)]
pub struct SemanticSearchOpts {
    pub limit: usize,
    pub filter: MetadataFilter,
    pub min_score: f32,
}

pub struct SemanticSearch {
    embeddings: Arc<dyn EmbeddingService>,
    vectors: Arc<dyn VectorStore>,
    relational: Arc<RelationalStore>,
}

impl SemanticSearch {
    pub fn new(
        embeddings: Arc<dyn EmbeddingService>,
        vectors: Arc<dyn VectorStore>,
        relational: Arc<RelationalStore>,
    ) -> Self {
        Self {
            embeddings,
            vectors,
            relational,
        }
    }

    /// `search(q, opts) -> hits[]` (§4.J).
    pub async fn search(&self, query: &str, opts: &SemanticSearchOpts) -> Result<Vec<SemanticHit>> {
        let vec = self.embeddings.embed(query).await?;
        let raw = self
            .vectors
            .search(
                &vec,
                VectorSearchOpts {
                    limit: opts.limit * 2,
                    offset: 0,
                    filter: Some(opts.filter.clone()),
                    min_score: opts.min_score,
                },
            )
            .await?;

        let mime_filter = opts.filter.mime_types.clone();
        let mut hits = Vec::with_capacity(opts.limit);
        for hit in raw {
            if let Some(ref allowed) = mime_filter {
                if !allowed.is_empty() && !allowed.contains(&hit.payload.mime_type) {
                    continue;
                }
            }
            let snippet = snippet_within(&hit.payload.content, SNIPPET_MAX_CHARS);
            let confidence = if hit.score >= 0.8 {
                SemanticConfidence::High
            } else if hit.score >= 0.6 {
                SemanticConfidence::Medium
            } else {
                SemanticConfidence::Low
            };
            hits.push(SemanticHit {
                chunk_id: hit.payload.chunk_id,
                document_id: hit.payload.document_id,
                score: hit.score,
                content: hit.payload.content,
                title: hit.payload.title,
                path: hit.payload.path,
                snippet,
                confidence,
            });
            if hits.len() >= opts.limit {
                break;
            }
        }
        Ok(hits)
    }

    /// Uses the first chunk of `document_id` as the query, excluding results
    /// from the same document (§4.J).
    pub async fn search_similar(&self, document_id: &str, limit: usize) -> Result<Vec<SemanticHit>> {
        let chunks = self.relational.get_chunks(document_id).await?;
        let Some(first) = chunks.first() else {
            return Ok(Vec::new());
        };
        let opts = SemanticSearchOpts {
            limit: limit * 2,
            filter: MetadataFilter::default(),
            min_score: 0.0,
        };
        let hits = self.search(&first.content, &opts).await?;
        Ok(hits
            .into_iter()
            .filter(|h| h.document_id != document_id)
            .take(limit)
            .collect())
    }

    /// Bootstraps semantic search on a previously lexical-only knowledge
    /// base: iterates every document in relational order, embeds its chunks,
    /// and upserts them to the vector store. Runs in a background context so
    /// it survives client disconnect (§4.J).
    pub async fn migrate_from_fts<F: Fn(usize, usize) + Send + Sync>(
        &self,
        progress_fn: F,
    ) -> Result<()> {
        let document_ids = self.relational.all_document_ids().await?;
        let total = document_ids.len();
        for (i, document_id) in document_ids.iter().enumerate() {
            let chunks = self.relational.get_chunks(document_id).await?;
            if chunks.is_empty() {
                progress_fn(i + 1, total);
                continue;
            }
            let Some(document) = self.relational.get_document(document_id).await? else {
                progress_fn(i + 1, total);
                continue;
            };
            let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
            let vectors = self.embeddings.embed_batch(&texts).await?;
            let points = chunks
                .iter()
                .zip(vectors.into_iter())
                .map(|(chunk, vector)| {
                    let point_id = crate::types::point_id_for_chunk(&chunk.chunk_id).to_string();
                    let payload = crate::types::VectorPayload {
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
            self.vectors.upsert_batch(points).await?;
            progress_fn(i + 1, total);
        }
        Ok(())
    }
}

/// Cuts `content` to `max_chars`, preferring a sentence boundary, falling
/// back to a word boundary (§4.J).
fn snippet_within(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    if let Some(pos) = truncated.rfind(['.', '!', '?']) {
        if pos > max_chars / 2 {
            return format!("{}…", &truncated[..=pos]);
        }
    }
    if let Some(pos) = truncated.rfind(' ') {
        return format!("{}…", &truncated[..pos]);
    }
    format!("{truncated}…")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_prefers_sentence_boundary() {
        let text = "First sentence here. Second sentence that runs long past the cutoff point for sure.";
        let snippet = snippet_within(text, 25);
        assert!(snippet.ends_with('…'));
        assert!(snippet.starts_with("First sentence here."));
    }

    #[test]
    fn snippet_falls_back_to_word_boundary() {
        let text = "supercalifragilisticexpialidocious word another more text here to pad it out";
        let snippet = snippet_within(text, 20);
        assert!(snippet.ends_with('…'));
        assert!(!snippet.contains('.'));
    }

    #[test]
    fn snippet_short_content_passes_through() {
        let text = "short";
        assert_eq!(snippet_within(text, 300), "short");
    }
}
