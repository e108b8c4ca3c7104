//! KAG searcher (§4.P): finds entities and relations relevant to a natural
//! language query, fusing a lexical `LIKE` search with an optional semantic
//! search over the chunk-level vector store (entities have no vectors of
//! their own — a hit chunk is mapped back to the entities it produced).

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::embeddings::EmbeddingService;
use crate::error::Result;
use crate::search::hybrid::reciprocal_rank_fusion;
use crate::storage::{RelationalStore, VectorSearchOpts, VectorStore};
use crate::types::{Entity, Relation};

const RRF_K: usize = 60;
const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "in", "on", "for", "and", "or", "to", "is", "are", "was", "were",
];

#[derive(Debug, Clone)]
pub struct KagSearchRequest {
    pub query: String,
    pub limit: usize,
    pub include_relations: bool,
}

#[derive(Debug, Clone)]
pub struct KagSearchResult {
    pub entities: Vec<(Entity, f32)>,
    pub relations: Vec<Relation>,
    pub context_markdown: String,
    pub total: usize,
}

pub struct KagSearcher {
    relational: Arc<RelationalStore>,
    vectors: Option<Arc<dyn VectorStore>>,
    embeddings: Option<Arc<dyn EmbeddingService>>,
}

impl KagSearcher {
    pub fn new(
        relational: Arc<RelationalStore>,
        vectors: Option<Arc<dyn VectorStore>>,
        embeddings: Option<Arc<dyn EmbeddingService>>,
    ) -> Self {
        Self {
            relational,
            vectors,
            embeddings,
        }
    }

    /// Tokenizes, fuses lexical and (if available) semantic entity
    /// candidates, and renders a context block (§4.P steps 1-7).
    pub async fn search(&self, request: &KagSearchRequest) -> Result<KagSearchResult> {
        let limit = request.limit.max(1);
        let tokens = tokenize(&request.query);
        let candidate_limit = (3 * limit).max(50);

        let lexical_candidates = self.lexical_candidates(&tokens, candidate_limit).await?;
        let semantic_candidates = self.semantic_candidates(&request.query, candidate_limit).await?;

        let mut by_id: HashMap<String, Entity> = HashMap::new();
        for e in lexical_candidates.iter().chain(semantic_candidates.iter()) {
            by_id.entry(e.entity_id.clone()).or_insert_with(|| e.clone());
        }

        let lexical_ids: Vec<String> = lexical_candidates.iter().map(|e| e.entity_id.clone()).collect();
        let semantic_ids: Vec<String> = semantic_candidates.iter().map(|e| e.entity_id.clone()).collect();

        let scored: Vec<(String, f32)> = if semantic_ids.is_empty() {
            // Step 5: lexical-only token-coverage scoring.
            lexical_candidates
                .iter()
                .map(|e| (e.entity_id.clone(), token_coverage_score(&tokens, e)))
                .collect()
        } else {
            // Step 4: RRF fusion with a 20% dual-found agreement boost.
            let lists = vec![lexical_ids.clone(), semantic_ids.clone()];
            let lexical_set: HashSet<&String> = lexical_ids.iter().collect();
            let semantic_set: HashSet<&String> = semantic_ids.iter().collect();
            reciprocal_rank_fusion(&lists, RRF_K)
                .into_iter()
                .map(|(id, score)| {
                    let dual_found = lexical_set.contains(&id) && semantic_set.contains(&id);
                    let boosted = if dual_found { score * 1.2 } else { score };
                    (id, boosted)
                })
                .collect()
        };

        let mut ranked: Vec<(Entity, f32)> = scored
            .into_iter()
            .filter_map(|(id, score)| by_id.get(&id).map(|e| (e.clone(), score)))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        let total = ranked.len();
        ranked.truncate(limit);

        let relations = if request.include_relations && !ranked.is_empty() {
            let ids: Vec<String> = ranked.iter().map(|(e, _)| e.entity_id.clone()).collect();
            self.relational.relations_for_entity_ids(&ids).await?
        } else {
            Vec::new()
        };

        let context_markdown = render_context(&ranked, &relations);

        Ok(KagSearchResult {
            entities: ranked,
            relations,
            context_markdown,
            total,
        })
    }

    async fn lexical_candidates(&self, tokens: &[String], limit: usize) -> Result<Vec<Entity>> {
        let mut seen: HashMap<String, Entity> = HashMap::new();
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        for token in tokens {
            let hits = self.relational.search_entities_like(token, limit).await?;
            for hit in hits {
                seen.entry(hit.entity_id.clone()).or_insert(hit);
            }
        }
        let mut out: Vec<Entity> = seen.into_values().collect();
        out.sort_by(|a, b| b.confidence.partial_cmp(&a.confidence).unwrap_or(std::cmp::Ordering::Equal));
        out.truncate(limit);
        Ok(out)
    }

    async fn semantic_candidates(&self, query: &str, limit: usize) -> Result<Vec<Entity>> {
        let (Some(vectors), Some(embeddings)) = (&self.vectors, &self.embeddings) else {
            return Ok(Vec::new());
        };
        let query_vec = embeddings.embed(query).await?;
        let hits = vectors
            .search(
                &query_vec,
                VectorSearchOpts {
                    limit,
                    offset: 0,
                    filter: None,
                    min_score: 0.0,
                },
            )
            .await?;
        let chunk_ids: Vec<String> = hits.into_iter().map(|h| h.payload.chunk_id).collect();
        self.relational.entities_for_chunk_ids(&chunk_ids).await
    }
}

/// Lowercase, drop stopwords and sub-3-char tokens (unless a likely
/// uppercase acronym), dedupe, preserving first-seen order (§4.P step 1).
fn tokenize(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for raw in query.split_whitespace() {
        let is_acronym = raw.len() == 2 && raw.chars().all(|c| c.is_ascii_uppercase());
        let lower = raw.to_lowercase();
        let cleaned: String = lower.chars().filter(|c| c.is_alphanumeric()).collect();
        if cleaned.is_empty() {
            continue;
        }
        if cleaned.len() < 3 && !is_acronym {
            continue;
        }
        if STOP_WORDS.contains(&cleaned.as_str()) {
            continue;
        }
        if seen.insert(cleaned.clone()) {
            out.push(cleaned);
        }
    }
    out
}

/// 70% token-coverage (fraction of query tokens present in name/description)
/// + 30% entity confidence (§4.P step 5).
fn token_coverage_score(tokens: &[String], entity: &Entity) -> f32 {
    if tokens.is_empty() {
        return entity.confidence * 0.3;
    }
    let haystack = format!("{} {}", entity.name, entity.description).to_lowercase();
    let matched = tokens.iter().filter(|t| haystack.contains(t.as_str())).count();
    let coverage = matched as f32 / tokens.len() as f32;
    coverage * 0.7 + entity.confidence * 0.3
}

/// Markdown context block: top 10 entities, top 15 relations (§4.P step 7).
fn render_context(entities: &[(Entity, f32)], relations: &[Relation]) -> String {
    let mut out = String::new();
    if entities.is_empty() {
        return out;
    }
    out.push_str("## Relevant entities\n");
    for (entity, _) in entities.iter().take(10) {
        out.push_str(&format!(
            "- **{}** ({:?}): {}\n",
            entity.name, entity.entity_type, entity.description
        ));
    }
    if !relations.is_empty() {
        let names: HashMap<&str, &str> = entities
            .iter()
            .map(|(e, _)| (e.entity_id.as_str(), e.name.as_str()))
            .collect();
        out.push_str("\n## Relevant relations\n");
        for relation in relations.iter().take(15) {
            let subject = names.get(relation.subject_id.as_str()).copied().unwrap_or(&relation.subject_id);
            let object = names.get(relation.object_id.as_str()).copied().unwrap_or(&relation.object_id);
            out.push_str(&format!("- {} {} {}\n", subject, relation.predicate, object));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityType;

    fn entity(id: &str, name: &str, description: &str, confidence: f32) -> Entity {
        Entity {
            entity_id: id.to_string(),
            name: name.to_string(),
            entity_type: EntityType::Concept,
            description: description.to_string(),
            confidence,
            source_chunk_id: "chunk-1".to_string(),
            source_document_id: "doc-1".to_string(),
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn tokenize_drops_stopwords_and_short_words_but_keeps_acronyms() {
        let tokens = tokenize("the AI and a GPU for ML systems");
        assert!(tokens.contains(&"ai".to_string()));
        assert!(!tokens.contains(&"the".to_string()));
        assert!(!tokens.contains(&"and".to_string()));
        assert!(tokens.contains(&"systems".to_string()));
    }

    #[test]
    fn tokenize_dedupes_preserving_first_order() {
        let tokens = tokenize("rust rust cargo");
        assert_eq!(tokens, vec!["rust".to_string(), "cargo".to_string()]);
    }

    #[test]
    fn token_coverage_rewards_full_match_and_high_confidence() {
        let tokens = vec!["rust".to_string(), "memory".to_string()];
        let e = entity("1", "Rust memory model", "describes safety", 1.0);
        let score = token_coverage_score(&tokens, &e);
        assert!(score > 0.9);
    }

    #[test]
    fn render_context_lists_entities_and_relations() {
        let entities = vec![(entity("1", "Rust", "a language", 0.9), 1.0)];
        let relations = vec![Relation {
            relation_id: "r1".to_string(),
            subject_id: "1".to_string(),
            predicate: "relates_to".to_string(),
            object_id: "2".to_string(),
            confidence: 0.9,
            source_chunk_id: "chunk-1".to_string(),
            created_at: 0,
        }];
        let md = render_context(&entities, &relations);
        assert!(md.contains("Rust"));
        assert!(md.contains("relates_to"));
    }
}
