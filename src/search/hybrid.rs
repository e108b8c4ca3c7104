//! Hybrid searcher (§4.K) — query analysis, mode selection, weighted
//! reciprocal rank fusion, exact-match and agreement boosts, a similarity
//! floor, reranking, MMR diversification, and a four-level fallback ladder
//! that guarantees a non-empty result whenever any match exists.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tokio_util::sync::CancellationToken;

use crate::error::{ConduitError, Result};
use crate::search::semantic_search::{SemanticSearch, SemanticSearchOpts};
use crate::search::text_search::{TextSearch, TextSearchOpts};
use crate::types::MetadataFilter;

/// Fixed k in the RRF denominator `1 / (k + rank)`.
pub const RRF_K: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Auto,
    Lexical,
    Semantic,
    Fusion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryType {
    ExactQuote,
    Conceptual,
    Factual,
    Entity,
    Exploratory,
}

impl QueryType {
    /// Weights `(semantic, lexical)` per query type, before `opts.semantic_weight`
    /// override (§4.K step 4).
    fn weights(self) -> (f32, f32) {
        match self {
            QueryType::ExactQuote => (0.1, 0.9),
            QueryType::Entity => (0.4, 0.6),
            QueryType::Conceptual => (0.8, 0.2),
            QueryType::Factual => (0.5, 0.5),
            QueryType::Exploratory => (0.7, 0.3),
        }
    }
}

static CONCEPTUAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(how|why|explain|compare|difference between|what is the relationship)\b")
        .unwrap()
});
static FACTUAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(19|20)\d{2}\b|\$\d|\bv?\d+\.\d+(\.\d+)?\b").unwrap());
static STOP_WORDS: &[&str] = &[
    "the", "a", "an", "of", "in", "on", "for", "and", "or", "to", "is", "are", "was", "were",
];

fn detect_quoted(query: &str) -> bool {
    query.contains('"')
}

/// Contiguous runs of ≥2 capitalized non-stop words (§4.K step 1b), plus
/// significant standalone capitalized tokens (step 1c).
fn detect_proper_nouns(query: &str) -> Vec<String> {
    let words: Vec<&str> = query.split_whitespace().collect();
    let mut nouns = Vec::new();
    let mut run: Vec<&str> = Vec::new();

    let is_capitalized = |w: &str| {
        w.chars().next().map(|c| c.is_uppercase()).unwrap_or(false)
            && !STOP_WORDS.contains(&w.to_lowercase().as_str())
    };

    for word in &words {
        let cleaned = word.trim_matches(|c: char| !c.is_alphanumeric());
        if !cleaned.is_empty() && is_capitalized(cleaned) {
            run.push(cleaned);
        } else {
            if run.len() >= 2 {
                nouns.push(run.join(" "));
            } else if run.len() == 1 {
                nouns.push(run[0].to_string());
            }
            run.clear();
        }
    }
    if run.len() >= 2 {
        nouns.push(run.join(" "));
    } else if run.len() == 1 {
        nouns.push(run[0].to_string());
    }
    nouns
}

fn classify_query(query: &str, has_quotes: bool, proper_nouns: &[String]) -> QueryType {
    if has_quotes {
        QueryType::ExactQuote
    } else if CONCEPTUAL_RE.is_match(query) {
        QueryType::Conceptual
    } else if FACTUAL_RE.is_match(query) {
        QueryType::Factual
    } else if !proper_nouns.is_empty() {
        QueryType::Entity
    } else {
        QueryType::Exploratory
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    None,
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone)]
pub struct HybridHit {
    pub chunk_id: String,
    pub document_id: String,
    pub score: f32,
    pub content: String,
    pub title: String,
    pub path: String,
    pub snippet: Option<String>,
    pub strategies_found: usize,
}

#[derive(Debug, Clone)]
pub struct HybridResult {
    pub hits: Vec<HybridHit>,
    pub confidence: Confidence,
    pub semantic_degraded: bool,
    pub dropped_below_floor: usize,
    pub fallback_level: u8,
    pub note: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HybridSearchOpts {
    pub mode: SearchMode,
    pub limit: usize,
    pub filter: MetadataFilter,
    pub semantic_weight: Option<f32>,
    pub similarity_floor: f32,
    pub enable_mmr: bool,
    pub mmr_lambda: f32,
    pub enable_rerank: bool,
    pub rerank_top_n: usize,
}

impl Default for HybridSearchOpts {
    fn default() -> Self {
        Self {
            mode: SearchMode::Auto,
            limit: 10,
            filter: MetadataFilter::default(),
            semantic_weight: None,
            similarity_floor: 0.001,
            enable_mmr: true,
            mmr_lambda: 0.7,
            enable_rerank: true,
            rerank_top_n: 30,
        }
    }
}

/// A per-strategy ranked candidate feeding RRF.
struct Candidate {
    chunk_id: String,
    document_id: String,
    content: String,
    title: String,
    path: String,
    snippet: Option<String>,
    semantic_score: f32,
}

fn lexical_candidates(
    lexical: &TextSearch,
    query: &str,
    opts: &HybridSearchOpts,
    candidate_limit: usize,
) -> Result<Vec<Candidate>> {
    let (hits, _total) = lexical.search(
        query,
        &TextSearchOpts {
            limit: candidate_limit,
            offset: 0,
            source_ids: opts.filter.source_ids.clone().unwrap_or_default(),
            mime_types: opts.filter.mime_types.clone().unwrap_or_default(),
            min_score: 0.0,
            highlight: true,
            context_len: 80,
        },
    )?;
    Ok(hits
        .into_iter()
        .map(|h| Candidate {
            chunk_id: h.chunk_id,
            document_id: h.document_id,
            content: h.content,
            title: h.title,
            path: h.path,
            snippet: h.snippet,
            semantic_score: 0.0,
        })
        .collect())
}

pub struct HybridSearcher {
    lexical: Arc<TextSearch>,
    semantic: Arc<SemanticSearch>,
}

impl HybridSearcher {
    pub fn new(lexical: Arc<TextSearch>, semantic: Arc<SemanticSearch>) -> Self {
        Self { lexical, semantic }
    }

    /// `search(q, opts) -> HybridResult` (§4.K steps 1-10).
    pub async fn search(&self, query: &str, opts: &HybridSearchOpts) -> Result<HybridResult> {
        self.search_cancellable(query, opts, &CancellationToken::new()).await
    }

    /// Same as [`search`](Self::search), but the lexical/semantic fan-out is
    /// raced against `token`: if it fires before both strategies return, the
    /// partial work is discarded and a cancellation error is returned
    /// promptly (§5 Cancellation semantics).
    pub async fn search_cancellable(
        &self,
        query: &str,
        opts: &HybridSearchOpts,
        token: &CancellationToken,
    ) -> Result<HybridResult> {
        if token.is_cancelled() {
            return Err(ConduitError::Other(anyhow::anyhow!("query cancelled")));
        }
        let has_quotes = detect_quoted(query);
        let proper_nouns = detect_proper_nouns(query);
        let query_type = classify_query(query, has_quotes, &proper_nouns);

        let mode = match opts.mode {
            SearchMode::Auto => {
                if has_quotes {
                    SearchMode::Lexical
                } else {
                    SearchMode::Fusion
                }
            }
            other => other,
        };

        let candidate_limit = (opts.limit * 3).max(30);

        let (lexical_ranked, semantic_ranked, semantic_degraded) = match mode {
            SearchMode::Lexical => {
                let lex = self.run_lexical(query, opts, candidate_limit)?;
                (lex, Vec::new(), false)
            }
            SearchMode::Semantic => {
                let (sem, degraded) = self.run_semantic(query, opts, candidate_limit).await;
                (Vec::new(), sem, degraded)
            }
            SearchMode::Fusion | SearchMode::Auto => {
                let fanout = async {
                    tokio::join!(
                        self.run_lexical_concurrent(query, opts, candidate_limit),
                        self.run_semantic(query, opts, candidate_limit)
                    )
                };
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(ConduitError::Other(anyhow::anyhow!("query cancelled")));
                    }
                    (lex_result, (sem, degraded)) = fanout => {
                        (lex_result.unwrap_or_default(), sem, degraded)
                    }
                }
            }
        };

        Ok(self.fuse_and_rank(
            &proper_nouns,
            query_type,
            opts,
            lexical_ranked,
            semantic_ranked,
            semantic_degraded,
            false,
        ))
    }

    /// Fallback ladder: level 0 is the primary search; progressively looser
    /// levels run only when the previous level returned nothing (§4.K
    /// "Fallback ladder").
    pub async fn search_with_fallback(
        &self,
        query: &str,
        opts: &HybridSearchOpts,
    ) -> Result<HybridResult> {
        self.search_with_fallback_cancellable(query, opts, &CancellationToken::new())
            .await
    }

    /// Same as [`search_with_fallback`](Self::search_with_fallback), honoring
    /// `token` at each ladder level.
    pub async fn search_with_fallback_cancellable(
        &self,
        query: &str,
        opts: &HybridSearchOpts,
        token: &CancellationToken,
    ) -> Result<HybridResult> {
        let primary = self.search_cancellable(query, opts, token).await?;
        if !primary.hits.is_empty() {
            return Ok(primary);
        }
        if token.is_cancelled() {
            return Err(ConduitError::Other(anyhow::anyhow!("query cancelled")));
        }

        let mut level1_opts = opts.clone();
        level1_opts.similarity_floor = 1e-4;
        level1_opts.enable_mmr = false;
        let candidate_limit = (opts.limit * 2).max(20);
        let has_quotes = detect_quoted(query);
        let proper_nouns = detect_proper_nouns(query);
        let query_type = classify_query(query, has_quotes, &proper_nouns);
        let lex = self
            .run_lexical(query, &level1_opts, candidate_limit)
            .unwrap_or_default();
        let (sem, degraded) = self.run_semantic(query, &level1_opts, candidate_limit).await;
        let mut level1 = self.fuse_and_rank(
            &proper_nouns,
            query_type,
            &level1_opts,
            lex,
            sem,
            degraded,
            true,
        );
        if !level1.hits.is_empty() {
            level1.fallback_level = 1;
            level1.note = Some("results found with relaxed relevance threshold".to_string());
            return Ok(level1);
        }

        // Level 2: per-word lexical search, merged.
        let mut merged: Vec<HybridHit> = Vec::new();
        let mut seen = HashSet::new();
        for word in query.split_whitespace().filter(|w| w.chars().count() >= 3) {
            if token.is_cancelled() {
                break;
            }
            let search_opts = TextSearchOpts {
                limit: 5,
                offset: 0,
                source_ids: opts.filter.source_ids.clone().unwrap_or_default(),
                mime_types: opts.filter.mime_types.clone().unwrap_or_default(),
                min_score: 0.0,
                highlight: true,
                context_len: 60,
            };
            let (hits, _total) = self.lexical.search(word, &search_opts).unwrap_or((Vec::new(), 0));
            for h in hits {
                if seen.insert(h.chunk_id.clone()) {
                    merged.push(HybridHit {
                        chunk_id: h.chunk_id,
                        document_id: h.document_id,
                        score: h.score,
                        content: h.content,
                        title: h.title,
                        path: h.path,
                        snippet: h.snippet,
                        strategies_found: 1,
                    });
                }
            }
        }
        if !merged.is_empty() {
            merged.truncate(opts.limit);
            return Ok(HybridResult {
                hits: merged,
                confidence: Confidence::Low,
                semantic_degraded: true,
                dropped_below_floor: 0,
                fallback_level: 2,
                note: Some("results found via individual-word search".to_string()),
            });
        }

        Ok(HybridResult {
            hits: Vec::new(),
            confidence: Confidence::None,
            semantic_degraded: degraded,
            dropped_below_floor: 0,
            fallback_level: 3,
            note: Some("no matches".to_string()),
        })
    }

    fn run_lexical(
        &self,
        query: &str,
        opts: &HybridSearchOpts,
        candidate_limit: usize,
    ) -> Result<Vec<Candidate>> {
        lexical_candidates(&self.lexical, query, opts, candidate_limit)
    }

    /// Runs the lexical search on a blocking thread so it genuinely
    /// overlaps with the semantic search's network/DB calls rather than
    /// running sequentially before them (§5 Query concurrency).
    async fn run_lexical_concurrent(
        &self,
        query: &str,
        opts: &HybridSearchOpts,
        candidate_limit: usize,
    ) -> Result<Vec<Candidate>> {
        let lexical = self.lexical.clone();
        let query = query.to_string();
        let opts = opts.clone();
        tokio::task::spawn_blocking(move || lexical_candidates(&lexical, &query, &opts, candidate_limit))
            .await
            .map_err(|e| ConduitError::Other(anyhow::anyhow!("lexical search task panicked: {e}")))?
    }

    /// Returns `(candidates, degraded)`. Errors are logged and swallowed —
    /// fusion proceeds with whatever strategies succeeded (§4.K step 3).
    async fn run_semantic(
        &self,
        query: &str,
        opts: &HybridSearchOpts,
        candidate_limit: usize,
    ) -> (Vec<Candidate>, bool) {
        let search_opts = SemanticSearchOpts {
            limit: candidate_limit,
            filter: opts.filter.clone(),
            min_score: 0.0,
        };
        match self.semantic.search(query, &search_opts).await {
            Ok(hits) => (
                hits.into_iter()
                    .map(|h| Candidate {
                        chunk_id: h.chunk_id,
                        document_id: h.document_id,
                        content: h.content,
                        title: h.title,
                        path: h.path,
                        snippet: Some(h.snippet),
                        semantic_score: h.score,
                    })
                    .collect(),
                false,
            ),
            Err(e) => {
                tracing::warn!(error = %e, "semantic search failed, degrading to lexical-only");
                (Vec::new(), true)
            }
        }
    }

    fn fuse_and_rank(
        &self,
        proper_nouns: &[String],
        query_type: QueryType,
        opts: &HybridSearchOpts,
        lexical: Vec<Candidate>,
        semantic: Vec<Candidate>,
        semantic_degraded: bool,
        is_fallback: bool,
    ) -> HybridResult {
        let (sem_w, lex_w) = opts
            .semantic_weight
            .map(|w| (w, 1.0 - w))
            .unwrap_or_else(|| query_type.weights());

        let mut scores: HashMap<String, f32> = HashMap::new();
        let mut strategies: HashMap<String, HashSet<&'static str>> = HashMap::new();
        let mut semantic_scores: HashMap<String, f32> = HashMap::new();
        let mut by_id: HashMap<String, Candidate> = HashMap::new();

        for (rank, c) in lexical.into_iter().enumerate() {
            *scores.entry(c.chunk_id.clone()).or_insert(0.0) +=
                lex_w / (RRF_K as f32 + rank as f32 + 1.0);
            strategies.entry(c.chunk_id.clone()).or_default().insert("lexical");
            by_id.entry(c.chunk_id.clone()).or_insert(c);
        }
        for (rank, c) in semantic.into_iter().enumerate() {
            *scores.entry(c.chunk_id.clone()).or_insert(0.0) +=
                sem_w / (RRF_K as f32 + rank as f32 + 1.0);
            strategies.entry(c.chunk_id.clone()).or_default().insert("semantic");
            semantic_scores.insert(c.chunk_id.clone(), c.semantic_score);
            by_id.entry(c.chunk_id.clone()).or_insert(c);
        }

        let mut ranked: Vec<HybridHit> = scores
            .iter()
            .filter_map(|(chunk_id, score)| {
                let c = by_id.get(chunk_id)?;
                Some(HybridHit {
                    chunk_id: chunk_id.clone(),
                    document_id: c.document_id.clone(),
                    score: *score,
                    content: c.content.clone(),
                    title: c.title.clone(),
                    path: c.path.clone(),
                    snippet: c.snippet.clone(),
                    strategies_found: strategies.get(chunk_id).map(|s| s.len()).unwrap_or(0),
                })
            })
            .collect();

        // Step 5: exact-match boost.
        for hit in ranked.iter_mut() {
            let haystack = format!(
                "{} {} {}",
                hit.snippet.clone().unwrap_or_default(),
                hit.title,
                hit.path
            )
            .to_lowercase();
            let mut boost = 1.0f32;
            for noun in proper_nouns {
                if haystack.contains(&noun.to_lowercase()) {
                    boost *= if noun.contains(' ') { 1.5 } else { 1.2 };
                }
            }
            hit.score *= boost.min(3.0);
        }
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Step 6: agreement boost.
        for hit in ranked.iter_mut() {
            let agreement = hit.strategies_found as f32 / 2.0;
            if hit.strategies_found == 1 && query_type == QueryType::Conceptual {
                let only_semantic = strategies
                    .get(&hit.chunk_id)
                    .map(|s| s.contains("semantic") && !s.contains("lexical"))
                    .unwrap_or(false);
                if only_semantic {
                    hit.score *= 1.1;
                    continue;
                }
            }
            hit.score *= 1.0 + 0.2 * agreement;
        }
        ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        // Step 7: similarity floor.
        let floor = opts.similarity_floor.max(0.0);
        let before = ranked.len();
        ranked.retain(|h| h.score >= floor);
        let dropped_below_floor = before - ranked.len();

        // Step 8: reranking.
        if opts.enable_rerank && !ranked.is_empty() {
            let top_n = opts.rerank_top_n.min(ranked.len());
            for hit in ranked.iter_mut().take(top_n) {
                let sem_score = semantic_scores.get(&hit.chunk_id).copied().unwrap_or(0.0);
                hit.score *= 1.0 + sem_score;
            }
            ranked[..top_n]
                .sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        }

        // Step 9: MMR diversification.
        let selected = if opts.enable_mmr {
            mmr_select(ranked, opts.limit, opts.mmr_lambda)
        } else {
            ranked.into_iter().take(opts.limit).collect()
        };

        let confidence = compute_confidence(&selected, semantic_degraded, is_fallback);

        HybridResult {
            hits: selected,
            confidence,
            semantic_degraded,
            dropped_below_floor,
            fallback_level: 0,
            note: None,
        }
    }
}

/// Greedy MMR selection maximizing `λ·relevance − (1−λ)·max_sim·relevance`
/// where similarity is Jaccard over lowercased tokens of length ≥3 (§4.K
/// step 9).
fn mmr_select(candidates: Vec<HybridHit>, limit: usize, lambda: f32) -> Vec<HybridHit> {
    let tokens: Vec<HashSet<String>> = candidates
        .iter()
        .map(|c| tokenize(c.snippet.as_deref().unwrap_or(&c.content)))
        .collect();
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected_idx: Vec<usize> = Vec::new();

    while selected_idx.len() < limit && !remaining.is_empty() {
        let mut best_pos = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (pos, &i) in remaining.iter().enumerate() {
            let relevance = candidates[i].score;
            let max_sim = selected_idx
                .iter()
                .map(|&j| jaccard(&tokens[i], &tokens[j]))
                .fold(0.0f32, f32::max);
            let mmr_score = lambda * relevance - (1.0 - lambda) * max_sim * relevance;
            if mmr_score > best_score {
                best_score = mmr_score;
                best_pos = pos;
            }
        }
        selected_idx.push(remaining.remove(best_pos));
    }

    let mut by_index: HashMap<usize, HybridHit> = candidates.into_iter().enumerate().collect();
    selected_idx
        .into_iter()
        .filter_map(|i| by_index.remove(&i))
        .collect()
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 3)
        .map(String::from)
        .collect()
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    if union == 0.0 {
        0.0
    } else {
        intersection / union
    }
}

/// Overall confidence assignment (§4.K step 10).
fn compute_confidence(hits: &[HybridHit], degraded: bool, is_fallback: bool) -> Confidence {
    if hits.is_empty() {
        return Confidence::None;
    }
    let max_strategies = hits.iter().map(|h| h.strategies_found).max().unwrap_or(1);
    let dual_found = hits.iter().filter(|h| h.strategies_found >= 2).count();

    let mut confidence = if max_strategies >= 2 && dual_found * 2 >= hits.len() {
        Confidence::VeryHigh
    } else if max_strategies >= 2 && dual_found > 0 {
        Confidence::High
    } else {
        Confidence::Medium
    };

    if degraded || is_fallback {
        confidence = match confidence {
            Confidence::VeryHigh => Confidence::High,
            Confidence::High => Confidence::Medium,
            Confidence::Medium => Confidence::Low,
            other => other,
        };
    }
    confidence
}

// ---- Plain RRF/weighted-fusion helpers, retained for standalone callers ---

/// Reciprocal rank fusion over already-ranked id lists, `k = 60` (§8).
pub fn reciprocal_rank_fusion(ranked_lists: &[Vec<String>], k: usize) -> Vec<(String, f32)> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    for list in ranked_lists {
        for (rank, id) in list.iter().enumerate() {
            *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k as f32 + rank as f32 + 1.0);
        }
    }
    let mut result: Vec<(String, f32)> = scores.into_iter().collect();
    result.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    result
}

/// Weighted linear fusion over two already-scored id lists.
pub fn weighted_fusion(
    lexical: &[(String, f32)],
    semantic: &[(String, f32)],
    lexical_weight: f32,
    semantic_weight: f32,
) -> Vec<(String, f32)> {
    let mut scores: HashMap<String, f32> = HashMap::new();
    for (id, score) in lexical {
        *scores.entry(id.clone()).or_insert(0.0) += score * lexical_weight;
    }
    for (id, score) in semantic {
        *scores.entry(id.clone()).or_insert(0.0) += score * semantic_weight;
    }
    let mut result: Vec<(String, f32)> = scores.into_iter().collect();
    result.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_quoted_phrase_as_exact_quote_type() {
        let q = "\"Oak Ridge National Laboratory\"";
        assert!(detect_quoted(q));
        let nouns = detect_proper_nouns(q);
        let qtype = classify_query(q, true, &nouns);
        assert_eq!(qtype, QueryType::ExactQuote);
    }

    #[test]
    fn detects_proper_noun_runs() {
        let nouns = detect_proper_nouns("tell me about Oak Ridge National Laboratory today");
        assert!(nouns.iter().any(|n| n.contains("Oak Ridge")));
    }

    #[test]
    fn conceptual_query_classified_correctly() {
        let qtype = classify_query("how does chunking work", false, &[]);
        assert_eq!(qtype, QueryType::Conceptual);
    }

    #[test]
    fn factual_query_detects_years_and_versions() {
        let qtype = classify_query("released in 2023 version 1.2.3", false, &[]);
        assert_eq!(qtype, QueryType::Factual);
    }

    #[test]
    fn rrf_combines_ranked_lists_by_reciprocal_rank() {
        let a = vec!["x".to_string(), "y".to_string()];
        let b = vec!["y".to_string(), "z".to_string()];
        let fused = reciprocal_rank_fusion(&[a, b], 60);
        assert_eq!(fused[0].0, "y");
    }

    #[test]
    fn mmr_select_deduplicates_near_identical_candidates() {
        let make = |id: &str, content: &str, score: f32| HybridHit {
            chunk_id: id.to_string(),
            document_id: "d".to_string(),
            score,
            content: content.to_string(),
            title: "t".to_string(),
            path: "p".to_string(),
            snippet: None,
            strategies_found: 1,
        };
        let candidates = vec![
            make("a", "the quick brown fox jumps over lazy dog", 1.0),
            make("b", "the quick brown fox jumps over lazy cat", 0.9),
            make("c", "completely unrelated content about space travel", 0.8),
        ];
        let selected = mmr_select(candidates, 2, 0.5);
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].chunk_id, "a");
        assert_eq!(selected[1].chunk_id, "c");
    }

    #[test]
    fn confidence_is_very_high_when_most_results_dual_found() {
        let make = |id: &str| HybridHit {
            chunk_id: id.to_string(),
            document_id: "d".to_string(),
            score: 1.0,
            content: String::new(),
            title: String::new(),
            path: String::new(),
            snippet: None,
            strategies_found: 2,
        };
        let hits = vec![make("a"), make("b")];
        assert_eq!(compute_confidence(&hits, false, false), Confidence::VeryHigh);
    }
}
