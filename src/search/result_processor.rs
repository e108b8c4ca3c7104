//! Result processor (§4.L): groups hybrid hits by document, merges
//! overlapping snippets, and applies boilerplate cleanup to the merged text.

use std::collections::HashMap;

use crate::processing::cleaner::{ContentCleaner, ContentOrigin};
use crate::search::hybrid::HybridHit;

#[derive(Debug, Clone)]
pub struct ProcessedResult {
    pub document_id: String,
    pub title: String,
    pub path: String,
    pub filename: String,
    pub merged_text: String,
    pub average_score: f32,
    pub chunk_count: usize,
    pub metadata: HashMap<String, String>,
}

/// Groups hits by `document_id` preserving first-appearance order, merges
/// snippets, and applies boilerplate removal to the merged text (§4.L).
pub fn process_results(hits: &[HybridHit]) -> Vec<ProcessedResult> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<&HybridHit>> = HashMap::new();

    for hit in hits {
        if !groups.contains_key(&hit.document_id) {
            order.push(hit.document_id.clone());
        }
        groups.entry(hit.document_id.clone()).or_default().push(hit);
    }

    order
        .into_iter()
        .map(|document_id| {
            let group = groups.remove(&document_id).unwrap_or_default();
            let merged_raw = merge_snippets(&group);
            let merged_text = ContentCleaner::clean(&merged_raw, ContentOrigin::Other);
            let average_score = group.iter().map(|h| h.score).sum::<f32>() / group.len() as f32;
            let first = group[0];
            let filename = first
                .path
                .rsplit('/')
                .next()
                .unwrap_or(&first.path)
                .to_string();

            ProcessedResult {
                document_id,
                title: first.title.clone(),
                path: first.path.clone(),
                filename,
                merged_text,
                average_score,
                chunk_count: group.len(),
                metadata: HashMap::new(),
            }
        })
        .collect()
}

/// Concatenates a document's hit texts, eliding any end/start overlap
/// between consecutive pieces (checked over lengths 10..150, §4.L).
fn merge_snippets(hits: &[&HybridHit]) -> String {
    let texts: Vec<&str> = hits
        .iter()
        .map(|h| h.snippet.as_deref().unwrap_or(h.content.as_str()))
        .collect();

    let mut merged = String::new();
    for text in texts {
        if merged.is_empty() {
            merged.push_str(text);
            continue;
        }
        let overlap = find_overlap(&merged, text);
        merged.push_str(&text[overlap..]);
    }
    merged
}

/// Finds the longest suffix of `a` that is a prefix of `b`, checked over
/// lengths 10..150 chars, returning the byte offset into `b` to resume from.
fn find_overlap(a: &str, b: &str) -> usize {
    let max_len = 150.min(a.chars().count()).min(b.chars().count());
    for len in (10..=max_len).rev() {
        let a_suffix: String = a.chars().rev().take(len).collect::<Vec<_>>().into_iter().rev().collect();
        let b_prefix: String = b.chars().take(len).collect();
        if a_suffix.eq_ignore_ascii_case(&b_prefix) {
            return b_prefix.len();
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(document_id: &str, content: &str, score: f32) -> HybridHit {
        HybridHit {
            chunk_id: format!("{document_id}-{content}"),
            document_id: document_id.to_string(),
            score,
            content: content.to_string(),
            title: "doc title".to_string(),
            path: "folder/report.pdf".to_string(),
            snippet: Some(content.to_string()),
            strategies_found: 1,
        }
    }

    #[test]
    fn groups_hits_by_document_preserving_first_appearance_order() {
        let hits = vec![hit("d2", "second doc", 0.5), hit("d1", "first doc", 0.9)];
        let results = process_results(&hits);
        assert_eq!(results[0].document_id, "d2");
        assert_eq!(results[1].document_id, "d1");
    }

    #[test]
    fn merges_overlapping_snippets_without_duplicating_overlap() {
        let hits = vec![
            hit("d1", "the quick brown fox jumps over the lazy dog end", 0.9),
            hit("d1", "the lazy dog end continues into the next paragraph here", 0.8),
        ];
        let results = process_results(&hits);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk_count, 2);
        assert!(results[0].merged_text.contains("continues into the next paragraph"));
    }

    #[test]
    fn averages_score_across_chunks_in_a_document() {
        let hits = vec![hit("d1", "a", 1.0), hit("d1", "b", 0.0)];
        let results = process_results(&hits);
        assert_eq!(results[0].average_score, 0.5);
    }

    #[test]
    fn derives_filename_from_path() {
        let hits = vec![hit("d1", "content", 1.0)];
        let results = process_results(&hits);
        assert_eq!(results[0].filename, "report.pdf");
    }
}
