//! Validator (§4.N): rejects malformed/suspicious extraction output and
//! normalizes what survives before it reaches the relational store.

use once_cell::sync::Lazy;
use regex::RegexBuilder;
use std::collections::HashMap;

use crate::llm::provider::{ExtractedEntity, ExtractedRelation};
use crate::types::normalize_predicate;

const MAX_NAME_LEN: usize = 500;
const MAX_DESCRIPTION_LEN: usize = 2000;

const INJECTION_PATTERNS: &[&str] = &[
    "ignore previous instructions",
    "ignore all previous instructions",
    "disregard the above",
    "system prompt",
    "you are now",
];

static INJECTION_RE: Lazy<Vec<regex::Regex>> = Lazy::new(|| {
    INJECTION_PATTERNS
        .iter()
        .map(|p| {
            RegexBuilder::new(&regex::escape(p))
                .case_insensitive(true)
                .build()
                .unwrap()
        })
        .collect()
});

/// Strips control characters, collapses whitespace, and trims boundary
/// punctuation (§4.N Validator "Normalizes names").
pub fn normalize_name(raw: &str) -> String {
    let stripped: String = raw.chars().filter(|c| !c.is_control()).collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| c.is_ascii_punctuation() && c != '-' && c != '_')
        .to_string()
}

fn is_suspicious(text: &str) -> bool {
    INJECTION_RE.iter().any(|re| re.is_match(text))
}

fn clamp(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Validated and normalized extraction output, ready for persistence.
#[derive(Debug, Clone, Default)]
pub struct ValidatedExtraction {
    pub entities: Vec<ExtractedEntity>,
    pub relations: Vec<ExtractedRelation>,
}

/// Applies the full validator pipeline (§4.N Validator):
/// - entities: reject empty/over-long names, injection-pattern matches,
///   confidence below threshold; normalize name and clamp description.
/// - relations: normalize subject/object names, require both to match a
///   surviving entity by normalized name, reject self-references, map
///   unknown predicates to `relates_to`.
pub fn validate(
    entities: Vec<ExtractedEntity>,
    relations: Vec<ExtractedRelation>,
    confidence_threshold: f32,
) -> ValidatedExtraction {
    let mut seen_names: HashMap<String, ()> = HashMap::new();
    let valid_entities: Vec<ExtractedEntity> = entities
        .into_iter()
        .filter_map(|mut e| {
            let name = normalize_name(&e.name);
            if name.is_empty() || name.chars().count() > MAX_NAME_LEN {
                return None;
            }
            if is_suspicious(&name) || is_suspicious(&e.description) {
                return None;
            }
            if e.confidence < confidence_threshold {
                return None;
            }
            e.name = name.clone();
            e.description = clamp(&e.description, MAX_DESCRIPTION_LEN);
            seen_names.insert(name.to_lowercase(), ());
            Some(e)
        })
        .collect();

    let valid_relations: Vec<ExtractedRelation> = relations
        .into_iter()
        .filter_map(|mut r| {
            let subject = normalize_name(&r.subject);
            let object = normalize_name(&r.object);
            if subject.is_empty() || object.is_empty() {
                return None;
            }
            if subject.eq_ignore_ascii_case(&object) {
                return None;
            }
            if !seen_names.contains_key(&subject.to_lowercase())
                || !seen_names.contains_key(&object.to_lowercase())
            {
                return None;
            }
            if r.confidence < confidence_threshold {
                return None;
            }
            r.subject = subject;
            r.object = object;
            r.predicate = normalize_predicate(&r.predicate);
            Some(r)
        })
        .collect();

    ValidatedExtraction {
        entities: valid_entities,
        relations: valid_relations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EntityType;

    fn entity(name: &str, confidence: f32) -> ExtractedEntity {
        ExtractedEntity {
            name: name.to_string(),
            entity_type: EntityType::Concept,
            description: "d".to_string(),
            confidence,
        }
    }

    fn relation(subject: &str, predicate: &str, object: &str) -> ExtractedRelation {
        ExtractedRelation {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object: object.to_string(),
            confidence: 0.9,
        }
    }

    #[test]
    fn rejects_empty_name_after_normalization() {
        let out = validate(vec![entity("   ", 0.9)], vec![], 0.5);
        assert!(out.entities.is_empty());
    }

    #[test]
    fn rejects_low_confidence_entity() {
        let out = validate(vec![entity("Rust", 0.1)], vec![], 0.5);
        assert!(out.entities.is_empty());
    }

    #[test]
    fn rejects_relation_referencing_unknown_entity() {
        let out = validate(
            vec![entity("Rust", 0.9)],
            vec![relation("Rust", "depends_on", "Ghost Entity")],
            0.5,
        );
        assert!(out.relations.is_empty());
    }

    #[test]
    fn rejects_self_relations() {
        let out = validate(
            vec![entity("Rust", 0.9)],
            vec![relation("Rust", "relates_to", "Rust")],
            0.5,
        );
        assert!(out.relations.is_empty());
    }

    #[test]
    fn keeps_valid_relation_and_normalizes_predicate() {
        let out = validate(
            vec![entity("Rust", 0.9), entity("Cargo", 0.9)],
            vec![relation("Rust", "weird-unknown predicate", "Cargo")],
            0.5,
        );
        assert_eq!(out.relations.len(), 1);
        assert_eq!(out.relations[0].predicate, "relates_to");
    }

    #[test]
    fn strips_control_chars_and_collapses_whitespace() {
        assert_eq!(normalize_name("  Rust\t\tLang\n  "), "Rust Lang");
    }
}
