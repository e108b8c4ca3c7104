//! Content cleaning pipeline (§4.B): OCR ligature repair, PDF artifact
//! repair, boilerplate stripping, and whitespace normalization, run in that
//! fixed order to produce clean UTF-8 text for chunking and embedding.

use once_cell::sync::Lazy;
use regex::Regex;

/// Curated OCR ligature/substitution table. Applied only to PDF-originated
/// content, where scanned-font kerning regularly drops or merges glyphs.
static OCR_LIGATURES: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"staSs").unwrap(), "staffs"),
        (Regex::new(r"Snd").unwrap(), "find"),
        (Regex::new(r"\bfi\b").unwrap(), "fi"),
        (Regex::new(r"rn(?=[a-z])").unwrap(), "m"),
        (Regex::new(r"(?i)\bteh\b").unwrap(), "the"),
    ]
});

static HYPHEN_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w)-\n(\w)").unwrap());
static FORM_FEED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x0c").unwrap());
static STANDALONE_PAGE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*\d{1,4}\s*$\n?").unwrap());

static BOILERPLATE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)downloaded from .*\n").unwrap(),
        Regex::new(r"(?i)©\s*\d{4}.*all rights reserved\.?\n?").unwrap(),
        Regex::new(r"(?i)copyright\s*(\(c\)|©)?\s*\d{4}.*\n?").unwrap(),
        Regex::new(r"\.{4,}\s*\d+\n?").unwrap(), // TOC dot-leaders
        Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap(), // bare IPv4
    ]
});

static TABS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t").unwrap());
static WHITESPACE_RUNS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[  ]{2,}").unwrap());
static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Whether content originated from PDF extraction (gates OCR-specific
/// repairs that would otherwise corrupt clean text, e.g. `rn` → `m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOrigin {
    Pdf,
    Other,
}

pub struct ContentCleaner;

impl ContentCleaner {
    /// Runs the full fixed-order pipeline and returns clean UTF-8 text.
    pub fn clean(text: &str, origin: ContentOrigin) -> String {
        let mut out = text.to_string();
        if origin == ContentOrigin::Pdf {
            out = Self::repair_ocr_ligatures(&out);
            out = Self::repair_pdf_artifacts(&out);
        }
        out = Self::strip_boilerplate(&out);
        out = Self::normalize_whitespace(&out);
        out
    }

    fn repair_ocr_ligatures(text: &str) -> String {
        let mut out = text.to_string();
        for (pattern, replacement) in OCR_LIGATURES.iter() {
            out = pattern.replace_all(&out, *replacement).into_owned();
        }
        out
    }

    fn repair_pdf_artifacts(text: &str) -> String {
        let out = HYPHEN_BREAK.replace_all(text, "$1$2");
        let out = FORM_FEED.replace_all(&out, "\n");
        STANDALONE_PAGE_NUMBER.replace_all(&out, "").into_owned()
    }

    fn strip_boilerplate(text: &str) -> String {
        let mut out = text.to_string();
        for pattern in BOILERPLATE_PATTERNS.iter() {
            out = pattern.replace_all(&out, "").into_owned();
        }
        out
    }

    fn normalize_whitespace(text: &str) -> String {
        let out = TABS.replace_all(text, " ");
        let out = WHITESPACE_RUNS.replace_all(&out, " ");
        EXCESS_BLANK_LINES.replace_all(&out, "\n\n").into_owned()
    }

    /// Removes lines (5..99 chars) that repeat across the document at least
    /// `max(3, 3% of total lines)` times — running/page headers and footers
    /// that survive per-page extraction. Offered as a separate pass since it
    /// needs whole-document context, unlike the fixed pipeline above.
    pub fn strip_repeated_headers(text: &str) -> String {
        let lines: Vec<&str> = text.lines().collect();
        if lines.is_empty() {
            return text.to_string();
        }

        let threshold = ((lines.len() as f64 * 0.03).ceil() as usize).max(3);
        let mut counts = std::collections::HashMap::new();
        for line in &lines {
            let trimmed = line.trim();
            if trimmed.len() >= 5 && trimmed.len() <= 99 {
                *counts.entry(trimmed.to_string()).or_insert(0usize) += 1;
            }
        }

        let repeated: std::collections::HashSet<String> = counts
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .map(|(line, _)| line)
            .collect();

        lines
            .into_iter()
            .filter(|line| !repeated.contains(line.trim()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejoins_hyphenated_line_breaks() {
        let input = "a very long-\nword here";
        let cleaned = ContentCleaner::clean(input, ContentOrigin::Pdf);
        assert!(cleaned.contains("longword"));
    }

    #[test]
    fn strips_standalone_page_numbers() {
        let input = "Intro text\n42\nMore text";
        let cleaned = ContentCleaner::clean(input, ContentOrigin::Pdf);
        assert!(!cleaned.lines().any(|l| l.trim() == "42"));
    }

    #[test]
    fn collapses_whitespace_runs_and_blank_lines() {
        let input = "a   b\n\n\n\nc";
        let cleaned = ContentCleaner::clean(input, ContentOrigin::Other);
        assert_eq!(cleaned, "a b\n\nc");
    }

    #[test]
    fn does_not_apply_ocr_repair_to_non_pdf_content() {
        let input = "barn door";
        let cleaned = ContentCleaner::clean(input, ContentOrigin::Other);
        assert_eq!(cleaned, "barn door");
    }

    #[test]
    fn strips_headers_repeated_above_threshold() {
        let mut lines = Vec::new();
        for i in 0..100 {
            lines.push("Confidential Draft".to_string());
            lines.push(format!("body line {i}"));
        }
        let text = lines.join("\n");
        let cleaned = ContentCleaner::strip_repeated_headers(&text);
        assert!(!cleaned.contains("Confidential Draft"));
        assert!(cleaned.contains("body line 0"));
    }
}
