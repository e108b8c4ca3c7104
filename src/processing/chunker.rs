use crate::types::{DocumentFormat, DocumentSection};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

/// Content class driving chunker dispatch (§4.C).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    Text,
    Code,
    Markdown,
    Pdf,
}

impl ContentClass {
    pub fn from_format(format: DocumentFormat) -> Self {
        match format {
            DocumentFormat::Code => ContentClass::Code,
            DocumentFormat::MD => ContentClass::Markdown,
            DocumentFormat::PDF => ContentClass::Pdf,
            _ => ContentClass::Text,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub id: Uuid,
    pub text: String,
    pub index: usize,
    pub heading: Option<String>,
    pub start_offset: usize,
    pub end_offset: usize,
}

pub struct TextChunker {
    chunk_size: usize,
    chunk_overlap: usize,
    min_chunk_size: usize,
}

impl TextChunker {
    pub fn new(chunk_size: usize, chunk_overlap: usize, min_chunk_size: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
            min_chunk_size,
        }
    }

    pub fn chunk(&self, text: &str) -> Vec<ChunkResult> {
        if text.len() <= self.chunk_size {
            if text.len() < self.min_chunk_size {
                return Vec::new();
            }
            return vec![ChunkResult {
                id: Uuid::new_v4(),
                text: text.to_string(),
                index: 0,
                heading: None,
                start_offset: 0,
                end_offset: text.len(),
            }];
        }

        let mut chunks = Vec::new();
        let mut start = 0;
        let mut index = 0;

        while start < text.len() {
            let raw_end = (start + self.chunk_size).min(text.len());
            let end = snap_to_char_boundary(text, raw_end);

            // Try to find a sentence boundary near the end
            let actual_end = if end < text.len() {
                self.find_break_point(text, start, end)
            } else {
                end
            };

            let chunk_text = &text[start..actual_end];

            if chunk_text.len() >= self.min_chunk_size {
                let heading = self.extract_heading(chunk_text);

                chunks.push(ChunkResult {
                    id: Uuid::new_v4(),
                    text: chunk_text.to_string(),
                    index,
                    heading,
                    start_offset: start,
                    end_offset: actual_end,
                });
                index += 1;
            }

            if actual_end >= text.len() {
                break;
            }

            // Move forward with overlap
            let step = if actual_end - start > self.chunk_overlap {
                actual_end - start - self.chunk_overlap
            } else {
                actual_end - start
            };

            let raw_next = start + step;
            start = snap_to_char_boundary(text, raw_next);
            if start >= text.len() {
                break;
            }
        }

        chunks
    }

    fn find_break_point(&self, text: &str, start: usize, preferred_end: usize) -> usize {
        let raw_search_start = if preferred_end > 200 {
            preferred_end - 200
        } else {
            start
        };
        let search_start = snap_to_char_boundary(text, raw_search_start);
        let safe_end = snap_to_char_boundary(text, preferred_end);

        if search_start >= safe_end {
            return safe_end;
        }

        let search_region = &text[search_start..safe_end];

        // Priority: paragraph break > sentence end > line break > word break
        if let Some(pos) = search_region.rfind("\n\n") {
            return search_start + pos + 2;
        }
        if let Some(pos) = search_region.rfind(". ") {
            return search_start + pos + 2;
        }
        if let Some(pos) = search_region.rfind(".\n") {
            return search_start + pos + 2;
        }
        if let Some(pos) = search_region.rfind('\n') {
            return search_start + pos + 1;
        }
        if let Some(pos) = search_region.rfind(' ') {
            return search_start + pos + 1;
        }

        safe_end
    }

    fn extract_heading(&self, text: &str) -> Option<String> {
        let first_line = text.lines().next()?;
        if first_line.starts_with('#') {
            Some(first_line.trim_start_matches('#').trim().to_string())
        } else {
            None
        }
    }
}

/// Snap a byte offset to the nearest valid UTF-8 char boundary (rounding down).
/// If `pos` is already on a boundary, returns `pos` unchanged.
/// If `pos` is beyond text length, returns `text.len()`.
fn snap_to_char_boundary(text: &str, pos: usize) -> usize {
    if pos >= text.len() {
        return text.len();
    }
    // Walk backwards until we hit a char boundary
    let mut p = pos;
    while p > 0 && !text.is_char_boundary(p) {
        p -= 1;
    }
    p
}

/// A chunk with document-level context prepended for embedding.
/// The original text is preserved for display; the contextualized form is used
/// for embedding and full-text indexing to improve retrieval recall.
#[derive(Debug, Clone)]
pub struct ContextualChunkResult {
    pub id: Uuid,
    /// Original chunk text (stored in DB and shown to user)
    pub text: String,
    /// Context-prefixed text (embedded and FTS-indexed for better retrieval)
    pub contextualized_text: String,
    pub index: usize,
    pub heading: Option<String>,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl TextChunker {
    /// Chunk with document-level context prepended before embedding.
    /// Prepending "Document: X. Section: Y." to each chunk before embedding
    /// improves retrieval by giving the embedding model document-level awareness.
    pub fn chunk_with_context(
        &self,
        text: &str,
        doc_title: &str,
        doc_source: &str,
    ) -> Vec<ContextualChunkResult> {
        let base_chunks = self.chunk(text);

        // Extract first paragraph as document summary (for chunks without headings)
        let doc_summary: String = text
            .split("\n\n")
            .next()
            .unwrap_or("")
            .chars()
            .take(200)
            .collect();

        base_chunks
            .into_iter()
            .map(|chunk| {
                let section = chunk
                    .heading
                    .as_deref()
                    .filter(|h| !h.is_empty())
                    .unwrap_or(&doc_summary);

                let context_prefix = format!(
                    "Document: \"{}\". Source: {}. Section: {}. ",
                    doc_title, doc_source, section
                );

                ContextualChunkResult {
                    contextualized_text: format!("{}{}", context_prefix, chunk.text),
                    id: chunk.id,
                    text: chunk.text,
                    index: chunk.index,
                    heading: chunk.heading,
                    start_offset: chunk.start_offset,
                    end_offset: chunk.end_offset,
                }
            })
            .collect()
    }

    /// Structure-aware chunking for documents with typed sections (PDFs with forms, tables, etc.).
    /// Keeps related data together: all form fields in one chunk, tables as atomic units,
    /// relationship text as a single chunk. Falls back to sliding-window for narrative text.
    pub fn chunk_structured(
        &self,
        sections: &[DocumentSection],
        doc_title: &str,
        doc_source: &str,
    ) -> Vec<ContextualChunkResult> {
        let mut results = Vec::new();
        let mut global_index = 0usize;

        for section in sections {
            match section {
                DocumentSection::FormFields { fields, page } => {
                    let mut body = String::new();
                    for (key, value) in fields {
                        if !key.is_empty() && !value.is_empty() {
                            body.push_str(key);
                            body.push_str(": ");
                            body.push_str(value);
                            body.push('\n');
                        }
                    }
                    let body = body.trim().to_string();
                    if body.is_empty() {
                        continue;
                    }

                    let page_label = if *page > 0 {
                        format!(" (Page {})", page)
                    } else {
                        String::new()
                    };

                    // If form fields fit in one chunk, keep them atomic
                    if body.len() <= self.chunk_size * 2 {
                        let context_prefix = format!(
                            "Document: \"{}\". Source: {}. Form Data{}. ",
                            doc_title, doc_source, page_label
                        );
                        results.push(ContextualChunkResult {
                            id: Uuid::new_v4(),
                            text: body.clone(),
                            contextualized_text: format!("{}{}", context_prefix, body),
                            index: global_index,
                            heading: Some("Form Fields".to_string()),
                            start_offset: 0,
                            end_offset: body.len(),
                        });
                        global_index += 1;
                    } else {
                        // Very large form — split by groups of lines, keeping all fields visible
                        let lines: Vec<&str> = body.lines().collect();
                        let mut chunk_start = 0;
                        while chunk_start < lines.len() {
                            let mut char_count = 0;
                            let mut chunk_end = chunk_start;
                            while chunk_end < lines.len()
                                && char_count + lines[chunk_end].len() < self.chunk_size
                            {
                                char_count += lines[chunk_end].len() + 1;
                                chunk_end += 1;
                            }
                            if chunk_end == chunk_start {
                                chunk_end = chunk_start + 1;
                            }
                            let chunk_text = lines[chunk_start..chunk_end].join("\n");
                            let context_prefix = format!(
                                "Document: \"{}\". Source: {}. Form Data{} (part {}). ",
                                doc_title,
                                doc_source,
                                page_label,
                                results.len() + 1
                            );
                            results.push(ContextualChunkResult {
                                id: Uuid::new_v4(),
                                text: chunk_text.clone(),
                                contextualized_text: format!("{}{}", context_prefix, chunk_text),
                                index: global_index,
                                heading: Some("Form Fields".to_string()),
                                start_offset: 0,
                                end_offset: chunk_text.len(),
                            });
                            global_index += 1;
                            chunk_start = chunk_end;
                        }
                    }
                }

                DocumentSection::Table {
                    headers,
                    rows,
                    page,
                    caption,
                } => {
                    if rows.is_empty() {
                        continue;
                    }

                    let cap = caption.as_deref().unwrap_or("Table");
                    let header_line = format!("| {} |", headers.join(" | "));
                    let separator = format!(
                        "| {} |",
                        headers
                            .iter()
                            .map(|_| "---")
                            .collect::<Vec<_>>()
                            .join(" | ")
                    );

                    // Build full table as markdown
                    let mut table_body = format!("{}\n{}\n", header_line, separator);
                    for row in rows {
                        table_body.push_str(&format!("| {} |\n", row.join(" | ")));
                    }
                    let table_body = table_body.trim().to_string();

                    let context_prefix = format!(
                        "Document: \"{}\". Source: {}. {} (Page {}). ",
                        doc_title, doc_source, cap, page
                    );

                    // If table fits in one chunk, keep it atomic
                    if table_body.len() <= self.chunk_size * 2 {
                        results.push(ContextualChunkResult {
                            id: Uuid::new_v4(),
                            text: table_body.clone(),
                            contextualized_text: format!("{}{}", context_prefix, table_body),
                            index: global_index,
                            heading: Some(format!("Table (Page {})", page)),
                            start_offset: 0,
                            end_offset: table_body.len(),
                        });
                        global_index += 1;
                    } else {
                        // Large table — split by row groups, repeat headers in each chunk
                        let row_lines: Vec<String> = rows
                            .iter()
                            .map(|row| format!("| {} |", row.join(" | ")))
                            .collect();
                        let header_block = format!("{}\n{}", header_line, separator);
                        let header_len = header_block.len() + 1;

                        let mut row_start = 0;
                        let mut part = 1;
                        while row_start < row_lines.len() {
                            let mut char_count = header_len;
                            let mut row_end = row_start;
                            while row_end < row_lines.len()
                                && char_count + row_lines[row_end].len() + 1 < self.chunk_size
                            {
                                char_count += row_lines[row_end].len() + 1;
                                row_end += 1;
                            }
                            if row_end == row_start {
                                row_end = row_start + 1;
                            }
                            let chunk_text = format!(
                                "{}\n{}",
                                header_block,
                                row_lines[row_start..row_end].join("\n")
                            );
                            let ctx = format!(
                                "Document: \"{}\". Source: {}. {} (Page {}, part {}). ",
                                doc_title, doc_source, cap, page, part
                            );
                            results.push(ContextualChunkResult {
                                id: Uuid::new_v4(),
                                text: chunk_text.clone(),
                                contextualized_text: format!("{}{}", ctx, chunk_text),
                                index: global_index,
                                heading: Some(format!("Table (Page {})", page)),
                                start_offset: 0,
                                end_offset: chunk_text.len(),
                            });
                            global_index += 1;
                            row_start = row_end;
                            part += 1;
                        }
                    }
                }

                DocumentSection::Relationships { content } => {
                    let content = content.trim();
                    if content.is_empty() {
                        continue;
                    }

                    let context_prefix = format!(
                        "Document: \"{}\". Source: {}. Key Relationships. ",
                        doc_title, doc_source
                    );

                    if content.len() <= self.chunk_size * 2 {
                        results.push(ContextualChunkResult {
                            id: Uuid::new_v4(),
                            text: content.to_string(),
                            contextualized_text: format!("{}{}", context_prefix, content),
                            index: global_index,
                            heading: Some("Relationships".to_string()),
                            start_offset: 0,
                            end_offset: content.len(),
                        });
                        global_index += 1;
                    } else {
                        // Large relationship block — use sliding window
                        let sub_chunks = self.chunk_with_context(content, doc_title, doc_source);
                        for mut sc in sub_chunks {
                            sc.index = global_index;
                            sc.heading = Some("Relationships".to_string());
                            results.push(sc);
                            global_index += 1;
                        }
                    }
                }

                DocumentSection::Text {
                    content,
                    page,
                    heading,
                } => {
                    let content = content.trim();
                    if content.len() < self.min_chunk_size {
                        continue;
                    }

                    let page_label = format!("Page {}", page);
                    let section_label = heading.as_deref().unwrap_or(&page_label);
                    let page_source = format!("{} (Page {})", doc_source, page);

                    let sub_chunks = self.chunk_with_context(content, doc_title, &page_source);
                    for mut sc in sub_chunks {
                        sc.index = global_index;
                        if sc.heading.is_none() {
                            sc.heading = Some(section_label.to_string());
                        }
                        results.push(sc);
                        global_index += 1;
                    }
                }
            }
        }

        results
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::new(1750, 200, 100)
    }
}

static ATX_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^(#{1,6})\s+(.+)$").unwrap());

/// Per-extension top-level boundary patterns for code-aware chunking (§4.C).
/// Each capture group 1 is the construct kind stored in chunk metadata.
static CODE_BOUNDARIES: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        (
            "rs",
            Regex::new(r"(?m)^\s*(?:pub\s+)?(fn|struct|enum|trait|impl|mod)\s+\w").unwrap(),
        ),
        (
            "py",
            Regex::new(r"(?m)^(def|class)\s+\w").unwrap(),
        ),
        (
            "go",
            Regex::new(r"(?m)^func\s+|^type\s+\w+\s+struct").unwrap(),
        ),
        (
            "js",
            Regex::new(r"(?m)^(export\s+)?(function|class)\s+\w").unwrap(),
        ),
        (
            "ts",
            Regex::new(r"(?m)^(export\s+)?(function|class|interface)\s+\w").unwrap(),
        ),
        (
            "java",
            Regex::new(r"(?m)^\s*(public|private|protected)?\s*(class|interface)\s+\w").unwrap(),
        ),
    ]
});

impl TextChunker {
    /// Markdown-aware chunking (§4.C): split on ATX headers, sentence-chunk
    /// each section, carrying the header text as `section` metadata via
    /// `ContextualChunkResult::heading`.
    pub fn chunk_markdown(
        &self,
        text: &str,
        doc_title: &str,
        doc_source: &str,
    ) -> Vec<ContextualChunkResult> {
        let mut sections: Vec<(Option<String>, String)> = Vec::new();
        let mut last_end = 0;
        let mut current_heading: Option<String> = None;
        let mut matches: Vec<(usize, usize, String)> = ATX_HEADER
            .captures_iter(text)
            .map(|caps| {
                let m = caps.get(0).unwrap();
                (m.start(), m.end(), caps[2].trim().to_string())
            })
            .collect();
        matches.push((text.len(), text.len(), String::new()));

        for (start, end, heading) in matches {
            if start > last_end {
                let body = &text[last_end..start];
                if !body.trim().is_empty() {
                    sections.push((current_heading.clone(), body.to_string()));
                }
            }
            current_heading = if heading.is_empty() {
                current_heading
            } else {
                Some(heading)
            };
            last_end = end;
        }

        if sections.is_empty() {
            sections.push((None, text.to_string()));
        }

        let mut results = Vec::new();
        let mut global_index = 0usize;
        for (heading, body) in sections {
            let section_source = match &heading {
                Some(h) => format!("{} — {}", doc_source, h),
                None => doc_source.to_string(),
            };
            let sub_chunks = self.chunk_with_context(&body, doc_title, &section_source);
            for mut sc in sub_chunks {
                sc.index = global_index;
                sc.heading = heading.clone().or(sc.heading);
                results.push(sc);
                global_index += 1;
            }
        }
        results
    }

    /// Code-aware chunking (§4.C): detect top-level boundaries for the given
    /// file extension, treat each boundary as delimiting a block, and
    /// recursively re-chunk blocks larger than `chunk_size`. Block kind
    /// (`function`, `class`, `block`) is stored via the returned metadata
    /// alongside each chunk's heading.
    pub fn chunk_code(
        &self,
        text: &str,
        extension: &str,
        doc_title: &str,
        doc_source: &str,
    ) -> Vec<(ContextualChunkResult, &'static str)> {
        let boundaries = CODE_BOUNDARIES
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, re)| re);

        let Some(pattern) = boundaries else {
            // No known boundary grammar for this extension: fall back to the
            // generic sentence/line-aware chunker, all blocks untyped.
            return self
                .chunk_with_context(text, doc_title, doc_source)
                .into_iter()
                .map(|c| (c, "block"))
                .collect();
        };

        let starts: Vec<usize> = pattern.find_iter(text).map(|m| m.start()).collect();
        if starts.is_empty() {
            return self
                .chunk_with_context(text, doc_title, doc_source)
                .into_iter()
                .map(|c| (c, "block"))
                .collect();
        }

        let mut blocks: Vec<(usize, usize)> = Vec::new();
        if starts[0] > 0 {
            blocks.push((0, starts[0]));
        }
        for window in starts.windows(2) {
            blocks.push((window[0], window[1]));
        }
        blocks.push((*starts.last().unwrap(), text.len()));

        let mut results = Vec::new();
        let mut global_index = 0usize;
        for (start, end) in blocks {
            let block_text = &text[start..end];
            if block_text.trim().is_empty() {
                continue;
            }
            let kind = if block_text.contains("class ") || block_text.contains("struct ") {
                "class"
            } else if block_text.contains("fn ") || block_text.contains("func ") || block_text.contains("def ") {
                "function"
            } else {
                "block"
            };

            if block_text.len() <= self.chunk_size {
                results.push((
                    ContextualChunkResult {
                        id: Uuid::new_v4(),
                        text: block_text.to_string(),
                        contextualized_text: format!(
                            "Document: \"{}\". Source: {}. Code {}. {}",
                            doc_title, doc_source, kind, block_text
                        ),
                        index: global_index,
                        heading: Some(kind.to_string()),
                        start_offset: start,
                        end_offset: end,
                    },
                    kind,
                ));
                global_index += 1;
            } else {
                for mut sc in self.chunk_with_context(block_text, doc_title, doc_source) {
                    sc.index = global_index;
                    sc.start_offset += start;
                    sc.end_offset += start;
                    results.push((sc, kind));
                    global_index += 1;
                }
            }
        }
        results
    }

    /// PDF dispatch (§4.C): paragraph aggregation with sentence-preserving
    /// overlap; falls back to a capitalization+period sentence heuristic when
    /// the text carries too few paragraph breaks to chunk on.
    pub fn chunk_pdf(
        &self,
        text: &str,
        doc_title: &str,
        doc_source: &str,
    ) -> Vec<ContextualChunkResult> {
        let paragraphs: Vec<&str> = text
            .split("\n\n")
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect();

        let units: Vec<String> = if paragraphs.len() >= 3 || text.len() <= 500 {
            paragraphs.into_iter().map(|p| p.to_string()).collect()
        } else {
            split_into_sentences(text)
        };

        let base = self.aggregate_units(&units);

        let doc_summary: String = text
            .split("\n\n")
            .next()
            .unwrap_or("")
            .chars()
            .take(200)
            .collect();

        base.into_iter()
            .map(|chunk| {
                let section = chunk
                    .heading
                    .as_deref()
                    .filter(|h| !h.is_empty())
                    .unwrap_or(&doc_summary);
                let context_prefix = format!(
                    "Document: \"{}\". Source: {}. Section: {}. ",
                    doc_title, doc_source, section
                );
                ContextualChunkResult {
                    contextualized_text: format!("{}{}", context_prefix, chunk.text),
                    id: chunk.id,
                    text: chunk.text,
                    index: chunk.index,
                    heading: chunk.heading,
                    start_offset: chunk.start_offset,
                    end_offset: chunk.end_offset,
                }
            })
            .collect()
    }

    /// Greedily packs `units` (paragraphs or sentences) into chunks bounded by
    /// `chunk_size`, carrying the trailing `chunk_overlap` chars of each chunk
    /// forward as the start of the next one (§4.C PDF path).
    fn aggregate_units(&self, units: &[String]) -> Vec<ChunkResult> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut offset = 0usize;
        let mut chunk_start = 0usize;
        let mut index = 0usize;

        let flush = |current: &str, chunk_start: usize, offset: usize, index: &mut usize| {
            if current.trim().is_empty() || current.len() < 1 {
                return None;
            }
            let result = ChunkResult {
                id: Uuid::new_v4(),
                text: current.to_string(),
                index: *index,
                heading: None,
                start_offset: chunk_start,
                end_offset: offset,
            };
            *index += 1;
            Some(result)
        };

        for unit in units {
            let candidate_len = if current.is_empty() {
                unit.len()
            } else {
                current.len() + 2 + unit.len()
            };

            if candidate_len > self.chunk_size && !current.is_empty() {
                if let Some(result) = flush(&current, chunk_start, offset, &mut index) {
                    chunks.push(result);
                }
                let overlap_text = tail_chars(&current, self.chunk_overlap);
                chunk_start = offset.saturating_sub(overlap_text.len());
                current = overlap_text;
            }

            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(unit);
            offset += unit.len() + 2;
        }

        if let Some(result) = flush(&current, chunk_start, offset, &mut index) {
            if result.text.len() >= self.min_chunk_size || chunks.is_empty() {
                chunks.push(result);
            }
        }

        chunks
    }
}

/// Splits on hard newline breaks and on `.!?` followed by whitespace and an
/// uppercase letter/quote/bracket (§4.C sentence-aware fallback).
fn split_into_sentences(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        let mut boundary: Option<usize> = None;

        if c == '\n' && chars.get(i + 1) == Some(&'\n') {
            boundary = Some(i + 1);
        } else if c == '.' || c == '!' || c == '?' {
            if let Some(&next) = chars.get(i + 1) {
                if next.is_whitespace() {
                    let mut j = i + 1;
                    while j < chars.len() && chars[j].is_whitespace() {
                        j += 1;
                    }
                    if let Some(&nc) = chars.get(j) {
                        if nc.is_uppercase() || matches!(nc, '"' | '\'' | '(' | '“') {
                            boundary = Some(j);
                        }
                    } else {
                        boundary = Some(j);
                    }
                }
            }
        }

        if let Some(next_start) = boundary {
            let sentence: String = chars[start..=i.min(chars.len() - 1)].iter().collect();
            let trimmed = sentence.trim();
            if !trimmed.is_empty() {
                sentences.push(trimmed.to_string());
            }
            start = next_start;
            i = next_start;
            continue;
        }
        i += 1;
    }

    if start < chars.len() {
        let tail: String = chars[start..].iter().collect();
        let trimmed = tail.trim();
        if !trimmed.is_empty() {
            sentences.push(trimmed.to_string());
        }
    }

    sentences
}

/// Last `n` bytes of `text`, snapped to a char boundary.
fn tail_chars(text: &str, n: usize) -> String {
    if text.len() <= n {
        return text.to_string();
    }
    let start = snap_to_char_boundary(text, text.len() - n);
    text[start..].to_string()
}

#[cfg(test)]
mod dispatch_tests {
    use super::*;

    #[test]
    fn markdown_chunks_carry_header_as_section() {
        let chunker = TextChunker::new(25, 5, 1);
        let text = "# Title\n\nAlpha beta gamma.\n\nDelta epsilon.";
        let chunks = chunker.chunk_markdown(text, "doc", "src");
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.heading.as_deref() == Some("Title")));
    }

    #[test]
    fn code_chunks_detect_function_boundaries() {
        let chunker = TextChunker::new(500, 50, 10);
        let text = "fn a() {\n  1\n}\n\nfn b() {\n  2\n}\n";
        let chunks = chunker.chunk_code(text, "rs", "doc", "src");
        assert!(chunks.iter().any(|(_, kind)| *kind == "function"));
    }

    #[test]
    fn pdf_chunks_split_on_paragraphs() {
        let chunker = TextChunker::new(40, 5, 1);
        let text = "Para one here.\n\nPara two follows.\n\nPara three ends it.";
        let chunks = chunker.chunk_pdf(text, "doc", "src");
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.contextualized_text.starts_with("Document:")));
    }

    #[test]
    fn pdf_chunks_fall_back_to_sentence_heuristic_with_few_paragraphs() {
        let chunker = TextChunker::new(60, 10, 1);
        let text = "This is one long paragraph without breaks. It has several sentences. \
                     Each one should become its own unit. This keeps going for a while longer.";
        assert!(text.split("\n\n").count() < 3);
        let chunks = chunker.chunk_pdf(text, "doc", "src");
        assert!(!chunks.is_empty());
    }

    #[test]
    fn content_class_dispatches_from_document_format() {
        assert_eq!(
            ContentClass::from_format(DocumentFormat::Code),
            ContentClass::Code
        );
        assert_eq!(
            ContentClass::from_format(DocumentFormat::MD),
            ContentClass::Markdown
        );
        assert_eq!(
            ContentClass::from_format(DocumentFormat::TXT),
            ContentClass::Text
        );
    }
}
