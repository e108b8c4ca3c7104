//! Lexical index and searcher (§4.D, §4.I): a Tantivy-backed BM25 index over
//! `(chunk_id, document_id, content, title, path, source_id, mime_type)`,
//! with a sanitize → tokenize → prefix-query pipeline and optional highlight
//! snippets.

use anyhow::{Context, Result};
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, QueryParser, TermQuery};
use tantivy::schema::{self, IndexRecordOption, Schema, Value as TantivyValue, STORED, STRING, TEXT};
use tantivy::{doc, Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

/// A single lexical hit with the fields needed by fusion and result
/// processing.
#[derive(Debug, Clone)]
pub struct LexicalHit {
    pub chunk_id: String,
    pub document_id: String,
    pub score: f32,
    pub content: String,
    pub title: String,
    pub path: String,
    pub snippet: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TextSearchOpts {
    pub limit: usize,
    pub offset: usize,
    pub source_ids: Vec<String>,
    pub mime_types: Vec<String>,
    pub min_score: f32,
    pub highlight: bool,
    pub context_len: usize,
}

pub struct TextSearch {
    index: Index,
    reader: IndexReader,
    writer: parking_lot::Mutex<IndexWriter>,
    chunk_id_field: schema::Field,
    document_id_field: schema::Field,
    content_field: schema::Field,
    title_field: schema::Field,
    path_field: schema::Field,
    source_id_field: schema::Field,
    mime_type_field: schema::Field,
}

impl TextSearch {
    fn build_schema() -> Schema {
        let mut sb = Schema::builder();
        sb.add_text_field("chunk_id", STRING | STORED);
        sb.add_text_field("document_id", STRING | STORED);
        sb.add_text_field("content", TEXT | STORED);
        sb.add_text_field("title", TEXT | STORED);
        sb.add_text_field("path", TEXT | STORED);
        sb.add_text_field("source_id", STRING | STORED);
        sb.add_text_field("mime_type", STRING | STORED);
        sb.build()
    }

    fn needs_schema_migration(index: &Index) -> bool {
        let schema = index.schema();
        match schema.get_field("chunk_id") {
            Ok(f) => !schema.get_field_entry(f).is_indexed(),
            Err(_) => true,
        }
    }

    pub fn new(path: &str) -> Result<Self> {
        let index_path = Path::new(path).join("tantivy_index");
        std::fs::create_dir_all(&index_path).ok();

        let schema = Self::build_schema();

        let needs_rebuild = {
            let dir = tantivy::directory::MmapDirectory::open(&index_path)?;
            if Index::exists(&dir)? {
                let existing = Index::open_in_dir(&index_path)?;
                let migrate = Self::needs_schema_migration(&existing);
                drop(existing);
                migrate
            } else {
                false
            }
        };

        let index = if needs_rebuild {
            tracing::warn!(
                "lexical index schema out of date, rebuilding — existing full-text data \
                 will be re-indexed on next ingest"
            );
            std::fs::remove_dir_all(&index_path).ok();
            std::fs::create_dir_all(&index_path)?;
            Index::create_in_dir(&index_path, schema.clone())?
        } else {
            let dir = tantivy::directory::MmapDirectory::open(&index_path)?;
            if Index::exists(&dir)? {
                Index::open_in_dir(&index_path)?
            } else {
                Index::create_in_dir(&index_path, schema.clone())?
            }
        };

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::OnCommitWithDelay)
            .try_into()
            .context("failed to create lexical index reader")?;

        let writer = index
            .writer(50_000_000)
            .context("failed to create lexical index writer")?;

        let get = |name: &str| index.schema().get_field(name).unwrap();

        Ok(Self {
            chunk_id_field: get("chunk_id"),
            document_id_field: get("document_id"),
            content_field: get("content"),
            title_field: get("title"),
            path_field: get("path"),
            source_id_field: get("source_id"),
            mime_type_field: get("mime_type"),
            index,
            reader,
            writer: parking_lot::Mutex::new(writer),
        })
    }

    pub fn index_chunk(
        &self,
        chunk_id: &str,
        document_id: &str,
        content: &str,
        title: &str,
        path: &str,
        source_id: &str,
        mime_type: &str,
    ) -> Result<()> {
        let writer = self.writer.lock();
        writer.add_document(doc!(
            self.chunk_id_field => chunk_id,
            self.document_id_field => document_id,
            self.content_field => content,
            self.title_field => title,
            self.path_field => path,
            self.source_id_field => source_id,
            self.mime_type_field => mime_type,
        ))?;
        Ok(())
    }

    pub fn commit(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.commit().context("lexical index commit failed")?;
        self.reader.reload()?;
        Ok(())
    }

    /// Sanitizes a raw query string by stripping Tantivy query metacharacters,
    /// then tokenizes on whitespace and appends a trailing `*` to the final
    /// token for prefix matching (§4.D step 1-3).
    fn build_query_string(raw: &str) -> String {
        let sanitized: String = raw
            .chars()
            .filter(|c| !matches!(c, '"' | '\'' | '(' | ')' | '[' | ']' | '{' | '}' | '^' | '~' | ':'))
            .collect();
        let mut tokens: Vec<String> = sanitized.split_whitespace().map(String::from).collect();
        if let Some(last) = tokens.last_mut() {
            last.push('*');
        }
        tokens.join(" ")
    }

    fn filter_query(&self, source_ids: &[String], mime_types: &[String]) -> Option<Box<dyn Query>> {
        let mut clauses: Vec<(Occur, Box<dyn Query>)> = Vec::new();
        if !source_ids.is_empty() {
            let should: Vec<(Occur, Box<dyn Query>)> = source_ids
                .iter()
                .map(|id| {
                    let term = Term::from_field_text(self.source_id_field, id);
                    let q: Box<dyn Query> = Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, q)
                })
                .collect();
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(should))));
        }
        if !mime_types.is_empty() {
            let should: Vec<(Occur, Box<dyn Query>)> = mime_types
                .iter()
                .map(|m| {
                    let term = Term::from_field_text(self.mime_type_field, m);
                    let q: Box<dyn Query> = Box::new(TermQuery::new(term, IndexRecordOption::Basic));
                    (Occur::Should, q)
                })
                .collect();
            clauses.push((Occur::Must, Box::new(BooleanQuery::new(should))));
        }
        if clauses.is_empty() {
            None
        } else {
            Some(Box::new(BooleanQuery::new(clauses)))
        }
    }

    /// `search(q, opts) -> (hits, total_hits)` (§4.I).
    pub fn search(&self, query: &str, opts: &TextSearchOpts) -> Result<(Vec<LexicalHit>, usize)> {
        if query.trim().is_empty() {
            return Ok((Vec::new(), 0));
        }
        let searcher = self.reader.searcher();
        let query_parser =
            QueryParser::for_index(&self.index, vec![self.content_field, self.title_field]);

        let query_str = Self::build_query_string(query);
        let text_query = match query_parser.parse_query(&query_str) {
            Ok(q) => q,
            Err(_) => query_parser.parse_query(&format!("\"{}\"", query.replace('"', "")))?,
        };

        let combined: Box<dyn Query> = match self.filter_query(&opts.source_ids, &opts.mime_types) {
            Some(filter) => Box::new(BooleanQuery::new(vec![
                (Occur::Must, text_query),
                (Occur::Must, filter),
            ])),
            None => text_query,
        };

        let total_hits = searcher.search(&combined, &tantivy::collector::Count)?;

        let fetch_limit = (opts.offset + opts.limit).max(1);
        let top_docs = searcher.search(&combined, &TopDocs::with_limit(fetch_limit))?;

        let mut hits = Vec::with_capacity(opts.limit);
        for (score, doc_address) in top_docs.into_iter().skip(opts.offset) {
            if score < opts.min_score {
                continue;
            }
            if let Ok(d) = searcher.doc::<TantivyDocument>(doc_address) {
                let get_str = |field: schema::Field| -> String {
                    d.get_first(field).and_then(|v| v.as_str()).unwrap_or("").to_string()
                };
                let content = get_str(self.content_field);
                let snippet = if opts.highlight {
                    highlight_snippet(&content, query, opts.context_len.max(40))
                } else {
                    None
                };
                hits.push(LexicalHit {
                    chunk_id: get_str(self.chunk_id_field),
                    document_id: get_str(self.document_id_field),
                    score,
                    content,
                    title: get_str(self.title_field),
                    path: get_str(self.path_field),
                    snippet,
                });
                if hits.len() >= opts.limit {
                    break;
                }
            }
        }

        Ok((hits, total_hits))
    }

    pub fn delete_by_id(&self, chunk_id: &str) -> Result<()> {
        let writer = self.writer.lock();
        let term = Term::from_field_text(self.chunk_id_field, chunk_id);
        writer.delete_term(term);
        Ok(())
    }

    pub fn delete_by_document(&self, document_id: &str) -> Result<()> {
        let writer = self.writer.lock();
        let term = Term::from_field_text(self.document_id_field, document_id);
        writer.delete_term(term);
        Ok(())
    }

    pub fn delete_by_source(&self, source_id: &str) -> Result<()> {
        let writer = self.writer.lock();
        let term = Term::from_field_text(self.source_id_field, source_id);
        writer.delete_term(term);
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.delete_all_documents()?;
        writer.commit()?;
        self.reader.reload()?;
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        Ok(self.reader.searcher().num_docs() as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.count().unwrap_or(0) == 0
    }
}

/// Locates the first matching query term in `content` and emits a window of
/// `±context_len` chars around it, prepending/appending ellipses when the
/// window was truncated (§4.D step 4).
fn highlight_snippet(content: &str, query: &str, context_len: usize) -> Option<String> {
    let lower_content = content.to_lowercase();
    let first_term = query.split_whitespace().next()?.to_lowercase();
    let byte_pos = lower_content.find(&first_term)?;

    let char_indices: Vec<usize> = content.char_indices().map(|(i, _)| i).collect();
    let char_pos = char_indices.iter().position(|&i| i >= byte_pos).unwrap_or(0);

    let total_chars = content.chars().count();
    let start = char_pos.saturating_sub(context_len);
    let end = (char_pos + first_term.chars().count() + context_len).min(total_chars);

    let snippet: String = content.chars().skip(start).take(end - start).collect();
    let prefix = if start > 0 { "…" } else { "" };
    let suffix = if end < total_chars { "…" } else { "" };
    Some(format!("{prefix}{snippet}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn opts(limit: usize) -> TextSearchOpts {
        TextSearchOpts {
            limit,
            offset: 0,
            source_ids: Vec::new(),
            mime_types: Vec::new(),
            min_score: 0.0,
            highlight: true,
            context_len: 40,
        }
    }

    #[test]
    fn indexes_and_finds_chunks_by_content() {
        let dir = tempdir().unwrap();
        let ts = TextSearch::new(dir.path().to_str().unwrap()).unwrap();
        ts.index_chunk("c1", "d1", "the quick brown fox jumps", "doc", "a.txt", "s1", "text/plain")
            .unwrap();
        ts.commit().unwrap();

        let (hits, total) = ts.search("quick fox", &opts(10)).unwrap();
        assert_eq!(total, 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].chunk_id, "c1");
        assert!(hits[0].snippet.is_some());
    }

    #[test]
    fn filters_by_source_id() {
        let dir = tempdir().unwrap();
        let ts = TextSearch::new(dir.path().to_str().unwrap()).unwrap();
        ts.index_chunk("c1", "d1", "apples and oranges", "a", "a.txt", "s1", "text/plain")
            .unwrap();
        ts.index_chunk("c2", "d2", "apples and oranges", "b", "b.txt", "s2", "text/plain")
            .unwrap();
        ts.commit().unwrap();

        let mut o = opts(10);
        o.source_ids = vec!["s1".to_string()];
        let (hits, total) = ts.search("apples", &o).unwrap();
        assert_eq!(total, 1);
        assert_eq!(hits[0].chunk_id, "c1");
    }

    #[test]
    fn delete_by_document_removes_its_chunks() {
        let dir = tempdir().unwrap();
        let ts = TextSearch::new(dir.path().to_str().unwrap()).unwrap();
        ts.index_chunk("c1", "d1", "hello world", "a", "a.txt", "s1", "text/plain")
            .unwrap();
        ts.commit().unwrap();
        ts.delete_by_document("d1").unwrap();
        ts.commit().unwrap();
        assert!(ts.is_empty());
    }
}
