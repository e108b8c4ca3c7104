//! Source Manager (§4.H): registers filesystem roots, walks them, and drives
//! extract → clean → chunk → index for every changed file. Builds on the
//! `indexing.rs::preview_folder` walk shape, generalized from a read-only
//! preview into a full add/sync lifecycle.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use dashmap::DashMap;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::ChunkConfig;
use crate::error::{ConduitError, Result};
use crate::indexing::Indexer;
use crate::processing::chunker::ContentClass;
use crate::processing::{ContentCleaner, ContentOrigin, DocumentParser, TextChunker};
use crate::types::{Document, DocumentFormat, Source, SourceStats, SourceStatus, SyncMode};

const DEFAULT_INCLUDE_GLOBS: &[&str] = &["**/*"];
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    "node_modules",
    "target",
    ".venv",
    "venv",
    "__pycache__",
    ".cache",
];

#[derive(Debug, Clone, Default)]
pub struct SyncOutcome {
    pub added: u64,
    pub updated: u64,
    pub deleted: u64,
    pub errors: Vec<(String, String)>,
}

/// Owns the relational store reference and the Indexer pipeline; drives
/// filesystem discovery and per-file ingestion (§4.H).
pub struct SourceManager {
    relational: Arc<crate::storage::RelationalStore>,
    indexer: Arc<Indexer>,
    parser: DocumentParser,
    chunk_config: ChunkConfig,
    sync_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl SourceManager {
    pub fn new(
        relational: Arc<crate::storage::RelationalStore>,
        indexer: Arc<Indexer>,
        chunk_config: ChunkConfig,
    ) -> Self {
        Self {
            relational,
            indexer,
            parser: DocumentParser::new(),
            chunk_config,
            sync_locks: DashMap::new(),
        }
    }

    /// Validates the directory, canonicalizes it, applies default
    /// patterns/excludes when absent, and persists the source (§4.H `add`).
    pub async fn add(
        &self,
        path: &str,
        patterns: Vec<String>,
        excludes: Vec<String>,
    ) -> Result<Source> {
        let root = Path::new(path);
        if !root.is_dir() {
            return Err(ConduitError::InvalidInput(format!(
                "{} is not a directory",
                path
            )));
        }
        let canonical = root
            .canonicalize()
            .map_err(ConduitError::Io)?
            .to_string_lossy()
            .to_string();

        let include_globs = if patterns.is_empty() {
            DEFAULT_INCLUDE_GLOBS.iter().map(|s| s.to_string()).collect()
        } else {
            patterns
        };
        let exclude_globs = if excludes.is_empty() {
            DEFAULT_EXCLUDE_DIRS.iter().map(|s| s.to_string()).collect()
        } else {
            excludes
        };

        let now = now_unix();
        let source = Source {
            source_id: Uuid::new_v4().to_string(),
            root_path: canonical,
            include_globs,
            exclude_globs,
            sync_mode: SyncMode::Manual,
            status: SourceStatus::Idle,
            stats: SourceStats::default(),
            created_at: now,
            updated_at: now,
        };
        self.relational.upsert_source(&source).await?;
        Ok(source)
    }

    /// One in-flight sync per `source_id`; concurrent syncs across sources
    /// are permitted (§4.H, §5 Ingestion).
    pub async fn sync(&self, source_id: &str) -> Result<SyncOutcome> {
        self.sync_cancellable(source_id, &CancellationToken::new())
            .await
    }

    /// Same as [`sync`](Self::sync), but checked at the next file boundary
    /// against `token` (§5 Cancellation semantics: "Cancelling a sync stops
    /// at the next file boundary; already-committed documents remain").
    pub async fn sync_cancellable(
        &self,
        source_id: &str,
        token: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let lock = self
            .sync_locks
            .entry(source_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let source = self
            .relational
            .get_source(source_id)
            .await?
            .ok_or_else(|| ConduitError::NotFound(format!("source {source_id} not found")))?;

        let mut syncing = source.clone();
        syncing.status = SourceStatus::Syncing;
        self.relational.upsert_source(&syncing).await?;

        let outcome = self.sync_inner(&source, token).await;

        let mut updated = source.clone();
        updated.updated_at = now_unix();
        match &outcome {
            Ok(result) => {
                updated.status = SourceStatus::Idle;
                updated.stats.last_sync = Some(updated.updated_at);
                updated.stats.error = if result.errors.is_empty() {
                    None
                } else {
                    Some(format!("{} file(s) failed during sync", result.errors.len()))
                };
            }
            Err(e) => {
                updated.status = SourceStatus::Error;
                updated.stats.error = Some(e.to_string());
            }
        }
        self.refresh_stats(&mut updated).await?;
        self.relational.upsert_source(&updated).await?;

        outcome
    }

    async fn sync_inner(&self, source: &Source, token: &CancellationToken) -> Result<SyncOutcome> {
        let mut known: std::collections::HashMap<String, String> = std::collections::HashMap::new();
        for (document_id, path) in self.relational.document_ids_for_source(&source.source_id).await? {
            if let Some(hash) = self.relational.content_hash_by_path(&source.source_id, &path).await? {
                known.insert(path, hash);
            }
            let _ = document_id;
        }

        let mut outcome = SyncOutcome::default();
        let mut visited: HashSet<String> = HashSet::new();
        let root = Path::new(&source.root_path);

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| !is_excluded_dir(e, &source.exclude_globs))
            .filter_map(|e| e.ok())
        {
            // Checked at each file boundary, not mid-file: an in-flight
            // `ingest_file` still completes and commits (§5 Cancellation
            // semantics).
            if token.is_cancelled() {
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let file_path = entry.path();
            if !matches_any_include(file_path, root, &source.include_globs) {
                continue;
            }
            let path_str = file_path.to_string_lossy().to_string();
            visited.insert(path_str.clone());

            match self.ingest_file(source, file_path).await {
                Ok(Some(content_hash)) => match known.get(&path_str) {
                    Some(prev_hash) if prev_hash == &content_hash => {}
                    Some(_) => outcome.updated += 1,
                    None => outcome.added += 1,
                },
                Ok(None) => {}
                Err(e) => outcome.errors.push((path_str, e.to_string())),
            }
        }

        // Skip the stale-document deletion pass when the walk was cancelled
        // partway through — paths past the cancellation point were never
        // visited and would otherwise be (wrongly) treated as deleted.
        if token.is_cancelled() {
            return Ok(outcome);
        }

        for (path, _hash) in known.iter() {
            if !visited.contains(path) {
                if let Err(e) = self.delete_by_path(source, path).await {
                    outcome.errors.push((path.clone(), e.to_string()));
                } else {
                    outcome.deleted += 1;
                }
            }
        }

        Ok(outcome)
    }

    /// Extracts, cleans, chunks, and indexes one file. Returns `Ok(None)` when
    /// the content hash is unchanged since the last index (idempotent sync,
    /// §3 Document invariant), `Ok(Some(hash))` when (re-)indexed.
    async fn ingest_file(&self, source: &Source, path: &Path) -> Result<Option<String>> {
        let parsed = self.parser.parse_file(path).map_err(ConduitError::Other)?;

        let origin = if parsed.format == DocumentFormat::PDF {
            ContentOrigin::Pdf
        } else {
            ContentOrigin::Other
        };
        let cleaned = ContentCleaner::clean(&parsed.content, origin);
        let content_hash = sha256_hex(cleaned.as_bytes());

        let path_str = path.to_string_lossy().to_string();
        if let Some(prev) = self
            .relational
            .content_hash_by_path(&source.source_id, &path_str)
            .await?
        {
            if prev == content_hash {
                return Ok(None);
            }
        }

        let document_id = sha256_hex(path_str.as_bytes());
        let metadata = std::fs::metadata(path).map_err(ConduitError::Io)?;
        let modified_at = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        let now = now_unix();

        let chunker = TextChunker::new(
            self.chunk_config.max_size,
            self.chunk_config.overlap,
            self.chunk_config.min_chunk_size,
        );
        let class = ContentClass::from_format(parsed.format);
        let chunk_results = match class {
            ContentClass::Markdown => chunker.chunk_markdown(&cleaned, &parsed.title, &path_str),
            ContentClass::Code => chunker
                .chunk_code(&cleaned, extension_of(path), &parsed.title, &path_str)
                .into_iter()
                .map(|(c, _kind)| c)
                .collect(),
            ContentClass::Pdf if !parsed.structured_sections.is_empty() => {
                chunker.chunk_structured(&parsed.structured_sections, &parsed.title, &path_str)
            }
            ContentClass::Pdf => chunker.chunk_pdf(&cleaned, &parsed.title, &path_str),
            ContentClass::Text => chunker.chunk_with_context(&cleaned, &parsed.title, &path_str),
        };

        let document = Document {
            document_id: document_id.clone(),
            source_id: source.source_id.clone(),
            path: path_str,
            title: parsed.title,
            mime_type: mime_for_format(parsed.format).to_string(),
            size: metadata.len(),
            modified_at,
            indexed_at: now,
            content_hash: content_hash.clone(),
            chunk_count: chunk_results.len() as u32,
            metadata: parsed.metadata,
        };

        let chunks: Vec<crate::types::Chunk> = chunk_results
            .iter()
            .enumerate()
            .map(|(i, c)| crate::types::Chunk {
                chunk_id: crate::types::Chunk::derive_id(&document.document_id, i as u32, &c.text),
                document_id: document.document_id.clone(),
                index: i as u32,
                content: c.text.clone(),
                start_char: c.start_offset,
                end_char: c.end_offset,
                metadata: Default::default(),
            })
            .collect();

        self.indexer.index(&document, &chunks).await?;
        Ok(Some(content_hash))
    }

    async fn delete_by_path(&self, source: &Source, path: &str) -> Result<()> {
        for (document_id, doc_path) in self.relational.document_ids_for_source(&source.source_id).await? {
            if doc_path == path {
                self.indexer.delete_document(&document_id).await?;
            }
        }
        Ok(())
    }

    async fn refresh_stats(&self, source: &mut Source) -> Result<()> {
        let docs = self.relational.document_ids_for_source(&source.source_id).await?;
        let mut chunk_count = 0u64;
        let mut size_bytes = 0u64;
        for (document_id, _path) in &docs {
            if let Some(doc) = self.relational.get_document(document_id).await? {
                chunk_count += doc.chunk_count as u64;
                size_bytes += doc.size;
            }
        }
        source.stats.doc_count = docs.len() as u64;
        source.stats.chunk_count = chunk_count;
        source.stats.size_bytes = size_bytes;
        Ok(())
    }

    /// Deletes the source and all documents it owns: the relational cascade,
    /// then the derivative lexical/vector/graph mirrors (§3 Ownership, §8
    /// Deletion cascade).
    pub async fn remove(&self, source_id: &str) -> Result<()> {
        self.indexer.delete_source(source_id).await
    }
}

fn is_excluded_dir(entry: &walkdir::DirEntry, exclude_globs: &[String]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let Some(name) = entry.file_name().to_str() else {
        return false;
    };
    exclude_globs.iter().any(|pattern| glob_matches(pattern, name))
}

/// Matches a single path segment (directory name) or a full relative path
/// against a simple glob: `*` and `**` act as wildcards, everything else is
/// a literal (or substring, for bare directory-name excludes).
fn glob_matches(pattern: &str, candidate: &str) -> bool {
    if pattern == candidate {
        return true;
    }
    if !pattern.contains('*') {
        return candidate == pattern;
    }
    let stripped = pattern.trim_start_matches("**/").trim_end_matches("/**");
    if !stripped.contains('*') {
        return candidate == stripped;
    }
    let parts: Vec<&str> = stripped.split('*').collect();
    let mut pos = 0usize;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        match candidate[pos..].find(part) {
            Some(found) => pos += found + part.len(),
            None => return false,
        }
        if i == 0 && !stripped.starts_with('*') && !candidate.starts_with(part) {
            return false;
        }
        if i == parts.len() - 1 && !stripped.ends_with('*') && pos != candidate.len() {
            return false;
        }
    }
    true
}

fn matches_any_include(file_path: &Path, root: &Path, include_globs: &[String]) -> bool {
    if include_globs.iter().any(|p| p == "**/*" || p == "*") {
        return true;
    }
    let relative = file_path.strip_prefix(root).unwrap_or(file_path);
    let relative_str = relative.to_string_lossy();
    let name = file_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    include_globs
        .iter()
        .any(|pattern| glob_matches(pattern, &relative_str) || glob_matches(pattern, name))
}

fn extension_of(path: &Path) -> &'static str {
    static EXTENSIONS: &[&str] = &[
        "rs", "py", "go", "js", "ts", "jsx", "tsx", "java", "c", "cpp", "h", "hpp", "cs", "rb",
        "php", "swift", "kt", "scala", "r", "sql", "sh",
    ];
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_lowercase();
    EXTENSIONS.iter().find(|e| **e == ext).copied().unwrap_or("")
}

fn mime_for_format(format: DocumentFormat) -> &'static str {
    match format {
        DocumentFormat::TXT => "text/plain",
        DocumentFormat::MD => "text/markdown",
        DocumentFormat::HTML => "text/html",
        DocumentFormat::JSON => "application/json",
        DocumentFormat::PDF => "application/pdf",
        DocumentFormat::CSV => "text/csv",
        DocumentFormat::Spreadsheet => "application/vnd.ms-excel",
        DocumentFormat::Presentation => "application/vnd.ms-powerpoint",
        DocumentFormat::Code => "text/x-source",
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn now_unix() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_literal_directory_name() {
        assert!(glob_matches("node_modules", "node_modules"));
        assert!(!glob_matches("node_modules", "src"));
    }

    #[test]
    fn glob_matches_star_suffix_pattern() {
        assert!(glob_matches("*.rs", "main.rs"));
        assert!(!glob_matches("*.rs", "main.py"));
    }

    #[test]
    fn glob_matches_double_star_prefix() {
        assert!(glob_matches("**/*.md", "docs/guide.md"));
    }

    #[test]
    fn glob_matches_suffix_pattern_is_end_anchored() {
        assert!(!glob_matches("*.md", "notes.md.bak"));
    }

    #[test]
    fn extension_of_recognizes_known_code_extensions() {
        assert_eq!(extension_of(Path::new("main.rs")), "rs");
        assert_eq!(extension_of(Path::new("notes.txt")), "");
    }
}
