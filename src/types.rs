use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// A registered filesystem root scanned for documents (§3 Source).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub source_id: String,
    pub root_path: String,
    pub include_globs: Vec<String>,
    pub exclude_globs: Vec<String>,
    pub sync_mode: SyncMode,
    pub status: SourceStatus,
    pub stats: SourceStats,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    Manual,
    Watch,
    Scheduled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Idle,
    Syncing,
    Error,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceStats {
    pub doc_count: u64,
    pub chunk_count: u64,
    pub size_bytes: u64,
    pub last_sync: Option<i64>,
    pub error: Option<String>,
}

/// A filesystem document owned by exactly one Source (§3 Document).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub document_id: String,
    pub source_id: String,
    pub path: String,
    pub title: String,
    pub mime_type: String,
    pub size: u64,
    pub modified_at: i64,
    pub indexed_at: i64,
    pub content_hash: String,
    pub chunk_count: u32,
    pub metadata: HashMap<String, String>,
}

/// A contiguous slice of cleaned document text (§3 Chunk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub document_id: String,
    pub index: u32,
    pub content: String,
    pub start_char: usize,
    pub end_char: usize,
    pub metadata: HashMap<String, String>,
}

impl Chunk {
    /// `chunk_id = H(document_id || index || content)` — stable and globally
    /// unique even when identical content appears across documents (§8).
    pub fn derive_id(document_id: &str, index: u32, content: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(document_id.as_bytes());
        hasher.update(b"|");
        hasher.update(index.to_le_bytes());
        hasher.update(b"|");
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Vector-store payload mirrored alongside each embedding (§3 Vector point).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPayload {
    pub document_id: String,
    pub chunk_id: String,
    pub chunk_index: u32,
    pub path: String,
    pub title: String,
    pub content: String,
    pub source_id: String,
    pub mime_type: String,
}

/// `point_id` is a deterministic UUID derived from `chunk_id` so upserts are
/// idempotent across re-indexing.
pub fn point_id_for_chunk(chunk_id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_OID, chunk_id.as_bytes())
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Concept,
    Organization,
    Person,
    Section,
    Document,
    Technology,
    Location,
    Event,
}

impl EntityType {
    /// Normalizes loose LLM-provided type strings via the alias table (§4.M).
    pub fn from_alias(raw: &str) -> Self {
        match raw.to_lowercase().as_str() {
            "concept" => Self::Concept,
            "organization" | "org" | "company" => Self::Organization,
            "person" | "people" => Self::Person,
            "section" => Self::Section,
            "document" | "doc" => Self::Document,
            "technology" | "tech" | "tool" => Self::Technology,
            "location" | "place" => Self::Location,
            "event" => Self::Event,
            _ => Self::Concept,
        }
    }
}

/// An extracted entity (§3 Entity).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
    pub entity_id: String,
    pub name: String,
    pub entity_type: EntityType,
    pub description: String,
    pub confidence: f32,
    pub source_chunk_id: String,
    pub source_document_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Entity {
    /// `entity_id = H(name | type | document_id)`, stable across runs (§8).
    pub fn derive_id(name: &str, entity_type: EntityType, document_id: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(name.to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(format!("{:?}", entity_type).to_lowercase().as_bytes());
        hasher.update(b"|");
        hasher.update(document_id.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// A typed relation between two entities (§3 Relation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relation {
    pub relation_id: String,
    pub subject_id: String,
    pub predicate: String,
    pub object_id: String,
    pub confidence: f32,
    pub source_chunk_id: String,
    pub created_at: i64,
}

impl Relation {
    pub fn derive_id(subject_id: &str, predicate: &str, object_id: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(subject_id.as_bytes());
        hasher.update(b"|");
        hasher.update(predicate.as_bytes());
        hasher.update(b"|");
        hasher.update(object_id.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// Known predicates; unknown predicates from extraction fall back to
/// `relates_to` (§4.N Validator).
pub const KNOWN_PREDICATES: &[&str] = &[
    "relates_to",
    "part_of",
    "authored_by",
    "located_in",
    "mentions",
    "depends_on",
    "succeeds",
    "precedes",
];

/// Normalizes a loose LLM-provided predicate string against `KNOWN_PREDICATES`,
/// mapping anything unrecognized to `relates_to` (§4.M post-processing, §4.N
/// Validator).
pub fn normalize_predicate(raw: &str) -> String {
    let lower = raw.trim().to_lowercase().replace([' ', '-'], "_");
    if KNOWN_PREDICATES.contains(&lower.as_str()) {
        lower
    } else {
        "relates_to".to_string()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionStatus {
    Queued,
    Completed,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionStatusRow {
    pub chunk_id: String,
    pub status: ExtractionStatus,
    pub entity_count: u32,
    pub relation_count: u32,
    pub error_message: Option<String>,
    pub extracted_at: Option<i64>,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum DocumentFormat {
    TXT,
    MD,
    HTML,
    JSON,
    PDF,
    CSV,
    Spreadsheet,
    Presentation,
    Code,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "txt" => Self::TXT,
            "md" | "markdown" => Self::MD,
            "html" | "htm" => Self::HTML,
            "json" => Self::JSON,
            "pdf" => Self::PDF,
            "csv" => Self::CSV,
            "xlsx" | "xls" | "ods" | "xlsm" | "xlsb" => Self::Spreadsheet,
            "pptx" | "ppt" | "odp" => Self::Presentation,
            "rs" | "py" | "js" | "ts" | "jsx" | "tsx" | "go" | "java" | "c" | "cpp" | "h"
            | "hpp" | "cs" | "rb" | "php" | "swift" | "kt" | "scala" | "r" | "sql" | "sh"
            | "bash" | "zsh" | "fish" | "ps1" | "bat" | "cmd" | "yaml" | "yml" | "toml" | "xml"
            | "ini" | "cfg" | "conf" | "env" | "dockerfile" | "makefile" => Self::Code,
            _ => Self::TXT,
        }
    }

    pub fn is_code(&self) -> bool {
        matches!(self, Self::Code)
    }
}

/// Structured section extracted from a document (PDF form, table, etc.).
/// Used to produce high-quality, relationship-preserving chunks.
#[derive(Debug, Clone)]
pub enum DocumentSection {
    /// Narrative text from a page.
    Text {
        content: String,
        page: usize,
        heading: Option<String>,
    },
    /// Form field key-value pairs (AcroForm, annotations).
    FormFields {
        fields: Vec<(String, String)>,
        page: usize,
    },
    /// Tabular data.
    Table {
        headers: Vec<String>,
        rows: Vec<Vec<String>>,
        page: usize,
        caption: Option<String>,
    },
    /// Synthesized relationship text from form data + annotations.
    Relationships { content: String },
}

/// Filters honored by the lexical and semantic searchers (§4.D, §4.E).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetadataFilter {
    pub source_ids: Option<Vec<String>>,
    pub mime_types: Option<Vec<String>>,
    pub document_id: Option<String>,
    pub path: Option<String>,
}

impl MetadataFilter {
    /// Builds an equality predicate over keyword-indexed payload fields for
    /// the vector store. Values are escaped against single-quote breakout.
    pub fn to_predicate(&self) -> Option<String> {
        let mut predicates = Vec::new();

        if let Some(ref ids) = self.source_ids {
            if !ids.is_empty() {
                let list = ids
                    .iter()
                    .map(|id| format!("'{}'", id.replace('\'', "''")))
                    .collect::<Vec<_>>()
                    .join(", ");
                predicates.push(format!("source_id IN ({})", list));
            }
        }
        if let Some(ref doc_id) = self.document_id {
            predicates.push(format!("document_id = '{}'", doc_id.replace('\'', "''")));
        }
        if let Some(ref path) = self.path {
            predicates.push(format!("path = '{}'", path.replace('\'', "''")));
        }

        if predicates.is_empty() {
            None
        } else {
            Some(predicates.join(" AND "))
        }
    }
}

/// A single retrieval hit shared by the lexical and semantic searchers before
/// hybrid fusion combines them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub chunk_id: String,
    pub document_id: String,
    pub score: f32,
    pub content: String,
    pub title: String,
    pub path: String,
    pub snippet: Option<String>,
}
