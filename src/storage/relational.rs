//! Relational store (§6): the single writer of truth. SQLite via `sqlx`,
//! with `kb_fts` as an `fts5` virtual table providing BM25 natively. All
//! other stores (vector, graph, extraction queue) are strictly derivative —
//! see §5 Shared resource policy.

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use crate::error::{ConduitError, Result};
use crate::types::{
    Chunk, Document, Entity, EntityType, ExtractionStatus, ExtractionStatusRow, Relation, Source,
    SourceStats, SourceStatus, SyncMode,
};

pub struct RelationalStore {
    pool: SqlitePool,
}

const SCHEMA: &str = include_str!("schema.sql");

impl RelationalStore {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .map_err(ConduitError::Sql)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await
            .map_err(ConduitError::Sql)?;

        for statement in SCHEMA.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            sqlx::query(statement).execute(&pool).await.map_err(ConduitError::Sql)?;
        }
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ---- Sources ------------------------------------------------------

    pub async fn upsert_source(&self, source: &Source) -> Result<()> {
        sqlx::query(
            "INSERT INTO kb_sources (source_id, path, name, type, patterns, excludes, sync_mode, status, last_sync, doc_count, chunk_count, size_bytes, created_at, updated_at, error)
             VALUES (?, ?, ?, 'filesystem', ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(source_id) DO UPDATE SET
               path=excluded.path, patterns=excluded.patterns, excludes=excluded.excludes,
               sync_mode=excluded.sync_mode, status=excluded.status, last_sync=excluded.last_sync,
               doc_count=excluded.doc_count, chunk_count=excluded.chunk_count,
               size_bytes=excluded.size_bytes, updated_at=excluded.updated_at, error=excluded.error",
        )
        .bind(&source.source_id)
        .bind(&source.root_path)
        .bind(&source.root_path)
        .bind(serde_json::to_string(&source.include_globs).unwrap_or_default())
        .bind(serde_json::to_string(&source.exclude_globs).unwrap_or_default())
        .bind(sync_mode_str(source.sync_mode))
        .bind(status_str(source.status))
        .bind(source.stats.last_sync)
        .bind(source.stats.doc_count as i64)
        .bind(source.stats.chunk_count as i64)
        .bind(source.stats.size_bytes as i64)
        .bind(source.created_at)
        .bind(source.updated_at)
        .bind(&source.stats.error)
        .execute(&self.pool)
        .await
        .map_err(ConduitError::Sql)?;
        Ok(())
    }

    pub async fn get_source(&self, source_id: &str) -> Result<Option<Source>> {
        let row = sqlx::query("SELECT * FROM kb_sources WHERE source_id = ?")
            .bind(source_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ConduitError::Sql)?;
        Ok(row.map(source_from_row))
    }

    /// Deletion cascades to all documents the source owns, and — via
    /// `kb_documents`' foreign key — their chunks, FTS rows, entities, and
    /// relations (§3 Ownership, §8 Deletion cascade).
    pub async fn delete_source(&self, source_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_fts WHERE document_id IN (SELECT document_id FROM kb_documents WHERE source_id = ?)")
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        sqlx::query(
            "DELETE FROM kb_relations WHERE subject_id IN (SELECT entity_id FROM kb_entities WHERE source_document_id IN (SELECT document_id FROM kb_documents WHERE source_id = ?))
                OR object_id IN (SELECT entity_id FROM kb_entities WHERE source_document_id IN (SELECT document_id FROM kb_documents WHERE source_id = ?))",
        )
        .bind(source_id)
        .bind(source_id)
        .execute(&mut *tx)
        .await
        .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_extraction_status WHERE chunk_id IN (SELECT chunk_id FROM kb_chunks WHERE document_id IN (SELECT document_id FROM kb_documents WHERE source_id = ?))")
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_entities WHERE source_document_id IN (SELECT document_id FROM kb_documents WHERE source_id = ?)")
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_documents WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_sources WHERE source_id = ?")
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        tx.commit().await.map_err(ConduitError::Sql)?;
        Ok(())
    }

    // ---- Documents, Chunks, FTS (Indexer §4.G) -------------------------

    /// `index(document, chunks)`: delete any existing rows for
    /// `document_id`, then insert document, chunks, and FTS rows, all in one
    /// transaction (§4.G steps 1-4).
    pub async fn index_document(&self, document: &Document, chunks: &[Chunk]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ConduitError::Sql)?;

        sqlx::query("DELETE FROM kb_fts WHERE document_id = ?")
            .bind(&document.document_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_chunks WHERE document_id = ?")
            .bind(&document.document_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_documents WHERE document_id = ?")
            .bind(&document.document_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;

        sqlx::query(
            "INSERT INTO kb_documents (document_id, source_id, path, title, mime_type, size, modified_at, indexed_at, hash, metadata, chunk_count)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&document.document_id)
        .bind(&document.source_id)
        .bind(&document.path)
        .bind(&document.title)
        .bind(&document.mime_type)
        .bind(document.size as i64)
        .bind(document.modified_at)
        .bind(document.indexed_at)
        .bind(&document.content_hash)
        .bind(serde_json::to_string(&document.metadata).unwrap_or_default())
        .bind(document.chunk_count as i64)
        .execute(&mut *tx)
        .await
        .map_err(ConduitError::Sql)?;

        for chunk in chunks {
            sqlx::query(
                "INSERT INTO kb_chunks (chunk_id, document_id, chunk_index, content, start_char, end_char, metadata)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.document_id)
            .bind(chunk.index as i64)
            .bind(&chunk.content)
            .bind(chunk.start_char as i64)
            .bind(chunk.end_char as i64)
            .bind(serde_json::to_string(&chunk.metadata).unwrap_or_default())
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;

            sqlx::query(
                "INSERT INTO kb_fts (chunk_id, document_id, content, title, path) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&chunk.chunk_id)
            .bind(&chunk.document_id)
            .bind(&chunk.content)
            .bind(&document.title)
            .bind(&document.path)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        }

        tx.commit().await.map_err(ConduitError::Sql)?;
        Ok(())
    }

    /// Mirrors `index_document`'s delete order: FTS, chunks, document, all
    /// in one transaction (§4.G).
    pub async fn delete_document(&self, document_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_fts WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_chunks WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_documents WHERE document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        tx.commit().await.map_err(ConduitError::Sql)?;
        Ok(())
    }

    /// Co-deletes entities and relations owned by a document (§3 Ownership,
    /// §4.G "then entities/relations for the document"). Relations are
    /// removed first so no relation can outlive an endpoint.
    pub async fn delete_entities_for_document(&self, document_id: &str) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ConduitError::Sql)?;
        sqlx::query(
            "DELETE FROM kb_relations WHERE subject_id IN (SELECT entity_id FROM kb_entities WHERE source_document_id = ?)
                OR object_id IN (SELECT entity_id FROM kb_entities WHERE source_document_id = ?)",
        )
        .bind(document_id)
        .bind(document_id)
        .execute(&mut *tx)
        .await
        .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_extraction_status WHERE chunk_id IN (SELECT source_chunk_id FROM kb_entities WHERE source_document_id = ?)")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        sqlx::query("DELETE FROM kb_entities WHERE source_document_id = ?")
            .bind(document_id)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        tx.commit().await.map_err(ConduitError::Sql)?;
        Ok(())
    }

    pub async fn get_document(&self, document_id: &str) -> Result<Option<Document>> {
        let row = sqlx::query("SELECT * FROM kb_documents WHERE document_id = ?")
            .bind(document_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ConduitError::Sql)?;
        Ok(row.map(document_from_row))
    }

    /// `content_hash` by path, used by the Source Manager's diff against the
    /// stored snapshot (§4.H).
    pub async fn content_hash_by_path(&self, source_id: &str, path: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT hash FROM kb_documents WHERE source_id = ? AND path = ?")
            .bind(source_id)
            .bind(path)
            .fetch_optional(&self.pool)
            .await
            .map_err(ConduitError::Sql)?;
        Ok(row.map(|r| r.get::<String, _>("hash")))
    }

    pub async fn document_ids_for_source(&self, source_id: &str) -> Result<Vec<(String, String)>> {
        let rows = sqlx::query("SELECT document_id, path FROM kb_documents WHERE source_id = ?")
            .bind(source_id)
            .fetch_all(&self.pool)
            .await
            .map_err(ConduitError::Sql)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("document_id"), r.get("path")))
            .collect())
    }

    pub async fn get_chunks(&self, document_id: &str) -> Result<Vec<Chunk>> {
        let rows = sqlx::query(
            "SELECT * FROM kb_chunks WHERE document_id = ? ORDER BY chunk_index ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await
        .map_err(ConduitError::Sql)?;
        Ok(rows.into_iter().map(chunk_from_row).collect())
    }

    pub async fn all_document_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT document_id FROM kb_documents ORDER BY indexed_at ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(ConduitError::Sql)?;
        Ok(rows.into_iter().map(|r| r.get("document_id")).collect())
    }

    // ---- Entities / Relations (§4.N) -----------------------------------

    pub async fn insert_entities_and_relations(
        &self,
        entities: &[Entity],
        relations: &[Relation],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(ConduitError::Sql)?;
        for entity in entities {
            sqlx::query(
                "INSERT INTO kb_entities (entity_id, name, type, description, source_chunk_id, source_document_id, confidence, metadata, created_at, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, '{}', ?, ?)
                 ON CONFLICT(entity_id) DO UPDATE SET confidence=excluded.confidence, updated_at=excluded.updated_at",
            )
            .bind(&entity.entity_id)
            .bind(&entity.name)
            .bind(entity_type_str(entity.entity_type))
            .bind(&entity.description)
            .bind(&entity.source_chunk_id)
            .bind(&entity.source_document_id)
            .bind(entity.confidence)
            .bind(entity.created_at)
            .bind(entity.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        }
        for relation in relations {
            sqlx::query(
                "INSERT INTO kb_relations (relation_id, subject_id, predicate, object_id, source_chunk_id, confidence, metadata, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, '{}', ?)
                 ON CONFLICT(relation_id) DO NOTHING",
            )
            .bind(&relation.relation_id)
            .bind(&relation.subject_id)
            .bind(&relation.predicate)
            .bind(&relation.object_id)
            .bind(&relation.source_chunk_id)
            .bind(relation.confidence)
            .bind(relation.created_at)
            .execute(&mut *tx)
            .await
            .map_err(ConduitError::Sql)?;
        }
        tx.commit().await.map_err(ConduitError::Sql)?;
        Ok(())
    }

    pub async fn entity_exists(&self, entity_id: &str) -> Result<bool> {
        let row = sqlx::query("SELECT 1 FROM kb_entities WHERE entity_id = ?")
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(ConduitError::Sql)?;
        Ok(row.is_some())
    }

    /// Case-insensitive `LIKE` match against name and description, ordered by
    /// confidence descending (§4.P lexical entity candidates).
    pub async fn search_entities_like(&self, term: &str, limit: usize) -> Result<Vec<Entity>> {
        let pattern = format!("%{}%", term.replace('%', "").replace('_', ""));
        let rows = sqlx::query(
            "SELECT * FROM kb_entities WHERE name LIKE ? COLLATE NOCASE OR description LIKE ? COLLATE NOCASE
             ORDER BY confidence DESC LIMIT ?",
        )
        .bind(&pattern)
        .bind(&pattern)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(ConduitError::Sql)?;
        Ok(rows.into_iter().map(entity_from_row).collect())
    }

    /// Entities whose `source_chunk_id` is in `chunk_ids`, preserving no
    /// particular order (callers re-rank by the caller's own criterion).
    pub async fn entities_for_chunk_ids(&self, chunk_ids: &[String]) -> Result<Vec<Entity>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = chunk_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT * FROM kb_entities WHERE source_chunk_id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in chunk_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(ConduitError::Sql)?;
        Ok(rows.into_iter().map(entity_from_row).collect())
    }

    /// Entities by id, used to resolve RRF-fused candidate ids back to rows.
    pub async fn entities_by_ids(&self, entity_ids: &[String]) -> Result<Vec<Entity>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = entity_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("SELECT * FROM kb_entities WHERE entity_id IN ({placeholders})");
        let mut query = sqlx::query(&sql);
        for id in entity_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(ConduitError::Sql)?;
        Ok(rows.into_iter().map(entity_from_row).collect())
    }

    /// Relations touching any entity in `entity_ids`, limit 50, sorted by
    /// confidence descending (§4.P relation expansion).
    pub async fn relations_for_entity_ids(&self, entity_ids: &[String]) -> Result<Vec<Relation>> {
        if entity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = entity_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT * FROM kb_relations WHERE subject_id IN ({placeholders}) OR object_id IN ({placeholders})
             ORDER BY confidence DESC LIMIT 50"
        );
        let mut query = sqlx::query(&sql);
        for id in entity_ids {
            query = query.bind(id);
        }
        for id in entity_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(ConduitError::Sql)?;
        Ok(rows.into_iter().map(relation_from_row).collect())
    }

    pub async fn set_extraction_status(&self, status: &ExtractionStatusRow) -> Result<()> {
        sqlx::query(
            "INSERT INTO kb_extraction_status (chunk_id, status, entity_count, relation_count, error_message, extracted_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(chunk_id) DO UPDATE SET
               status=excluded.status, entity_count=excluded.entity_count, relation_count=excluded.relation_count,
               error_message=excluded.error_message, extracted_at=excluded.extracted_at, updated_at=excluded.updated_at",
        )
        .bind(&status.chunk_id)
        .bind(extraction_status_str(status.status))
        .bind(status.entity_count as i64)
        .bind(status.relation_count as i64)
        .bind(&status.error_message)
        .bind(status.extracted_at)
        .bind(status.updated_at)
        .execute(&self.pool)
        .await
        .map_err(ConduitError::Sql)?;
        Ok(())
    }

    // ---- Lexical search (§4.D, §4.I) -----------------------------------

    /// BM25 query over `kb_fts`, the relational source of truth. Production
    /// query latency for D/I is served by the Tantivy index mirrored from
    /// this table (`src/search/text_search.rs`); this path exists so the
    /// relational store alone is sufficient to answer queries (e.g. during
    /// Tantivy index rebuild).
    pub async fn fts_search(
        &self,
        sanitized_query: &str,
        source_ids: &[String],
        mime_types: &[String],
        limit: usize,
    ) -> Result<Vec<(String, String, f64)>> {
        let mut sql = String::from(
            "SELECT kb_fts.chunk_id, kb_fts.document_id, bm25(kb_fts) AS rank
             FROM kb_fts JOIN kb_documents ON kb_documents.document_id = kb_fts.document_id
             WHERE kb_fts MATCH ?",
        );
        if !source_ids.is_empty() {
            sql.push_str(&format!(
                " AND kb_documents.source_id IN ({})",
                source_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
            ));
        }
        if !mime_types.is_empty() {
            sql.push_str(&format!(
                " AND kb_documents.mime_type IN ({})",
                mime_types.iter().map(|_| "?").collect::<Vec<_>>().join(", ")
            ));
        }
        sql.push_str(" ORDER BY rank LIMIT ?");

        let mut query = sqlx::query(&sql).bind(sanitized_query);
        for id in source_ids {
            query = query.bind(id);
        }
        for mime in mime_types {
            query = query.bind(mime);
        }
        query = query.bind(limit as i64);

        let rows = query.fetch_all(&self.pool).await.map_err(ConduitError::Sql)?;
        Ok(rows
            .into_iter()
            .map(|r| (r.get("chunk_id"), r.get("document_id"), r.get::<f64, _>("rank")))
            .collect())
    }
}

fn sync_mode_str(mode: SyncMode) -> &'static str {
    match mode {
        SyncMode::Manual => "manual",
        SyncMode::Watch => "watch",
        SyncMode::Scheduled => "scheduled",
    }
}

fn status_str(status: SourceStatus) -> &'static str {
    match status {
        SourceStatus::Idle => "idle",
        SourceStatus::Syncing => "syncing",
        SourceStatus::Error => "error",
    }
}

fn entity_type_str(t: EntityType) -> &'static str {
    match t {
        EntityType::Concept => "concept",
        EntityType::Organization => "organization",
        EntityType::Person => "person",
        EntityType::Section => "section",
        EntityType::Document => "document",
        EntityType::Technology => "technology",
        EntityType::Location => "location",
        EntityType::Event => "event",
    }
}

fn extraction_status_str(s: ExtractionStatus) -> &'static str {
    match s {
        ExtractionStatus::Queued => "queued",
        ExtractionStatus::Completed => "completed",
        ExtractionStatus::Error => "error",
    }
}

fn source_from_row(row: sqlx::sqlite::SqliteRow) -> Source {
    let patterns: String = row.get("patterns");
    let excludes: String = row.get("excludes");
    Source {
        source_id: row.get("source_id"),
        root_path: row.get("path"),
        include_globs: serde_json::from_str(&patterns).unwrap_or_default(),
        exclude_globs: serde_json::from_str(&excludes).unwrap_or_default(),
        sync_mode: match row.get::<String, _>("sync_mode").as_str() {
            "watch" => SyncMode::Watch,
            "scheduled" => SyncMode::Scheduled,
            _ => SyncMode::Manual,
        },
        status: match row.get::<String, _>("status").as_str() {
            "syncing" => SourceStatus::Syncing,
            "error" => SourceStatus::Error,
            _ => SourceStatus::Idle,
        },
        stats: SourceStats {
            doc_count: row.get::<i64, _>("doc_count") as u64,
            chunk_count: row.get::<i64, _>("chunk_count") as u64,
            size_bytes: row.get::<i64, _>("size_bytes") as u64,
            last_sync: row.get("last_sync"),
            error: row.get("error"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn document_from_row(row: sqlx::sqlite::SqliteRow) -> Document {
    let metadata: String = row.get("metadata");
    Document {
        document_id: row.get("document_id"),
        source_id: row.get("source_id"),
        path: row.get("path"),
        title: row.get("title"),
        mime_type: row.get("mime_type"),
        size: row.get::<i64, _>("size") as u64,
        modified_at: row.get("modified_at"),
        indexed_at: row.get("indexed_at"),
        content_hash: row.get("hash"),
        chunk_count: row.get::<i64, _>("chunk_count") as u32,
        metadata: serde_json::from_str::<HashMap<String, String>>(&metadata).unwrap_or_default(),
    }
}

fn chunk_from_row(row: sqlx::sqlite::SqliteRow) -> Chunk {
    let metadata: String = row.get("metadata");
    Chunk {
        chunk_id: row.get("chunk_id"),
        document_id: row.get("document_id"),
        index: row.get::<i64, _>("chunk_index") as u32,
        content: row.get("content"),
        start_char: row.get::<i64, _>("start_char") as usize,
        end_char: row.get::<i64, _>("end_char") as usize,
        metadata: serde_json::from_str::<HashMap<String, String>>(&metadata).unwrap_or_default(),
    }
}

fn entity_from_row(row: sqlx::sqlite::SqliteRow) -> Entity {
    Entity {
        entity_id: row.get("entity_id"),
        name: row.get("name"),
        entity_type: EntityType::from_alias(row.get::<String, _>("type").as_str()),
        description: row.get("description"),
        confidence: row.get::<f64, _>("confidence") as f32,
        source_chunk_id: row.get("source_chunk_id"),
        source_document_id: row.get("source_document_id"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn relation_from_row(row: sqlx::sqlite::SqliteRow) -> Relation {
    Relation {
        relation_id: row.get("relation_id"),
        subject_id: row.get("subject_id"),
        predicate: row.get("predicate"),
        object_id: row.get("object_id"),
        confidence: row.get::<f64, _>("confidence") as f32,
        source_chunk_id: row.get("source_chunk_id"),
        created_at: row.get("created_at"),
    }
}
