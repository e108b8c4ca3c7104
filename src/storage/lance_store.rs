//! Embedded vector store backend (§4.E), the default `VectorStore`
//! implementation. No external process required — LanceDB persists to a
//! directory under the data dir.

use anyhow::Context as _;
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow_schema::{DataType, Field, Schema};
use async_trait::async_trait;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

use crate::error::{ConduitError, Result};
use crate::storage::vector_store::{VectorHit, VectorSearchOpts, VectorStore};
use crate::types::VectorPayload;

pub struct LanceStore {
    db: lancedb::Connection,
    dimension: usize,
    table_name: String,
}

impl LanceStore {
    pub async fn new(path: &str, dimension: usize, collection: &str) -> Result<Self> {
        std::fs::create_dir_all(path).ok();
        let db = lancedb::connect(path)
            .execute()
            .await
            .map_err(|e| ConduitError::Other(anyhow::anyhow!(e).context("connect to LanceDB")))?;

        let store = Self {
            db,
            dimension,
            table_name: collection.to_string(),
        };
        store.ensure_table().await?;
        Ok(store)
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("point_id", DataType::Utf8, false),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("path", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("source_id", DataType::Utf8, false),
            Field::new("mime_type", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    self.dimension as i32,
                ),
                true,
            ),
        ]))
    }

    fn vector_array(&self, flat: Vec<f32>) -> FixedSizeListArray {
        let values = Float32Array::from(flat);
        let field = Field::new("item", DataType::Float32, true);
        FixedSizeListArray::new(
            Arc::new(field),
            self.dimension as i32,
            Arc::new(values) as Arc<dyn Array>,
            None,
        )
    }

    async fn ensure_table(&self) -> anyhow::Result<()> {
        let names = self.db.table_names().execute().await?;
        if !names.contains(&self.table_name) {
            let schema = self.schema();
            let vector_array = self.vector_array(vec![0.0f32; self.dimension]);

            let batch = RecordBatch::try_new(
                schema.clone(),
                vec![
                    Arc::new(StringArray::from(vec!["__seed__"])) as Arc<dyn Array>,
                    Arc::new(StringArray::from(vec!["__seed__"])),
                    Arc::new(StringArray::from(vec!["__seed__"])),
                    Arc::new(UInt32Array::from(vec![0u32])),
                    Arc::new(StringArray::from(vec![""])),
                    Arc::new(StringArray::from(vec![""])),
                    Arc::new(StringArray::from(vec![""])),
                    Arc::new(StringArray::from(vec![""])),
                    Arc::new(StringArray::from(vec![""])),
                    Arc::new(vector_array) as Arc<dyn Array>,
                ],
            )
            .context("build seed record batch")?;

            let batches = RecordBatchIterator::new(vec![Ok(batch)], schema);
            self.db
                .create_table(&self.table_name, Box::new(batches))
                .execute()
                .await
                .context("create vector collection")?;

            let table = self.db.open_table(&self.table_name).execute().await?;
            table.delete("point_id = '__seed__'").await.ok();
        }
        Ok(())
    }

    async fn delete_where(&self, predicate: &str) -> anyhow::Result<usize> {
        let table = self.db.open_table(&self.table_name).execute().await?;
        let before = table.count_rows(None).await.unwrap_or(0);
        table.delete(predicate).await?;
        let after = table.count_rows(None).await.unwrap_or(0);
        Ok(before.saturating_sub(after))
    }
}

fn escape(value: &str) -> String {
    value.replace('\'', "''")
}

fn extract_hits(batches: &[RecordBatch], distance_is_score: bool) -> Vec<VectorHit> {
    let mut hits = Vec::new();
    for batch in batches {
        let col = |name: &str| {
            batch
                .column_by_name(name)
                .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        };
        let (
            Some(point_ids),
            Some(document_ids),
            Some(chunk_ids),
            Some(paths),
            Some(titles),
            Some(contents),
            Some(source_ids),
            Some(mime_types),
        ) = (
            col("point_id"),
            col("document_id"),
            col("chunk_id"),
            col("path"),
            col("title"),
            col("content"),
            col("source_id"),
            col("mime_type"),
        )
        else {
            continue;
        };
        let chunk_indices = batch
            .column_by_name("chunk_index")
            .and_then(|c| c.as_any().downcast_ref::<UInt32Array>());
        let distances = batch
            .column_by_name("_distance")
            .and_then(|c| c.as_any().downcast_ref::<Float32Array>());

        for i in 0..batch.num_rows() {
            if point_ids.value(i) == "__seed__" {
                continue;
            }
            let score = if distance_is_score {
                distances.map(|d| (1.0 - d.value(i)).max(0.0)).unwrap_or(0.0)
            } else {
                0.0
            };
            hits.push(VectorHit {
                point_id: point_ids.value(i).to_string(),
                score,
                payload: VectorPayload {
                    document_id: document_ids.value(i).to_string(),
                    chunk_id: chunk_ids.value(i).to_string(),
                    chunk_index: chunk_indices.map(|c| c.value(i)).unwrap_or(0),
                    path: paths.value(i).to_string(),
                    title: titles.value(i).to_string(),
                    content: contents.value(i).to_string(),
                    source_id: source_ids.value(i).to_string(),
                    mime_type: mime_types.value(i).to_string(),
                },
            });
        }
    }
    hits
}

#[async_trait]
impl VectorStore for LanceStore {
    async fn upsert_batch(&self, points: Vec<(String, Vec<f32>, VectorPayload)>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| ConduitError::Other(e.into()))?;

        let schema = self.schema();
        let point_ids: Vec<&str> = points.iter().map(|(id, _, _)| id.as_str()).collect();
        let document_ids: Vec<&str> = points.iter().map(|(_, _, p)| p.document_id.as_str()).collect();
        let chunk_ids: Vec<&str> = points.iter().map(|(_, _, p)| p.chunk_id.as_str()).collect();
        let chunk_indices: Vec<u32> = points.iter().map(|(_, _, p)| p.chunk_index).collect();
        let paths: Vec<&str> = points.iter().map(|(_, _, p)| p.path.as_str()).collect();
        let titles: Vec<&str> = points.iter().map(|(_, _, p)| p.title.as_str()).collect();
        let contents: Vec<&str> = points.iter().map(|(_, _, p)| p.content.as_str()).collect();
        let source_ids: Vec<&str> = points.iter().map(|(_, _, p)| p.source_id.as_str()).collect();
        let mime_types: Vec<&str> = points.iter().map(|(_, _, p)| p.mime_type.as_str()).collect();
        let flat: Vec<f32> = points.iter().flat_map(|(_, v, _)| v.iter().copied()).collect();
        let vector_array = self.vector_array(flat);

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(StringArray::from(point_ids)) as Arc<dyn Array>,
                Arc::new(StringArray::from(document_ids)),
                Arc::new(StringArray::from(chunk_ids)),
                Arc::new(UInt32Array::from(chunk_indices)),
                Arc::new(StringArray::from(paths)),
                Arc::new(StringArray::from(titles)),
                Arc::new(StringArray::from(contents)),
                Arc::new(StringArray::from(source_ids)),
                Arc::new(StringArray::from(mime_types)),
                Arc::new(vector_array) as Arc<dyn Array>,
            ],
        )
        .map_err(|e| ConduitError::Other(e.into()))?;

        let reader = RecordBatchIterator::new(vec![Ok(batch)], schema);
        table
            .add(Box::new(reader))
            .execute()
            .await
            .map_err(|e| ConduitError::Other(e.into()))?;
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let mut deleted = 0;
        for chunk in ids.chunks(100) {
            let list = chunk
                .iter()
                .map(|id| format!("'{}'", escape(id)))
                .collect::<Vec<_>>()
                .join(", ");
            let predicate = format!("point_id IN ({})", list);
            deleted += self
                .delete_where(&predicate)
                .await
                .map_err(ConduitError::Other)?;
        }
        Ok(deleted)
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        let predicate = format!("document_id = '{}'", escape(document_id));
        self.delete_where(&predicate).await.map_err(ConduitError::Other)
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<usize> {
        let predicate = format!("source_id = '{}'", escape(source_id));
        self.delete_where(&predicate).await.map_err(ConduitError::Other)
    }

    async fn search(&self, query_vec: &[f32], opts: VectorSearchOpts) -> Result<Vec<VectorHit>> {
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| ConduitError::Other(e.into()))?;

        let mut query = table
            .query()
            .nearest_to(query_vec)
            .map_err(|e| ConduitError::Other(e.into()))?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(opts.limit.max(1) + opts.offset);

        if let Some(predicate) = opts.filter.as_ref().and_then(|f| f.to_predicate()) {
            query = query.only_if(predicate);
        }

        let results = query
            .execute()
            .await
            .map_err(|e| ConduitError::Other(anyhow::anyhow!(e).context("vector search")))?;
        let batches: Vec<RecordBatch> = futures::TryStreamExt::try_collect(results)
            .await
            .map_err(|e: lancedb::Error| ConduitError::Other(e.into()))?;

        let mut hits = extract_hits(&batches, true);
        hits.retain(|h| h.score >= opts.min_score);
        if opts.offset > 0 {
            hits = hits.into_iter().skip(opts.offset).collect();
        }
        hits.truncate(opts.limit.max(1));
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let table = self
            .db
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| ConduitError::Other(e.into()))?;
        table
            .count_rows(None)
            .await
            .map_err(|e| ConduitError::Other(e.into()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
