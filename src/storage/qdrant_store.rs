//! Remote vector store backend (§4.E), speaking the Qdrant REST contract
//! against the container the Dependency Supervisor (§4.Q) brings up.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{ConduitError, Result};
use crate::storage::vector_store::{VectorHit, VectorSearchOpts, VectorStore};
use crate::types::VectorPayload;

pub struct QdrantStore {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    dimension: usize,
}

impl QdrantStore {
    pub fn new(host: &str, port: u16, collection: &str, dimension: usize) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client"),
            base_url: format!("{}:{}", host.trim_end_matches('/'), port),
            collection: collection.to_string(),
            dimension,
        }
    }

    /// Creates the collection with cosine distance and keyword indexes on
    /// first use; re-uses without altering dimension if it already exists
    /// (§4.E).
    pub async fn ensure_collection(&self) -> Result<()> {
        let exists = self
            .client
            .get(format!("{}/collections/{}", self.base_url, self.collection))
            .send()
            .await
            .map_err(dependency_error)?
            .status()
            .is_success();

        if !exists {
            self.client
                .put(format!("{}/collections/{}", self.base_url, self.collection))
                .json(&json!({
                    "vectors": { "size": self.dimension, "distance": "Cosine" }
                }))
                .send()
                .await
                .map_err(dependency_error)?
                .error_for_status()
                .map_err(dependency_error)?;

            for field in ["document_id", "path", "source_id"] {
                self.client
                    .put(format!(
                        "{}/collections/{}/index",
                        self.base_url, self.collection
                    ))
                    .json(&json!({ "field_name": field, "field_schema": "keyword" }))
                    .send()
                    .await
                    .map_err(dependency_error)?;
            }
        }
        Ok(())
    }
}

/// Translates the shared `MetadataFilter` into Qdrant's filter DSL, matching
/// against the keyword indexes `ensure_collection` creates on `document_id`,
/// `path`, and `source_id` (§4.E).
fn qdrant_filter(filter: &crate::types::MetadataFilter) -> serde_json::Value {
    let mut must = Vec::new();

    if let Some(ids) = &filter.source_ids {
        if !ids.is_empty() {
            let should: Vec<_> = ids
                .iter()
                .map(|id| json!({ "key": "source_id", "match": { "value": id } }))
                .collect();
            must.push(json!({ "should": should }));
        }
    }
    if let Some(document_id) = &filter.document_id {
        must.push(json!({ "key": "document_id", "match": { "value": document_id } }));
    }
    if let Some(path) = &filter.path {
        must.push(json!({ "key": "path", "match": { "value": path } }));
    }

    if must.is_empty() {
        serde_json::Value::Null
    } else {
        json!({ "must": must })
    }
}

fn dependency_error(e: reqwest::Error) -> ConduitError {
    ConduitError::UnavailableDependency {
        dependency: "vector_store".to_string(),
        reason: e.to_string(),
    }
}

#[derive(Serialize)]
struct UpsertPoint {
    id: String,
    vector: Vec<f32>,
    payload: VectorPayload,
}

#[derive(Deserialize)]
struct SearchResponse {
    result: Vec<ScoredPoint>,
}

#[derive(Deserialize)]
struct ScoredPoint {
    id: serde_json::Value,
    score: f32,
    payload: VectorPayload,
}

#[derive(Deserialize)]
struct CountResponse {
    result: CountResult,
}

#[derive(Deserialize)]
struct CountResult {
    count: usize,
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn upsert_batch(&self, points: Vec<(String, Vec<f32>, VectorPayload)>) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        let body = json!({
            "points": points
                .into_iter()
                .map(|(id, vector, payload)| UpsertPoint { id, vector, payload })
                .collect::<Vec<_>>()
        });
        self.client
            .put(format!(
                "{}/collections/{}/points?wait=true",
                self.base_url, self.collection
            ))
            .json(&body)
            .send()
            .await
            .map_err(dependency_error)?
            .error_for_status()
            .map_err(dependency_error)?;
        Ok(())
    }

    async fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.client
            .post(format!(
                "{}/collections/{}/points/delete?wait=true",
                self.base_url, self.collection
            ))
            .json(&json!({ "points": ids }))
            .send()
            .await
            .map_err(dependency_error)?
            .error_for_status()
            .map_err(dependency_error)?;
        Ok(ids.len())
    }

    async fn delete_by_document(&self, document_id: &str) -> Result<usize> {
        self.delete_by_filter("document_id", document_id).await
    }

    async fn delete_by_source(&self, source_id: &str) -> Result<usize> {
        self.delete_by_filter("source_id", source_id).await
    }

    async fn search(&self, query_vec: &[f32], opts: VectorSearchOpts) -> Result<Vec<VectorHit>> {
        let filter = opts
            .filter
            .as_ref()
            .map(qdrant_filter)
            .filter(|f| !f.is_null())
            .unwrap_or(serde_json::Value::Null);

        let body = json!({
            "vector": query_vec,
            "limit": opts.limit.max(1),
            "offset": opts.offset,
            "with_payload": true,
            "score_threshold": if opts.min_score > 0.0 { Some(opts.min_score) } else { None },
            "filter": filter,
        });

        let response: SearchResponse = self
            .client
            .post(format!(
                "{}/collections/{}/points/search",
                self.base_url, self.collection
            ))
            .json(&body)
            .send()
            .await
            .map_err(dependency_error)?
            .error_for_status()
            .map_err(dependency_error)?
            .json()
            .await
            .map_err(dependency_error)?;

        Ok(response
            .result
            .into_iter()
            .map(|p| VectorHit {
                point_id: p.id.to_string().trim_matches('"').to_string(),
                score: p.score,
                payload: p.payload,
            })
            .collect())
    }

    async fn count(&self) -> Result<usize> {
        let response: CountResponse = self
            .client
            .post(format!(
                "{}/collections/{}/points/count",
                self.base_url, self.collection
            ))
            .json(&json!({ "exact": true }))
            .send()
            .await
            .map_err(dependency_error)?
            .error_for_status()
            .map_err(dependency_error)?
            .json()
            .await
            .map_err(dependency_error)?;
        Ok(response.result.count)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

impl QdrantStore {
    async fn delete_by_filter(&self, key: &str, value: &str) -> Result<usize> {
        let before = self.count().await.unwrap_or(0);
        self.client
            .post(format!(
                "{}/collections/{}/points/delete?wait=true",
                self.base_url, self.collection
            ))
            .json(&json!({
                "filter": { "must": [{ "key": key, "match": { "value": value } }] }
            }))
            .send()
            .await
            .map_err(dependency_error)?
            .error_for_status()
            .map_err(dependency_error)?;
        let after = self.count().await.unwrap_or(0);
        Ok(before.saturating_sub(after))
    }

    /// Collection health as reported by Qdrant's cluster/collection-info
    /// endpoint; used by the Dependency Supervisor (§4.Q) to decide whether
    /// recovery is needed.
    pub async fn check_health(&self) -> Result<CollectionHealth> {
        #[derive(Deserialize)]
        struct InfoResponse {
            result: InfoResult,
        }
        #[derive(Deserialize)]
        struct InfoResult {
            status: String,
            points_count: Option<u64>,
            indexed_vectors_count: Option<u64>,
        }

        let info: InfoResponse = self
            .client
            .get(format!("{}/collections/{}", self.base_url, self.collection))
            .send()
            .await
            .map_err(dependency_error)?
            .error_for_status()
            .map_err(dependency_error)?
            .json()
            .await
            .map_err(dependency_error)?;

        Ok(CollectionHealth {
            status: info.result.status,
            points_count: info.result.points_count.unwrap_or(0),
            indexed_vectors_count: info.result.indexed_vectors_count.unwrap_or(0),
        })
    }
}

#[derive(Debug, Clone)]
pub struct CollectionHealth {
    pub status: String,
    pub points_count: u64,
    pub indexed_vectors_count: u64,
}

impl CollectionHealth {
    /// True when the collection needs the supervisor's recovery path (§4.Q):
    /// status is `red`, or it has points but none indexed.
    pub fn needs_recovery(&self) -> bool {
        self.status.eq_ignore_ascii_case("red")
            || (self.points_count > 0 && self.indexed_vectors_count == 0)
    }
}
