//! Entity extractor (§4.N): wraps an `LlmProvider`, the validator, and a
//! bounded background job queue drained by a fixed worker pool.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::config::ExtractionConfig;
use crate::error::{ConduitError, Result};
use crate::graph::GraphStore;
use crate::kag::validator::validate;
use crate::llm::provider::{ExtractionRequest, LlmProvider};
use crate::storage::RelationalStore;
use crate::types::{Chunk, Document, Entity, ExtractionStatus, ExtractionStatusRow, Relation};

const JOB_CHANNEL_CAPACITY: usize = 100;

struct Job {
    document: Document,
    chunk: Chunk,
}

/// Background extraction pipeline. `enqueue` is non-blocking and fails fast
/// if the channel is full (§5 Entity extraction workers).
pub struct Extractor {
    sender: mpsc::Sender<Job>,
    stop: tokio_util::sync::CancellationToken,
}

impl Extractor {
    /// Spawns `config.num_workers` workers draining a channel of capacity
    /// `JOB_CHANNEL_CAPACITY` (≥100, §4.N).
    pub fn spawn(
        provider: Arc<dyn LlmProvider>,
        relational: Arc<RelationalStore>,
        graph: Option<Arc<GraphStore>>,
        config: ExtractionConfig,
    ) -> Arc<Self> {
        let (sender, receiver) = mpsc::channel(JOB_CHANNEL_CAPACITY);
        let stop = tokio_util::sync::CancellationToken::new();

        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));
        for worker_id in 0..config.num_workers.max(1) {
            let receiver = receiver.clone();
            let provider = provider.clone();
            let relational = relational.clone();
            let graph = graph.clone();
            let config = config.clone();
            let stop = stop.clone();
            tokio::spawn(async move {
                loop {
                    let job = {
                        let mut rx = receiver.lock().await;
                        tokio::select! {
                            _ = stop.cancelled() => None,
                            job = rx.recv() => job,
                        }
                    };
                    let Some(job) = job else {
                        tracing::debug!(worker_id, "extraction worker exiting");
                        break;
                    };
                    let fut = extract_one(&provider, &relational, graph.as_ref(), &config, job);
                    match timeout(std::time::Duration::from_secs(config.timeout_seconds), fut).await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => tracing::warn!(error = %e, "extraction job failed"),
                        Err(_) => tracing::warn!("extraction job timed out"),
                    }
                }
            });
        }

        Arc::new(Self { sender, stop })
    }

    pub async fn enqueue(&self, document: Document, chunk: Chunk) -> Result<()> {
        self.sender
            .try_send(Job { document, chunk })
            .map_err(|_| ConduitError::UnavailableDependency {
                dependency: "kag_queue".to_string(),
                reason: "extraction job queue is full".to_string(),
            })
    }

    /// Extracts synchronously, bypassing the queue — used when the caller
    /// wants to block on the result inline (§4.G step 6).
    pub async fn extract_now(
        provider: &Arc<dyn LlmProvider>,
        relational: &Arc<RelationalStore>,
        graph: Option<&Arc<GraphStore>>,
        config: &ExtractionConfig,
        document: Document,
        chunk: Chunk,
    ) -> Result<()> {
        extract_one(provider, relational, graph, config, Job { document, chunk }).await
    }

    pub async fn shutdown(&self) {
        self.stop.cancel();
    }
}

async fn extract_one(
    provider: &Arc<dyn LlmProvider>,
    relational: &Arc<RelationalStore>,
    graph: Option<&Arc<GraphStore>>,
    config: &ExtractionConfig,
    job: Job,
) -> Result<()> {
    let request = ExtractionRequest {
        content: job.chunk.content.clone(),
        document_title: job.document.title.clone(),
        section: None,
        max_entities: config.max_entities_per_chunk,
        max_relations: config.max_relations_per_chunk,
        confidence_threshold: config.confidence_threshold,
    };

    let now = job.document.indexed_at;
    let result = provider.extract(&request).await;

    let response = match result {
        Ok(r) => r,
        Err(e) => {
            persist_status(
                relational,
                &job.chunk.chunk_id,
                ExtractionStatus::Error,
                0,
                0,
                Some(e.to_string()),
                now,
            )
            .await?;
            return Err(e);
        }
    };

    let validated = validate(response.entities, response.relations, config.confidence_threshold);

    let entities: Vec<Entity> = validated
        .entities
        .iter()
        .map(|e| {
            let entity_id = Entity::derive_id(&e.name, e.entity_type, &job.document.document_id);
            Entity {
                entity_id,
                name: e.name.clone(),
                entity_type: e.entity_type,
                description: e.description.clone(),
                confidence: e.confidence,
                source_chunk_id: job.chunk.chunk_id.clone(),
                source_document_id: job.document.document_id.clone(),
                created_at: now,
                updated_at: now,
            }
        })
        .collect();

    let name_to_id: std::collections::HashMap<String, String> = entities
        .iter()
        .map(|e| (e.name.to_lowercase(), e.entity_id.clone()))
        .collect();

    let relations: Vec<Relation> = validated
        .relations
        .iter()
        .filter_map(|r| {
            let subject_id = name_to_id.get(&r.subject.to_lowercase())?.clone();
            let object_id = name_to_id.get(&r.object.to_lowercase())?.clone();
            let relation_id = Relation::derive_id(&subject_id, &r.predicate, &object_id);
            Some(Relation {
                relation_id,
                subject_id,
                predicate: r.predicate.clone(),
                object_id,
                confidence: r.confidence,
                source_chunk_id: job.chunk.chunk_id.clone(),
                created_at: now,
            })
        })
        .collect();

    relational.insert_entities_and_relations(&entities, &relations).await?;

    if let Some(graph) = graph {
        for entity in &entities {
            if let Err(e) = graph.create_entity(entity).await {
                tracing::warn!(error = %e, "graph mirror of entity failed, relational copy retained");
            }
        }
        for relation in &relations {
            if let Err(e) = graph.create_relation(relation).await {
                tracing::warn!(error = %e, "graph mirror of relation failed, relational copy retained");
            }
        }
    }

    persist_status(
        relational,
        &job.chunk.chunk_id,
        ExtractionStatus::Completed,
        entities.len() as u32,
        relations.len() as u32,
        None,
        now,
    )
    .await
}

async fn persist_status(
    relational: &Arc<RelationalStore>,
    chunk_id: &str,
    status: ExtractionStatus,
    entity_count: u32,
    relation_count: u32,
    error_message: Option<String>,
    now: i64,
) -> Result<()> {
    relational
        .set_extraction_status(&ExtractionStatusRow {
            chunk_id: chunk_id.to_string(),
            status,
            entity_count,
            relation_count,
            error_message,
            extracted_at: Some(now),
            updated_at: now,
        })
        .await
}
