//! Graph store (§4.O): typed nodes and edges mirrored from the relational
//! store, `neo4rs`-backed. Value escaping is handled by parameterized
//! queries; label/type identifiers cannot be parameterized in Cypher so they
//! are validated against an allow-list before being spliced into statements.

use neo4rs::{query, Graph};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::GraphConfig;
use crate::error::{ConduitError, Result};
use crate::types::{Entity, EntityType, Relation};

static LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap());

fn entity_label(entity_type: EntityType) -> &'static str {
    match entity_type {
        EntityType::Concept => "Concept",
        EntityType::Organization => "Organization",
        EntityType::Person => "Person",
        EntityType::Section => "Section",
        EntityType::Document => "Document",
        EntityType::Technology => "Technology",
        EntityType::Location => "Location",
        EntityType::Event => "Event",
    }
}

/// Validates a label/type identifier against the allow-list transform:
/// letter-start, `[A-Za-z0-9_]*` (§4.O).
fn validate_identifier(identifier: &str) -> Result<()> {
    if LABEL_RE.is_match(identifier) {
        Ok(())
    } else {
        Err(ConduitError::InvalidInput(format!(
            "identifier `{identifier}` is not a valid label/type"
        )))
    }
}

pub struct GraphStore {
    graph: Graph,
}

impl GraphStore {
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port);
        let password = config.password.clone().unwrap_or_default();
        let graph = Graph::new(&addr, &config.graph_name, &password)
            .await
            .map_err(|e| ConduitError::UnavailableDependency {
                dependency: "graph_store".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { graph })
    }

    fn run_error(e: neo4rs::Error) -> ConduitError {
        ConduitError::UnavailableDependency {
            dependency: "graph_store".to_string(),
            reason: e.to_string(),
        }
    }

    /// Merge-on-id create (§4.O).
    pub async fn create_entity(&self, entity: &Entity) -> Result<()> {
        let label = entity_label(entity.entity_type);
        validate_identifier(label)?;
        let cypher = format!(
            "MERGE (e:{label} {{id: $id}}) \
             SET e.name = $name, e.description = $description, e.confidence = $confidence, \
             e.source_document_id = $source_document_id, e.updated_at = $updated_at"
        );
        self.graph
            .run(
                query(&cypher)
                    .param("id", entity.entity_id.clone())
                    .param("name", entity.name.clone())
                    .param("description", entity.description.clone())
                    .param("confidence", entity.confidence as f64)
                    .param("source_document_id", entity.source_document_id.clone())
                    .param("updated_at", entity.updated_at),
            )
            .await
            .map_err(Self::run_error)
    }

    /// Merge-on-id create; rejects self-relations (§4.O).
    pub async fn create_relation(&self, relation: &Relation) -> Result<()> {
        if relation.subject_id == relation.object_id {
            return Err(ConduitError::InvalidInput(
                "relation subject_id and object_id must differ".to_string(),
            ));
        }
        validate_identifier(&relation.predicate.to_uppercase())?;
        let rel_type = relation.predicate.to_uppercase();
        let cypher = format!(
            "MATCH (s {{id: $subject_id}}), (o {{id: $object_id}}) \
             MERGE (s)-[r:{rel_type} {{id: $relation_id}}]->(o) \
             SET r.confidence = $confidence, r.created_at = $created_at"
        );
        self.graph
            .run(
                query(&cypher)
                    .param("subject_id", relation.subject_id.clone())
                    .param("object_id", relation.object_id.clone())
                    .param("relation_id", relation.relation_id.clone())
                    .param("confidence", relation.confidence as f64)
                    .param("created_at", relation.created_at),
            )
            .await
            .map_err(Self::run_error)
    }

    pub async fn get_entity(&self, entity_id: &str) -> Result<Option<GraphEntity>> {
        let mut cursor = self
            .graph
            .execute(query("MATCH (e {id: $id}) RETURN e.id AS id, e.name AS name, labels(e) AS labels").param("id", entity_id.to_string()))
            .await
            .map_err(Self::run_error)?;
        if let Some(row) = cursor.next().await.map_err(Self::run_error)? {
            let id: String = row.get("id").unwrap_or_default();
            let name: String = row.get("name").unwrap_or_default();
            let labels: Vec<String> = row.get("labels").unwrap_or_default();
            Ok(Some(GraphEntity {
                id,
                name,
                label: labels.into_iter().next().unwrap_or_default(),
            }))
        } else {
            Ok(None)
        }
    }

    pub async fn search_entities(&self, name_contains: &str, limit: usize) -> Result<Vec<GraphEntity>> {
        let mut cursor = self
            .graph
            .execute(
                query(
                    "MATCH (e) WHERE toLower(e.name) CONTAINS toLower($q) \
                     RETURN e.id AS id, e.name AS name, labels(e) AS labels LIMIT $limit",
                )
                .param("q", name_contains.to_string())
                .param("limit", limit as i64),
            )
            .await
            .map_err(Self::run_error)?;

        let mut out = Vec::new();
        while let Some(row) = cursor.next().await.map_err(Self::run_error)? {
            let id: String = row.get("id").unwrap_or_default();
            let name: String = row.get("name").unwrap_or_default();
            let labels: Vec<String> = row.get("labels").unwrap_or_default();
            out.push(GraphEntity {
                id,
                name,
                label: labels.into_iter().next().unwrap_or_default(),
            });
        }
        Ok(out)
    }

    /// `get_related(id, max_hops <= 5)` (§4.O).
    pub async fn get_related(&self, entity_id: &str, max_hops: u8) -> Result<Vec<GraphEntity>> {
        let hops = max_hops.min(5).max(1);
        let cypher = format!(
            "MATCH (e {{id: $id}})-[*1..{hops}]-(related) \
             RETURN DISTINCT related.id AS id, related.name AS name, labels(related) AS labels"
        );
        let mut cursor = self
            .graph
            .execute(query(&cypher).param("id", entity_id.to_string()))
            .await
            .map_err(Self::run_error)?;

        let mut out = Vec::new();
        while let Some(row) = cursor.next().await.map_err(Self::run_error)? {
            let id: String = row.get("id").unwrap_or_default();
            let name: String = row.get("name").unwrap_or_default();
            let labels: Vec<String> = row.get("labels").unwrap_or_default();
            out.push(GraphEntity {
                id,
                name,
                label: labels.into_iter().next().unwrap_or_default(),
            });
        }
        Ok(out)
    }

    pub async fn delete_entity(&self, entity_id: &str) -> Result<()> {
        self.graph
            .run(query("MATCH (e {id: $id}) DETACH DELETE e").param("id", entity_id.to_string()))
            .await
            .map_err(Self::run_error)
    }

    pub async fn delete_by_document(&self, document_id: &str) -> Result<()> {
        self.graph
            .run(
                query("MATCH (e {source_document_id: $doc}) DETACH DELETE e")
                    .param("doc", document_id.to_string()),
            )
            .await
            .map_err(Self::run_error)
    }
}

#[derive(Debug, Clone)]
pub struct GraphEntity {
    pub id: String,
    pub name: String,
    pub label: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_simple_identifiers() {
        assert!(validate_identifier("Concept").is_ok());
        assert!(validate_identifier("relates_to").is_ok());
    }

    #[test]
    fn rejects_identifiers_starting_with_digit_or_containing_symbols() {
        assert!(validate_identifier("1Entity").is_err());
        assert!(validate_identifier("Entity; DROP").is_err());
        assert!(validate_identifier("Entity-Type").is_err());
    }

    #[test]
    fn entity_label_covers_every_entity_type() {
        for t in [
            EntityType::Concept,
            EntityType::Organization,
            EntityType::Person,
            EntityType::Section,
            EntityType::Document,
            EntityType::Technology,
            EntityType::Location,
            EntityType::Event,
        ] {
            assert!(!entity_label(t).is_empty());
        }
    }
}
