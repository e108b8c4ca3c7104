//! Graph store (§4.O): optional `neo4rs`-backed mirror of entities and
//! relations, used for multi-hop traversal the relational store doesn't
//! serve well.

pub mod store;

pub use store::{GraphEntity, GraphStore};
