#![allow(unused_variables)]

pub mod config;
pub mod embeddings;
pub mod engine;
pub mod error;
pub mod graph;
pub mod indexing;
pub mod kag;
pub mod llm;
pub mod processing;
pub mod search;
pub mod source_manager;
pub mod storage;
pub mod supervisor;
pub mod types;

pub use config::ConduitConfig;
pub use engine::Daemon;
pub use error::{ConduitError, Result};
pub use types::{Chunk, Document, Entity, MetadataFilter, Relation, Source};

pub use uuid::Uuid;
