use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConduitConfig {
    pub data_dir: PathBuf,
    pub chunk: ChunkConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub rag: RagConfig,
    pub kag: KagConfig,
    pub graph: GraphConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkConfig {
    pub max_size: usize,
    pub overlap: usize,
    pub min_chunk_size: usize,
    pub splitters: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    /// HTTP endpoint speaking the Ollama-style `/api/embed` contract (§6).
    Http,
    /// In-process ONNX model, no endpoint required.
    LocalOnnx,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub host: String,
    pub model: String,
    pub dimension: usize,
    pub batch_size: usize,
    /// Only consulted when `backend = local_onnx`.
    pub model_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VectorStoreBackend {
    /// Embedded LanceDB, no external process required.
    Embedded,
    /// Remote Qdrant-compatible HTTP API, brought up by the Dependency
    /// Supervisor (§4.Q).
    Remote,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    pub backend: VectorStoreBackend,
    pub host: String,
    pub port: u16,
    pub collection: String,
    pub dimension: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    pub default_limit: usize,
    pub candidate_multiplier: usize,
    pub semantic_weight: Option<f32>,
    pub enable_mmr: bool,
    pub mmr_lambda: f32,
    pub min_score: f32,
    pub enable_rerank: bool,
    pub rerank_top_n: usize,
    pub rrf_k: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KagProvider {
    Ollama,
    Openai,
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KagConfig {
    pub enabled: bool,
    pub provider: KagProvider,
    pub host: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub confidence_threshold: f32,
    pub max_entities_per_chunk: usize,
    pub max_relations_per_chunk: usize,
    pub timeout_seconds: u64,
    pub enable_background: bool,
    pub num_workers: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    Neo4j,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub backend: GraphBackend,
    pub host: String,
    pub port: u16,
    pub graph_name: String,
    pub password: Option<String>,
    pub pool_size: u32,
    pub connect_timeout_seconds: u64,
}

impl ConduitConfig {
    /// Validate config values, returning errors for clearly broken
    /// configurations.
    pub fn validate(&self) -> Result<(), String> {
        if self.embedding.dimension == 0 {
            return Err("embedding.dimension must be > 0".into());
        }
        if self.chunk.max_size < 50 {
            return Err("chunk.max_size must be >= 50".into());
        }
        if self.chunk.overlap >= self.chunk.max_size {
            return Err("chunk.overlap must be < chunk.max_size".into());
        }
        if self.rag.default_limit == 0 {
            return Err("rag.default_limit must be > 0".into());
        }
        if self.rag.candidate_multiplier == 0 {
            return Err("rag.candidate_multiplier must be > 0".into());
        }
        if !(0.0..=1.0).contains(&self.rag.min_score) {
            return Err("rag.min_score must be in [0.0, 1.0]".into());
        }
        if !(0.0..=1.0).contains(&self.rag.mmr_lambda) {
            return Err("rag.mmr_lambda must be in [0.0, 1.0]".into());
        }
        if self.kag.enabled && self.kag.extraction.num_workers == 0 {
            return Err("kag.extraction.num_workers must be > 0 when kag.enabled".into());
        }
        if self.vector_store.dimension != self.embedding.dimension {
            return Err("vector_store.dimension must match embedding.dimension".into());
        }
        Ok(())
    }

    /// Load config from a JSON file, falling back to defaults for missing
    /// fields.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConduitConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("conduit");

        Self {
            data_dir: data_dir.clone(),
            chunk: ChunkConfig {
                max_size: 1750,
                overlap: 200,
                min_chunk_size: 100,
                splitters: vec![
                    "\n\n".to_string(),
                    "\n".to_string(),
                    ". ".to_string(),
                    " ".to_string(),
                ],
            },
            embedding: EmbeddingConfig {
                backend: EmbeddingBackend::Http,
                host: "http://localhost:11434".to_string(),
                model: "nomic-embed-text".to_string(),
                dimension: 768,
                batch_size: 32,
                model_dir: data_dir.join("models"),
            },
            vector_store: VectorStoreConfig {
                backend: VectorStoreBackend::Embedded,
                host: "http://localhost".to_string(),
                port: 6333,
                collection: "conduit_kb".to_string(),
                dimension: 768,
                batch_size: 100,
            },
            rag: RagConfig {
                default_limit: 10,
                candidate_multiplier: 3,
                semantic_weight: None,
                enable_mmr: true,
                mmr_lambda: 0.7,
                min_score: 0.001,
                enable_rerank: true,
                rerank_top_n: 30,
                rrf_k: 60,
            },
            kag: KagConfig {
                enabled: false,
                provider: KagProvider::Ollama,
                host: Some("http://localhost:11434".to_string()),
                api_key: None,
                model: "llama3.1".to_string(),
                extraction: ExtractionConfig {
                    confidence_threshold: 0.6,
                    max_entities_per_chunk: 20,
                    max_relations_per_chunk: 20,
                    timeout_seconds: 60,
                    enable_background: true,
                    num_workers: 2,
                },
            },
            graph: GraphConfig {
                backend: GraphBackend::None,
                host: "127.0.0.1".to_string(),
                port: 7687,
                graph_name: "conduit".to_string(),
                password: None,
                pool_size: 8,
                connect_timeout_seconds: 10,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(ConduitConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_overlap_not_smaller_than_chunk_size() {
        let mut cfg = ConduitConfig::default();
        cfg.chunk.overlap = cfg.chunk.max_size;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_mismatched_vector_dimension() {
        let mut cfg = ConduitConfig::default();
        cfg.vector_store.dimension = cfg.embedding.dimension + 1;
        assert!(cfg.validate().is_err());
    }
}
