pub mod hybrid;
pub mod result_processor;
pub mod semantic_search;
pub mod text_search;

pub use hybrid::{
    reciprocal_rank_fusion, weighted_fusion, Confidence, HybridHit, HybridResult, HybridSearchOpts,
    HybridSearcher, SearchMode,
};
pub use result_processor::{process_results, ProcessedResult};
pub use semantic_search::{SemanticConfidence, SemanticHit, SemanticSearch, SemanticSearchOpts};
pub use text_search::{LexicalHit, TextSearch, TextSearchOpts};
