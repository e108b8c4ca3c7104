//! LLM access for knowledge-graph extraction (§4.M): a single HTTP-backed
//! provider trait, no local inference.

pub mod provider;

pub use provider::{ExtractionRequest, ExtractionResponse, HttpLlmProvider, LlmProvider};
