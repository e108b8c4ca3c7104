pub mod chunker;
pub mod cleaner;
pub mod lopdf_parser;
pub mod parser;

#[cfg(windows)]
pub mod windows_ocr;

pub use chunker::{ChunkResult, ContextualChunkResult, TextChunker};
pub use cleaner::{ContentCleaner, ContentOrigin};
pub use lopdf_parser::LoPdfParser;
pub use parser::{DocumentParser, ParsedDocument};
