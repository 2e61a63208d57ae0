//! Document ingestion: upload acceptance and the processing pipeline

pub mod chunker;
pub mod parser;
pub mod pipeline;
pub mod upload;

pub use chunker::TextChunker;
pub use parser::{FileParser, ParsedDocument};
pub use pipeline::IngestionPipeline;
pub use upload::{content_hash, AcceptedUpload, UploadCoordinator};
