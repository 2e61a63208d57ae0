//! Durable persistence and vector retrieval

pub mod database;
pub mod vector_index;

pub use database::{ScoredChunk, Store, SubstringMatch};
pub use vector_index::{build_index, FlatIndex, HnswIndex, VectorIndex};
