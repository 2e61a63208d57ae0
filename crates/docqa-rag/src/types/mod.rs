//! Core domain and wire types

pub mod document;
pub mod query;
pub mod response;

pub use document::{Chunk, Document, DocumentCounts, DocumentStatus, FileType, NewChunk};
