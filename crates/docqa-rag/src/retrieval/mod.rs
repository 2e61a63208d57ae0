//! Chunk ranking for queries

pub mod search;

pub use search::{NeighborChunk, RankedChunk, SearchService, SearchStatistics};
