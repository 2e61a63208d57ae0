//! Grounded answer generation

pub mod prompt;
pub mod rag;

pub use prompt::{AssembledContext, PromptBuilder};
pub use rag::{RagAnswer, RagEngine};
