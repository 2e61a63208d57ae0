//! Chat completion provider trait

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Result of a completion call
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text
    pub text: String,
    /// Total tokens consumed
    pub tokens_used: u32,
    /// Model that produced the completion
    pub model: String,
}

/// Produces a completion for an ordered message list.
///
/// A dumb adapter over the external provider; it makes no decisions about
/// content.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate a completion
    async fn complete(
        &self,
        messages: &[ChatMessage],
        temperature: f32,
        max_tokens: u32,
    ) -> Result<Completion>;

    /// Whether the provider is reachable
    async fn health_check(&self) -> Result<bool>;

    /// Configured model identifier
    fn model(&self) -> &str;
}
