//! Context assembly and the grounding prompt

use crate::providers::chat::ChatMessage;
use crate::retrieval::RankedChunk;

/// Context assembled from ranked results under a character budget
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// Formatted context text
    pub text: String,
    /// Number of results actually included
    pub used: usize,
}

/// Builds the grounded prompt for RAG completions
pub struct PromptBuilder;

impl PromptBuilder {
    /// Walk the ranked results in order, formatting each as
    /// `[Source i: <filename>]\n<text>\n`, and stop before a result would
    /// push the total past `max_chars`.
    pub fn assemble_context(results: &[RankedChunk], max_chars: usize) -> AssembledContext {
        let mut parts: Vec<String> = Vec::new();
        let mut total = 0usize;

        for (i, result) in results.iter().enumerate() {
            let part = format!(
                "[Source {}: {}]\n{}\n",
                i + 1,
                result.document_name,
                result.chunk.text
            );
            let part_chars = part.chars().count();
            let separator = if parts.is_empty() { 0 } else { 1 };
            if total + separator + part_chars > max_chars {
                break;
            }
            total += separator + part_chars;
            parts.push(part);
        }

        AssembledContext {
            used: parts.len(),
            text: parts.join("\n"),
        }
    }

    /// The fixed grounding instruction wrapped around the assembled context
    pub fn system_prompt(context: &str) -> String {
        format!(
            r#"You are a helpful AI assistant that answers questions based strictly on the provided document context.

CRITICAL RULES:
1. Answer ONLY using information from the CONTEXT below - never your general knowledge.
2. If the context does not contain the answer, respond: "I don't have enough information in the available documents to answer that question."
3. Always cite your sources using the format "According to Source 1..." or "Source 2 states...".
4. Never make up document names, content, or information that is not in the CONTEXT.
5. If the CONTEXT is empty or insufficient, say so - never fabricate an answer.

CONTEXT FROM UPLOADED DOCUMENTS:
{context}

Remember: if it is not in the CONTEXT above, you cannot answer it."#,
            context = context
        )
    }

    /// System prompt, prior turns verbatim, then the user query
    pub fn build_messages(
        context: &str,
        history: Option<&[ChatMessage]>,
        query: &str,
    ) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage::system(Self::system_prompt(context))];
        if let Some(turns) = history {
            messages.extend(turns.iter().cloned());
        }
        messages.push(ChatMessage::user(query));
        messages
    }
}
