//! Generation capability and prompt composition
//!
//! The [`Generator`] trait is the seam to the language model. The answer
//! pipeline describes what the model should see with a [`GenerationContext`]:
//! retrieved documentation, rendered conversation history and the system
//! instructions. Providers flatten it with [`GenerationContext::render_prompt`].


use std::fmt::Write as _;

use serde::Serialize;

use crate::Result;

/// The generation capability: prompt plus optional structured context in, text out
///
/// Calls may be slow, rate limited and non-deterministic. Failures surface as
/// [`crate::SupportError::Generation`].
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &str, context: Option<&GenerationContext>) -> Result<String>;
}

pub const SUPPORT_SYSTEM_PROMPT: &str = "You are a customer support assistant. \
Answer the customer's question using the product documentation provided. \
Be concise and friendly. If the documentation does not cover the question, say so \
rather than guessing.";

/// Note included in place of documentation when retrieval found nothing
pub const NO_DOCUMENTATION_NOTE: &str = "No matching documentation found.";

/// Structured context for a single generation call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerationContext {
    /// System instructions for the model
    pub system: String,
    /// Retrieved documentation passages, most relevant first
    pub documents: Vec<String>,
    /// Rendered conversation history, oldest first
    pub history: String,
}

impl GenerationContext {
    #[inline]
    pub fn new(documents: Vec<String>, history: String) -> Self {
        Self {
            system: SUPPORT_SYSTEM_PROMPT.to_string(),
            documents,
            history,
        }
    }

    #[inline]
    pub fn has_documents(&self) -> bool {
        !self.documents.is_empty()
    }

    /// Flatten documentation, history and the question into one prompt
    #[inline]
    pub fn render_prompt(&self, question: &str) -> String {
        let mut prompt = String::from("Documentation:\n");
        if self.documents.is_empty() {
            prompt.push_str(NO_DOCUMENTATION_NOTE);
            prompt.push_str(" Answer from general knowledge if you can, and suggest contacting support otherwise.\n");
        } else {
            for (i, document) in self.documents.iter().enumerate() {
                let _ = writeln!(prompt, "[{}] {}", i + 1, document.trim());
            }
        }

        prompt.push_str("\nConversation so far:\n");
        if self.history.trim().is_empty() {
            prompt.push_str("(no previous messages)\n");
        } else {
            prompt.push_str(self.history.trim_end());
            prompt.push('\n');
        }

        let _ = write!(prompt, "\nCustomer question: {}\nAnswer:", question.trim());
        prompt
    }
}
