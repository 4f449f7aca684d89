// Test doubles for the embedding and generation capabilities

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::embeddings::Embedder;
use crate::generation::{GenerationContext, Generator};
use crate::{Result, SupportError};

/// Deterministic bag-of-keywords embedder
///
/// Each dimension counts occurrences of one vocabulary word, plus a constant
/// bias dimension so no text maps to the zero vector.
pub(crate) struct KeywordEmbedder {
    vocabulary: Vec<&'static str>,
    model: String,
    calls: AtomicUsize,
    fail: bool,
}

pub(crate) const SUPPORT_VOCABULARY: &[&str] = &[
    "return", "refund", "days", "password", "reset", "login", "payment", "paypal", "card",
    "shipping",
];

impl KeywordEmbedder {
    pub(crate) fn new() -> Self {
        Self::with_vocabulary(SUPPORT_VOCABULARY)
    }

    pub(crate) fn with_vocabulary(vocabulary: &[&'static str]) -> Self {
        Self {
            vocabulary: vocabulary.to_vec(),
            model: "keyword-test".to_string(),
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub(crate) fn named(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn dimension(&self) -> usize {
        self.vocabulary.len() + 1
    }
}

impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SupportError::Embedding("embedding service offline".to_string()));
        }

        let lower = text.to_lowercase();
        let mut vector: Vec<f32> = self
            .vocabulary
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect();
        vector.push(0.1);
        Ok(vector)
    }
}

/// How a [`ScriptedGenerator`] answers
#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// Always return this text
    Reply(String),
    /// Quote the most relevant document, or admit there is none
    QuoteTopDocument,
    /// Fail every call
    Fail,
}

/// Generator double that records every call
pub(crate) struct ScriptedGenerator {
    script: Script,
    calls: Mutex<Vec<(String, Option<GenerationContext>)>>,
}

impl ScriptedGenerator {
    pub(crate) fn new(script: Script) -> Self {
        Self {
            script,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replying(text: &str) -> Self {
        Self::new(Script::Reply(text.to_string()))
    }

    pub(crate) fn quoting() -> Self {
        Self::new(Script::QuoteTopDocument)
    }

    pub(crate) fn failing() -> Self {
        Self::new(Script::Fail)
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().expect("calls lock poisoned").len()
    }

    pub(crate) fn last_call(&self) -> Option<(String, Option<GenerationContext>)> {
        self.calls.lock().expect("calls lock poisoned").last().cloned()
    }
}

impl Generator for ScriptedGenerator {
    fn model_name(&self) -> &str {
        "scripted-test"
    }

    fn generate(&self, prompt: &str, context: Option<&GenerationContext>) -> Result<String> {
        self.calls
            .lock()
            .expect("calls lock poisoned")
            .push((prompt.to_string(), context.cloned()));

        match &self.script {
            Script::Reply(text) => Ok(text.clone()),
            Script::QuoteTopDocument => Ok(context
                .and_then(|c| c.documents.first())
                .map(|doc| format!("According to our documentation: {}", doc.trim()))
                .unwrap_or_else(|| "I could not find that in our documentation.".to_string())),
            Script::Fail => Err(SupportError::Generation("model unavailable".to_string())),
        }
    }
}
