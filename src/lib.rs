use thiserror::Error;

pub type Result<T> = std::result::Result<T, SupportError>;

#[derive(Error, Debug)]
pub enum SupportError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Escalation classification failed: {0}")]
    Classification(String),

    #[error("Invalid transition: cannot {action} while session is {mode}")]
    InvalidTransition {
        action: &'static str,
        mode: conversation::SessionMode,
    },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Query is empty")]
    EmptyQuery,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SupportError {
    /// Stable machine-readable name for the error category
    #[inline]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::IndexUnavailable(_) => "index_unavailable",
            Self::Embedding(_) => "embedding",
            Self::Generation(_) => "generation",
            Self::Classification(_) => "classification",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::SessionNotFound(_) => "session_not_found",
            Self::EmptyQuery => "empty_query",
            Self::Io(_) => "io",
            Self::Other(_) => "other",
        }
    }
}

impl From<config::ConfigError> for SupportError {
    #[inline]
    fn from(err: config::ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

pub mod commands;
pub mod config;
pub mod conversation;
pub mod corpus;
pub mod embeddings;
pub mod escalation;
pub mod generation;
pub mod index;
pub mod orchestrator;
pub mod retrieval;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;
