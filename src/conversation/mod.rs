//! Session state and conversation memory
//!
//! A [`SessionState`] is one customer conversation: an ordered, append-only list
//! of [`Turn`]s and the escalation [`SessionMode`]. The free functions here are
//! the memory operations the answer pipeline applies before each generation.


use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::estimate_token_count;

/// Who authored a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Agent,
}

impl Role {
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::User => "Customer",
            Self::Assistant => "Assistant",
            Self::Agent => "Support agent",
        }
    }
}

impl fmt::Display for Role {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::Agent => write!(f, "agent"),
        }
    }
}

/// One message in a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl Turn {
    #[inline]
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    #[inline]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    #[inline]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    #[inline]
    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(Role::Agent, content)
    }
}

/// Whether the session is answered by the pipeline or waiting on a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    #[default]
    Automated,
    Escalated,
}

impl fmt::Display for SessionMode {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Automated => write!(f, "automated"),
            Self::Escalated => write!(f, "escalated"),
        }
    }
}

/// Conversation state for a single customer session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    id: String,
    turns: Vec<Turn>,
    mode: SessionMode,
    created_at: DateTime<Utc>,
}

impl Default for SessionState {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    /// Start an automated session with empty history and a fresh id
    #[inline]
    pub fn new() -> Self {
        Self::with_id(Uuid::new_v4().to_string())
    }

    #[inline]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            turns: Vec::new(),
            mode: SessionMode::Automated,
            created_at: Utc::now(),
        }
    }

    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[inline]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    #[inline]
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    #[inline]
    pub fn is_escalated(&self) -> bool {
        self.mode == SessionMode::Escalated
    }

    #[inline]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub(crate) fn set_mode(&mut self, mode: SessionMode) {
        self.mode = mode;
    }
}

/// Bound applied to history before it is handed to generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryLimit {
    /// Keep at most this many of the newest turns
    Turns(usize),
    /// Keep the newest turns whose estimated token total fits this budget
    Tokens(usize),
}

/// Append a turn to the end of the session history
#[inline]
pub fn append(session: &mut SessionState, turn: Turn) {
    session.turns.push(turn);
}

/// Format the ordered history as prompt text, one turn per line
#[inline]
pub fn render(session: &SessionState) -> String {
    let mut rendered = String::new();
    for turn in &session.turns {
        rendered.push_str(turn.role.label());
        rendered.push_str(": ");
        rendered.push_str(turn.content.trim());
        rendered.push('\n');
    }
    rendered
}

/// Drop the oldest turns until the history satisfies `limit`
///
/// Returns the number of turns removed.
#[inline]
pub fn truncate(session: &mut SessionState, limit: HistoryLimit) -> usize {
    let drop = match limit {
        HistoryLimit::Turns(max) => session.turns.len().saturating_sub(max),
        HistoryLimit::Tokens(budget) => {
            let mut kept_tokens = 0usize;
            let mut kept = 0usize;
            for turn in session.turns.iter().rev() {
                let tokens = estimate_token_count(&turn.content);
                if kept_tokens + tokens > budget {
                    break;
                }
                kept_tokens += tokens;
                kept += 1;
            }
            session.turns.len() - kept
        }
    };

    session.turns.drain(..drop);
    drop
}
