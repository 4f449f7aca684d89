//! Line-delimited JSON protocol for the support service
//!
//! Each request is one JSON object tagged by `"type"`; each reply is one JSON
//! object on its own line.

use serde::{Deserialize, Serialize};

use crate::SupportError;
use crate::orchestrator::SupportResponse;

/// Incoming request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    StartSession,
    Query {
        session_id: String,
        query: String,
    },
    AgentReply {
        session_id: String,
        #[serde(alias = "agent_reply")]
        text: String,
    },
    Resume {
        session_id: String,
    },
    EndSession {
        session_id: String,
    },
}

/// Error details sent back to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub kind: String,
    pub message: String,
}

/// Outgoing reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reply {
    Answer(SupportResponse),
    SessionStarted { session_id: String },
    Ack { ok: bool },
    Error { error: ErrorBody },
}

impl Reply {
    #[inline]
    pub fn ack() -> Self {
        Self::Ack { ok: true }
    }

    #[inline]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::Error {
            error: ErrorBody {
                kind: "invalid_request".to_string(),
                message: message.into(),
            },
        }
    }
}

impl From<&SupportError> for Reply {
    #[inline]
    fn from(err: &SupportError) -> Self {
        Self::Error {
            error: ErrorBody {
                kind: err.kind().to_string(),
                message: err.to_string(),
            },
        }
    }
}
