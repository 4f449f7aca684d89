//! The answer pipeline and the escalation state machine
//!
//! [`AnswerOrchestrator`] runs one request/response cycle for a session:
//! escalation check, retrieval, generation and memory update. It also owns the
//! human hand-off transitions. A session is either `Automated` (answered by the
//! pipeline) or `Escalated` (waiting on a human agent until `resume`).
//!
//! Every call is atomic for its session. Mutations are applied to a staged copy
//! that replaces the caller's state only once the whole cycle has succeeded.


use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::{Config, EscalationConfig};
use crate::conversation::{self, HistoryLimit, SessionMode, SessionState, Turn};
use crate::embeddings::Embedder;
use crate::escalation::EscalationClassifier;
use crate::generation::{GenerationContext, Generator};
use crate::index::VectorIndex;
use crate::retrieval::Retriever;
use crate::{Result, SupportError};

/// Reply returned to the caller for every query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportResponse {
    pub response: String,
    pub escalate: bool,
}

impl SupportResponse {
    #[inline]
    pub fn answered(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            escalate: false,
        }
    }

    #[inline]
    pub fn escalated(response: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            escalate: true,
        }
    }
}

pub struct AnswerOrchestrator {
    classifier: EscalationClassifier,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    history_limits: Vec<HistoryLimit>,
    handoff_message: String,
    pending_message: String,
}

impl fmt::Debug for AnswerOrchestrator {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnswerOrchestrator")
            .field("classifier", &self.classifier)
            .field("retriever", &self.retriever)
            .field("generator", &self.generator.model_name())
            .field("history_limits", &self.history_limits)
            .finish_non_exhaustive()
    }
}

impl AnswerOrchestrator {
    /// Orchestrator with the default memory limit and hand-off messages
    #[inline]
    pub fn new(
        classifier: EscalationClassifier,
        retriever: Retriever,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let defaults = Config::default();
        let escalation = EscalationConfig::default();
        Self {
            classifier,
            retriever,
            generator,
            history_limits: vec![HistoryLimit::Turns(defaults.memory.max_turns)],
            handoff_message: escalation.handoff_message,
            pending_message: escalation.pending_message,
        }
    }

    /// Assemble the pipeline described by `config` around the two capabilities
    #[inline]
    pub fn from_config(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        config.validate()?;

        let classifier = EscalationClassifier::from_config(
            &config.escalation,
            Some(Arc::clone(&generator)),
        )?;
        let retriever = Retriever::from_config(embedder, &config.retrieval);

        let mut history_limits = vec![HistoryLimit::Turns(config.memory.max_turns)];
        if let Some(max_tokens) = config.memory.max_tokens {
            history_limits.push(HistoryLimit::Tokens(max_tokens));
        }

        Ok(Self {
            classifier,
            retriever,
            generator,
            history_limits,
            handoff_message: config.escalation.handoff_message.clone(),
            pending_message: config.escalation.pending_message.clone(),
        })
    }

    #[inline]
    pub fn with_history_limits(mut self, limits: Vec<HistoryLimit>) -> Self {
        self.history_limits = limits;
        self
    }

    #[inline]
    pub fn with_messages(
        mut self,
        handoff_message: impl Into<String>,
        pending_message: impl Into<String>,
    ) -> Self {
        self.handoff_message = handoff_message.into();
        self.pending_message = pending_message.into();
        self
    }

    #[inline]
    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    #[inline]
    pub fn handoff_message(&self) -> &str {
        &self.handoff_message
    }

    #[inline]
    pub fn pending_message(&self) -> &str {
        &self.pending_message
    }

    /// Answer one customer query for `session`
    #[inline]
    pub fn handle_query(
        &self,
        index: &VectorIndex,
        session: &mut SessionState,
        query: &str,
    ) -> Result<SupportResponse> {
        if query.trim().is_empty() {
            return Err(SupportError::EmptyQuery);
        }

        if session.is_escalated() {
            debug!("Session {} is waiting on an agent; pipeline bypassed", session.id());
            return Ok(SupportResponse::escalated(self.pending_message.clone()));
        }

        let decision = self.classifier.classify_decision(query)?;
        let mut staged = session.clone();

        if decision.escalate {
            conversation::append(&mut staged, Turn::user(query));
            conversation::append(&mut staged, Turn::assistant(self.handoff_message.clone()));
            staged.set_mode(SessionMode::Escalated);
            *session = staged;

            info!("Session {} handed to a human agent", session.id());
            return Ok(SupportResponse::escalated(self.handoff_message.clone()));
        }

        let history = self.prompt_history(&staged);

        let retrieved = self.retriever.retrieve_top(index, query)?;
        debug!("Composing answer from {} retrieved chunks", retrieved.len());
        let documents = retrieved.into_iter().map(|scored| scored.chunk.text).collect();
        let context = GenerationContext::new(documents, history);

        let answer = self.generator.generate(query, Some(&context))?;

        conversation::append(&mut staged, Turn::user(query));
        conversation::append(&mut staged, Turn::assistant(answer.clone()));
        *session = staged;

        Ok(SupportResponse::answered(answer))
    }

    /// Render the history the model sees, bounded by the memory limits
    ///
    /// Limits shape the prompt only. The session keeps every turn.
    fn prompt_history(&self, session: &SessionState) -> String {
        let mut window = session.clone();
        for limit in &self.history_limits {
            let dropped = conversation::truncate(&mut window, *limit);
            if dropped > 0 {
                debug!("Left {} old turns of session {} out of the prompt", dropped, session.id());
            }
        }
        conversation::render(&window)
    }

    /// Record a human agent's reply in an escalated session
    ///
    /// The reply is stored with [`Role::Agent`](crate::conversation::Role::Agent)
    /// rather than as an assistant turn, so rendered history tells the human
    /// apart from the model. It renders as "Support agent:".
    #[inline]
    pub fn agent_reply(&self, session: &mut SessionState, text: &str) -> Result<()> {
        if !session.is_escalated() {
            return Err(SupportError::InvalidTransition {
                action: "record an agent reply",
                mode: session.mode(),
            });
        }

        conversation::append(session, Turn::agent(text));
        debug!("Agent replied in session {}", session.id());
        Ok(())
    }

    /// Return an escalated session to automated answering
    #[inline]
    pub fn resume(&self, session: &mut SessionState) -> Result<()> {
        if !session.is_escalated() {
            return Err(SupportError::InvalidTransition {
                action: "resume automated support",
                mode: session.mode(),
            });
        }

        session.set_mode(SessionMode::Automated);
        info!("Session {} resumed automated support", session.id());
        Ok(())
    }
}
