//! Caller-facing support service
//!
//! [`SupportService`] owns the session registry and the shared index. Turns
//! for one session are serialised by a per-session mutex held across the whole
//! pipeline, while independent sessions proceed concurrently. The index is
//! read-only and replaced wholesale on rebuild.

pub mod protocol;
pub mod server;

#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::Config;
use crate::conversation::SessionState;
use crate::embeddings::Embedder;
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::orchestrator::{AnswerOrchestrator, SupportResponse};
use crate::{Result, SupportError};

pub use server::{serve, serve_stdio};

type SessionHandle = Arc<Mutex<SessionState>>;

#[derive(Debug)]
pub struct SupportService {
    orchestrator: Arc<AnswerOrchestrator>,
    index: RwLock<Arc<VectorIndex>>,
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SupportService {
    #[inline]
    pub fn new(orchestrator: AnswerOrchestrator, index: VectorIndex) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            index: RwLock::new(Arc::new(index)),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Load the persisted index and assemble the pipeline from `config`
    ///
    /// Fails with [`SupportError::IndexUnavailable`] when no valid index has
    /// been built for the configured embedding model.
    #[inline]
    pub fn start(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self> {
        let index = VectorIndex::load(&config.index_path(), embedder.as_ref())?;
        let orchestrator = AnswerOrchestrator::from_config(config, embedder, generator)?;
        info!(
            "Support service ready with {} indexed chunks ({} escalation)",
            index.len(),
            config.escalation.strategy
        );
        Ok(Self::new(orchestrator, index))
    }

    #[inline]
    pub fn orchestrator(&self) -> &AnswerOrchestrator {
        &self.orchestrator
    }

    /// The index currently used for retrieval
    #[inline]
    pub async fn index(&self) -> Arc<VectorIndex> {
        Arc::clone(&*self.index.read().await)
    }

    /// Replace the index; turns already in flight finish on the old one
    #[inline]
    pub async fn swap_index(&self, index: VectorIndex) -> Arc<VectorIndex> {
        let mut current = self.index.write().await;
        info!("Swapping index ({} -> {} chunks)", current.len(), index.len());
        std::mem::replace(&mut *current, Arc::new(index))
    }

    /// Open a new automated session and return its id
    #[inline]
    pub async fn start_session(&self) -> String {
        let session = SessionState::new();
        let id = session.id().to_string();
        self.sessions
            .write()
            .await
            .insert(id.clone(), Arc::new(Mutex::new(session)));
        debug!("Started session {}", id);
        id
    }

    /// Discard a session and its history
    #[inline]
    pub async fn end_session(&self, session_id: &str) -> Result<()> {
        let removed = self.sessions.write().await.remove(session_id);
        if removed.is_none() {
            return Err(SupportError::SessionNotFound(session_id.to_string()));
        }
        debug!("Ended session {}", session_id);
        Ok(())
    }

    #[inline]
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// A copy of the session's current state
    #[inline]
    pub async fn session_snapshot(&self, session_id: &str) -> Result<SessionState> {
        let handle = self.session(session_id).await?;
        let session = handle.lock().await;
        Ok(session.clone())
    }

    /// Run one query turn for `session_id`
    ///
    /// The pipeline makes blocking capability calls, so it runs on the blocking
    /// pool while the session's lock is held for the whole turn.
    #[inline]
    pub async fn query(&self, session_id: &str, query: String) -> Result<SupportResponse> {
        let handle = self.session(session_id).await?;
        let guard = handle.lock_owned().await;
        let index = self.index().await;
        let orchestrator = Arc::clone(&self.orchestrator);

        tokio::task::spawn_blocking(move || {
            let mut session = guard;
            orchestrator.handle_query(&index, &mut session, &query)
        })
        .await
        .map_err(|e| SupportError::Other(anyhow::anyhow!("Query task failed: {}", e)))?
    }

    #[inline]
    pub async fn agent_reply(&self, session_id: &str, text: &str) -> Result<()> {
        let handle = self.session(session_id).await?;
        let mut session = handle.lock().await;
        self.orchestrator.agent_reply(&mut session, text)
    }

    #[inline]
    pub async fn resume(&self, session_id: &str) -> Result<()> {
        let handle = self.session(session_id).await?;
        let mut session = handle.lock().await;
        self.orchestrator.resume(&mut session)
    }

    async fn session(&self, session_id: &str) -> Result<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| SupportError::SessionNotFound(session_id.to_string()))
    }
}
