//! Practice session history.
//!
//! Sessions are stored per user, oldest first. The store is a
//! collaborator of the evaluation pipeline, not part of it: evaluations
//! never read or write history.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use thiserror::Error;

use coach_core::SessionSummary;

/// Errors from a history store.
#[derive(Error, Debug)]
pub enum HistoryError {
    #[error("Invalid user id: {0:?}")]
    InvalidUser(String),
}

/// Storage for finished practice sessions.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a session and return the user's full history.
    async fn append(
        &self,
        user: &str,
        session: SessionSummary,
    ) -> Result<Vec<SessionSummary>, HistoryError>;

    /// The user's sessions, oldest first. Unknown users have none.
    async fn list(&self, user: &str) -> Result<Vec<SessionSummary>, HistoryError>;
}

/// Process-local history store.
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    sessions: RwLock<BTreeMap<String, Vec<SessionSummary>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }
}

fn check_user(user: &str) -> Result<&str, HistoryError> {
    let trimmed = user.trim();
    if trimmed.is_empty() {
        return Err(HistoryError::InvalidUser(user.to_string()));
    }
    Ok(trimmed)
}

#[async_trait]
impl HistoryStore for InMemoryHistory {
    async fn append(
        &self,
        user: &str,
        session: SessionSummary,
    ) -> Result<Vec<SessionSummary>, HistoryError> {
        let user = check_user(user)?;
        let mut sessions = self.sessions.write();
        let history = sessions.entry(user.to_string()).or_default();
        history.push(session);
        tracing::debug!(user, sessions = history.len(), "Session recorded");
        Ok(history.clone())
    }

    async fn list(&self, user: &str) -> Result<Vec<SessionSummary>, HistoryError> {
        let user = check_user(user)?;
        Ok(self.sessions.read().get(user).cloned().unwrap_or_default())
    }
}
