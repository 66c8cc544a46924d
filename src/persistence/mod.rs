//! 会话与轮次的本地持久化层。

pub mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

use crate::session::history::{ConversationSession, NewTurn, Turn};

pub use sqlite::{EnvKeyResolver, KeyResolver, SqliteConfig, SqlitePath, SqlitePersistence};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{0}")]
    Backend(String),
    #[error("storage worker failed: {0}")]
    Worker(String),
}

impl From<anyhow::Error> for StoreError {
    fn from(error: anyhow::Error) -> Self {
        StoreError::Backend(format!("{error:#}"))
    }
}

/// Single source of truth for sessions and their turn history.
///
/// Every write is one transaction: either all of it becomes visible or none of it does.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Inserts the session row together with its opening turns.
    async fn create_session(
        &self,
        session: &ConversationSession,
        turns: &[NewTurn],
    ) -> Result<(), StoreError>;

    async fn load_session(&self, session_id: &str)
        -> Result<Option<ConversationSession>, StoreError>;

    async fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>, StoreError>;

    async fn append_turns(&self, session_id: &str, turns: &[NewTurn]) -> Result<(), StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl ConversationStore for SqlitePersistence {
    async fn create_session(
        &self,
        session: &ConversationSession,
        turns: &[NewTurn],
    ) -> Result<(), StoreError> {
        let store = self.clone();
        let session = session.clone();
        let turns = turns.to_vec();
        run_blocking(move || store.create_session_with_turns(&session, &turns)).await
    }

    async fn load_session(
        &self,
        session_id: &str,
    ) -> Result<Option<ConversationSession>, StoreError> {
        let store = self.clone();
        let session_id = session_id.to_string();
        run_blocking(move || store.load_session(&session_id)).await
    }

    async fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>, StoreError> {
        let store = self.clone();
        let session_id = session_id.to_string();
        run_blocking(move || store.load_turns(&session_id)).await
    }

    async fn append_turns(&self, session_id: &str, turns: &[NewTurn]) -> Result<(), StoreError> {
        let store = self.clone();
        let session_id = session_id.to_string();
        let turns = turns.to_vec();
        run_blocking(move || store.append_turns(&session_id, &turns)).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let store = self.clone();
        run_blocking(move || store.ping()).await
    }
}

async fn run_blocking<T, F>(task: F) -> Result<T, StoreError>
where
    T: Send + 'static,
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|err| StoreError::Worker(err.to_string()))?
        .map_err(StoreError::from)
}
