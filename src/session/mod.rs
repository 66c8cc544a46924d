//! 会话身份与凭证管理。

pub mod credential;
pub mod history;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::persistence::{ConversationStore, StoreError};
use crate::persistence::sqlite::now_ms;

pub use credential::{SecretHasher, SessionCredential};
pub use history::{phase_of, ConversationSession, NewTurn, Turn};

const DECOY_SECRET: &str = "mockchat-decoy-secret";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Unknown session or wrong secret; the two are deliberately indistinguishable.
    #[error("invalid session credentials")]
    Invalid,
    #[error("credential lookup failed: {0}")]
    Store(StoreError),
    #[error("{0}")]
    Entropy(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub hash_iterations: u32,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            hash_iterations: 100_000,
        }
    }
}

/// Mints session identities and authenticates the bearer secret on later turns.
pub struct CredentialManager {
    store: Arc<dyn ConversationStore>,
    hasher: SecretHasher,
    decoy_hash: String,
}

impl CredentialManager {
    pub fn new(
        config: &CredentialConfig,
        store: Arc<dyn ConversationStore>,
    ) -> Result<Self, CredentialError> {
        let hasher = SecretHasher::new(config.hash_iterations);
        let decoy_hash = hasher.hash(DECOY_SECRET)?;
        Ok(Self {
            store,
            hasher,
            decoy_hash,
        })
    }

    /// Creates a session identity and its one-time plaintext secret.
    ///
    /// Only the hash is kept on the returned session; the caller persists it
    /// together with the opening turns.
    pub fn create_session(
        &self,
        conversation_language: &str,
        subtitle_language: &str,
        voice_profile: &str,
    ) -> Result<(ConversationSession, String), CredentialError> {
        let secret = self.hasher.generate_secret()?;
        let secret_hash = self.hasher.hash(&secret)?;
        let session = ConversationSession {
            id: Uuid::new_v4().to_string(),
            secret_hash,
            conversation_language: conversation_language.to_string(),
            subtitle_language: subtitle_language.to_string(),
            voice_profile: voice_profile.to_string(),
            created_at_ms: now_ms(),
        };
        debug!(target: "credentials", session_id = %session.id, "session identity minted");
        Ok((session, secret))
    }

    /// Verifies `presented_secret` for `session_id` without mutating anything.
    pub async fn authenticate(
        &self,
        session_id: &str,
        presented_secret: &str,
    ) -> Result<ConversationSession, CredentialError> {
        if session_id.is_empty() || presented_secret.is_empty() {
            return Err(CredentialError::Invalid);
        }

        let session = self
            .store
            .load_session(session_id)
            .await
            .map_err(CredentialError::Store)?;

        // Unknown sessions are checked against a decoy so both failures cost the same.
        let stored_hash = session
            .as_ref()
            .map(|session| session.secret_hash.clone())
            .unwrap_or_else(|| self.decoy_hash.clone());
        let hasher = self.hasher.clone();
        let secret = presented_secret.to_string();
        let verified = tokio::task::spawn_blocking(move || hasher.verify(&secret, &stored_hash))
            .await
            .map_err(|err| CredentialError::Store(StoreError::Worker(err.to_string())))?;

        match session {
            Some(session) if verified => Ok(session),
            _ => {
                warn!(target: "credentials", session_id, "session authentication failed");
                Err(CredentialError::Invalid)
            }
        }
    }

    pub async fn authenticate_credential(
        &self,
        credential: &SessionCredential,
    ) -> Result<ConversationSession, CredentialError> {
        self.authenticate(&credential.session_id, &credential.secret)
            .await
    }
}
