use thiserror::Error;

use crate::orchestrator::extract::ExtractError;
use crate::orchestrator::traits::ProviderError;
use crate::persistence::StoreError;
use crate::session::CredentialError;

/// Failure of a whole turn. Nothing is persisted when one is returned.
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("invalid session credentials")]
    InvalidCredentials,
    #[error("conversation has already ended")]
    ConversationEnded,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("malformed model response: {0}")]
    MalformedResponse(String),
    #[error("speech recognition returned no text")]
    EmptyTranscript,
    #[error("model returned an empty reply")]
    EmptyReply,
    #[error("{provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },
    #[error("{provider} rejected the request (status {status})")]
    ProviderRejected { provider: String, status: u16 },
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),
    #[error("internal failure: {0}")]
    Internal(String),
}

impl TurnError {
    /// Stable identifier used in telemetry.
    pub fn code(&self) -> &'static str {
        match self {
            TurnError::InvalidCredentials => "invalid_credentials",
            TurnError::ConversationEnded => "conversation_ended",
            TurnError::InvalidRequest(_) => "invalid_request",
            TurnError::MalformedResponse(_) => "malformed_response",
            TurnError::EmptyTranscript => "empty_transcript",
            TurnError::EmptyReply => "empty_reply",
            TurnError::ProviderUnavailable { .. } => "provider_unavailable",
            TurnError::ProviderRejected { .. } => "provider_rejected",
            TurnError::Storage(_) => "storage_error",
            TurnError::Internal(_) => "internal_error",
        }
    }

    /// HTTP-equivalent status for the routing layer.
    pub fn status_code(&self) -> u16 {
        match self {
            TurnError::InvalidCredentials => 401,
            TurnError::ConversationEnded => 409,
            TurnError::InvalidRequest(_) => 400,
            TurnError::ProviderUnavailable { .. } | TurnError::ProviderRejected { .. } => 502,
            TurnError::MalformedResponse(_)
            | TurnError::EmptyTranscript
            | TurnError::EmptyReply
            | TurnError::Storage(_)
            | TurnError::Internal(_) => 500,
        }
    }

    /// Message safe to hand to the client. Provider detail and raw model text stay in the logs.
    pub fn public_message(&self) -> &'static str {
        match self {
            TurnError::InvalidCredentials => "invalid session credentials",
            TurnError::ConversationEnded => "conversation has already ended",
            TurnError::InvalidRequest(_) => "invalid request",
            TurnError::MalformedResponse(_) | TurnError::EmptyReply => {
                "failed to process the conversation reply"
            }
            TurnError::EmptyTranscript => "failed to understand the recorded audio",
            TurnError::ProviderUnavailable { .. } | TurnError::ProviderRejected { .. } => {
                "conversation service is temporarily unavailable, please try again"
            }
            TurnError::Storage(_) => "failed to save the conversation",
            TurnError::Internal(_) => "failed to prepare the conversation",
        }
    }
}

impl From<ProviderError> for TurnError {
    fn from(error: ProviderError) -> Self {
        match error {
            ProviderError::Unavailable { provider, message } => {
                TurnError::ProviderUnavailable { provider, message }
            }
            ProviderError::Rejected {
                provider, status, ..
            } => TurnError::ProviderRejected { provider, status },
            ProviderError::EmptyTranscript { .. } => TurnError::EmptyTranscript,
        }
    }
}

impl From<ExtractError> for TurnError {
    fn from(error: ExtractError) -> Self {
        match error {
            ExtractError::Malformed { reason } => TurnError::MalformedResponse(reason),
            ExtractError::EmptyReply => TurnError::EmptyReply,
        }
    }
}

impl From<CredentialError> for TurnError {
    fn from(error: CredentialError) -> Self {
        match error {
            CredentialError::Invalid => TurnError::InvalidCredentials,
            CredentialError::Store(err) => TurnError::Storage(err),
            CredentialError::Entropy(reason) => TurnError::Internal(reason),
        }
    }
}
