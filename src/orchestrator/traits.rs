use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::orchestrator::prompt::Prompt;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("{provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },
    #[error("{provider} rejected the request (status {status}): {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("{provider} returned an empty transcript")]
    EmptyTranscript { provider: String },
}

impl ProviderError {
    pub fn unavailable<P: Into<String>, M: Into<String>>(provider: P, message: M) -> Self {
        Self::Unavailable {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn rejected<P: Into<String>, M: Into<String>>(provider: P, status: u16, message: M) -> Self {
        Self::Rejected {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    pub fn empty_transcript<P: Into<String>>(provider: P) -> Self {
        Self::EmptyTranscript {
            provider: provider.into(),
        }
    }
}

/// Produces raw, unparsed model output for a prepared prompt.
#[async_trait]
pub trait TextGeneration: Send + Sync {
    fn name(&self) -> &str;

    fn supports_language(&self, _language: &str) -> bool {
        true
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError>;
}

#[async_trait]
pub trait SpeechRecognition: Send + Sync {
    fn name(&self) -> &str;

    fn supports_language(&self, _language: &str) -> bool {
        true
    }

    /// `hint_language` is an ISO 639-1 code, or empty to let the provider detect it.
    async fn transcribe(
        &self,
        audio: Bytes,
        filename: &str,
        hint_language: &str,
    ) -> Result<String, ProviderError>;
}

/// Text-to-speech. An empty result means "no audio, narrate locally".
#[async_trait]
pub trait SpeechSynthesis: Send + Sync {
    fn name(&self) -> &str;

    fn supports_language(&self, _language: &str) -> bool {
        true
    }

    /// False for a placeholder that never yields audio.
    fn produces_audio(&self) -> bool {
        true
    }

    /// Picks the voice a new session keeps for its whole lifetime.
    fn pick_voice(&self) -> String {
        String::new()
    }

    async fn synthesize(&self, text: &str, voice_profile: &str) -> Result<Bytes, ProviderError>;
}

#[async_trait]
pub trait SubtitleTranslator: Send + Sync {
    fn name(&self) -> &str;

    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError>;
}

/// Synthesis capability used when no backend is configured.
#[derive(Debug, Default)]
pub struct SilentSynthesis;

#[async_trait]
impl SpeechSynthesis for SilentSynthesis {
    fn name(&self) -> &str {
        "silent"
    }

    fn produces_audio(&self) -> bool {
        false
    }

    async fn synthesize(&self, _text: &str, _voice_profile: &str) -> Result<Bytes, ProviderError> {
        Ok(Bytes::new())
    }
}
