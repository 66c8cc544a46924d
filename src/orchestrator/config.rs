use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::orchestrator::constants::{DEFAULT_PROVIDER_TIMEOUT, DEFAULT_SUBTITLE_TIMEOUT};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Upper bound for a single generation, recognition or synthesis call.
    #[serde(with = "millis")]
    pub provider_timeout: Duration,
    /// Upper bound for a subtitle translation; expiry only drops the subtitle.
    #[serde(with = "millis")]
    pub subtitle_timeout: Duration,
    /// Serialize Answer/End submissions per session inside this process.
    pub serialize_session_turns: bool,
    /// Ask the model to echo the user's transcript and its translation.
    pub request_transcript_echo: bool,
    /// Keep the recorded user audio on the stored user turn.
    pub retain_user_audio: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            subtitle_timeout: DEFAULT_SUBTITLE_TIMEOUT,
            serialize_session_turns: true,
            request_transcript_echo: false,
            retain_user_audio: false,
        }
    }
}

pub(crate) mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
