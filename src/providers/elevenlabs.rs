use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::language;
use crate::orchestrator::{ProviderError, SpeechSynthesis};
use crate::providers::http;

const PROVIDER: &str = "elevenlabs";

/// Premade voices offered to new conversations.
pub const VOICES: [&str; 21] = [
    "hpp4J3VqNfWAUOO0d1Us",
    "CwhRBWXzGAHq8TQ4Fs17",
    "EXAVITQu4vr4xnSDxMaL",
    "FGY2WhTYpPnrIDTdsKH5",
    "IKne3meq5aSn9XLyUdCD",
    "JBFqnCBsd6RMkjVDRZzb",
    "N2lVS1w4EtoT3dr4eOWO",
    "SAz9YHcvj6GT2YYXdXww",
    "SOYHLrjzK2X1ezoPC6cr",
    "TX3LPaxmHKxFdv7VOQHJ",
    "Xb7hH8MSUJpSbSDYk0k2",
    "XrExE9yKIg1WjnnlVkGX",
    "bIHbv24MWmeRgasZH58o",
    "cgSgspJ2msm6clMCkdW9",
    "cjVigY5qzO86Huf0OWal",
    "iP95p4xoKVk53GoZ742B",
    "nPczCjzI2devNBz1zQrb",
    "onwK4e9ZLuTAKqWW03F9",
    "pFZP5JQG7iQjIQuC4Bku",
    "pNInz6obpgDQGcFmaJgB",
    "pqHfZKP75CvOlQylNhV4",
];

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ElevenLabsConfig {
    pub api_key: String,
    pub base_url: String,
    pub model_id: String,
    pub default_voice: String,
    pub stability: f32,
    pub similarity_boost: f32,
}

impl Default for ElevenLabsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.elevenlabs.io/v1".to_string(),
            model_id: "eleven_multilingual_v2".to_string(),
            default_voice: "cgSgspJ2msm6clMCkdW9".to_string(),
            stability: 0.5,
            similarity_boost: 0.75,
        }
    }
}

impl std::fmt::Debug for ElevenLabsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElevenLabsConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("model_id", &self.model_id)
            .field("default_voice", &self.default_voice)
            .finish_non_exhaustive()
    }
}

pub struct ElevenLabsClient {
    agent: ureq::Agent,
    config: Arc<ElevenLabsConfig>,
}

impl ElevenLabsClient {
    pub fn new(config: ElevenLabsConfig, timeout: Duration) -> Self {
        Self {
            agent: http::agent(timeout),
            config: Arc::new(config),
        }
    }
}

#[async_trait]
impl SpeechSynthesis for ElevenLabsClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supports_language(&self, language: &str) -> bool {
        language::is_supported(language)
    }

    fn pick_voice(&self) -> String {
        VOICES
            .choose(&mut rand::thread_rng())
            .map(|voice| voice.to_string())
            .unwrap_or_else(|| self.config.default_voice.clone())
    }

    async fn synthesize(&self, text: &str, voice_profile: &str) -> Result<Bytes, ProviderError> {
        let voice = if voice_profile.is_empty() {
            self.config.default_voice.as_str()
        } else {
            voice_profile
        };
        let body = json!({
            "text": text,
            "model_id": self.config.model_id,
            "voice_settings": {
                "stability": self.config.stability,
                "similarity_boost": self.config.similarity_boost,
            },
        });

        let request = self
            .agent
            .post(&http::join_url(
                &self.config.base_url,
                &format!("text-to-speech/{voice}"),
            ))
            .set("xi-api-key", &self.config.api_key)
            .set("Accept", "audio/mpeg");
        http::blocking(PROVIDER, move || {
            let response = request
                .send_json(body)
                .map_err(|err| http::map_error(PROVIDER, err))?;
            http::read_bytes(PROVIDER, response)
        })
        .await
    }
}
