use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use rand::seq::SliceRandom;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use crate::language;
use crate::orchestrator::{
    Prompt, ProviderError, SpeechRecognition, SpeechSynthesis, TextGeneration,
};
use crate::providers::http;
use crate::status::{ProviderHealth, UpstreamStatus};

const PROVIDER: &str = "openai";
const STATUS_COMPONENTS: [&str; 2] = ["Chat Completions", "Audio"];

pub const VOICES: [&str; 12] = [
    "alloy", "ash", "ballad", "coral", "echo", "fable", "marin", "nova", "onyx", "sage", "shimmer",
    "verse",
];

#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub status_url: String,
    pub chat_model: String,
    pub transcription_model: String,
    pub speech_model: String,
    pub speech_speed: f32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.openai.com/v1".to_string(),
            status_url: "https://status.openai.com/api/v2".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            transcription_model: "whisper-1".to_string(),
            speech_model: "gpt-4o-mini-tts".to_string(),
            speech_speed: 1.0,
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &if self.api_key.is_empty() { "" } else { "***" })
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("transcription_model", &self.transcription_model)
            .field("speech_model", &self.speech_model)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct ComponentsResponse {
    #[serde(default)]
    components: Vec<Component>,
}

#[derive(Debug, Deserialize)]
struct Component {
    name: String,
    status: String,
}

/// Chat, transcription, speech and health probes against the OpenAI HTTP API.
#[derive(Clone)]
pub struct OpenAiClient {
    agent: ureq::Agent,
    uploads: reqwest::Client,
    config: Arc<OpenAiConfig>,
    json_mode: bool,
}

impl OpenAiClient {
    pub fn new(config: OpenAiConfig, timeout: Duration) -> Self {
        let uploads = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("mockchat-core/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|err| {
                warn!(target: "providers", %err, "upload client fell back to defaults");
                reqwest::Client::new()
            });
        Self {
            agent: http::agent(timeout),
            uploads,
            config: Arc::new(config),
            json_mode: true,
        }
    }

    /// Same client without the JSON response format, for free-text tasks such as translation.
    pub fn plain_text(&self) -> Self {
        Self {
            json_mode: false,
            ..self.clone()
        }
    }

    fn authorization(&self) -> String {
        format!("Bearer {}", self.config.api_key)
    }

    fn url(&self, path: &str) -> String {
        http::join_url(&self.config.base_url, path)
    }
}

#[async_trait]
impl TextGeneration for OpenAiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let mut body = json!({
            "model": self.config.chat_model,
            "messages": prompt.messages(),
        });
        if self.json_mode {
            body["response_format"] = json!({ "type": "json_object" });
        }

        let request = self
            .agent
            .post(&self.url("chat/completions"))
            .set("Authorization", &self.authorization());
        let reply = http::blocking(PROVIDER, move || {
            let response: ChatResponse = request
                .send_json(body)
                .map_err(|err| http::map_error(PROVIDER, err))?
                .into_json()
                .map_err(|err| ProviderError::unavailable(PROVIDER, format!("invalid chat body: {err}")))?;
            response
                .choices
                .into_iter()
                .next()
                .and_then(|choice| choice.message.content)
                .ok_or_else(|| ProviderError::unavailable(PROVIDER, "no choices returned"))
        })
        .await?;

        debug!(target: "providers", provider = PROVIDER, reply_chars = reply.chars().count(), "chat completion received");
        Ok(reply)
    }
}

#[async_trait]
impl SpeechRecognition for OpenAiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn transcribe(
        &self,
        audio: Bytes,
        filename: &str,
        hint_language: &str,
    ) -> Result<String, ProviderError> {
        let mime = mime_guess::from_path(filename).first_or_octet_stream();
        let file = Part::bytes(audio.to_vec())
            .file_name(filename.to_string())
            .mime_str(mime.essence_str())
            .map_err(|err| ProviderError::unavailable(PROVIDER, format!("invalid upload part: {err}")))?;
        let mut form = Form::new()
            .part("file", file)
            .text("model", self.config.transcription_model.clone());
        if !hint_language.is_empty() {
            form = form.text("language", hint_language.to_string());
        }

        let response = self
            .uploads
            .post(self.url("audio/transcriptions"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|err| http::transport_error(PROVIDER, err))?;
        let response: TranscriptionResponse = http::check_status(PROVIDER, response)
            .await?
            .json()
            .await
            .map_err(|err| {
                ProviderError::unavailable(PROVIDER, format!("invalid transcription body: {err}"))
            })?;

        if response.text.trim().is_empty() {
            return Err(ProviderError::empty_transcript(PROVIDER));
        }
        Ok(response.text)
    }
}

#[async_trait]
impl SpeechSynthesis for OpenAiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    fn supports_language(&self, language: &str) -> bool {
        language::is_supported(language)
    }

    fn pick_voice(&self) -> String {
        VOICES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(VOICES[0])
            .to_string()
    }

    async fn synthesize(&self, text: &str, voice_profile: &str) -> Result<Bytes, ProviderError> {
        let voice = if voice_profile.is_empty() {
            VOICES[0]
        } else {
            voice_profile
        };
        let body = json!({
            "model": self.config.speech_model,
            "voice": voice,
            "input": text,
            "speed": self.config.speech_speed,
        });

        let request = self
            .agent
            .post(&self.url("audio/speech"))
            .set("Authorization", &self.authorization());
        http::blocking(PROVIDER, move || {
            let response = request
                .send_json(body)
                .map_err(|err| http::map_error(PROVIDER, err))?;
            http::read_bytes(PROVIDER, response)
        })
        .await
    }
}

#[async_trait]
impl ProviderHealth for OpenAiClient {
    fn name(&self) -> &str {
        PROVIDER
    }

    async fn key_valid(&self) -> Result<bool, ProviderError> {
        if self.config.api_key.is_empty() {
            return Ok(false);
        }

        let request = self
            .agent
            .get(&self.url("models"))
            .set("Authorization", &self.authorization());
        http::blocking(PROVIDER, move || match request.call() {
            Ok(response) => Ok(response.status() == 200),
            Err(ureq::Error::Status(401 | 403, _)) => Ok(false),
            Err(err) => Err(http::map_error(PROVIDER, err)),
        })
        .await
    }

    async fn upstream_status(&self) -> Result<UpstreamStatus, ProviderError> {
        let request = self
            .agent
            .get(&http::join_url(&self.config.status_url, "components.json"));
        http::blocking(PROVIDER, move || {
            let response: ComponentsResponse = request
                .call()
                .map_err(|err| http::map_error(PROVIDER, err))?
                .into_json()
                .map_err(|err| ProviderError::unavailable(PROVIDER, format!("invalid status body: {err}")))?;
            Ok(UpstreamStatus::worst(
                response
                    .components
                    .iter()
                    .filter(|component| STATUS_COMPONENTS.contains(&component.name.as_str()))
                    .map(|component| UpstreamStatus::from_component(&component.status)),
            ))
        })
        .await
    }
}
