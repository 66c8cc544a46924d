//! 外部能力供应商的 HTTP 适配层。

pub mod elevenlabs;
mod http;
pub mod openai;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::orchestrator::config::millis;
use crate::orchestrator::{ModelTranslator, ProviderSet, SilentSynthesis, SpeechSynthesis};
use crate::status::ProviderHealth;

pub use elevenlabs::{ElevenLabsClient, ElevenLabsConfig};
pub use openai::{OpenAiClient, OpenAiConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisBackend {
    ElevenLabs,
    OpenAi,
    None,
}

impl SynthesisBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "elevenlabs" => Some(SynthesisBackend::ElevenLabs),
            "openai" => Some(SynthesisBackend::OpenAi),
            "none" | "off" => Some(SynthesisBackend::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub openai: OpenAiConfig,
    pub elevenlabs: ElevenLabsConfig,
    pub synthesis: SynthesisBackend,
    /// Socket-level timeout of each HTTP exchange.
    #[serde(with = "millis")]
    pub request_timeout: Duration,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            openai: OpenAiConfig::default(),
            elevenlabs: ElevenLabsConfig::default(),
            synthesis: SynthesisBackend::ElevenLabs,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Wired providers plus the health probe used by status reporting.
pub struct Providers {
    pub set: ProviderSet,
    pub health: Arc<dyn ProviderHealth>,
}

pub fn build(config: &ProvidersConfig) -> Result<Providers> {
    if config.openai.api_key.trim().is_empty() {
        bail!("OpenAI API key is not configured (set OPENAI_API_KEY)");
    }

    let openai = OpenAiClient::new(config.openai.clone(), config.request_timeout);
    let synthesis: Arc<dyn SpeechSynthesis> = match config.synthesis {
        SynthesisBackend::ElevenLabs if !config.elevenlabs.api_key.trim().is_empty() => Arc::new(
            ElevenLabsClient::new(config.elevenlabs.clone(), config.request_timeout),
        ),
        SynthesisBackend::ElevenLabs => {
            warn!(
                target: "providers",
                "ElevenLabs selected without an API key, replies will carry no audio"
            );
            Arc::new(SilentSynthesis)
        }
        SynthesisBackend::OpenAi => Arc::new(openai.clone()),
        SynthesisBackend::None => Arc::new(SilentSynthesis),
    };
    info!(
        target: "providers",
        text = "openai",
        recognition = "openai",
        synthesis = synthesis.name(),
        "providers assembled"
    );

    let translator = ModelTranslator::new(Arc::new(openai.plain_text()));
    let openai = Arc::new(openai);
    Ok(Providers {
        set: ProviderSet {
            text: openai.clone(),
            recognition: openai.clone(),
            synthesis,
            translator: Some(Arc::new(translator)),
        },
        health: openai,
    })
}

#[cfg(test)]
mod tests;
