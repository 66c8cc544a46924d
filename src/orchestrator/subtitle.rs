use std::sync::Arc;

use async_trait::async_trait;

use crate::orchestrator::constants::TRANSLATE_INSTRUCTION;
use crate::orchestrator::prompt::{with_subtitle, PromptBuilder};
use crate::orchestrator::traits::{ProviderError, SubtitleTranslator, TextGeneration};
use crate::orchestrator::types::TurnRole;

/// Translates subtitles with the configured text-generation capability.
pub struct ModelTranslator {
    model: Arc<dyn TextGeneration>,
}

impl ModelTranslator {
    pub fn new(model: Arc<dyn TextGeneration>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl SubtitleTranslator for ModelTranslator {
    fn name(&self) -> &str {
        self.model.name()
    }

    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        let prompt = PromptBuilder::new(with_subtitle(TRANSLATE_INSTRUCTION, target_language))
            .message(TurnRole::User, text)
            .build();
        let raw = self.model.generate(&prompt).await?;
        Ok(strip_quotes(raw.trim()).to_string())
    }
}

fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .map(str::trim)
        .unwrap_or(text)
}
