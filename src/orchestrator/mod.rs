//! 对话轮次编排：Start / Answer / End 协议与结构化响应提取。

mod constants;
mod engine;
mod locks;

pub mod config;
pub mod error;
pub mod extract;
pub mod prompt;
pub mod subtitle;
pub mod traits;
pub mod types;

pub use config::OrchestratorConfig;
pub use engine::{ConversationOrchestrator, ProviderSet};
pub use error::TurnError;
pub use extract::{extract, locate_payload, ExtractError};
pub use prompt::{Prompt, PromptBuilder};
pub use subtitle::ModelTranslator;
pub use traits::{
    ProviderError, SilentSynthesis, SpeechRecognition, SpeechSynthesis, SubtitleTranslator,
    TextGeneration,
};
pub use types::{
    AnswerRequest, AnswerResponse, ChatPayload, ConversationPhase, EndResponse, StartRequest,
    StartResponse, TurnExchangeResult, TurnKind, TurnRole,
};

#[cfg(test)]
mod tests;
