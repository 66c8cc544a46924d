//! Prompt assembly for the text-generation capability.

use crate::orchestrator::constants::PERSONA_TEMPLATE;
use crate::orchestrator::types::{PromptMessage, TurnRole};
use crate::session::history::Turn;

/// Fully assembled prompt: the persona instruction, the visible history and
/// the per-turn instruction suffix, kept apart until `messages` composes them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub history: Vec<PromptMessage>,
    pub instruction_suffix: String,
}

impl Prompt {
    /// Ordered messages as sent to the model, the suffix appended to the system message.
    pub fn messages(&self) -> Vec<PromptMessage> {
        let mut system = self.system.clone();
        if !self.instruction_suffix.is_empty() {
            if !system.is_empty() {
                system.push_str("\n\n");
            }
            system.push_str(&self.instruction_suffix);
        }

        let mut messages = Vec::with_capacity(self.history.len() + 1);
        messages.push(PromptMessage::new(TurnRole::System, system));
        messages.extend(self.history.iter().cloned());
        messages
    }
}

#[derive(Debug, Default)]
pub struct PromptBuilder {
    system: String,
    history: Vec<PromptMessage>,
    instruction_suffix: String,
}

impl PromptBuilder {
    pub fn new<S: Into<String>>(system: S) -> Self {
        Self {
            system: system.into(),
            ..Self::default()
        }
    }

    /// Seeds the builder from stored history: the first system turn becomes the
    /// persona instruction, every other turn is replayed in order.
    pub fn from_history(turns: &[Turn]) -> Self {
        let mut builder = Self::default();
        let mut seen_system = false;
        for turn in turns {
            if turn.role == TurnRole::System && !seen_system {
                builder.system = turn.text.clone();
                seen_system = true;
                continue;
            }
            builder
                .history
                .push(PromptMessage::new(turn.role, turn.text.clone()));
        }
        builder
    }

    pub fn message<S: Into<String>>(mut self, role: TurnRole, content: S) -> Self {
        self.history.push(PromptMessage::new(role, content));
        self
    }

    pub fn instruction<S: Into<String>>(mut self, suffix: S) -> Self {
        self.instruction_suffix = suffix.into();
        self
    }

    pub fn build(self) -> Prompt {
        Prompt {
            system: self.system,
            history: self.history,
            instruction_suffix: self.instruction_suffix,
        }
    }
}

pub fn persona_instruction(role: &str, topic: &str, language_name: &str) -> String {
    PERSONA_TEMPLATE
        .replace("{role}", role.trim())
        .replace("{topic}", topic.trim())
        .replace("{language}", language_name)
}

pub(crate) fn with_subtitle(template: &str, subtitle_language: &str) -> String {
    template.replace("{subtitle}", subtitle_language)
}
