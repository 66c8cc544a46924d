//! Locates and decodes the JSON payload embedded in free-form model output.

use serde_json::{Map, Value};
use thiserror::Error;

use crate::orchestrator::types::TurnExchangeResult;

const FENCE: &str = "```";

const REPLY_KEYS: &[&str] = &["reply", "response"];
const REPLY_SUBTITLE_KEYS: &[&str] = &["replySubtitle", "responseSubtitle"];
const TRANSCRIPT_KEYS: &[&str] = &["userTranscriptEcho", "transcript"];
const TRANSCRIPT_SUBTITLE_KEYS: &[&str] = &["userTranscriptSubtitle", "transcriptSubtitle"];
const ENDING_KEYS: &[&str] = &["isConversationEnding", "isLast"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExtractError {
    #[error("model output is not a JSON object: {reason}")]
    Malformed { reason: String },
    #[error("model output has an empty reply")]
    EmptyReply,
}

impl ExtractError {
    fn malformed<S: Into<String>>(reason: S) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }
}

/// Narrows raw model output down to the span that should hold the JSON object.
pub fn locate_payload(raw: &str) -> &str {
    let trimmed = raw.trim();

    if trimmed.starts_with(FENCE) {
        let mut body = match trimmed.find('\n') {
            Some(idx) => &trimmed[idx + 1..],
            None => trimmed,
        };
        if let Some(idx) = body.rfind(FENCE) {
            body = &body[..idx];
        }
        return body.trim();
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => &trimmed[start..=end],
        _ => trimmed,
    }
}

pub fn extract(raw: &str) -> Result<TurnExchangeResult, ExtractError> {
    let payload = locate_payload(raw);
    if payload.is_empty() {
        return Err(ExtractError::malformed("no payload found"));
    }

    let value: Value = serde_json::from_str(payload)
        .map_err(|err| ExtractError::malformed(format!("invalid JSON: {err}")))?;
    let object = match value {
        Value::Object(object) => object,
        other => {
            return Err(ExtractError::malformed(format!(
                "expected an object, found {}",
                kind_of(&other)
            )))
        }
    };

    let reply = text_field(&object, REPLY_KEYS);
    if reply.is_empty() {
        return Err(ExtractError::EmptyReply);
    }

    Ok(TurnExchangeResult {
        reply,
        reply_subtitle: text_field(&object, REPLY_SUBTITLE_KEYS),
        user_transcript_echo: text_field(&object, TRANSCRIPT_KEYS),
        user_transcript_subtitle: text_field(&object, TRANSCRIPT_SUBTITLE_KEYS),
        is_conversation_ending: flag_field(&object, ENDING_KEYS),
    })
}

fn text_field(object: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| value.as_str())
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

fn flag_field(object: &Map<String, Value>, keys: &[&str]) -> bool {
    keys.iter()
        .filter_map(|key| object.get(*key))
        .find_map(|value| match value {
            Value::Bool(flag) => Some(*flag),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        })
        .unwrap_or(false)
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
