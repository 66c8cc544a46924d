use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Speaker of a single utterance in the conversation history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    System,
    Assistant,
    User,
}

impl TurnRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnRole::System => "system",
            TurnRole::Assistant => "assistant",
            TurnRole::User => "user",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "system" => Some(TurnRole::System),
            "assistant" => Some(TurnRole::Assistant),
            "user" => Some(TurnRole::User),
            _ => None,
        }
    }
}

/// Which protocol step produced a turn batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Start,
    Answer,
    End,
}

impl TurnKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnKind::Start => "start",
            TurnKind::Answer => "answer",
            TurnKind::End => "end",
        }
    }
}

/// Logical conversation phase, derived from the stored history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationPhase {
    Created,
    AwaitingFirstTurn,
    InProgress,
    Ended,
}

/// Structured payload pulled out of one text-generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnExchangeResult {
    pub reply: String,
    pub reply_subtitle: String,
    pub user_transcript_echo: String,
    pub user_transcript_subtitle: String,
    pub is_conversation_ending: bool,
}

/// One message handed to the text-generation capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptMessage {
    pub role: TurnRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new<S: Into<String>>(role: TurnRole, content: S) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub role: String,
    pub topic: String,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub subtitle_language: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub audio: Bytes,
    pub filename: String,
}

impl AnswerRequest {
    pub fn new(audio: impl Into<Bytes>) -> Self {
        Self {
            audio: audio.into(),
            filename: "answer.wav".to_string(),
        }
    }
}

/// Text, audio and subtitle of one utterance as returned to the client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub text: String,
    /// Base64 encoded audio; empty when the client should narrate locally.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub audio: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subtitle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub session_id: String,
    pub secret: String,
    pub language: String,
    pub chat: ChatPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResponse {
    pub language: String,
    pub is_last: bool,
    pub prompt: ChatPayload,
    pub answer: ChatPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndResponse {
    pub language: String,
    pub is_last: bool,
    pub answer: ChatPayload,
}
