//! Conversation session and turn history records shared by persistence and the orchestrator.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::orchestrator::types::{ConversationPhase, TurnRole};

/// One mock conversation. Hash and voice are fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSession {
    pub id: String,
    pub secret_hash: String,
    pub conversation_language: String,
    #[serde(default)]
    pub subtitle_language: String,
    #[serde(default)]
    pub voice_profile: String,
    #[serde(default)]
    pub created_at_ms: i64,
}

impl ConversationSession {
    pub fn subtitles_enabled(&self) -> bool {
        !self.subtitle_language.trim().is_empty()
    }
}

/// A turn waiting to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTurn {
    pub role: TurnRole,
    pub text: String,
    pub audio: Option<Bytes>,
    pub concludes: bool,
}

impl NewTurn {
    pub fn system<S: Into<String>>(text: S) -> Self {
        Self {
            role: TurnRole::System,
            text: text.into(),
            audio: None,
            concludes: false,
        }
    }

    pub fn user<S: Into<String>>(text: S, audio: Option<Bytes>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
            audio,
            concludes: false,
        }
    }

    pub fn assistant<S: Into<String>>(text: S, audio: Bytes) -> Self {
        Self {
            role: TurnRole::Assistant,
            text: text.into(),
            audio: if audio.is_empty() { None } else { Some(audio) },
            concludes: false,
        }
    }

    /// Marks the assistant turn that closes the conversation.
    pub fn concluding(mut self) -> Self {
        self.concludes = true;
        self
    }
}

/// A persisted turn, ordered by `seq`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub seq: i64,
    pub session_id: String,
    pub role: TurnRole,
    pub text: String,
    pub audio: Option<Vec<u8>>,
    pub concludes: bool,
    pub created_at_ms: i64,
}

pub fn phase_of(turns: &[Turn]) -> ConversationPhase {
    let Some(last) = turns.last() else {
        return ConversationPhase::Created;
    };

    if last.concludes {
        return ConversationPhase::Ended;
    }

    if turns.iter().all(|turn| turn.role == TurnRole::System) {
        ConversationPhase::AwaitingFirstTurn
    } else {
        ConversationPhase::InProgress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(seq: i64, role: TurnRole, concludes: bool) -> Turn {
        Turn {
            seq,
            session_id: "s".into(),
            role,
            text: format!("turn {seq}"),
            audio: None,
            concludes,
            created_at_ms: 0,
        }
    }

    #[test]
    fn phase_follows_history() {
        assert_eq!(phase_of(&[]), ConversationPhase::Created);
        assert_eq!(
            phase_of(&[turn(1, TurnRole::System, false)]),
            ConversationPhase::AwaitingFirstTurn
        );
        let mut turns = vec![
            turn(1, TurnRole::System, false),
            turn(2, TurnRole::Assistant, false),
        ];
        assert_eq!(phase_of(&turns), ConversationPhase::InProgress);
        turns.push(turn(3, TurnRole::User, false));
        turns.push(turn(4, TurnRole::Assistant, true));
        assert_eq!(phase_of(&turns), ConversationPhase::Ended);
    }

    #[test]
    fn empty_assistant_audio_is_not_stored() {
        assert_eq!(NewTurn::assistant("hi", Bytes::new()).audio, None);
        assert!(NewTurn::assistant("hi", Bytes::from_static(b"mp3"))
            .audio
            .is_some());
    }
}
