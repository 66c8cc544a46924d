use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::language::{language_name, normalize_code, normalize_optional_code, recognition_hint};
use crate::orchestrator::config::OrchestratorConfig;
use crate::orchestrator::constants::{
    ANSWER_INSTRUCTION, ANSWER_INSTRUCTION_ECHO, ANSWER_INSTRUCTION_SUBTITLED, END_INSTRUCTION,
    END_INSTRUCTION_SUBTITLED, START_INSTRUCTION, START_INSTRUCTION_SUBTITLED, START_KICKOFF,
};
use crate::orchestrator::error::TurnError;
use crate::orchestrator::extract::extract;
use crate::orchestrator::locks::SessionLocks;
use crate::orchestrator::prompt::{persona_instruction, with_subtitle, Prompt, PromptBuilder};
use crate::orchestrator::traits::{
    ProviderError, SpeechRecognition, SpeechSynthesis, SubtitleTranslator, TextGeneration,
};
use crate::orchestrator::types::{
    AnswerRequest, AnswerResponse, ChatPayload, ConversationPhase, EndResponse, StartRequest,
    StartResponse, TurnExchangeResult, TurnKind, TurnRole,
};
use crate::persistence::ConversationStore;
use crate::session::{phase_of, ConversationSession, CredentialManager, NewTurn, SessionCredential, Turn};
use crate::telemetry::events::{
    record_turn_completed, record_turn_degraded, record_turn_failed, STAGE_SUBTITLE,
    STAGE_SYNTHESIS,
};

/// The capabilities one orchestrator talks to.
#[derive(Clone)]
pub struct ProviderSet {
    pub text: Arc<dyn TextGeneration>,
    pub recognition: Arc<dyn SpeechRecognition>,
    pub synthesis: Arc<dyn SpeechSynthesis>,
    /// Fallback for subtitles the model did not provide inline.
    pub translator: Option<Arc<dyn SubtitleTranslator>>,
}

/// Runs the Start / Answer / End turn protocol.
///
/// Every turn either persists its whole batch of turns and returns a complete
/// envelope, or persists nothing and returns a [`TurnError`].
pub struct ConversationOrchestrator {
    config: OrchestratorConfig,
    store: Arc<dyn ConversationStore>,
    credentials: Arc<CredentialManager>,
    providers: ProviderSet,
    locks: SessionLocks,
}

impl ConversationOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        store: Arc<dyn ConversationStore>,
        credentials: Arc<CredentialManager>,
        providers: ProviderSet,
    ) -> Self {
        Self {
            config,
            store,
            credentials,
            providers,
            locks: SessionLocks::default(),
        }
    }

    pub fn with_components(
        config: OrchestratorConfig,
        store: Arc<dyn ConversationStore>,
        credentials: Arc<CredentialManager>,
        text: Arc<dyn TextGeneration>,
        recognition: Arc<dyn SpeechRecognition>,
        synthesis: Arc<dyn SpeechSynthesis>,
        translator: Option<Arc<dyn SubtitleTranslator>>,
    ) -> Self {
        Self::new(
            config,
            store,
            credentials,
            ProviderSet {
                text,
                recognition,
                synthesis,
                translator,
            },
        )
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Opens a conversation: persona, greeting, fresh credentials.
    pub async fn start(&self, request: StartRequest) -> Result<StartResponse, TurnError> {
        let started = Instant::now();
        let result = self.run_start(request).await;
        match &result {
            Ok(response) => record_turn_completed(
                TurnKind::Start.as_str(),
                &response.session_id,
                started.elapsed(),
                false,
                response.chat.audio.len(),
                !response.chat.subtitle.is_empty(),
            ),
            Err(err) => self.record_failure(TurnKind::Start, "", err, started),
        }
        result
    }

    /// Processes one recorded user answer and produces the persona's reply.
    pub async fn answer(
        &self,
        credential: &SessionCredential,
        request: AnswerRequest,
    ) -> Result<AnswerResponse, TurnError> {
        let started = Instant::now();
        let result = self.run_answer(credential, request).await;
        match &result {
            Ok(response) => record_turn_completed(
                TurnKind::Answer.as_str(),
                &credential.session_id,
                started.elapsed(),
                response.is_last,
                response.answer.audio.len(),
                !response.answer.subtitle.is_empty(),
            ),
            Err(err) => self.record_failure(TurnKind::Answer, &credential.session_id, err, started),
        }
        result
    }

    /// Closes the conversation at the user's request with a farewell.
    pub async fn end(&self, credential: &SessionCredential) -> Result<EndResponse, TurnError> {
        let started = Instant::now();
        let result = self.run_end(credential).await;
        match &result {
            Ok(response) => record_turn_completed(
                TurnKind::End.as_str(),
                &credential.session_id,
                started.elapsed(),
                true,
                response.answer.audio.len(),
                !response.answer.subtitle.is_empty(),
            ),
            Err(err) => self.record_failure(TurnKind::End, &credential.session_id, err, started),
        }
        result
    }

    async fn run_start(&self, request: StartRequest) -> Result<StartResponse, TurnError> {
        let role = request.role.trim();
        let topic = request.topic.trim();
        if role.is_empty() || topic.is_empty() {
            return Err(TurnError::InvalidRequest(
                "role and topic are required".to_string(),
            ));
        }

        let language = normalize_code(&request.language);
        if !self.providers.text.supports_language(language) {
            warn!(
                target: "conversation",
                provider = self.providers.text.name(),
                language,
                "text model cannot hold a conversation in this language"
            );
            return Err(TurnError::InvalidRequest(format!(
                "language {language} is not available"
            )));
        }
        let subtitle_language =
            normalize_optional_code(request.subtitle_language.as_deref().unwrap_or_default());
        let persona = persona_instruction(role, topic, language_name(language));
        let voice = self.providers.synthesis.pick_voice();

        let (session, secret) = self
            .mint_session(language, subtitle_language, &voice)
            .await?;
        info!(
            target: "conversation",
            session_id = %session.id,
            language,
            subtitle_language,
            voice = %voice,
            "starting conversation"
        );

        let instruction = if session.subtitles_enabled() {
            with_subtitle(START_INSTRUCTION_SUBTITLED, language_name(subtitle_language))
        } else {
            START_INSTRUCTION.to_string()
        };
        let prompt = PromptBuilder::new(persona.clone())
            .message(TurnRole::User, START_KICKOFF)
            .instruction(instruction)
            .build();

        let exchange = self.exchange(&session.id, &prompt).await?;
        let audio = self
            .synthesize(TurnKind::Start, &session, &exchange.reply)
            .await?;
        let subtitle = self
            .subtitle(
                TurnKind::Start,
                &session,
                &exchange.reply,
                &exchange.reply_subtitle,
            )
            .await;

        self.store
            .create_session(
                &session,
                &[
                    NewTurn::system(persona),
                    NewTurn::assistant(exchange.reply.clone(), audio.clone()),
                ],
            )
            .await?;

        Ok(StartResponse {
            session_id: session.id,
            secret,
            language: language.to_string(),
            chat: ChatPayload {
                text: exchange.reply,
                audio: encode_audio(&audio),
                subtitle,
            },
        })
    }

    async fn run_answer(
        &self,
        credential: &SessionCredential,
        request: AnswerRequest,
    ) -> Result<AnswerResponse, TurnError> {
        let session = self.credentials.authenticate_credential(credential).await?;
        if request.audio.is_empty() {
            return Err(TurnError::InvalidRequest("recorded audio is empty".to_string()));
        }

        let _guard = self.serialize(&session.id).await;
        let turns = self.open_history(&session).await?;
        let language = session.conversation_language.as_str();

        let transcript = self.transcribe(&session, &request).await?;
        debug!(
            target: "conversation",
            session_id = %session.id,
            transcript_chars = transcript.chars().count(),
            "user answer recognized"
        );

        let echo = self.config.request_transcript_echo && session.subtitles_enabled();
        let instruction = match (session.subtitles_enabled(), echo) {
            (true, true) => with_subtitle(
                ANSWER_INSTRUCTION_ECHO,
                language_name(&session.subtitle_language),
            ),
            (true, false) => with_subtitle(
                ANSWER_INSTRUCTION_SUBTITLED,
                language_name(&session.subtitle_language),
            ),
            (false, _) => ANSWER_INSTRUCTION.to_string(),
        };
        let prompt = PromptBuilder::from_history(&turns)
            .message(TurnRole::User, transcript.clone())
            .instruction(instruction)
            .build();

        let exchange = self.exchange(&session.id, &prompt).await?;
        let audio = self
            .synthesize(TurnKind::Answer, &session, &exchange.reply)
            .await?;
        let echoed_subtitle = if echo {
            exchange.user_transcript_subtitle.as_str()
        } else {
            ""
        };
        let prompt_subtitle = self
            .subtitle(TurnKind::Answer, &session, &transcript, echoed_subtitle)
            .await;
        let answer_subtitle = self
            .subtitle(
                TurnKind::Answer,
                &session,
                &exchange.reply,
                &exchange.reply_subtitle,
            )
            .await;

        let user_audio = self.config.retain_user_audio.then(|| request.audio.clone());
        let mut reply_turn = NewTurn::assistant(exchange.reply.clone(), audio.clone());
        if exchange.is_conversation_ending {
            reply_turn = reply_turn.concluding();
        }
        self.store
            .append_turns(
                &session.id,
                &[NewTurn::user(transcript.clone(), user_audio), reply_turn],
            )
            .await?;

        if exchange.is_conversation_ending {
            info!(
                target: "conversation",
                session_id = %session.id,
                "model ended the conversation"
            );
        }

        Ok(AnswerResponse {
            language: language.to_string(),
            is_last: exchange.is_conversation_ending,
            prompt: ChatPayload {
                text: transcript,
                audio: String::new(),
                subtitle: prompt_subtitle,
            },
            answer: ChatPayload {
                text: exchange.reply,
                audio: encode_audio(&audio),
                subtitle: answer_subtitle,
            },
        })
    }

    async fn run_end(&self, credential: &SessionCredential) -> Result<EndResponse, TurnError> {
        let session = self.credentials.authenticate_credential(credential).await?;
        let _guard = self.serialize(&session.id).await;
        let turns = self.open_history(&session).await?;

        let instruction = if session.subtitles_enabled() {
            with_subtitle(
                END_INSTRUCTION_SUBTITLED,
                language_name(&session.subtitle_language),
            )
        } else {
            END_INSTRUCTION.to_string()
        };
        let prompt = PromptBuilder::from_history(&turns)
            .instruction(instruction)
            .build();

        let exchange = self.exchange(&session.id, &prompt).await?;
        let audio = self
            .synthesize(TurnKind::End, &session, &exchange.reply)
            .await?;
        let subtitle = self
            .subtitle(
                TurnKind::End,
                &session,
                &exchange.reply,
                &exchange.reply_subtitle,
            )
            .await;

        self.store
            .append_turns(
                &session.id,
                &[NewTurn::assistant(exchange.reply.clone(), audio.clone()).concluding()],
            )
            .await?;
        info!(target: "conversation", session_id = %session.id, "conversation ended by user");

        Ok(EndResponse {
            language: session.conversation_language.clone(),
            is_last: true,
            answer: ChatPayload {
                text: exchange.reply,
                audio: encode_audio(&audio),
                subtitle,
            },
        })
    }

    async fn mint_session(
        &self,
        language: &str,
        subtitle_language: &str,
        voice: &str,
    ) -> Result<(ConversationSession, String), TurnError> {
        let credentials = Arc::clone(&self.credentials);
        let language = language.to_string();
        let subtitle_language = subtitle_language.to_string();
        let voice = voice.to_string();
        let minted = tokio::task::spawn_blocking(move || {
            credentials.create_session(&language, &subtitle_language, &voice)
        })
        .await
        .map_err(|err| TurnError::Internal(err.to_string()))??;
        Ok(minted)
    }

    async fn serialize(&self, session_id: &str) -> Option<OwnedMutexGuard<()>> {
        if !self.config.serialize_session_turns {
            return None;
        }
        Some(self.locks.acquire(session_id).await)
    }

    /// Loads the history a new turn builds on, refusing conversations that already ended.
    async fn open_history(&self, session: &ConversationSession) -> Result<Vec<Turn>, TurnError> {
        let turns = self.store.load_turns(&session.id).await?;
        match phase_of(&turns) {
            ConversationPhase::Ended => Err(TurnError::ConversationEnded),
            ConversationPhase::Created => Err(TurnError::Internal(format!(
                "session {} has no history",
                session.id
            ))),
            ConversationPhase::AwaitingFirstTurn | ConversationPhase::InProgress => Ok(turns),
        }
    }

    async fn transcribe(
        &self,
        session: &ConversationSession,
        request: &AnswerRequest,
    ) -> Result<String, TurnError> {
        let recognition = &self.providers.recognition;
        let language = &session.conversation_language;
        let hint = if recognition.supports_language(language) {
            recognition_hint(language)
        } else {
            ""
        };

        let transcript = bounded(
            recognition.name(),
            self.config.provider_timeout,
            recognition.transcribe(request.audio.clone(), &request.filename, hint),
        )
        .await?;
        let transcript = transcript.trim();
        if transcript.is_empty() {
            return Err(TurnError::EmptyTranscript);
        }
        Ok(transcript.to_string())
    }

    async fn exchange(
        &self,
        session_id: &str,
        prompt: &Prompt,
    ) -> Result<TurnExchangeResult, TurnError> {
        let text = &self.providers.text;
        let raw = bounded(
            text.name(),
            self.config.provider_timeout,
            text.generate(prompt),
        )
        .await?;

        extract(&raw).map_err(|err| {
            warn!(
                target: "conversation",
                session_id,
                %err,
                raw_chars = raw.chars().count(),
                "model output could not be extracted"
            );
            TurnError::from(err)
        })
    }

    /// Empty audio when no backend is configured or it does not cover the conversation language.
    async fn synthesize(
        &self,
        kind: TurnKind,
        session: &ConversationSession,
        text: &str,
    ) -> Result<Bytes, TurnError> {
        let synthesis = &self.providers.synthesis;
        let skipped = synthesis_skip_reason(synthesis.as_ref(), &session.conversation_language);
        if let Some(reason) = skipped {
            record_turn_degraded(
                kind.as_str(),
                &session.id,
                STAGE_SYNTHESIS,
                synthesis.name(),
                reason,
            );
            return Ok(Bytes::new());
        }

        let audio = bounded(
            synthesis.name(),
            self.config.provider_timeout,
            synthesis.synthesize(text, &session.voice_profile),
        )
        .await?;
        if audio.is_empty() {
            record_turn_degraded(
                kind.as_str(),
                &session.id,
                STAGE_SYNTHESIS,
                synthesis.name(),
                "synthesis returned no audio",
            );
        }
        Ok(audio)
    }

    /// Never fails: any problem yields an empty subtitle.
    async fn subtitle(
        &self,
        kind: TurnKind,
        session: &ConversationSession,
        text: &str,
        inline: &str,
    ) -> String {
        if !session.subtitles_enabled() || text.trim().is_empty() {
            return String::new();
        }
        if !inline.trim().is_empty() {
            return inline.trim().to_string();
        }

        let Some(translator) = &self.providers.translator else {
            return String::new();
        };
        let target = language_name(&session.subtitle_language);
        match bounded(
            translator.name(),
            self.config.subtitle_timeout,
            translator.translate(text, target),
        )
        .await
        {
            Ok(subtitle) => subtitle.trim().to_string(),
            Err(err) => {
                record_turn_degraded(
                    kind.as_str(),
                    &session.id,
                    STAGE_SUBTITLE,
                    translator.name(),
                    &err.to_string(),
                );
                String::new()
            }
        }
    }

    fn record_failure(&self, kind: TurnKind, session_id: &str, err: &TurnError, started: Instant) {
        warn!(
            target: "conversation",
            kind = kind.as_str(),
            session_id,
            %err,
            "turn aborted"
        );
        record_turn_failed(
            kind.as_str(),
            session_id,
            err.code(),
            err.status_code(),
            started.elapsed(),
        );
    }
}

/// Why synthesis is skipped for this language, if it is.
pub(super) fn synthesis_skip_reason(
    synthesis: &dyn SpeechSynthesis,
    language: &str,
) -> Option<&'static str> {
    if !synthesis.produces_audio() {
        Some("no synthesis backend configured")
    } else if !synthesis.supports_language(language) {
        Some("language not supported by synthesis backend")
    } else {
        None
    }
}

/// Runs a capability call under `limit`; expiry counts as the provider being unavailable.
pub(crate) async fn bounded<T, F>(provider: &str, limit: Duration, call: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(ProviderError::unavailable(
            provider,
            format!("timed out after {}ms", limit.as_millis()),
        )),
    }
}

fn encode_audio(audio: &Bytes) -> String {
    if audio.is_empty() {
        String::new()
    } else {
        BASE64.encode(audio)
    }
}
