use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::NamedTempFile;
use tokio::time::sleep;

use crate::orchestrator::*;
use crate::persistence::{SqliteConfig, SqlitePersistence};
use crate::session::{CredentialConfig, CredentialManager, SessionCredential, Turn};


pub(super) const GREETING_AUDIO: &[u8] = b"ID3-greeting";

pub(super) struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    prompts: Mutex<Vec<Prompt>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    languages: Vec<String>,
}

impl ScriptedModel {
    pub(super) fn new(replies: &[&str]) -> Arc<Self> {
        Self::with_delay(replies, Duration::ZERO)
    }

    pub(super) fn with_delay(replies: &[&str], delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|reply| Ok(reply.to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            languages: Vec::new(),
        })
    }

    /// A model that only converses in `languages`.
    pub(super) fn limited_to(replies: &[&str], languages: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|reply| Ok(reply.to_string())).collect()),
            prompts: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            languages: languages.iter().map(|code| code.to_string()).collect(),
        })
    }

    pub(super) fn push_error(&self, error: ProviderError) {
        self.replies
            .lock()
            .expect("replies lock poisoned")
            .push_back(Err(error));
    }

    pub(super) fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().expect("prompts lock poisoned").clone()
    }

    pub(super) fn calls(&self) -> usize {
        self.prompts.lock().expect("prompts lock poisoned").len()
    }

    pub(super) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGeneration for ScriptedModel {
    fn name(&self) -> &str {
        "scripted-model"
    }

    fn supports_language(&self, language: &str) -> bool {
        self.languages.is_empty() || self.languages.iter().any(|code| code == language)
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String, ProviderError> {
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        self.prompts
            .lock()
            .expect("prompts lock poisoned")
            .push(prompt.clone());

        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }

        let reply = self
            .replies
            .lock()
            .expect("replies lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(ProviderError::unavailable("scripted-model", "script exhausted")));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply
    }
}

pub(super) struct ScriptedRecognizer {
    transcripts: Mutex<VecDeque<String>>,
    hints: Mutex<Vec<String>>,
}

impl ScriptedRecognizer {
    pub(super) fn new(transcripts: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            transcripts: Mutex::new(transcripts.iter().map(|text| text.to_string()).collect()),
            hints: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn hints(&self) -> Vec<String> {
        self.hints.lock().expect("hints lock poisoned").clone()
    }

    pub(super) fn calls(&self) -> usize {
        self.hints.lock().expect("hints lock poisoned").len()
    }
}

#[async_trait]
impl SpeechRecognition for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted-recognizer"
    }

    async fn transcribe(
        &self,
        _audio: Bytes,
        _filename: &str,
        hint_language: &str,
    ) -> Result<String, ProviderError> {
        self.hints
            .lock()
            .expect("hints lock poisoned")
            .push(hint_language.to_string());
        Ok(self
            .transcripts
            .lock()
            .expect("transcripts lock poisoned")
            .pop_front()
            .unwrap_or_else(|| "hello".to_string()))
    }
}

pub(super) struct FakeSynthesis {
    audio: Bytes,
    supported: bool,
    failure: Option<ProviderError>,
    voices: Mutex<Vec<String>>,
}

impl FakeSynthesis {
    pub(super) fn speaking() -> Arc<Self> {
        Arc::new(Self {
            audio: Bytes::from_static(GREETING_AUDIO),
            supported: true,
            failure: None,
            voices: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn unsupported() -> Arc<Self> {
        Arc::new(Self {
            audio: Bytes::from_static(GREETING_AUDIO),
            supported: false,
            failure: None,
            voices: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn failing() -> Arc<Self> {
        Arc::new(Self {
            audio: Bytes::new(),
            supported: true,
            failure: Some(ProviderError::rejected("fake-tts", 401, "bad key")),
            voices: Mutex::new(Vec::new()),
        })
    }

    pub(super) fn voices(&self) -> Vec<String> {
        self.voices.lock().expect("voices lock poisoned").clone()
    }
}

#[async_trait]
impl SpeechSynthesis for FakeSynthesis {
    fn name(&self) -> &str {
        "fake-tts"
    }

    fn supports_language(&self, _language: &str) -> bool {
        self.supported
    }

    fn pick_voice(&self) -> String {
        "nova".to_string()
    }

    async fn synthesize(&self, _text: &str, voice_profile: &str) -> Result<Bytes, ProviderError> {
        self.voices
            .lock()
            .expect("voices lock poisoned")
            .push(voice_profile.to_string());
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(self.audio.clone()),
        }
    }
}

#[derive(Default)]
pub(super) struct FailingTranslator {
    calls: AtomicUsize,
}

impl FailingTranslator {
    pub(super) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubtitleTranslator for FailingTranslator {
    fn name(&self) -> &str {
        "failing-translator"
    }

    async fn translate(&self, _text: &str, _target_language: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProviderError::unavailable("failing-translator", "connection reset"))
    }
}

pub(super) struct PrefixTranslator;

#[async_trait]
impl SubtitleTranslator for PrefixTranslator {
    fn name(&self) -> &str {
        "prefix-translator"
    }

    async fn translate(&self, text: &str, target_language: &str) -> Result<String, ProviderError> {
        Ok(format!("[{target_language}] {text}"))
    }
}

pub(super) struct Harness {
    pub store: Arc<SqlitePersistence>,
    pub orchestrator: ConversationOrchestrator,
    _db: NamedTempFile,
}

impl Harness {
    pub(super) fn count_turns(&self, session_id: &str) -> i64 {
        self.store.count_turns(session_id).expect("count turns")
    }

    pub(super) fn turns(&self, session_id: &str) -> Vec<Turn> {
        self.store.load_turns(session_id).expect("load turns")
    }

    pub(super) fn count_sessions(&self) -> i64 {
        self.store
            .connection()
            .expect("connection available")
            .query_row("SELECT count(*) FROM sessions", [], |row| row.get(0))
            .expect("count sessions")
    }
}

pub(super) struct HarnessBuilder {
    config: OrchestratorConfig,
    model: Arc<ScriptedModel>,
    recognizer: Arc<ScriptedRecognizer>,
    synthesis: Arc<dyn SpeechSynthesis>,
    translator: Option<Arc<dyn SubtitleTranslator>>,
}

impl HarnessBuilder {
    pub(super) fn new(model: Arc<ScriptedModel>) -> Self {
        Self {
            config: OrchestratorConfig::default(),
            model,
            recognizer: ScriptedRecognizer::new(&[]),
            synthesis: FakeSynthesis::speaking(),
            translator: None,
        }
    }

    pub(super) fn config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    pub(super) fn recognizer(mut self, recognizer: Arc<ScriptedRecognizer>) -> Self {
        self.recognizer = recognizer;
        self
    }

    pub(super) fn synthesis(mut self, synthesis: Arc<dyn SpeechSynthesis>) -> Self {
        self.synthesis = synthesis;
        self
    }

    pub(super) fn translator(mut self, translator: Arc<dyn SubtitleTranslator>) -> Self {
        self.translator = Some(translator);
        self
    }

    pub(super) fn build(self) -> Harness {
        let db = NamedTempFile::new().expect("temp database");
        let mut sqlite = SqliteConfig::file(db.path());
        sqlite.pool_size = 4;
        let store = Arc::new(SqlitePersistence::bootstrap(sqlite).expect("bootstrap store"));
        let credentials = Arc::new(
            CredentialManager::new(
                &CredentialConfig {
                    hash_iterations: 1_000,
                },
                store.clone(),
            )
            .expect("credential manager"),
        );

        let orchestrator = ConversationOrchestrator::with_components(
            self.config,
            store.clone(),
            credentials,
            self.model,
            self.recognizer,
            self.synthesis,
            self.translator,
        );

        Harness {
            store,
            orchestrator,
            _db: db,
        }
    }
}

pub(super) fn start_request(subtitle_language: Option<&str>) -> StartRequest {
    StartRequest {
        role: "travel guide".to_string(),
        topic: "Tokyo".to_string(),
        language: "en-US".to_string(),
        subtitle_language: subtitle_language.map(str::to_string),
    }
}

pub(super) fn credential_of(response: &StartResponse) -> SessionCredential {
    SessionCredential::new(response.session_id.clone(), response.secret.clone())
}

pub(super) fn clip() -> AnswerRequest {
    AnswerRequest::new(Bytes::from_static(b"RIFF....WAVEfmt "))
}
