use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;

use super::*;
use crate::orchestrator::{
    PromptBuilder, ProviderError, SpeechRecognition, TextGeneration, TurnRole,
};
use crate::status::UpstreamStatus;

struct CapturedRequest {
    request_line: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl CapturedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json request body")
    }
}

/// Serves exactly one HTTP response and hands back what the client sent.
fn serve_once(status: u16, content_type: &str, body: Vec<u8>) -> (String, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port");
    let address = listener.local_addr().expect("local addr available");
    let content_type = content_type.to_string();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("client connects");
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

        let mut request_line = String::new();
        reader.read_line(&mut request_line).expect("request line");
        let mut headers = Vec::new();
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).expect("header line");
            let line = line.trim_end();
            if line.is_empty() {
                break;
            }
            if let Some((key, value)) = line.split_once(':') {
                headers.push((key.trim().to_string(), value.trim().to_string()));
            }
        }
        let length = headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, value)| value.parse::<usize>().ok())
            .unwrap_or(0);
        let mut request_body = vec![0_u8; length];
        reader.read_exact(&mut request_body).expect("request body");

        let mut stream = stream;
        let head = format!(
            "HTTP/1.1 {status} Status\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        );
        stream.write_all(head.as_bytes()).expect("response headers written");
        stream.write_all(&body).expect("response body written");

        CapturedRequest {
            request_line: request_line.trim_end().to_string(),
            headers,
            body: request_body,
        }
    });
    (format!("http://{address}"), handle)
}

fn openai_at(base_url: &str) -> OpenAiClient {
    OpenAiClient::new(
        OpenAiConfig {
            api_key: "sk-test".to_string(),
            base_url: base_url.to_string(),
            status_url: base_url.to_string(),
            ..OpenAiConfig::default()
        },
        Duration::from_secs(5),
    )
}

#[tokio::test]
async fn chat_completion_requests_json_object_format() {
    let (base, server) = serve_once(
        200,
        "application/json",
        br#"{"choices":[{"message":{"role":"assistant","content":"{\"reply\":\"hi\"}"}}]}"#.to_vec(),
    );
    let client = openai_at(&base);
    let prompt = PromptBuilder::new("persona")
        .message(TurnRole::User, "hello")
        .instruction("respond in JSON")
        .build();

    let reply = client.generate(&prompt).await.expect("chat succeeds");
    assert_eq!(reply, r#"{"reply":"hi"}"#);

    let request = server.join().expect("server thread");
    assert_eq!(request.request_line, "POST /chat/completions HTTP/1.1");
    assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
    let body = request.json();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["response_format"]["type"], "json_object");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][0]["content"], "persona\n\nrespond in JSON");
    assert_eq!(body["messages"][1]["role"], "user");
}

#[tokio::test]
async fn plain_text_client_omits_response_format() {
    let (base, server) = serve_once(
        200,
        "application/json",
        br#"{"choices":[{"message":{"content":"Halo"}}]}"#.to_vec(),
    );
    let client = openai_at(&base).plain_text();
    let prompt = PromptBuilder::new("translate").message(TurnRole::User, "Hello").build();

    assert_eq!(client.generate(&prompt).await.expect("chat"), "Halo");
    let body = server.join().expect("server thread").json();
    assert!(body.get("response_format").is_none());
}

#[tokio::test]
async fn client_errors_are_rejections_and_server_errors_are_outages() {
    let (base, server) = serve_once(400, "application/json", br#"{"error":"bad"}"#.to_vec());
    let err = openai_at(&base)
        .generate(&PromptBuilder::new("p").build())
        .await
        .expect_err("400 fails");
    server.join().expect("server thread");
    assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));

    let (base, server) = serve_once(503, "text/plain", b"overloaded".to_vec());
    let err = openai_at(&base)
        .generate(&PromptBuilder::new("p").build())
        .await
        .expect_err("503 fails");
    server.join().expect("server thread");
    assert!(matches!(err, ProviderError::Unavailable { .. }));
}

#[tokio::test]
async fn unreachable_host_is_unavailable() {
    let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
    let address = listener.local_addr().expect("addr");
    drop(listener);

    let err = openai_at(&format!("http://{address}"))
        .generate(&PromptBuilder::new("p").build())
        .await
        .expect_err("connection refused");
    assert!(matches!(err, ProviderError::Unavailable { .. }));
}

#[tokio::test]
async fn transcription_uploads_multipart_with_language_hint() {
    let (base, server) = serve_once(200, "application/json", br#"{"text":"goodbye"}"#.to_vec());
    let transcript = openai_at(&base)
        .transcribe(Bytes::from_static(b"RIFFDATA"), "answer.wav", "en")
        .await
        .expect("transcription succeeds");
    assert_eq!(transcript, "goodbye");

    let request = server.join().expect("server thread");
    assert_eq!(request.request_line, "POST /audio/transcriptions HTTP/1.1");
    assert_eq!(request.header("authorization"), Some("Bearer sk-test"));
    let content_type = request.header("content-type").expect("content type");
    assert!(content_type.starts_with("multipart/form-data; boundary="));
    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains("filename=\"answer.wav\""));
    assert!(body.to_ascii_lowercase().contains("content-type: audio/"));
    assert!(body.contains("RIFFDATA"));
    assert!(body.contains("name=\"model\"\r\n\r\nwhisper-1"));
    assert!(body.contains("name=\"language\"\r\n\r\nen"));
}

#[tokio::test]
async fn transcription_failures_follow_status_class() {
    let (base, server) = serve_once(413, "application/json", br#"{"error":"too large"}"#.to_vec());
    let err = openai_at(&base)
        .transcribe(Bytes::from_static(b"RIFF"), "answer.webm", "en")
        .await
        .expect_err("413 fails");
    server.join().expect("server thread");
    assert!(matches!(err, ProviderError::Rejected { status: 413, .. }));

    let (base, server) = serve_once(502, "text/plain", b"bad gateway".to_vec());
    let err = openai_at(&base)
        .transcribe(Bytes::from_static(b"RIFF"), "answer.webm", "en")
        .await
        .expect_err("502 fails");
    server.join().expect("server thread");
    assert!(matches!(err, ProviderError::Unavailable { .. }));
}

#[tokio::test]
async fn blank_transcription_is_reported_as_empty() {
    let (base, server) = serve_once(200, "application/json", br#"{"text":"  "}"#.to_vec());
    let err = openai_at(&base)
        .transcribe(Bytes::from_static(b"RIFF"), "answer.wav", "")
        .await
        .expect_err("blank transcript");
    let request = server.join().expect("server thread");
    assert!(matches!(err, ProviderError::EmptyTranscript { .. }));
    assert!(!String::from_utf8_lossy(&request.body).contains("name=\"language\""));
}

#[tokio::test]
async fn openai_speech_returns_raw_audio() {
    let (base, server) = serve_once(200, "audio/mpeg", b"ID3-mp3-bytes".to_vec());
    let client = openai_at(&base);
    let voice = client.pick_voice();
    assert!(openai::VOICES.contains(&voice.as_str()));

    let audio = client.synthesize("Hello", &voice).await.expect("speech");
    assert_eq!(audio, Bytes::from_static(b"ID3-mp3-bytes"));

    let body = server.join().expect("server thread").json();
    assert_eq!(body["model"], "gpt-4o-mini-tts");
    assert_eq!(body["voice"], voice.as_str());
    assert_eq!(body["input"], "Hello");
}

#[tokio::test]
async fn elevenlabs_posts_to_voice_path_with_key_header() {
    let (base, server) = serve_once(200, "audio/mpeg", b"eleven-audio".to_vec());
    let client = ElevenLabsClient::new(
        ElevenLabsConfig {
            api_key: "xi-test".to_string(),
            base_url: base,
            ..ElevenLabsConfig::default()
        },
        Duration::from_secs(5),
    );

    let audio = client.synthesize("Selamat pagi", "").await.expect("tts");
    assert_eq!(audio, Bytes::from_static(b"eleven-audio"));

    let request = server.join().expect("server thread");
    assert_eq!(
        request.request_line,
        "POST /text-to-speech/cgSgspJ2msm6clMCkdW9 HTTP/1.1"
    );
    assert_eq!(request.header("xi-api-key"), Some("xi-test"));
    let body = request.json();
    assert_eq!(body["model_id"], "eleven_multilingual_v2");
    assert_eq!(body["voice_settings"]["stability"], 0.5);
    assert_eq!(body["voice_settings"]["similarity_boost"], 0.75);
    assert!(elevenlabs::VOICES.contains(&client.pick_voice().as_str()));
}

#[tokio::test]
async fn key_check_distinguishes_refusal_from_outage() {
    let (base, server) = serve_once(200, "application/json", br#"{"data":[]}"#.to_vec());
    assert!(openai_at(&base).key_valid().await.expect("probe"));
    assert_eq!(
        server.join().expect("server thread").request_line,
        "GET /models HTTP/1.1"
    );

    let (base, server) = serve_once(401, "application/json", br#"{"error":"invalid key"}"#.to_vec());
    assert!(!openai_at(&base).key_valid().await.expect("probe"));
    server.join().expect("server thread");
}

#[tokio::test]
async fn status_page_reports_worst_tracked_component() {
    let (base, server) = serve_once(
        200,
        "application/json",
        br#"{"components":[
            {"name":"Chat Completions","status":"degraded_performance"},
            {"name":"Audio","status":"partial_outage"},
            {"name":"Fine-tuning","status":"major_outage"}
        ]}"#
        .to_vec(),
    );
    let status = openai_at(&base).upstream_status().await.expect("status");
    assert_eq!(status, UpstreamStatus::PartialOutage);
    assert_eq!(
        server.join().expect("server thread").request_line,
        "GET /components.json HTTP/1.1"
    );
}

#[test]
fn building_requires_an_openai_key() {
    assert!(build(&ProvidersConfig::default()).is_err());
}

#[test]
fn missing_elevenlabs_key_falls_back_to_silence() {
    let mut config = ProvidersConfig::default();
    config.openai.api_key = "sk-test".to_string();
    let providers = build(&config).expect("providers");
    assert_eq!(providers.set.synthesis.name(), "silent");
    assert!(providers.set.translator.is_some());

    config.synthesis = SynthesisBackend::OpenAi;
    let providers = build(&config).expect("providers");
    assert_eq!(providers.set.synthesis.name(), "openai");
}

#[test]
fn synthesis_backend_parses_names() {
    assert_eq!(SynthesisBackend::parse("ElevenLabs"), Some(SynthesisBackend::ElevenLabs));
    assert_eq!(SynthesisBackend::parse("off"), Some(SynthesisBackend::None));
    assert_eq!(SynthesisBackend::parse("polly"), None);
}
