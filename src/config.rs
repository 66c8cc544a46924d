//! 服务配置：默认值、可选 TOML 文件与环境变量覆盖。

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::orchestrator::OrchestratorConfig;
use crate::persistence::SqliteConfig;
use crate::providers::{ProvidersConfig, SynthesisBackend};
use crate::session::CredentialConfig;
use crate::telemetry::TelemetryConfig;

pub const CONFIG_PATH_ENV: &str = "MOCKCHAT_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file; an in-memory database is used when unset.
    pub path: Option<PathBuf>,
    pub pool_size: Option<u32>,
}

impl DatabaseConfig {
    pub fn sqlite(&self) -> SqliteConfig {
        let mut config = match &self.path {
            Some(path) => SqliteConfig::file(path.clone()),
            None => SqliteConfig::memory(),
        };
        if let (Some(size), Some(_)) = (self.pool_size, &self.path) {
            config.pool_size = size.max(1);
        }
        config
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub database: DatabaseConfig,
    pub credentials: CredentialConfig,
    pub orchestrator: OrchestratorConfig,
    pub providers: ProvidersConfig,
    pub telemetry: TelemetryConfig,
}

impl ServiceConfig {
    /// `.env`, then the TOML file named by `MOCKCHAT_CONFIG`, then environment overrides.
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(target: "config", path = %path.display(), "loaded .env file");
        }

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("failed to parse TOML configuration")
    }

    /// Applies environment overrides through `lookup`; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(path) = get("MOCKCHAT_DATABASE_PATH") {
            self.database.path = Some(PathBuf::from(path));
        }
        if let Some(size) = get("MOCKCHAT_DB_POOL_SIZE") {
            self.database.pool_size = Some(parse_number("MOCKCHAT_DB_POOL_SIZE", &size)?);
        }
        if let Some(iterations) = get("MOCKCHAT_HASH_ITERATIONS") {
            self.credentials.hash_iterations =
                parse_number("MOCKCHAT_HASH_ITERATIONS", &iterations)?;
        }

        if let Some(ms) = get("MOCKCHAT_PROVIDER_TIMEOUT_MS") {
            self.orchestrator.provider_timeout =
                Duration::from_millis(parse_number("MOCKCHAT_PROVIDER_TIMEOUT_MS", &ms)?);
        }
        if let Some(ms) = get("MOCKCHAT_SUBTITLE_TIMEOUT_MS") {
            self.orchestrator.subtitle_timeout =
                Duration::from_millis(parse_number("MOCKCHAT_SUBTITLE_TIMEOUT_MS", &ms)?);
        }
        if let Some(flag) = get("MOCKCHAT_SERIALIZE_TURNS") {
            self.orchestrator.serialize_session_turns = parse_flag("MOCKCHAT_SERIALIZE_TURNS", &flag)?;
        }
        if let Some(flag) = get("MOCKCHAT_TRANSCRIPT_ECHO") {
            self.orchestrator.request_transcript_echo = parse_flag("MOCKCHAT_TRANSCRIPT_ECHO", &flag)?;
        }
        if let Some(flag) = get("MOCKCHAT_RETAIN_USER_AUDIO") {
            self.orchestrator.retain_user_audio = parse_flag("MOCKCHAT_RETAIN_USER_AUDIO", &flag)?;
        }

        if let Some(key) = get("OPENAI_API_KEY") {
            self.providers.openai.api_key = key;
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            self.providers.openai.base_url = url;
        }
        if let Some(key) = get("ELEVENLABS_API_KEY") {
            self.providers.elevenlabs.api_key = key;
        }
        if let Some(url) = get("ELEVENLABS_BASE_URL") {
            self.providers.elevenlabs.base_url = url;
        }
        if let Some(backend) = get("MOCKCHAT_SYNTHESIS") {
            self.providers.synthesis = SynthesisBackend::parse(&backend)
                .ok_or_else(|| anyhow!("MOCKCHAT_SYNTHESIS has unknown backend `{backend}`"))?;
        }
        if let Some(ms) = get("MOCKCHAT_HTTP_TIMEOUT_MS") {
            self.providers.request_timeout =
                Duration::from_millis(parse_number("MOCKCHAT_HTTP_TIMEOUT_MS", &ms)?);
        }

        if let Some(filter) = get("MOCKCHAT_LOG") {
            self.telemetry.default_filter = filter;
        }
        if let Some(dir) = get("MOCKCHAT_LOG_DIR") {
            self.telemetry.log_dir = Some(PathBuf::from(dir));
        }
        if let Some(flag) = get("MOCKCHAT_LOG_JSON") {
            self.telemetry.json = parse_flag("MOCKCHAT_LOG_JSON", &flag)?;
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|err| anyhow!("{key} must be a number: {err}"))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("{key} must be a boolean, got `{other}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::SqlitePath;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_usable() {
        let config = ServiceConfig::default();
        assert!(config.orchestrator.serialize_session_turns);
        assert!(!config.orchestrator.request_transcript_echo);
        assert_eq!(config.credentials.hash_iterations, 100_000);
        assert_eq!(config.providers.synthesis, SynthesisBackend::ElevenLabs);
        assert!(matches!(config.database.sqlite().path, SqlitePath::Memory));
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let mut file = NamedTempFile::new().expect("temp config");
        writeln!(
            file,
            r#"
[database]
path = "/var/lib/mockchat/chat.db"
pool_size = 4

[orchestrator]
provider_timeout = 5000
request_transcript_echo = true

[providers]
synthesis = "openai"

[providers.openai]
chat_model = "gpt-4o"
"#
        )
        .expect("write config");

        let config = ServiceConfig::from_file(file.path()).expect("config parses");
        assert_eq!(config.orchestrator.provider_timeout, Duration::from_secs(5));
        assert!(config.orchestrator.request_transcript_echo);
        assert_eq!(config.providers.synthesis, SynthesisBackend::OpenAi);
        assert_eq!(config.providers.openai.chat_model, "gpt-4o");
        assert_eq!(config.providers.openai.transcription_model, "whisper-1");
        let sqlite = config.database.sqlite();
        assert_eq!(sqlite.pool_size, 4);
        assert!(matches!(sqlite.path, SqlitePath::File(_)));
    }

    #[test]
    fn environment_overrides_apply_last() {
        let mut config = ServiceConfig::default();
        config
            .apply_env(lookup(&[
                ("OPENAI_API_KEY", " sk-live "),
                ("ELEVENLABS_API_KEY", "xi-live"),
                ("MOCKCHAT_SYNTHESIS", "none"),
                ("MOCKCHAT_SUBTITLE_TIMEOUT_MS", "2500"),
                ("MOCKCHAT_RETAIN_USER_AUDIO", "yes"),
                ("MOCKCHAT_LOG", "debug"),
                ("MOCKCHAT_DATABASE_PATH", ""),
            ]))
            .expect("overrides apply");

        assert_eq!(config.providers.openai.api_key, "sk-live");
        assert_eq!(config.providers.elevenlabs.api_key, "xi-live");
        assert_eq!(config.providers.synthesis, SynthesisBackend::None);
        assert_eq!(config.orchestrator.subtitle_timeout, Duration::from_millis(2500));
        assert!(config.orchestrator.retain_user_audio);
        assert_eq!(config.telemetry.default_filter, "debug");
        assert!(config.database.path.is_none());
    }

    #[test]
    fn malformed_overrides_are_reported() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env(lookup(&[("MOCKCHAT_PROVIDER_TIMEOUT_MS", "soon")]))
            .expect_err("non numeric timeout");
        assert!(err.to_string().contains("MOCKCHAT_PROVIDER_TIMEOUT_MS"));

        let err = config
            .apply_env(lookup(&[("MOCKCHAT_SYNTHESIS", "polly")]))
            .expect_err("unknown backend");
        assert!(err.to_string().contains("polly"));
    }

    #[test]
    fn api_keys_are_not_printed() {
        let mut config = ServiceConfig::default();
        config.providers.openai.api_key = "sk-very-secret".to_string();
        assert!(!format!("{config:?}").contains("sk-very-secret"));
    }
}
