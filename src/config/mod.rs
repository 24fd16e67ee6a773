//! Configuration management
//!
//! Values come from environment variables first, then the TOML config file,
//! then built-in defaults.

pub mod file;

use std::path::PathBuf;
use std::str::FromStr;

use secrecy::SecretString;

use crate::{Error, Result};

/// Default backend port
pub const DEFAULT_PORT: u16 = 5000;

pub const DEFAULT_LLM_API_BASE: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_LLM_MODEL: &str = "openai/gpt-3.5-turbo";
pub const DEFAULT_STT_API_BASE: &str = "https://api.openai.com/v1";
pub const DEFAULT_STT_MODEL: &str = "whisper-1";
pub const DEFAULT_TTS_MODEL: &str = "tts-1";
pub const DEFAULT_TTS_VOICE: &str = "alloy";
pub const DEFAULT_LANGUAGE: &str = "en-US";

/// Database file name inside the data directory
const DATABASE_FILE: &str = "voicechat.db";

/// Application configuration
#[derive(Debug)]
pub struct Config {
    pub server: ServerConfig,

    /// Origin of the chat backend the front end talks to
    pub endpoint: String,

    /// Path to data directory (transcript database)
    pub data_dir: PathBuf,

    /// Persona file; `None` uses the built-in persona
    pub persona_path: Option<PathBuf>,

    pub llm: LlmConfig,

    pub voice: VoiceConfig,
}

/// Backend server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub static_dir: Option<PathBuf>,
}

/// LLM provider configuration
#[derive(Debug)]
pub struct LlmConfig {
    pub api_base: String,
    /// Also used for transcription and cloud speech
    pub api_key: Option<SecretString>,
    pub model: String,
}

/// Voice configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    pub stt_api_base: String,
    pub stt_model: String,
    pub tts_model: String,
    pub tts_voice: String,
    pub playback: PlaybackBackend,
    pub language: String,
}

/// Which speech playback backend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackBackend {
    /// `say` or `espeak-ng`
    #[default]
    System,
    /// Remote TTS played on the default output device
    Cloud,
    /// No audio
    None,
}

impl FromStr for PlaybackBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "cloud" => Ok(Self::Cloud),
            "none" | "off" => Ok(Self::None),
            other => Err(Error::Config(format!(
                "unknown playback backend '{other}' (expected system, cloud or none)"
            ))),
        }
    }
}

impl std::fmt::Display for PlaybackBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::System => "system",
            Self::Cloud => "cloud",
            Self::None => "none",
        };
        f.write_str(name)
    }
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(|key| std::env::var(key).ok(), fc)
    }

    /// Merge an environment lookup over a parsed config file
    ///
    /// Empty environment values count as unset.
    ///
    /// # Errors
    ///
    /// Returns error if a setting has an invalid value
    pub fn from_sources(
        lookup: impl Fn(&str) -> Option<String>,
        fc: file::ConfigFile,
    ) -> Result<Self> {
        let env = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let port = match env("PORT") {
            Some(port) => port
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("invalid PORT '{port}': {e}")))?,
            None => fc.server.port.unwrap_or(DEFAULT_PORT),
        };

        let server = ServerConfig {
            port,
            static_dir: env("VOICECHAT_STATIC_DIR")
                .or(fc.server.static_dir)
                .map(PathBuf::from),
        };

        let endpoint = env("VOICECHAT_ENDPOINT")
            .or(fc.client.endpoint)
            .unwrap_or_else(|| format!("http://127.0.0.1:{port}"));

        // ~/.local/share/voicechat on Linux
        let data_dir = env("VOICECHAT_DATA_DIR")
            .or(fc.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        let llm = LlmConfig {
            api_base: env("OPENAI_API_BASE")
                .or(fc.llm.api_base)
                .unwrap_or_else(|| DEFAULT_LLM_API_BASE.to_string()),
            api_key: env("OPENAI_API_KEY")
                .or(fc.llm.api_key)
                .map(SecretString::from),
            model: env("VOICECHAT_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
        };

        let playback = env("VOICECHAT_PLAYBACK")
            .or(fc.voice.playback)
            .map(|value| value.parse::<PlaybackBackend>())
            .transpose()?
            .unwrap_or_default();

        let voice = VoiceConfig {
            stt_api_base: env("VOICECHAT_STT_API_BASE")
                .or(fc.voice.stt_api_base)
                .unwrap_or_else(|| DEFAULT_STT_API_BASE.to_string()),
            stt_model: env("VOICECHAT_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| DEFAULT_STT_MODEL.to_string()),
            tts_model: env("VOICECHAT_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            tts_voice: env("VOICECHAT_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| DEFAULT_TTS_VOICE.to_string()),
            playback,
            language: env("VOICECHAT_LANGUAGE")
                .or(fc.voice.language)
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        };

        Ok(Self {
            server,
            endpoint,
            data_dir,
            persona_path: env("VOICECHAT_PERSONA").or(fc.persona).map(PathBuf::from),
            llm,
            voice,
        })
    }

    /// Path of the transcript database
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(DATABASE_FILE)
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new()
        .map_or_else(|| PathBuf::from("."), |d| d.data_dir().join("voicechat"))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::file::ConfigFile;
    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_sources() {
        let config = Config::from_sources(env_from(&[]), ConfigFile::default()).unwrap();

        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.endpoint, "http://127.0.0.1:5000");
        assert_eq!(config.llm.api_base, DEFAULT_LLM_API_BASE);
        assert_eq!(config.llm.model, DEFAULT_LLM_MODEL);
        assert!(config.llm.api_key.is_none());
        assert_eq!(config.voice.playback, PlaybackBackend::System);
        assert_eq!(config.voice.language, "en-US");
        assert!(config.persona_path.is_none());
    }

    #[test]
    fn env_overrides_file() {
        let mut fc = ConfigFile::default();
        fc.server.port = Some(7000);
        fc.llm.model = Some("file-model".to_string());
        fc.voice.tts_voice = Some("nova".to_string());

        let env = env_from(&[
            ("PORT", "9000"),
            ("VOICECHAT_MODEL", "env-model"),
            ("OPENAI_API_KEY", "sk-test"),
        ]);
        let config = Config::from_sources(env, fc).unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.endpoint, "http://127.0.0.1:9000");
        assert_eq!(config.llm.model, "env-model");
        assert_eq!(config.voice.tts_voice, "nova");
        assert_eq!(config.llm.api_key.unwrap().expose_secret(), "sk-test");
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut fc = ConfigFile::default();
        fc.client.endpoint = Some("http://chat.internal".to_string());

        let config = Config::from_sources(env_from(&[("VOICECHAT_ENDPOINT", "  ")]), fc).unwrap();
        assert_eq!(config.endpoint, "http://chat.internal");
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(Config::from_sources(env_from(&[("PORT", "abc")]), ConfigFile::default()).is_err());
        assert!(
            Config::from_sources(env_from(&[("VOICECHAT_PLAYBACK", "loud")]), ConfigFile::default())
                .is_err()
        );
    }

    #[test]
    fn parses_playback_backends() {
        assert_eq!("Cloud".parse::<PlaybackBackend>().unwrap(), PlaybackBackend::Cloud);
        assert_eq!("off".parse::<PlaybackBackend>().unwrap(), PlaybackBackend::None);
        assert_eq!(PlaybackBackend::System.to_string(), "system");
    }

    #[test]
    fn database_lives_in_data_dir() {
        let config = Config::from_sources(
            env_from(&[("VOICECHAT_DATA_DIR", "/tmp/vc")]),
            ConfigFile::default(),
        )
        .unwrap();
        assert_eq!(config.database_path(), PathBuf::from("/tmp/vc/voicechat.db"));
    }
}
