//! TOML configuration file loading
//!
//! Supports `~/.config/voicechat/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Directory holding the transcript database
    pub data_dir: Option<String>,

    /// Path to a persona TOML file
    pub persona: Option<String>,

    #[serde(default)]
    pub server: ServerFileConfig,

    #[serde(default)]
    pub client: ClientFileConfig,

    #[serde(default)]
    pub llm: LlmFileConfig,

    #[serde(default)]
    pub voice: VoiceFileConfig,
}

/// Backend server configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    pub port: Option<u16>,

    /// Front end files to serve
    pub static_dir: Option<String>,
}

/// Chat front end configuration
#[derive(Debug, Default, Deserialize)]
pub struct ClientFileConfig {
    /// Origin of the chat backend (e.g. "http://127.0.0.1:5000")
    pub endpoint: Option<String>,
}

/// LLM provider configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    pub api_base: Option<String>,
    pub api_key: Option<String>,

    /// Model identifier (e.g. "openai/gpt-3.5-turbo")
    pub model: Option<String>,
}

/// Voice capture and playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    pub stt_api_base: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// "system", "cloud" or "none"
    pub playback: Option<String>,

    /// Capture language tag (e.g. "en-US")
    pub language: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
#[must_use]
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_config_file_from(&path))
}

/// Load a TOML config file from `path`, falling back to defaults
#[must_use]
pub fn load_config_file_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/voicechat/config.toml`
#[must_use]
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("voicechat").join("config.toml"))
}
