//! Error types for the voice chatbot

use thiserror::Error;

/// Result type alias for voice chatbot operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice chatbot
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech capture is not available on this system
    #[error("speech capture unavailable: {0}")]
    CaptureUnavailable(String),

    /// Speech capture session failed
    #[error("capture error: {0}")]
    Capture(String),

    /// Remote chat endpoint failed or returned an unusable payload
    #[error("remote error: {0}")]
    Remote(String),

    /// Speech playback failed
    #[error("playback error: {0}")]
    Playback(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// LLM request failed before a response status was received
    #[error("llm error: {0}")]
    Llm(String),

    /// LLM provider answered with a non-success status
    #[error("llm status {status}: {body}")]
    LlmStatus {
        /// HTTP status code
        status: u16,
        /// Response body, for diagnostics
        body: String,
    },

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}
