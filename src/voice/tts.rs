//! Text-to-speech (TTS) via an OpenAI-compatible speech API

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Lowest speed the speech API accepts
const MIN_SPEED: f32 = 0.25;

/// Highest speed the speech API accepts
const MAX_SPEED: f32 = 4.0;

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    model: String,
    default_voice: String,
}

impl TextToSpeech {
    /// Create a TTS client
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new(
        api_base: impl Into<String>,
        api_key: String,
        model: impl Into<String>,
        default_voice: impl Into<String>,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
            model: model.into(),
            default_voice: default_voice.into(),
        })
    }

    /// Voice used when the caller does not pick one
    #[must_use]
    pub fn default_voice(&self) -> &str {
        &self.default_voice
    }

    /// Synthesize text to MP3 audio
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str, voice: Option<&str>, speed: f32) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: voice.unwrap_or(&self.default_voice),
            speed: speed.clamp(MIN_SPEED, MAX_SPEED),
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}
