//! Speech-to-text (STT) via an OpenAI-compatible transcription API

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// Response from the Whisper transcription endpoint
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Transcribes WAV audio to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    model: String,
    language: Option<String>,
}

impl SpeechToText {
    /// Create a Whisper transcriber
    ///
    /// `language` is a BCP-47 tag such as `en-US`; only the primary subtag
    /// is sent.
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing
    pub fn new_whisper(
        api_base: impl Into<String>,
        api_key: String,
        model: impl Into<String>,
        language: Option<&str>,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key),
            model: model.into(),
            language: language.and_then(primary_language),
        })
    }

    /// Transcribe audio to text
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the provider rejects it
    pub async fn transcribe(&self, wav: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = wav.len(), "starting Whisper transcription");

        let mut form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(wav.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        if let Some(language) = &self.language {
            form = form.text("language", language.clone());
        }

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Whisper request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }
}

/// Extract the primary language subtag (`en-US` → `en`)
fn primary_language(tag: &str) -> Option<String> {
    tag.split(['-', '_'])
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}
