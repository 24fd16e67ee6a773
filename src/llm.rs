//! OpenAI-compatible chat completions client

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Sampling temperature for replies
pub const TEMPERATURE: f64 = 0.7;

/// Upper bound on reply length, in tokens
pub const MAX_TOKENS: u32 = 150;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f64,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// A single-turn chat completions client
pub struct LlmClient {
    client: reqwest::Client,
    api_base: String,
    api_key: SecretString,
    model: String,
}

impl LlmClient {
    /// Create a client for `{api_base}/chat/completions`
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_base: &str, api_key: SecretString, model: impl Into<String>) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("LLM API key is empty".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key,
            model: model.into(),
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask for a reply to `message` under the given system prompt
    ///
    /// # Errors
    ///
    /// Returns [`Error::LlmStatus`] if the provider answers with a non-success
    /// status, [`Error::Http`] on transport failure, and [`Error::Llm`] if the
    /// reply has no content
    pub async fn complete(&self, system_prompt: &str, message: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: message,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        tracing::debug!(model = %self.model, chars = message.len(), "requesting chat completion");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::LlmStatus {
                status: status.as_u16(),
                body,
            });
        }

        let completion: ChatResponse = response.json().await?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| Error::Llm("completion had no content".to_string()))
    }
}
