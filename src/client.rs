//! Remote chat endpoint client
//!
//! The endpoint is opaque: it takes `{"message": "..."}` and answers
//! `{"response": "..."}`. Anything else is a [`Error::Remote`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Path of the chat endpoint under the configured origin
pub const CHAT_PATH: &str = "/api/chat";

/// Sends one user message and returns the reply text
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a message
    ///
    /// # Errors
    ///
    /// Returns [`Error::Remote`] on any transport, status, or payload failure
    async fn send(&self, message: &str) -> Result<String>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    response: Option<String>,
}

/// HTTP client for `POST <origin>/api/chat`
pub struct HttpChatClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpChatClient {
    /// Create a client for the given origin (e.g. `http://127.0.0.1:5000`)
    #[must_use]
    pub fn new(origin: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}{CHAT_PATH}", origin.trim_end_matches('/')),
        }
    }

    /// Full endpoint URL
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn send(&self, message: &str) -> Result<String> {
        tracing::debug!(endpoint = %self.endpoint, chars = message.len(), "sending chat message");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&ChatRequest { message })
            .send()
            .await
            .map_err(|e| Error::Remote(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Remote(format!("HTTP error! status: {}", status.as_u16())));
        }

        let reply: ChatReply = response
            .json()
            .await
            .map_err(|e| Error::Remote(format!("malformed response body: {e}")))?;

        match reply.response {
            Some(text) if !text.is_empty() => Ok(text),
            _ => Err(Error::Remote("No response from server".to_string())),
        }
    }
}
