//! Chat endpoint

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;

use super::ApiState;
use crate::Error;
use crate::llm::LlmClient;
use crate::persona::Persona;

/// Reply when the provider rejects the request
pub const AUTHORIZATION_REPLY: &str =
    "Sorry, I'm unable to process your request at the moment due to an authorization issue.";

/// Reply for any other provider failure
pub const GENERIC_REPLY: &str = "Something went wrong. Please try again later.";

/// Turns a user message into reply text
///
/// Implementations never fail: provider errors become apology text.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, message: &str) -> String;
}

/// Answers as a persona through an LLM
pub struct PersonaResponder {
    llm: Option<LlmClient>,
    system_prompt: String,
}

impl PersonaResponder {
    /// Without an LLM client every reply is [`GENERIC_REPLY`]
    #[must_use]
    pub fn new(llm: Option<LlmClient>, persona: &Persona) -> Self {
        Self {
            llm,
            system_prompt: persona.system_prompt(),
        }
    }
}

#[async_trait]
impl Responder for PersonaResponder {
    async fn respond(&self, message: &str) -> String {
        let Some(llm) = &self.llm else {
            tracing::error!("no LLM API key configured");
            return GENERIC_REPLY.to_string();
        };

        match llm.complete(&self.system_prompt, message).await {
            Ok(reply) => reply,
            Err(e) => fallback_reply(&e).to_string(),
        }
    }
}

/// Collapse a provider error into the text shown to the user
#[must_use]
pub fn fallback_reply(error: &Error) -> &'static str {
    match error {
        Error::LlmStatus { status, body } => {
            tracing::error!(status, %body, "LLM provider returned an error");
            AUTHORIZATION_REPLY
        }
        other => {
            tracing::error!(error = %other, "LLM request failed");
            GENERIC_REPLY
        }
    }
}

/// Build chat router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new().route("/chat", post(chat)).with_state(state)
}

/// Successful chat response
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub status: &'static str,
}

/// Answer one message
///
/// The body is decoded by hand so that anything unreadable maps to a 500
/// rather than axum's extractor rejections.
async fn chat(
    State(state): State<Arc<ApiState>>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ChatError> {
    let message = parse_message(&body)?;

    tracing::info!(chars = message.len(), "chat request");
    let response = state.responder.respond(&message).await;

    Ok(Json(ChatResponse {
        response,
        status: "success",
    }))
}

fn parse_message(body: &[u8]) -> Result<String, ChatError> {
    let value: serde_json::Value = serde_json::from_slice(body).map_err(|e| {
        tracing::error!(error = %e, "chat body is not JSON");
        ChatError::Internal
    })?;

    let object = value.as_object().ok_or_else(|| {
        tracing::error!("chat body is not a JSON object");
        ChatError::Internal
    })?;

    let message = match object.get("message") {
        None => "",
        Some(serde_json::Value::String(message)) => message.trim(),
        Some(other) => {
            tracing::error!(kind = json_kind(other), "chat message is not a string");
            return Err(ChatError::Internal);
        }
    };

    if message.is_empty() {
        return Err(ChatError::MissingMessage);
    }
    Ok(message.to_string())
}

const fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Chat API errors
#[derive(Debug)]
pub enum ChatError {
    MissingMessage,
    Internal,
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        let (status, error) = match self {
            Self::MissingMessage => (StatusCode::BAD_REQUEST, "Message is required"),
            Self::Internal => (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error"),
        };

        (status, Json(ErrorResponse { error })).into_response()
    }
}
