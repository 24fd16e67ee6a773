//! Conversation state machine
//!
//! [`ConversationController`] owns the transcript and the three capability
//! seams (capture, playback, remote chat) and guarantees they never run at
//! the same time. [`driver::run`] feeds it user commands, capability events
//! and status deadlines from one loop.

mod controller;
pub mod driver;
mod message;
mod status;
mod transcript;

use std::sync::Arc;
use std::time::Duration;

pub use controller::ConversationController;
pub use driver::Command;
pub use message::{Message, Role};
pub use status::{Status, StatusKind};
pub use transcript::Transcript;

use crate::client::ChatClient;
use crate::voice::{EventSink, SpeechCapture, SpeechPlayback};

/// Storage key holding the serialized transcript
pub const STORAGE_KEY: &str = "voice_chat_transcript";

/// Bot message appended when the chat endpoint fails
pub const FALLBACK_REPLY: &str =
    "I apologize, but I'm having trouble connecting to the server. Please try again in a moment.";

/// How long transient statuses stay visible
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

pub const LISTENING_STATUS: &str = "Listening... Ask me anything!";
pub const THINKING_STATUS: &str = "Thinking...";
pub const SPEAKING_STATUS: &str = "Speaking...";
pub const CONNECTION_ERROR_STATUS: &str = "Connection error - please try again";
pub const CAPTURE_UNSUPPORTED_STATUS: &str = "Speech recognition not supported on this system.";
/// Closing sentence of every greeting
const INVITATION: &str =
    "Feel free to type a question or start listening to begin our conversation!";

pub const LISTENING_BUSY_STATUS: &str = "Stop listening before typing a message";
pub const REPLY_BUSY_STATUS: &str = "Please wait for the current reply";

/// Which of the mutually exclusive activities is running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Listening,
    AwaitingReply,
    Speaking,
}

impl std::fmt::Display for InteractionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::AwaitingReply => "awaiting reply",
            Self::Speaking => "speaking",
        };
        f.write_str(name)
    }
}

/// Change notification for front ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    State(InteractionState),
    Message(Message),
    /// Typing placeholder shown or hidden
    Typing(bool),
    /// `None` hides the status line
    Status(Option<Status>),
    /// Transcript reset to the greeting
    Cleared,
}

/// External capabilities the controller coordinates
pub struct Capabilities {
    pub capture: Box<dyn SpeechCapture>,
    pub playback: Box<dyn SpeechPlayback>,
    pub client: Arc<dyn ChatClient>,
    /// Where capture and playback backends report their events
    pub events: EventSink,
}

/// Fixed texts and timings
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub greeting: String,
    pub fallback_reply: String,
    pub status_timeout: Duration,
    pub storage_key: String,
}

impl ControllerSettings {
    /// Settings with a greeting introducing `name`
    #[must_use]
    pub fn for_persona(name: &str) -> Self {
        Self {
            greeting: format!("Hi! I'm {name}. {INVITATION}"),
            ..Self::default()
        }
    }
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            greeting: format!("Hi! {INVITATION}"),
            fallback_reply: FALLBACK_REPLY.to_string(),
            status_timeout: STATUS_TIMEOUT,
            storage_key: STORAGE_KEY.to_string(),
        }
    }
}
