//! Speech capture and playback capabilities
//!
//! The conversation controller only sees the [`SpeechCapture`] and
//! [`SpeechPlayback`] traits. Backends do their blocking work elsewhere and
//! report progress as [`Event`]s through an [`EventSink`].

mod capture;
mod cloud;
mod endpoint;
mod microphone;
mod playback;
mod silent;
mod stt;
mod system;
mod tts;

use tokio::sync::mpsc;

use crate::Result;

pub use capture::{AudioCapture, SAMPLE_RATE, encode_wav, input_device_available, rms_energy};
pub use cloud::{CLOUD_VOICES, CloudPlayback};
pub use endpoint::{Endpoint, EndpointConfig, Endpointer};
pub use microphone::MicrophoneCapture;
pub use playback::{AudioPlayback, decode_mp3};
pub use silent::SilentPlayback;
pub use stt::SpeechToText;
pub use system::{SpeechTool, SystemPlayback, parse_espeak_voices, parse_say_voices};
pub use tts::TextToSpeech;

/// Speaking rate relative to the platform default
pub const SPEECH_RATE: f32 = 0.9;

/// Pitch relative to the platform default
pub const SPEECH_PITCH: f32 = 1.1;

/// Output volume (0.0 to 1.0)
pub const SPEECH_VOLUME: f32 = 0.8;

/// Voice name fragments known to sound better than most defaults
pub const PREFERRED_VOICES: &[&str] = &["Google", "Microsoft", "Alex", "Samantha"];

/// Sending half of the capability event channel
pub type EventSink = mpsc::UnboundedSender<Event>;

/// Receiving half of the capability event channel
pub type EventStream = mpsc::UnboundedReceiver<Event>;

/// Create a capability event channel
#[must_use]
pub fn event_channel() -> (EventSink, EventStream) {
    mpsc::unbounded_channel()
}

/// Event delivered by a capability backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Progress of a capture session
    Capture {
        /// Session the event belongs to
        session: u64,
        /// What happened
        event: CaptureEvent,
    },
    /// Progress of an utterance
    Playback {
        /// Utterance the event belongs to
        utterance: u64,
        /// What happened
        event: PlaybackEvent,
    },
}

/// Capture session lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Microphone is open
    Started,
    /// Final transcript for the session
    Result(String),
    /// Recognition failed (includes "no speech detected")
    Error(String),
    /// Session is over; always the last event of a session
    Ended,
}

/// Utterance lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    /// Audio started
    Started,
    /// Audio finished or was cancelled
    Ended,
    /// Synthesis or output failed
    Error(String),
}

/// Tags capture events with their session before sending
#[derive(Debug, Clone)]
pub struct CaptureReporter {
    session: u64,
    sink: EventSink,
}

impl CaptureReporter {
    /// Create a reporter for one session
    #[must_use]
    pub const fn new(session: u64, sink: EventSink) -> Self {
        Self { session, sink }
    }

    /// Send an event; a closed channel means nobody is listening any more
    pub fn send(&self, event: CaptureEvent) {
        let event = Event::Capture {
            session: self.session,
            event,
        };
        if self.sink.send(event).is_err() {
            tracing::trace!(session = self.session, "capture event dropped, receiver closed");
        }
    }
}

/// Tags playback events with their utterance before sending
#[derive(Debug, Clone)]
pub struct PlaybackReporter {
    utterance: u64,
    sink: EventSink,
}

impl PlaybackReporter {
    /// Create a reporter for one utterance
    #[must_use]
    pub const fn new(utterance: u64, sink: EventSink) -> Self {
        Self { utterance, sink }
    }

    /// Send an event; a closed channel means nobody is listening any more
    pub fn send(&self, event: PlaybackEvent) {
        let event = Event::Playback {
            utterance: self.utterance,
            event,
        };
        if self.sink.send(event).is_err() {
            tracing::trace!(utterance = self.utterance, "playback event dropped, receiver closed");
        }
    }
}

/// Speech-to-text capability
pub trait SpeechCapture: Send {
    /// Whether capture can work on this system at all
    fn is_available(&self) -> bool;

    /// Begin a capture session
    ///
    /// The backend must report `Ended` exactly once per accepted session.
    ///
    /// # Errors
    ///
    /// Returns error if the session cannot be started
    fn start(&mut self, session: u64, events: EventSink) -> Result<()>;

    /// Terminate the current session, if any
    fn stop(&mut self);
}

/// Text-to-speech capability
pub trait SpeechPlayback: Send {
    /// Voices the backend can speak with, in platform order
    fn voices(&self) -> Vec<Voice>;

    /// Whether an utterance is currently playing
    fn is_speaking(&self) -> bool;

    /// Begin speaking an utterance
    ///
    /// # Errors
    ///
    /// Returns error if playback cannot be started
    fn speak(&mut self, id: u64, utterance: Utterance, events: EventSink) -> Result<()>;

    /// Cancel the current utterance, if any
    fn cancel(&mut self);
}

/// A synthesis voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    /// Display name, as reported by the platform
    pub name: String,
    /// Language tag, when known
    pub language: Option<String>,
}

impl Voice {
    /// Create a voice with no language information
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            language: None,
        }
    }
}

/// Text to speak with its fixed playback parameters
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// `None` means the platform default voice
    pub voice: Option<Voice>,
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Utterance {
    /// Build an utterance with the standard rate, pitch and volume
    #[must_use]
    pub fn new(text: impl Into<String>, voice: Option<Voice>) -> Self {
        Self {
            text: text.into(),
            voice,
            rate: SPEECH_RATE,
            pitch: SPEECH_PITCH,
            volume: SPEECH_VOLUME,
        }
    }
}

/// Pick the first voice whose name contains a preferred fragment
///
/// Returns `None` when no voice matches, meaning the platform default.
#[must_use]
pub fn select_voice(voices: &[Voice]) -> Option<&Voice> {
    voices.iter().find(|voice| {
        PREFERRED_VOICES
            .iter()
            .any(|fragment| voice.name.contains(fragment))
    })
}
