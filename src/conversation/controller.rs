//! The conversation controller

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::Instant;

use super::message::Message;
use super::status::{Status, StatusKind};
use super::transcript::Transcript;
use super::{
    CAPTURE_UNSUPPORTED_STATUS, CONNECTION_ERROR_STATUS, Capabilities, ControllerSettings,
    InteractionState, LISTENING_BUSY_STATUS, LISTENING_STATUS, REPLY_BUSY_STATUS, SPEAKING_STATUS,
    THINKING_STATUS, Update,
};
use crate::client::ChatClient;
use crate::db::KeyValueStore;
use crate::voice::{
    CaptureEvent, Event, EventSink, PlaybackEvent, SpeechCapture, SpeechPlayback, Utterance,
    select_voice,
};

/// Capacity of the update broadcast; slow subscribers skip ahead
const UPDATE_CAPACITY: usize = 64;

/// Coordinates capture, the remote call and playback
///
/// All transitions happen through `&mut self`, so at most one of the three
/// activities is ever in flight. The remote call is awaited inline: while a
/// reply is pending no other operation can reach the controller.
pub struct ConversationController {
    capture: Box<dyn SpeechCapture>,
    capture_available: bool,
    playback: Box<dyn SpeechPlayback>,
    client: Arc<dyn ChatClient>,
    events: EventSink,
    store: Box<dyn KeyValueStore>,
    settings: ControllerSettings,
    transcript: Transcript,
    state: InteractionState,
    status: Option<Status>,
    next_session: u64,
    active_session: Option<u64>,
    next_utterance: u64,
    active_utterance: Option<u64>,
    updates: broadcast::Sender<Update>,
}

impl ConversationController {
    /// Create a controller, restoring any stored transcript
    #[must_use]
    pub fn new(
        capabilities: Capabilities,
        store: Box<dyn KeyValueStore>,
        settings: ControllerSettings,
    ) -> Self {
        let Capabilities {
            capture,
            playback,
            client,
            events,
        } = capabilities;

        let greeting = Message::bot(settings.greeting.clone());
        let transcript = Transcript::load(&*store, &settings.storage_key, greeting);
        let capture_available = capture.is_available();

        let status = if capture_available {
            None
        } else {
            tracing::info!("speech capture unavailable, voice input disabled");
            Some(Status::persistent(StatusKind::Error, CAPTURE_UNSUPPORTED_STATUS))
        };

        let (updates, _) = broadcast::channel(UPDATE_CAPACITY);

        Self {
            capture,
            capture_available,
            playback,
            client,
            events,
            store,
            settings,
            transcript,
            state: InteractionState::Idle,
            status,
            next_session: 0,
            active_session: None,
            next_utterance: 0,
            active_utterance: None,
            updates,
        }
    }

    #[must_use]
    pub const fn state(&self) -> InteractionState {
        self.state
    }

    #[must_use]
    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    #[must_use]
    pub const fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    #[must_use]
    pub const fn is_capture_available(&self) -> bool {
        self.capture_available
    }

    /// Receive every subsequent [`Update`]
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Update> {
        self.updates.subscribe()
    }

    /// Begin listening for speech
    ///
    /// Returns `false` when capture is unavailable or another activity is
    /// running.
    pub fn start_capture(&mut self) -> bool {
        if !self.capture_available {
            tracing::debug!("capture requested but unavailable");
            return false;
        }
        if self.state != InteractionState::Idle {
            tracing::debug!(state = %self.state, "capture request ignored");
            return false;
        }

        self.next_session += 1;
        let session = self.next_session;

        if let Err(e) = self.capture.start(session, self.events.clone()) {
            tracing::warn!(error = %e, session, "failed to start capture");
            self.raise_error(format!("Speech recognition error: {e}"));
            return false;
        }

        self.active_session = Some(session);
        self.set_state(InteractionState::Listening);
        self.set_status(Some(Status::persistent(StatusKind::Listening, LISTENING_STATUS)));
        tracing::debug!(session, "capture started");
        true
    }

    /// Stop listening; no effect unless currently listening
    pub fn stop_capture(&mut self) {
        if self.state != InteractionState::Listening {
            return;
        }

        self.capture.stop();
        if let Some(session) = self.active_session.take() {
            tracing::debug!(session, "capture stopped");
        }
        self.set_state(InteractionState::Idle);
        self.set_status(None);
    }

    /// Submit typed text
    ///
    /// Text arriving while a reply is being spoken cuts that reply off.
    /// Returns `false` if the text is blank or the controller is listening.
    pub async fn submit_text(&mut self, text: &str) -> bool {
        let text = text.trim();
        if text.is_empty() {
            return false;
        }

        match self.state {
            InteractionState::Idle => {}
            InteractionState::Speaking => self.interrupt_playback(),
            InteractionState::Listening => {
                tracing::debug!("text submission rejected while listening");
                self.raise_error(LISTENING_BUSY_STATUS.to_string());
                return false;
            }
            InteractionState::AwaitingReply => {
                tracing::debug!("text submission ignored while awaiting a reply");
                return false;
            }
        }

        self.submit(text.to_string()).await;
        true
    }

    /// Ask a preset question
    ///
    /// Unlike typed text, a preset question never cuts off a reply.
    pub async fn ask(&mut self, question: &str) -> bool {
        match self.state {
            InteractionState::Idle => self.submit_text(question).await,
            InteractionState::Listening => {
                self.raise_error(LISTENING_BUSY_STATUS.to_string());
                false
            }
            InteractionState::AwaitingReply | InteractionState::Speaking => {
                tracing::debug!(state = %self.state, "preset question rejected");
                self.raise_error(REPLY_BUSY_STATUS.to_string());
                false
            }
        }
    }

    /// Apply an event reported by a capability backend
    pub async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Capture { session, event } => self.on_capture(session, event).await,
            Event::Playback { utterance, event } => self.on_playback(utterance, event),
        }
    }

    /// Reset the transcript to the greeting and erase the stored copy
    pub fn clear(&mut self) {
        self.transcript.reset();
        if let Err(e) = self.store.remove(&self.settings.storage_key) {
            tracing::warn!(error = %e, "failed to erase stored transcript");
        }
        tracing::info!("transcript cleared");
        self.notify(Update::Cleared);
    }

    /// Hide a transient status whose deadline has passed
    ///
    /// Returns whether a status was cleared.
    pub fn expire_status(&mut self, now: Instant) -> bool {
        if self.status.as_ref().is_some_and(|s| s.is_expired(now)) {
            self.set_status(None);
            return true;
        }
        false
    }

    /// When the current status is due to clear, if ever
    #[must_use]
    pub fn status_deadline(&self) -> Option<Instant> {
        self.status.as_ref().and_then(|s| s.expires_at)
    }

    /// Stop capture and playback before the controller goes away
    pub fn shutdown(&mut self) {
        if self.state == InteractionState::Listening {
            self.capture.stop();
        }
        self.interrupt_playback();
        self.active_session = None;
        self.set_state(InteractionState::Idle);
    }

    async fn on_capture(&mut self, session: u64, event: CaptureEvent) {
        if self.state != InteractionState::Listening || self.active_session != Some(session) {
            tracing::trace!(session, ?event, "stale capture event ignored");
            return;
        }

        match event {
            CaptureEvent::Started => tracing::debug!(session, "microphone open"),
            CaptureEvent::Result(text) => {
                let text = text.trim();
                if text.is_empty() {
                    tracing::debug!(session, "empty capture result ignored");
                    return;
                }
                self.active_session = None;
                self.submit(text.to_string()).await;
            }
            CaptureEvent::Error(detail) => {
                tracing::warn!(session, error = %detail, "speech recognition error");
                self.active_session = None;
                self.set_state(InteractionState::Idle);
                self.raise_error(format!("Speech recognition error: {detail}"));
            }
            CaptureEvent::Ended => {
                tracing::debug!(session, "capture ended without a result");
                self.active_session = None;
                self.set_state(InteractionState::Idle);
                self.set_status(None);
            }
        }
    }

    fn on_playback(&mut self, utterance: u64, event: PlaybackEvent) {
        if self.state != InteractionState::Speaking || self.active_utterance != Some(utterance) {
            tracing::trace!(utterance, ?event, "stale playback event ignored");
            return;
        }

        match event {
            PlaybackEvent::Started => {
                self.set_status(Some(Status::persistent(StatusKind::Speaking, SPEAKING_STATUS)));
            }
            PlaybackEvent::Ended => {
                tracing::debug!(utterance, "playback finished");
                self.finish_playback();
            }
            PlaybackEvent::Error(detail) => {
                tracing::warn!(utterance, error = %detail, "speech playback error");
                self.finish_playback();
            }
        }
    }

    async fn submit(&mut self, text: String) {
        self.append(Message::user(text.clone()));
        self.transcript.set_typing(true);
        self.notify(Update::Typing(true));
        self.set_state(InteractionState::AwaitingReply);
        self.set_status(Some(Status::persistent(StatusKind::Processing, THINKING_STATUS)));

        let reply = self.client.send(&text).await;

        self.transcript.set_typing(false);
        self.notify(Update::Typing(false));

        match reply {
            Ok(reply) => {
                self.append(Message::bot(reply.clone()));
                self.speak(reply);
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                self.append(Message::bot(self.settings.fallback_reply.clone()));
                self.set_state(InteractionState::Idle);
                self.raise_error(CONNECTION_ERROR_STATUS.to_string());
            }
        }
    }

    fn speak(&mut self, text: String) {
        if self.playback.is_speaking() {
            self.playback.cancel();
        }

        self.next_utterance += 1;
        let id = self.next_utterance;
        let voice = select_voice(&self.playback.voices()).cloned();
        tracing::debug!(utterance = id, voice = ?voice.as_ref().map(|v| &v.name), "speaking reply");

        match self
            .playback
            .speak(id, Utterance::new(text, voice), self.events.clone())
        {
            Ok(()) => {
                self.active_utterance = Some(id);
                self.set_state(InteractionState::Speaking);
            }
            Err(e) => {
                tracing::warn!(error = %e, utterance = id, "failed to start playback");
                self.set_state(InteractionState::Idle);
                self.set_status(None);
            }
        }
    }

    fn interrupt_playback(&mut self) {
        if let Some(utterance) = self.active_utterance.take() {
            tracing::debug!(utterance, "playback interrupted");
            self.playback.cancel();
        }
    }

    fn finish_playback(&mut self) {
        self.active_utterance = None;
        self.set_state(InteractionState::Idle);
        self.set_status(None);
    }

    fn append(&mut self, message: Message) {
        self.transcript.push(message.clone());
        if let Err(e) = self.transcript.save(&*self.store, &self.settings.storage_key) {
            tracing::warn!(error = %e, "failed to persist transcript");
        }
        self.notify(Update::Message(message));
    }

    fn raise_error(&mut self, text: String) {
        let status = Status::transient(
            StatusKind::Error,
            text,
            Instant::now(),
            self.settings.status_timeout,
        );
        self.set_status(Some(status));
    }

    fn set_state(&mut self, state: InteractionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(from = %self.state, to = %state, "state transition");
        self.state = state;
        self.notify(Update::State(state));
    }

    fn set_status(&mut self, status: Option<Status>) {
        if self.status == status {
            return;
        }
        self.status = status.clone();
        self.notify(Update::Status(status));
    }

    fn notify(&self, update: Update) {
        // No subscribers is fine
        let _ = self.updates.send(update);
    }
}
