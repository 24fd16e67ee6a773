//! Shared test utilities

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use voice_chatbot::voice::{
    CaptureEvent, Event, EventSink, EventStream, SpeechCapture, SpeechPlayback, Utterance, Voice,
    event_channel,
};
use voice_chatbot::{
    Capabilities, ChatClient, ControllerSettings, ConversationController, Error, MemoryStore,
    Result,
};

/// Records what the controller asked the capture backend to do
#[derive(Clone, Default)]
pub struct CaptureLog {
    pub started: Arc<Mutex<Vec<u64>>>,
    pub stops: Arc<AtomicUsize>,
    /// Sink handed to the most recent session
    pub sink: Arc<Mutex<Option<EventSink>>>,
}

impl CaptureLog {
    pub fn started(&self) -> Vec<u64> {
        self.started.lock().unwrap().clone()
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Report a capture event for the most recent session
    pub fn emit(&self, event: CaptureEvent) {
        let session = *self.started.lock().unwrap().last().unwrap();
        let sink = self.sink.lock().unwrap();
        sink.as_ref()
            .unwrap()
            .send(Event::Capture { session, event })
            .unwrap();
    }
}

/// Capture backend that never produces events on its own
pub struct FakeCapture {
    pub available: bool,
    pub log: CaptureLog,
}

impl SpeechCapture for FakeCapture {
    fn is_available(&self) -> bool {
        self.available
    }

    fn start(&mut self, session: u64, events: EventSink) -> Result<()> {
        self.log.started.lock().unwrap().push(session);
        *self.log.sink.lock().unwrap() = Some(events);
        Ok(())
    }

    fn stop(&mut self) {
        self.log.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Records what the controller asked the playback backend to do
#[derive(Clone, Default)]
pub struct PlaybackLog {
    pub spoken: Arc<Mutex<Vec<(u64, Utterance)>>>,
    pub cancels: Arc<AtomicUsize>,
    /// What `is_speaking` reports
    pub speaking: Arc<AtomicBool>,
}

impl PlaybackLog {
    pub fn spoken(&self) -> Vec<(u64, Utterance)> {
        self.spoken.lock().unwrap().clone()
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

/// Playback backend that never produces events on its own
pub struct FakePlayback {
    pub voices: Vec<Voice>,
    pub log: PlaybackLog,
}

impl SpeechPlayback for FakePlayback {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn is_speaking(&self) -> bool {
        self.log.speaking.load(Ordering::SeqCst)
    }

    fn speak(&mut self, id: u64, utterance: Utterance, _events: EventSink) -> Result<()> {
        self.log.spoken.lock().unwrap().push((id, utterance));
        Ok(())
    }

    fn cancel(&mut self) {
        self.log.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Chat client answering from a script; an empty script is a failure
#[derive(Default)]
pub struct FakeClient {
    replies: Mutex<VecDeque<Result<String>>>,
    sent: Mutex<Vec<String>>,
}

impl FakeClient {
    pub fn replying(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatClient for FakeClient {
    async fn send(&self, message: &str) -> Result<String> {
        self.sent.lock().unwrap().push(message.to_string());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(Error::Remote("HTTP error! status: 500".to_string())))
    }
}

/// A controller wired to fakes, plus handles to inspect them
pub struct Harness {
    pub controller: ConversationController,
    pub events: EventStream,
    pub capture: CaptureLog,
    pub playback: PlaybackLog,
    pub client: Arc<FakeClient>,
    pub store: MemoryStore,
}

/// Builder for [`Harness`]
pub struct HarnessBuilder {
    capture_available: bool,
    voices: Vec<Voice>,
    client: Arc<dyn ChatClient>,
    fake_client: Arc<FakeClient>,
    store: MemoryStore,
    settings: ControllerSettings,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        let fake_client = Arc::new(FakeClient::default());
        Self {
            capture_available: true,
            voices: Vec::new(),
            client: fake_client.clone(),
            fake_client,
            store: MemoryStore::default(),
            settings: ControllerSettings::for_persona("Test"),
        }
    }

    pub fn replies(mut self, replies: Vec<Result<String>>) -> Self {
        let client = Arc::new(FakeClient::replying(replies));
        self.client = client.clone();
        self.fake_client = client;
        self
    }

    /// Use a real client instead of the scripted one
    pub fn client(mut self, client: Arc<dyn ChatClient>) -> Self {
        self.client = client;
        self
    }

    pub fn capture_available(mut self, available: bool) -> Self {
        self.capture_available = available;
        self
    }

    pub fn voices(mut self, names: &[&str]) -> Self {
        self.voices = names.iter().map(|name| Voice::named(*name)).collect();
        self
    }

    /// Share a store, e.g. to reload a previous session
    pub fn store(mut self, store: MemoryStore) -> Self {
        self.store = store;
        self
    }

    pub fn settings(mut self, settings: ControllerSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Harness {
        let capture = CaptureLog::default();
        let playback = PlaybackLog::default();
        let (sink, events) = event_channel();

        let capabilities = Capabilities {
            capture: Box::new(FakeCapture {
                available: self.capture_available,
                log: capture.clone(),
            }),
            playback: Box::new(FakePlayback {
                voices: self.voices,
                log: playback.clone(),
            }),
            client: self.client,
            events: sink,
        };

        let controller = ConversationController::new(
            capabilities,
            Box::new(self.store.clone()),
            self.settings,
        );

        Harness {
            controller,
            events,
            capture,
            playback,
            client: self.fake_client,
            store: self.store,
        }
    }
}

/// A controller with working capture and the given scripted replies
pub fn harness(replies: Vec<Result<String>>) -> Harness {
    HarnessBuilder::new().replies(replies).build()
}
