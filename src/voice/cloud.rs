//! Cloud speech playback: remote synthesis, local output

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::playback::{AudioPlayback, apply_volume, decode_mp3};
use super::tts::TextToSpeech;
use super::{EventSink, PlaybackEvent, PlaybackReporter, SpeechPlayback, Utterance, Voice};
use crate::{Error, Result};

/// Voices offered by OpenAI-compatible speech APIs
pub const CLOUD_VOICES: &[&str] = &["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

struct Playing {
    id: u64,
    cancel: Arc<AtomicBool>,
    active: Arc<AtomicBool>,
}

/// Speaks through a TTS API and the default output device
///
/// Rate maps to the API's speed parameter and volume scales the decoded
/// samples. The API has no pitch control, so pitch is not applied.
pub struct CloudPlayback {
    tts: Arc<TextToSpeech>,
    current: Option<Playing>,
}

impl CloudPlayback {
    /// Create a cloud playback backend
    #[must_use]
    pub fn new(tts: TextToSpeech) -> Self {
        Self {
            tts: Arc::new(tts),
            current: None,
        }
    }
}

impl SpeechPlayback for CloudPlayback {
    fn voices(&self) -> Vec<Voice> {
        CLOUD_VOICES.iter().map(|name| Voice::named(*name)).collect()
    }

    fn is_speaking(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|p| p.active.load(Ordering::Acquire))
    }

    fn speak(&mut self, id: u64, utterance: Utterance, events: EventSink) -> Result<()> {
        self.cancel();

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Playback(format!("no async runtime: {e}")))?;

        let cancel = Arc::new(AtomicBool::new(false));
        let active = Arc::new(AtomicBool::new(true));
        let reporter = PlaybackReporter::new(id, events);
        let tts = Arc::clone(&self.tts);

        {
            let cancel = Arc::clone(&cancel);
            let active = Arc::clone(&active);
            std::thread::Builder::new()
                .name(format!("playback-{id}"))
                .spawn(move || {
                    match play_utterance(&tts, &utterance, &cancel, &reporter, &runtime) {
                        Ok(()) => reporter.send(PlaybackEvent::Ended),
                        Err(e) => {
                            tracing::warn!(error = %e, utterance = id, "cloud playback failed");
                            reporter.send(PlaybackEvent::Error(e.to_string()));
                        }
                    }
                    active.store(false, Ordering::Release);
                })?;
        }

        self.current = Some(Playing { id, cancel, active });
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(playing) = self.current.take() {
            playing.cancel.store(true, Ordering::Release);
            tracing::debug!(utterance = playing.id, "cloud playback cancelled");
        }
    }
}

fn play_utterance(
    tts: &TextToSpeech,
    utterance: &Utterance,
    cancel: &AtomicBool,
    reporter: &PlaybackReporter,
    runtime: &tokio::runtime::Handle,
) -> Result<()> {
    let voice = utterance.voice.as_ref().map(|v| v.name.as_str());
    let mp3 = runtime.block_on(tts.synthesize(&utterance.text, voice, utterance.rate))?;
    if cancel.load(Ordering::Acquire) {
        return Ok(());
    }

    let mut samples = decode_mp3(&mp3)?;
    apply_volume(&mut samples, utterance.volume);

    let output = AudioPlayback::new()?;
    reporter.send(PlaybackEvent::Started);
    output.play_blocking(samples, cancel)?;
    Ok(())
}
