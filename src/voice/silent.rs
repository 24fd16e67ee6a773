//! Text-only playback

use super::{EventSink, PlaybackEvent, PlaybackReporter, SpeechPlayback, Utterance, Voice};
use crate::Result;

/// Playback that finishes immediately without producing audio
///
/// Used for headless sessions and when no synthesizer is installed.
#[derive(Debug, Default)]
pub struct SilentPlayback;

impl SpeechPlayback for SilentPlayback {
    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn is_speaking(&self) -> bool {
        false
    }

    fn speak(&mut self, id: u64, utterance: Utterance, events: EventSink) -> Result<()> {
        tracing::trace!(utterance = id, chars = utterance.text.len(), "silent playback");
        let reporter = PlaybackReporter::new(id, events);
        reporter.send(PlaybackEvent::Started);
        reporter.send(PlaybackEvent::Ended);
        Ok(())
    }

    fn cancel(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{Event, event_channel};

    #[test]
    fn reports_start_and_end_immediately() {
        let (sink, mut stream) = event_channel();
        let mut playback = SilentPlayback;

        playback.speak(4, Utterance::new("hi", None), sink).unwrap();

        assert_eq!(
            stream.try_recv().unwrap(),
            Event::Playback {
                utterance: 4,
                event: PlaybackEvent::Started,
            }
        );
        assert_eq!(
            stream.try_recv().unwrap(),
            Event::Playback {
                utterance: 4,
                event: PlaybackEvent::Ended,
            }
        );
        assert!(!playback.is_speaking());
    }
}
