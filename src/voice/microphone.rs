//! Microphone capture backend
//!
//! Each session runs on its own thread: open the input device, endpoint the
//! utterance, then transcribe it on the tokio runtime that started the
//! session. Progress is reported through a [`CaptureReporter`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::capture::{AudioCapture, SAMPLE_RATE, encode_wav, input_device_available};
use super::endpoint::{Endpoint, EndpointConfig, Endpointer};
use super::stt::SpeechToText;
use super::{CaptureEvent, CaptureReporter, EventSink, SpeechCapture};
use crate::{Error, Result};

/// How often the capture thread drains the input buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct ActiveSession {
    session: u64,
    stop: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
}

/// Captures one utterance per session from the default microphone
pub struct MicrophoneCapture {
    stt: Option<Arc<SpeechToText>>,
    endpoint: EndpointConfig,
    active: Option<ActiveSession>,
}

impl MicrophoneCapture {
    /// Create a capture backend
    ///
    /// Without a transcriber the backend reports itself unavailable.
    #[must_use]
    pub fn new(stt: Option<SpeechToText>, endpoint: EndpointConfig) -> Self {
        Self {
            stt: stt.map(Arc::new),
            endpoint,
            active: None,
        }
    }

    fn is_busy(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| !a.finished.load(Ordering::Acquire))
    }
}

impl SpeechCapture for MicrophoneCapture {
    fn is_available(&self) -> bool {
        self.stt.is_some() && input_device_available()
    }

    fn start(&mut self, session: u64, events: EventSink) -> Result<()> {
        let stt = self.stt.clone().ok_or_else(|| {
            Error::CaptureUnavailable("no transcription provider configured".to_string())
        })?;

        if self.is_busy() {
            return Err(Error::Capture("a capture session is already running".to_string()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Capture(format!("no async runtime: {e}")))?;

        let stop = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let reporter = CaptureReporter::new(session, events);
        let endpoint = self.endpoint;

        {
            let stop = Arc::clone(&stop);
            let finished = Arc::clone(&finished);
            std::thread::Builder::new()
                .name(format!("capture-{session}"))
                .spawn(move || {
                    let outcome = run_session(&reporter, &stop, endpoint, &stt, &runtime);
                    finish_session(&reporter, &finished, outcome);
                })?;
        }

        tracing::debug!(session, "capture session started");
        self.active = Some(ActiveSession {
            session,
            stop,
            finished,
        });
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.stop.store(true, Ordering::Release);
            tracing::debug!(session = active.session, "capture session stop requested");
        }
    }
}

/// Mark the session finished, then report its outcome and `Ended`
///
/// A new session may start as soon as the outcome is observed.
fn finish_session(
    reporter: &CaptureReporter,
    finished: &AtomicBool,
    outcome: Option<CaptureEvent>,
) {
    finished.store(true, Ordering::Release);
    if let Some(event) = outcome {
        reporter.send(event);
    }
    reporter.send(CaptureEvent::Ended);
}

/// Record, endpoint, and transcribe one utterance
///
/// Returns the `Result` or `Error` event to report, or `None` if stopped.
fn run_session(
    reporter: &CaptureReporter,
    stop: &AtomicBool,
    endpoint: EndpointConfig,
    stt: &SpeechToText,
    runtime: &tokio::runtime::Handle,
) -> Option<CaptureEvent> {
    let mut capture = match AudioCapture::new().and_then(|mut c| c.start().map(|()| c)) {
        Ok(capture) => capture,
        Err(e) => {
            tracing::warn!(error = %e, "failed to open microphone");
            return Some(CaptureEvent::Error("audio-capture".to_string()));
        }
    };
    reporter.send(CaptureEvent::Started);

    let mut endpointer = Endpointer::new(endpoint);
    let samples = loop {
        std::thread::sleep(POLL_INTERVAL);

        if stop.load(Ordering::Acquire) {
            tracing::debug!("capture aborted");
            return None;
        }

        match endpointer.process(&capture.take_buffer()) {
            Endpoint::Pending => {}
            Endpoint::Complete(samples) => break samples,
            Endpoint::NoSpeech => return Some(CaptureEvent::Error("no-speech".to_string())),
        }
    };
    capture.stop();

    #[allow(clippy::cast_precision_loss)]
    let seconds = samples.len() as f32 / SAMPLE_RATE as f32;
    tracing::debug!(seconds, "utterance captured");

    let transcript = encode_wav(&samples, SAMPLE_RATE)
        .and_then(|wav| runtime.block_on(stt.transcribe(&wav)));

    if stop.load(Ordering::Acquire) {
        return None;
    }

    match transcript {
        Ok(text) => Some(CaptureEvent::Result(text)),
        Err(e) => {
            tracing::warn!(error = %e, "transcription failed");
            Some(CaptureEvent::Error("network".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::{Event, event_channel};

    #[test]
    fn session_is_finished_before_outcome_is_reported() {
        let (sink, mut events) = event_channel();
        let reporter = CaptureReporter::new(3, sink);
        let finished = Arc::new(AtomicBool::new(false));

        let worker = {
            let finished = Arc::clone(&finished);
            std::thread::spawn(move || {
                let outcome = Some(CaptureEvent::Error("no-speech".to_string()));
                finish_session(&reporter, &finished, outcome);
            })
        };

        let first = events.blocking_recv().unwrap();
        assert!(finished.load(Ordering::Acquire));
        assert_eq!(
            first,
            Event::Capture {
                session: 3,
                event: CaptureEvent::Error("no-speech".to_string()),
            }
        );

        worker.join().unwrap();
        assert_eq!(
            events.blocking_recv().unwrap(),
            Event::Capture {
                session: 3,
                event: CaptureEvent::Ended,
            }
        );
    }

    #[test]
    fn finished_session_does_not_block_the_next() {
        let mut capture = MicrophoneCapture::new(None, EndpointConfig::default());
        capture.active = Some(ActiveSession {
            session: 1,
            stop: Arc::new(AtomicBool::new(false)),
            finished: Arc::new(AtomicBool::new(false)),
        });
        assert!(capture.is_busy());

        if let Some(active) = &capture.active {
            active.finished.store(true, Ordering::Release);
        }
        assert!(!capture.is_busy());
    }
}
