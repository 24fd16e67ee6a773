//! System speech playback through `say` or `espeak-ng`

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::oneshot;

use super::{EventSink, PlaybackEvent, PlaybackReporter, SpeechPlayback, Utterance, Voice};
use crate::{Error, Result};

/// Words per minute both tools treat as normal speed
const BASE_WORDS_PER_MINUTE: f32 = 175.0;

/// A speech synthesizer found on `PATH`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechTool {
    /// macOS `say`
    Say(PathBuf),
    /// `espeak-ng` or legacy `espeak`
    Espeak(PathBuf),
}

impl SpeechTool {
    /// Find the first supported tool on `PATH`
    #[must_use]
    pub fn detect() -> Option<Self> {
        which::which("say")
            .map(Self::Say)
            .or_else(|_| which::which("espeak-ng").map(Self::Espeak))
            .or_else(|_| which::which("espeak").map(Self::Espeak))
            .ok()
    }

    const fn path(&self) -> &PathBuf {
        match self {
            Self::Say(path) | Self::Espeak(path) => path,
        }
    }

    /// Ask the tool which voices it has
    fn list_voices(&self) -> Vec<Voice> {
        let output = match self {
            Self::Say(path) => std::process::Command::new(path).args(["-v", "?"]).output(),
            Self::Espeak(path) => std::process::Command::new(path).arg("--voices").output(),
        };

        let listing = match output {
            Ok(output) if output.status.success() => {
                String::from_utf8_lossy(&output.stdout).into_owned()
            }
            Ok(output) => {
                tracing::warn!(status = %output.status, "voice listing failed");
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to run voice listing");
                return Vec::new();
            }
        };

        match self {
            Self::Say(_) => parse_say_voices(&listing),
            Self::Espeak(_) => parse_espeak_voices(&listing),
        }
    }

    /// Command-line arguments that speak `utterance`
    #[must_use]
    pub fn arguments(&self, utterance: &Utterance) -> Vec<String> {
        let wpm = words_per_minute(utterance.rate);
        match self {
            Self::Say(_) => {
                let mut args = vec!["-r".to_string(), wpm.to_string()];
                if let Some(voice) = &utterance.voice {
                    args.push("-v".to_string());
                    args.push(voice.name.clone());
                }
                // `say` has no volume flag but honors embedded commands
                args.push(format!(
                    "[[volm {:.2}]] {}",
                    utterance.volume.clamp(0.0, 1.0),
                    strip_embedded_commands(&utterance.text)
                ));
                args
            }
            Self::Espeak(_) => {
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let pitch = (50.0 * utterance.pitch).round().clamp(0.0, 99.0) as u32;
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let amplitude = (100.0 * utterance.volume).round().clamp(0.0, 200.0) as u32;

                let mut args = vec![
                    "-s".to_string(),
                    wpm.to_string(),
                    "-p".to_string(),
                    pitch.to_string(),
                    "-a".to_string(),
                    amplitude.to_string(),
                ];
                if let Some(voice) = &utterance.voice {
                    args.push("-v".to_string());
                    args.push(voice.language.clone().unwrap_or_else(|| voice.name.clone()));
                }
                args.push("--".to_string());
                args.push(utterance.text.clone());
                args
            }
        }
    }
}

/// Remove brackets so reply text cannot open a `say` `[[...]]` command
fn strip_embedded_commands(text: &str) -> String {
    text.replace(['[', ']'], "")
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn words_per_minute(rate: f32) -> u32 {
    (BASE_WORDS_PER_MINUTE * rate).round().max(1.0) as u32
}

/// Parse `say -v ?` output
///
/// Lines look like `Alex    en_US    # Most people recognize me by my voice.`
#[must_use]
pub fn parse_say_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .filter_map(|line| {
            let head = line.split('#').next()?.trim();
            let mut tokens: Vec<&str> = head.split_whitespace().collect();
            if tokens.len() < 2 {
                return None;
            }
            let language = tokens.pop()?;
            Some(Voice {
                name: tokens.join(" "),
                language: Some(language.to_string()),
            })
        })
        .collect()
}

/// Parse `espeak-ng --voices` output
///
/// Columns: `Pty Language Age/Gender VoiceName File Other Languages`.
#[must_use]
pub fn parse_espeak_voices(output: &str) -> Vec<Voice> {
    output
        .lines()
        .skip(1)
        .filter_map(|line| {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.as_slice() {
                [_, language, _, name, ..] => Some(Voice {
                    name: (*name).to_string(),
                    language: Some((*language).to_string()),
                }),
                _ => None,
            }
        })
        .collect()
}

struct Speaking {
    id: u64,
    cancel: Option<oneshot::Sender<()>>,
    active: Arc<AtomicBool>,
}

/// Speaks with the platform's command-line synthesizer
pub struct SystemPlayback {
    tool: SpeechTool,
    voices: Vec<Voice>,
    current: Option<Speaking>,
}

impl SystemPlayback {
    /// Use the given tool, listing its voices once up front
    #[must_use]
    pub fn new(tool: SpeechTool) -> Self {
        let voices = tool.list_voices();
        tracing::debug!(tool = ?tool, voices = voices.len(), "system playback initialized");
        Self {
            tool,
            voices,
            current: None,
        }
    }

    /// Detect a synthesizer on `PATH`
    ///
    /// # Errors
    ///
    /// Returns error if neither `say` nor `espeak` is installed
    pub fn detect() -> Result<Self> {
        SpeechTool::detect().map(Self::new).ok_or_else(|| {
            Error::Playback("no speech synthesizer found (install espeak-ng)".to_string())
        })
    }
}

impl SpeechPlayback for SystemPlayback {
    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn is_speaking(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|s| s.active.load(Ordering::Acquire))
    }

    fn speak(&mut self, id: u64, utterance: Utterance, events: EventSink) -> Result<()> {
        self.cancel();

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Playback(format!("no async runtime: {e}")))?;
        let _guard = runtime.enter();

        let mut child = tokio::process::Command::new(self.tool.path())
            .args(self.tool.arguments(&utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Playback(format!("failed to start synthesizer: {e}")))?;

        let reporter = PlaybackReporter::new(id, events);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let active = Arc::new(AtomicBool::new(true));

        reporter.send(PlaybackEvent::Started);

        let task_active = Arc::clone(&active);
        runtime.spawn(async move {
            tokio::select! {
                status = child.wait() => match status {
                    Ok(status) if status.success() => reporter.send(PlaybackEvent::Ended),
                    Ok(status) => {
                        tracing::warn!(%status, utterance = id, "synthesizer exited with failure");
                        let detail = format!("synthesizer exited with {status}");
                        reporter.send(PlaybackEvent::Error(detail));
                    }
                    Err(e) => reporter.send(PlaybackEvent::Error(e.to_string())),
                },
                _ = cancel_rx => {
                    if let Err(e) = child.kill().await {
                        tracing::debug!(error = %e, "synthesizer already exited");
                    }
                    reporter.send(PlaybackEvent::Ended);
                }
            }
            task_active.store(false, Ordering::Release);
        });

        self.current = Some(Speaking {
            id,
            cancel: Some(cancel_tx),
            active,
        });
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(mut speaking) = self.current.take() {
            if let Some(tx) = speaking.cancel.take() {
                // The task may already have finished
                let _ = tx.send(());
            }
            tracing::debug!(utterance = speaking.id, "system playback cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_say_voice_listing() {
        let output = "\
Alex                en_US    # Most people recognize me by my voice.
Bad News            en_US    # The light you see at the end of the tunnel is the headlamp.
Eddy (English (US)) en_US    # Hello! My name is Eddy.
";
        let voices = parse_say_voices(output);

        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0].name, "Alex");
        assert_eq!(voices[0].language.as_deref(), Some("en_US"));
        assert_eq!(voices[1].name, "Bad News");
        assert_eq!(voices[2].name, "Eddy (English (US))");
    }

    #[test]
    fn parses_espeak_voice_listing() {
        let output = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  af              --/M      Afrikaans          gmw/af
 2  en-us           --/M      English_(America)  gmw/en-US            (en 10)
";
        let voices = parse_espeak_voices(output);

        assert_eq!(voices.len(), 2);
        assert_eq!(voices[1].name, "English_(America)");
        assert_eq!(voices[1].language.as_deref(), Some("en-us"));
    }

    #[test]
    fn espeak_arguments_scale_parameters() {
        let tool = SpeechTool::Espeak(PathBuf::from("espeak-ng"));
        let args = tool.arguments(&Utterance::new("hi there", None));
        let wpm = words_per_minute(crate::voice::SPEECH_RATE).to_string();

        assert_eq!(
            args,
            vec!["-s", wpm.as_str(), "-p", "55", "-a", "80", "--", "hi there"]
        );
    }

    #[test]
    fn say_arguments_embed_volume_and_voice() {
        let tool = SpeechTool::Say(PathBuf::from("/usr/bin/say"));
        let args = tool.arguments(&Utterance::new("hello", Some(Voice::named("Samantha"))));
        let wpm = words_per_minute(crate::voice::SPEECH_RATE).to_string();

        assert_eq!(
            args,
            vec!["-r", wpm.as_str(), "-v", "Samantha", "[[volm 0.80]] hello"]
        );
    }

    #[test]
    fn say_arguments_drop_embedded_commands_from_text() {
        let tool = SpeechTool::Say(PathBuf::from("/usr/bin/say"));
        let args = tool.arguments(&Utterance::new("wait [[slnc 60000]] [[rate 1]]done", None));

        let text = args.last().unwrap();
        assert_eq!(text.matches("[[").count(), 1);
        assert!(text.starts_with("[[volm 0.80]] "));
        assert!(text.ends_with("wait slnc 60000 rate 1done"));
    }

    #[test]
    fn rate_scales_words_per_minute() {
        assert_eq!(words_per_minute(1.0), 175);
        assert_eq!(words_per_minute(2.0), 350);
        assert_eq!(words_per_minute(0.0), 1);
    }
}
