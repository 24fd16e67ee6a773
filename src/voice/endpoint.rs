//! Utterance endpointing
//!
//! Decides when a microphone session holds a complete utterance using
//! frame energy alone. Runs before transcription so silence never reaches
//! the STT provider.

use super::capture::{SAMPLE_RATE, rms_energy};

/// Thresholds for endpointing, in samples at [`SAMPLE_RATE`]
#[derive(Debug, Clone, Copy)]
pub struct EndpointConfig {
    /// RMS energy above which a chunk counts as speech
    pub energy_threshold: f32,
    /// Speech needed before trailing silence may end the utterance
    pub min_speech_samples: usize,
    /// Silence after speech that ends the utterance
    pub trailing_silence_samples: usize,
    /// Give up if no speech starts within this many samples
    pub no_speech_samples: usize,
    /// Hard cap on session length
    pub max_samples: usize,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        let per_sec = SAMPLE_RATE as usize;
        Self {
            energy_threshold: 0.03,
            min_speech_samples: per_sec * 3 / 10,
            trailing_silence_samples: per_sec * 8 / 10,
            no_speech_samples: per_sec * 5,
            max_samples: per_sec * 15,
        }
    }
}

/// Outcome of feeding a chunk to the endpointer
#[derive(Debug, Clone, PartialEq)]
pub enum Endpoint {
    /// Keep listening
    Pending,
    /// Utterance finished; contains every sample since speech began
    Complete(Vec<f32>),
    /// Timed out without usable speech
    NoSpeech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Speaking,
}

/// Energy-based endpoint detector
pub struct Endpointer {
    config: EndpointConfig,
    phase: Phase,
    buffer: Vec<f32>,
    speech_samples: usize,
    silence_samples: usize,
    elapsed: usize,
}

impl Endpointer {
    /// Create an endpointer with the given thresholds
    #[must_use]
    pub const fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            phase: Phase::Waiting,
            buffer: Vec::new(),
            speech_samples: 0,
            silence_samples: 0,
            elapsed: 0,
        }
    }

    /// Feed the next chunk of samples
    pub fn process(&mut self, chunk: &[f32]) -> Endpoint {
        if chunk.is_empty() {
            return Endpoint::Pending;
        }

        self.elapsed += chunk.len();
        let is_speech = rms_energy(chunk) > self.config.energy_threshold;

        match self.phase {
            Phase::Waiting => {
                if is_speech {
                    self.phase = Phase::Speaking;
                    self.buffer.clear();
                    self.buffer.extend_from_slice(chunk);
                    self.speech_samples = chunk.len();
                    self.silence_samples = 0;
                    tracing::trace!("speech onset");
                } else if self.elapsed >= self.config.no_speech_samples {
                    return Endpoint::NoSpeech;
                }
            }
            Phase::Speaking => {
                self.buffer.extend_from_slice(chunk);
                if is_speech {
                    self.speech_samples += chunk.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += chunk.len();
                }

                if self.silence_samples >= self.config.trailing_silence_samples {
                    if self.speech_samples >= self.config.min_speech_samples {
                        return Endpoint::Complete(std::mem::take(&mut self.buffer));
                    }
                    // Too short to be speech (a click or a cough)
                    tracing::trace!(samples = self.speech_samples, "discarding short burst");
                    self.phase = Phase::Waiting;
                    self.buffer.clear();
                    self.speech_samples = 0;
                    self.silence_samples = 0;
                }
            }
        }

        if self.elapsed >= self.config.max_samples {
            return if self.phase == Phase::Speaking
                && self.speech_samples >= self.config.min_speech_samples
            {
                Endpoint::Complete(std::mem::take(&mut self.buffer))
            } else {
                Endpoint::NoSpeech
            };
        }

        Endpoint::Pending
    }
}

impl Default for Endpointer {
    fn default() -> Self {
        Self::new(EndpointConfig::default())
    }
}
