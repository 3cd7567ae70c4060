//! Utterance endpointing
//!
//! Decides when a microphone capture cycle has heard a complete utterance.
//! Uses local RMS energy only: speech starts when energy crosses a threshold
//! and ends after a run of trailing silence.

use super::capture::SAMPLE_RATE;

/// Minimum audio energy threshold to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// Minimum duration of speech to count as an utterance (0.3s at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Endpointing limits, in samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Trailing silence that closes an utterance
    pub silence_samples: usize,

    /// Silence before any speech after which the cycle reports no speech
    pub no_speech_samples: usize,

    /// Hard cap on the whole cycle, waiting included
    pub max_samples: usize,
}

impl EndpointConfig {
    /// Build limits from durations at the capture sample rate
    ///
    /// Oversized durations saturate instead of overflowing.
    #[must_use]
    pub fn from_durations(silence_ms: u64, no_speech_secs: u64, max_listen_secs: u64) -> Self {
        let rate = u64::from(SAMPLE_RATE);
        let samples = |n: u64| usize::try_from(n).unwrap_or(usize::MAX);
        Self {
            silence_samples: samples(silence_ms.saturating_mul(rate) / 1000),
            no_speech_samples: samples(no_speech_secs.saturating_mul(rate)),
            max_samples: samples(max_listen_secs.saturating_mul(rate)),
        }
    }
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::from_durations(800, 5, 10)
    }
}

/// Outcome of feeding a block of samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Keep listening
    Pending,
    /// An utterance is ready in the speech buffer
    Complete,
    /// Nothing was said before the no-speech timeout
    NoSpeech,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Speaking,
}

/// Tracks speech activity across one capture cycle
#[derive(Debug)]
pub struct Endpointer {
    config: EndpointConfig,
    phase: Phase,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
    waited: usize,
    elapsed: usize,
}

impl Endpointer {
    /// Create an endpointer for one cycle
    #[must_use]
    pub const fn new(config: EndpointConfig) -> Self {
        Self {
            config,
            phase: Phase::Waiting,
            speech_buffer: Vec::new(),
            silence_counter: 0,
            waited: 0,
            elapsed: 0,
        }
    }

    /// Feed captured samples
    pub fn push(&mut self, samples: &[f32]) -> Endpoint {
        if samples.is_empty() {
            return Endpoint::Pending;
        }

        self.elapsed = self.elapsed.saturating_add(samples.len());

        let energy = calculate_energy(samples);
        let is_speech = energy > ENERGY_THRESHOLD;

        match self.phase {
            Phase::Waiting => {
                if is_speech {
                    self.phase = Phase::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech started");
                } else {
                    self.waited += samples.len();
                    if self.waited >= self.config.no_speech_samples {
                        tracing::debug!(waited = self.waited, "no speech before timeout");
                        return Endpoint::NoSpeech;
                    }
                }
            }
            Phase::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > self.config.silence_samples {
                    if self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter {
                        tracing::debug!(samples = self.speech_buffer.len(), "utterance complete");
                        return Endpoint::Complete;
                    }

                    // A click or breath, not speech
                    self.waited += self.speech_buffer.len();
                    self.speech_buffer.clear();
                    self.silence_counter = 0;
                    self.phase = Phase::Waiting;
                }
            }
        }

        if self.elapsed >= self.config.max_samples {
            tracing::debug!(elapsed = self.elapsed, "capture cycle hit length cap");
            return if self.phase == Phase::Speaking {
                Endpoint::Complete
            } else {
                Endpoint::NoSpeech
            };
        }

        Endpoint::Pending
    }

    /// Take the buffered utterance
    pub fn take_speech(&mut self) -> Vec<f32> {
        std::mem::take(&mut self.speech_buffer)
    }

    /// Whether speech has started in this cycle
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.phase == Phase::Speaking
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
pub(crate) fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: usize = 1600;

    fn loud() -> Vec<f32> {
        vec![0.3; BLOCK]
    }

    fn quiet() -> Vec<f32> {
        vec![0.0; BLOCK]
    }

    #[test]
    fn test_energy_calculation() {
        assert!(calculate_energy(&quiet()) < 0.001);
        assert!(calculate_energy(&[0.5f32; 100]) > 0.4);
        assert!(calculate_energy(&[]) < f32::EPSILON);
    }

    #[test]
    fn test_utterance_completes_after_silence() {
        let mut endpointer = Endpointer::new(EndpointConfig::default());

        for _ in 0..10 {
            assert_eq!(endpointer.push(&loud()), Endpoint::Pending);
        }
        assert!(endpointer.is_speaking());

        let mut outcome = Endpoint::Pending;
        for _ in 0..20 {
            outcome = endpointer.push(&quiet());
            if outcome != Endpoint::Pending {
                break;
            }
        }

        assert_eq!(outcome, Endpoint::Complete);
        assert!(endpointer.take_speech().len() >= BLOCK * 10);
    }

    #[test]
    fn test_no_speech_timeout() {
        let config = EndpointConfig::from_durations(800, 1, 10);
        let mut endpointer = Endpointer::new(config);

        let mut outcome = Endpoint::Pending;
        for _ in 0..20 {
            outcome = endpointer.push(&quiet());
            if outcome != Endpoint::Pending {
                break;
            }
        }

        assert_eq!(outcome, Endpoint::NoSpeech);
    }

    #[test]
    fn test_length_cap() {
        let config = EndpointConfig::from_durations(800, 5, 1);
        let mut endpointer = Endpointer::new(config);

        let mut outcome = Endpoint::Pending;
        for _ in 0..20 {
            outcome = endpointer.push(&loud());
            if outcome != Endpoint::Pending {
                break;
            }
        }

        assert_eq!(outcome, Endpoint::Complete);
    }

    #[test]
    fn test_cap_counts_time_spent_waiting() {
        let mut endpointer = Endpointer::new(EndpointConfig::from_durations(800, 5, 10));

        for _ in 0..45 {
            assert_eq!(endpointer.push(&quiet()), Endpoint::Pending);
        }

        let mut fed = BLOCK * 45;
        let outcome = loop {
            fed += BLOCK;
            match endpointer.push(&loud()) {
                Endpoint::Pending => assert!(fed < 16000 * 10, "cycle ran past the cap"),
                done => break done,
            }
        };

        assert_eq!(outcome, Endpoint::Complete);
        assert_eq!(fed, 16000 * 10);
        assert_eq!(endpointer.take_speech().len(), BLOCK * 55);
    }

    #[test]
    fn test_cap_without_speech_is_no_speech() {
        let mut endpointer = Endpointer::new(EndpointConfig::from_durations(800, 30, 2));

        let mut outcome = Endpoint::Pending;
        for _ in 0..20 {
            outcome = endpointer.push(&quiet());
            if outcome != Endpoint::Pending {
                break;
            }
        }

        assert_eq!(outcome, Endpoint::NoSpeech);
    }

    #[test]
    fn test_huge_durations_saturate() {
        let config = EndpointConfig::from_durations(u64::MAX, u64::MAX, u64::MAX);
        assert!(config.silence_samples > 0);
        assert_eq!(config.max_samples, usize::MAX);
    }

    #[test]
    fn test_short_blip_is_ignored() {
        let mut endpointer = Endpointer::new(EndpointConfig::default());

        endpointer.push(&loud());
        for _ in 0..10 {
            assert_eq!(endpointer.push(&quiet()), Endpoint::Pending);
        }

        assert!(!endpointer.is_speaking());
    }
}
