//! Speech capture and speech output adapters
//!
//! The controller only sees the [`SpeechCapture`] and [`SpeechOutput`] ports.
//! Microphone recognition goes through local capture, endpointing and a remote
//! STT provider; spoken replies go through a remote TTS provider and local
//! playback.

mod capture;
mod disabled;
mod endpoint;
mod playback;
mod recognizer;
mod speaker;
mod stt;
mod tts;

use std::fmt;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub use capture::{Microphone, SAMPLE_RATE, samples_to_wav};
pub use disabled::Disabled;
pub use endpoint::{Endpoint, EndpointConfig, Endpointer};
pub use playback::Speaker;
pub use recognizer::MicrophoneRecognizer;
pub use speaker::SpeakerOutput;
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

use crate::Result;
use crate::controller::Event;
use crate::session::{Generation, RecognitionResult, VoiceDescriptor};

/// Why a capture cycle failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureErrorKind {
    /// Nothing was said before the timeout
    NoSpeech,
    /// The input device failed
    AudioCapture,
    /// Microphone access was denied
    NotAllowed,
    /// The recognition backend could not be reached
    Network,
    /// The cycle was aborted by the adapter
    Aborted,
    /// Anything else, with the adapter's description
    Other(String),
}

impl fmt::Display for CaptureErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSpeech => f.write_str("no speech detected"),
            Self::AudioCapture => f.write_str("microphone failure"),
            Self::NotAllowed => f.write_str("microphone access denied"),
            Self::Network => f.write_str("speech recognition service unreachable"),
            Self::Aborted => f.write_str("recognition aborted"),
            Self::Other(detail) => f.write_str(detail),
        }
    }
}

/// Lifecycle event of one capture cycle
///
/// At most one `Result` or `Error` fires per cycle and `Ended` always fires last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// Capture has begun
    Started,
    /// Recognized speech
    Result(RecognitionResult),
    /// Recognition failed
    Error(CaptureErrorKind),
    /// The cycle is over
    Ended,
}

/// Notification about one utterance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// The utterance played to the end
    Finished,
    /// The utterance was cancelled or superseded
    Cancelled,
    /// The utterance could not be synthesized or played
    Failed(String),
}

/// Text to speak and the voice to speak it with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Text to synthesize
    pub text: String,

    /// Voice from the catalog; `None` selects the adapter default
    pub voice_id: Option<String>,
}

/// Sink for one capture cycle's events, tagged with the cycle's generation
#[derive(Debug, Clone)]
pub struct CaptureEvents {
    generation: Generation,
    tx: mpsc::UnboundedSender<Event>,
}

impl CaptureEvents {
    /// Create a sink for `generation`
    #[must_use]
    pub const fn new(generation: Generation, tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { generation, tx }
    }

    /// Generation this sink reports under
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Report an event; returns false once the controller has gone away
    pub fn emit(&self, event: CaptureEvent) -> bool {
        self.tx
            .send(Event::Capture {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Sink for one utterance's notifications, tagged with the cycle's generation
#[derive(Debug, Clone)]
pub struct SpeechEvents {
    generation: Generation,
    tx: mpsc::UnboundedSender<Event>,
}

impl SpeechEvents {
    /// Create a sink for `generation`
    #[must_use]
    pub const fn new(generation: Generation, tx: mpsc::UnboundedSender<Event>) -> Self {
        Self { generation, tx }
    }

    /// Generation this sink reports under
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Report an event; returns false once the controller has gone away
    pub fn emit(&self, event: SpeechEvent) -> bool {
        self.tx
            .send(Event::Speech {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Handle to a playing utterance
#[derive(Debug, Clone, Default)]
pub struct UtteranceHandle {
    token: CancellationToken,
}

impl UtteranceHandle {
    /// Create a handle with a fresh token
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop this utterance
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Whether the utterance was cancelled
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Token the adapter watches while playing
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

/// Platform speech recognition
pub trait SpeechCapture: Send + Sync {
    /// Whether recognition can run on this host
    fn is_available(&self) -> bool;

    /// Begin a capture cycle that reports through `events`
    ///
    /// # Errors
    ///
    /// Returns error if the cycle cannot be started
    fn start(&self, events: CaptureEvents) -> Result<()>;

    /// Best-effort stop of the active cycle
    ///
    /// Events may still trail in after this returns.
    fn stop(&self);
}

/// Platform speech synthesis
pub trait SpeechOutput: Send + Sync {
    /// Current voice catalog
    fn voices(&self) -> Vec<VoiceDescriptor>;

    /// Speak an utterance, cancelling any utterance still playing
    ///
    /// # Errors
    ///
    /// Returns error if synthesis cannot be started
    fn speak(&self, utterance: Utterance, events: SpeechEvents) -> Result<UtteranceHandle>;

    /// Stop everything that is playing
    fn cancel_all(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_events_are_tagged() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let generation = Generation::default().next();
        let events = CaptureEvents::new(generation, tx);

        assert!(events.emit(CaptureEvent::Started));

        match rx.try_recv().unwrap() {
            Event::Capture {
                generation: tagged,
                event,
            } => {
                assert_eq!(tagged, generation);
                assert_eq!(event, CaptureEvent::Started);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn test_emit_after_controller_gone() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);

        let events = SpeechEvents::new(Generation::default(), tx);
        assert!(!events.emit(SpeechEvent::Finished));
    }

    #[test]
    fn test_handle_cancel() {
        let handle = UtteranceHandle::new();
        let token = handle.token();
        assert!(!handle.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_capture_error_display() {
        assert_eq!(CaptureErrorKind::NoSpeech.to_string(), "no speech detected");
        assert_eq!(
            CaptureErrorKind::Other("bad grammar".to_string()).to_string(),
            "bad grammar"
        );
    }
}
