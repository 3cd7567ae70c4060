//! Session state for the single live interaction
//!
//! Exactly one [`Session`] exists per running controller. It is never
//! persisted; a restart starts from [`Session::default`].

use std::fmt;
use std::sync::Arc;

use crate::error::ErrorKind;

/// Monotonic tag identifying one capture/submit/speak cycle
///
/// Callbacks carry the generation they were issued under and are discarded
/// when it no longer matches the session's current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// The generation that follows this one
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Interaction status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    /// Waiting for the user
    #[default]
    Idle,
    /// Capturing speech
    Listening,
    /// Waiting on the reply service
    Submitting,
    /// Playing the reply
    Speaking,
    /// A failure is being surfaced; resets to `Idle` right after
    Error,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Submitting => "thinking",
            Self::Speaking => "speaking",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// A synthesis voice offered by the speech output adapter
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VoiceDescriptor {
    /// Adapter-specific voice identifier
    pub id: String,

    /// Human readable name
    pub display_name: String,

    /// BCP 47 language tag (e.g. "en-US")
    pub language_tag: String,
}

impl VoiceDescriptor {
    /// Create a voice descriptor
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        language_tag: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            language_tag: language_tag.into(),
        }
    }
}

/// Transcript produced by one successful capture cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionResult {
    /// Recognized text, untrimmed
    pub transcript: String,
}

/// One completed round trip, handed to the presentation layer once
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatExchange {
    /// What the user said or typed
    pub user_input: String,

    /// What the assistant replied
    pub response: String,
}

/// Failure surfaced through the session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionError {
    /// Failure kind
    pub kind: ErrorKind,

    /// User-facing message
    pub message: String,
}

impl SessionError {
    /// Create an error with the kind's default message
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: kind.message().to_string(),
        }
    }

    /// Create an error with a specific message
    #[must_use]
    pub fn with_message(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The mutable interaction state
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub(crate) status: Status,
    pub(crate) current_input: String,
    pub(crate) current_response: Option<String>,
    pub(crate) error: Option<SessionError>,
    pub(crate) selected_voice_id: Option<String>,
    pub(crate) generation: Generation,
}

impl Session {
    /// Create a session with an initial voice selection
    #[must_use]
    pub fn with_voice(selected_voice_id: Option<String>) -> Self {
        Self {
            selected_voice_id,
            ..Self::default()
        }
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Current generation
    #[must_use]
    pub const fn generation(&self) -> Generation {
        self.generation
    }

    /// Selected voice, if any
    #[must_use]
    pub fn selected_voice_id(&self) -> Option<&str> {
        self.selected_voice_id.as_deref()
    }

    /// Advance to a fresh generation, invalidating every outstanding callback
    pub(crate) fn advance(&mut self) -> Generation {
        self.generation = self.generation.next();
        self.generation
    }

    /// Whether a callback tagged `generation` belongs to the live cycle
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation == generation
    }

    /// Take an immutable copy for rendering
    #[must_use]
    pub fn snapshot(&self, voices: &Arc<[VoiceDescriptor]>) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            current_input: self.current_input.clone(),
            current_response: self.current_response.clone(),
            error: self.error.clone(),
            selected_voice_id: self.selected_voice_id.clone(),
            voices: Arc::clone(voices),
        }
    }
}

/// Session state as seen by the presentation layer after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    /// Interaction status
    pub status: Status,

    /// Last submitted input
    pub current_input: String,

    /// Last reply, kept across failures
    pub current_response: Option<String>,

    /// Present only while `status` is [`Status::Error`]
    pub error: Option<SessionError>,

    /// Voice used for the next synthesis call
    pub selected_voice_id: Option<String>,

    /// Voice catalog at the time of the snapshot
    pub voices: Arc<[VoiceDescriptor]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_advances() {
        let mut session = Session::default();
        let first = session.generation();
        let second = session.advance();

        assert_ne!(first, second);
        assert!(second > first);
        assert!(session.is_current(second));
        assert!(!session.is_current(first));
    }

    #[test]
    fn test_snapshot_shares_catalog() {
        let voices: Arc<[VoiceDescriptor]> =
            Arc::from(vec![VoiceDescriptor::new("alloy", "Alloy", "en-US")]);
        let session = Session::with_voice(Some("alloy".to_string()));
        let snapshot = session.snapshot(&voices);

        assert_eq!(snapshot.status, Status::Idle);
        assert_eq!(snapshot.selected_voice_id.as_deref(), Some("alloy"));
        assert!(Arc::ptr_eq(&snapshot.voices, &voices));
    }
}
