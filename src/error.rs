//! Error types for the Sage voice front end

use thiserror::Error;

/// Result type alias for Sage operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice front end and its adapters
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Speech capture could not be started
    #[error("capture error: {0}")]
    Capture(String),

    /// Speech synthesis could not be started
    #[error("synthesis error: {0}")]
    Synthesis(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text error
    #[error("STT error: {0}")]
    Stt(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Failure kinds surfaced to the presentation layer through the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No speech capture capability on this host
    CaptureUnavailable,
    /// Input was empty or whitespace only
    EmptyInput,
    /// The user cancelled the cycle
    UserCancelled,
    /// The capture adapter reported an error
    CaptureFailure,
    /// The reply service could not be reached or answered with a non-2xx status
    ServiceUnreachable,
    /// The reply service answered with a body that is not a valid reply
    InvalidReply,
}

impl ErrorKind {
    /// Whether this kind is shown to the user as an error banner
    ///
    /// Cancellation is a plain reset and never displayed.
    #[must_use]
    pub const fn is_displayed(self) -> bool {
        !matches!(self, Self::UserCancelled)
    }

    /// Default user-facing message for this kind
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::CaptureUnavailable => "speech recognition is not available on this device",
            Self::EmptyInput => "I didn't catch anything to send",
            Self::UserCancelled => "cancelled",
            Self::CaptureFailure => "speech recognition failed",
            Self::ServiceUnreachable => "the assistant could not be reached",
            Self::InvalidReply => "the assistant sent a reply that could not be read",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CaptureUnavailable => "capture unavailable",
            Self::EmptyInput => "empty input",
            Self::UserCancelled => "user cancelled",
            Self::CaptureFailure => "capture failure",
            Self::ServiceUnreachable => "service unreachable",
            Self::InvalidReply => "invalid reply",
        };
        f.write_str(name)
    }
}
