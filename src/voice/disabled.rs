//! Adapter for hosts without audio

use super::{
    CaptureEvents, SpeechCapture, SpeechEvent, SpeechEvents, SpeechOutput, Utterance,
    UtteranceHandle,
};
use crate::session::VoiceDescriptor;
use crate::{Error, Result};

/// Stand-in for both ports when voice is disabled
///
/// Capture reports itself unavailable. Speech completes immediately, so
/// replies are shown as text only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Disabled;

impl SpeechCapture for Disabled {
    fn is_available(&self) -> bool {
        false
    }

    fn start(&self, _events: CaptureEvents) -> Result<()> {
        Err(Error::Capture("voice is disabled".to_string()))
    }

    fn stop(&self) {}
}

impl SpeechOutput for Disabled {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        Vec::new()
    }

    fn speak(&self, utterance: Utterance, events: SpeechEvents) -> Result<UtteranceHandle> {
        tracing::debug!(chars = utterance.text.len(), "voice disabled, skipping speech");
        events.emit(SpeechEvent::Finished);
        Ok(UtteranceHandle::new())
    }

    fn cancel_all(&self) {}
}
