//! Spoken replies through remote TTS and local playback

use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;

use super::playback::{Speaker, decode_mp3};
use super::tts::TextToSpeech;
use super::{SpeechEvent, SpeechEvents, SpeechOutput, Utterance, UtteranceHandle};
use crate::session::VoiceDescriptor;
use crate::{Error, Result};

/// [`SpeechOutput`] that synthesizes remotely and plays on the default speaker
///
/// At most one utterance is audible: speaking again cancels the previous one.
pub struct SpeakerOutput {
    tts: Arc<TextToSpeech>,
    current: Mutex<Option<UtteranceHandle>>,
    runtime: Handle,
}

impl SpeakerOutput {
    /// Create a speaker output
    ///
    /// # Errors
    ///
    /// Returns error if called outside a Tokio runtime
    pub fn new(tts: TextToSpeech) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Synthesis(format!("no async runtime: {e}")))?;

        if !Speaker::probe() {
            tracing::warn!("no output device found; replies will not be audible");
        }

        Ok(Self {
            tts: Arc::new(tts),
            current: Mutex::new(None),
            runtime,
        })
    }

    /// Fetch the provider's full voice catalog
    ///
    /// # Errors
    ///
    /// Returns error if the catalog request fails
    pub async fn fetch_voices(&self) -> Result<Vec<VoiceDescriptor>> {
        self.tts.fetch_voices().await
    }

    fn replace_current(&self, handle: Option<UtteranceHandle>) {
        if let Ok(mut current) = self.current.lock() {
            if let Some(previous) = std::mem::replace(&mut *current, handle) {
                previous.cancel();
            }
        }
    }
}

impl SpeechOutput for SpeakerOutput {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.tts.builtin_voices()
    }

    fn speak(&self, utterance: Utterance, events: SpeechEvents) -> Result<UtteranceHandle> {
        let handle = UtteranceHandle::new();
        self.replace_current(Some(handle.clone()));

        let tts = Arc::clone(&self.tts);
        let token = handle.token();

        self.runtime.spawn(async move {
            let synthesized = tokio::select! {
                biased;
                () = token.cancelled() => {
                    events.emit(SpeechEvent::Cancelled);
                    return;
                }
                result = tts.synthesize(&utterance.text, utterance.voice_id.as_deref()) => result,
            };

            let audio = match synthesized {
                Ok(audio) => audio,
                Err(e) => {
                    tracing::warn!(error = %e, "speech synthesis failed");
                    events.emit(SpeechEvent::Failed(e.to_string()));
                    return;
                }
            };

            let played = tokio::task::spawn_blocking(move || {
                let clip = decode_mp3(&audio)?;
                Speaker::play(&clip, &token)
            })
            .await;

            let event = match played {
                Ok(Ok(true)) => SpeechEvent::Finished,
                Ok(Ok(false)) => SpeechEvent::Cancelled,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "playback failed");
                    SpeechEvent::Failed(e.to_string())
                }
                Err(e) => SpeechEvent::Failed(format!("playback task failed: {e}")),
            };
            events.emit(event);
        });

        Ok(handle)
    }

    fn cancel_all(&self) {
        self.replace_current(None);
    }
}
