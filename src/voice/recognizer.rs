//! Microphone speech recognition
//!
//! One capture cycle records from the microphone on a dedicated thread until
//! the endpointer closes the utterance, then transcribes it remotely.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::capture::{Microphone, SAMPLE_RATE, samples_to_wav};
use super::endpoint::{Endpoint, EndpointConfig, Endpointer};
use super::stt::SpeechToText;
use super::{CaptureErrorKind, CaptureEvent, CaptureEvents, SpeechCapture};
use crate::session::RecognitionResult;
use crate::{Error, Result};

/// How often the capture thread drains the microphone buffer
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a recording ended
enum Recording {
    Speech(Vec<f32>),
    NoSpeech,
    Stopped,
    Failed(Error),
}

/// [`SpeechCapture`] backed by the default microphone and a remote STT provider
pub struct MicrophoneRecognizer {
    stt: Arc<SpeechToText>,
    endpoint: EndpointConfig,
    active: Mutex<Option<CancellationToken>>,
    runtime: Handle,
}

impl MicrophoneRecognizer {
    /// Create a recognizer
    ///
    /// # Errors
    ///
    /// Returns error if called outside a Tokio runtime
    pub fn new(stt: SpeechToText, endpoint: EndpointConfig) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::Capture(format!("no async runtime: {e}")))?;

        Ok(Self {
            stt: Arc::new(stt),
            endpoint,
            active: Mutex::new(None),
            runtime,
        })
    }

    fn replace_active(&self, token: Option<CancellationToken>) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(previous) = std::mem::replace(&mut *active, token) {
                previous.cancel();
            }
        }
    }
}

impl SpeechCapture for MicrophoneRecognizer {
    fn is_available(&self) -> bool {
        Microphone::probe()
    }

    fn start(&self, events: CaptureEvents) -> Result<()> {
        let token = CancellationToken::new();
        self.replace_active(Some(token.clone()));

        let stt = Arc::clone(&self.stt);
        let endpoint = self.endpoint;
        let runtime = self.runtime.clone();

        std::thread::Builder::new()
            .name("sage-capture".to_string())
            .spawn(move || {
                let recording = record(&events, endpoint, &token);
                finish_cycle(&runtime, stt, events, token, recording);
            })
            .map_err(|e| Error::Capture(format!("failed to spawn capture thread: {e}")))?;

        Ok(())
    }

    fn stop(&self) {
        self.replace_active(None);
    }
}

/// Record until the utterance ends, the cycle is stopped, or the device fails
fn record(events: &CaptureEvents, endpoint: EndpointConfig, token: &CancellationToken) -> Recording {
    let mut microphone = match Microphone::open() {
        Ok(microphone) => microphone,
        Err(e) => return Recording::Failed(e),
    };

    if let Err(e) = microphone.start() {
        return Recording::Failed(e);
    }

    tracing::debug!(generation = %events.generation(), "capture cycle started");
    events.emit(CaptureEvent::Started);

    let mut endpointer = Endpointer::new(endpoint);
    loop {
        std::thread::sleep(POLL_INTERVAL);

        if token.is_cancelled() {
            return Recording::Stopped;
        }

        match endpointer.push(&microphone.take_buffer()) {
            Endpoint::Pending => {}
            Endpoint::Complete => return Recording::Speech(endpointer.take_speech()),
            Endpoint::NoSpeech => return Recording::NoSpeech,
        }
    }
}

/// Report the outcome of a recording, transcribing speech on the runtime
fn finish_cycle(
    runtime: &Handle,
    stt: Arc<SpeechToText>,
    events: CaptureEvents,
    token: CancellationToken,
    recording: Recording,
) {
    match recording {
        Recording::Speech(samples) => {
            runtime.spawn(async move {
                let outcome = tokio::select! {
                    biased;
                    () = token.cancelled() => None,
                    result = transcribe(&stt, &samples) => Some(result),
                };

                match outcome {
                    Some(Ok(transcript)) => {
                        events.emit(CaptureEvent::Result(RecognitionResult { transcript }));
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "transcription failed");
                        events.emit(CaptureEvent::Error(classify(&e)));
                    }
                    None => tracing::debug!("transcription abandoned after stop"),
                }
                events.emit(CaptureEvent::Ended);
            });
        }
        Recording::NoSpeech => {
            events.emit(CaptureEvent::Error(CaptureErrorKind::NoSpeech));
            events.emit(CaptureEvent::Ended);
        }
        Recording::Stopped => {
            events.emit(CaptureEvent::Ended);
        }
        Recording::Failed(e) => {
            tracing::warn!(error = %e, "microphone unavailable");
            events.emit(CaptureEvent::Error(CaptureErrorKind::AudioCapture));
            events.emit(CaptureEvent::Ended);
        }
    }
}

async fn transcribe(stt: &SpeechToText, samples: &[f32]) -> Result<String> {
    let wav = samples_to_wav(samples, SAMPLE_RATE)?;
    stt.transcribe(wav).await
}

fn classify(error: &Error) -> CaptureErrorKind {
    match error {
        Error::Http(_) => CaptureErrorKind::Network,
        Error::Audio(_) => CaptureErrorKind::AudioCapture,
        other => CaptureErrorKind::Other(other.to_string()),
    }
}
