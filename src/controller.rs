//! Interaction controller
//!
//! Owns the [`Session`] and sequences capture, submission and speech. Every
//! user intent and every adapter or service callback arrives as an [`Event`]
//! and is processed to completion before the next one, so session state is
//! never mutated concurrently.
//!
//! Callbacks are tagged with the [`Generation`] of the cycle that issued them.
//! Cancelling or starting a cycle advances the generation, which makes any
//! late callback from the old cycle a no-op.
//!
//! ```text
//! Idle ──start──▶ Listening ──result──▶ Submitting ──reply──▶ Speaking ──done──▶ Idle
//!  │                  │                     ▲    │
//!  └──submit text─────┼─────────────────────┘    │ failure
//!                     └──error / empty──▶ Error ◀┘ ──▶ Idle
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::ErrorKind;
use crate::service::{ResponseService, ServiceError, ServiceReply};
use crate::session::{
    ChatExchange, Generation, Session, SessionError, SessionSnapshot, Status, VoiceDescriptor,
};
use crate::voice::{
    CaptureEvent, CaptureEvents, SpeechCapture, SpeechEvent, SpeechEvents, SpeechOutput,
    Utterance, UtteranceHandle,
};

/// Input to the controller: a user intent or a tagged callback
#[derive(Debug)]
pub enum Event {
    /// Begin a capture cycle
    StartCapture,
    /// Abort the active capture, request or utterance
    Cancel,
    /// Submit typed text
    SubmitText(String),
    /// Select the voice for the next utterance
    SelectVoice(String),
    /// The output adapter's voice catalog changed
    VoicesChanged(Vec<VoiceDescriptor>),
    /// Capture adapter callback
    Capture {
        /// Cycle that issued the event
        generation: Generation,
        /// What happened
        event: CaptureEvent,
    },
    /// Reply service completion
    Reply {
        /// Cycle that issued the request
        generation: Generation,
        /// Service outcome
        result: Result<ServiceReply, ServiceError>,
    },
    /// Output adapter callback
    Speech {
        /// Cycle that issued the utterance
        generation: Generation,
        /// What happened
        event: SpeechEvent,
    },
    /// Stop the controller and release adapters
    Shutdown,
}

/// Receives session state after every transition
pub trait Presenter: Send {
    /// Render a snapshot
    fn render(&mut self, snapshot: &SessionSnapshot);

    /// Show a completed round trip; called once per successful reply
    fn exchange(&mut self, _exchange: &ChatExchange) {}
}

/// Update forwarded by a [`ChannelPresenter`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Update {
    /// Session state after a transition
    Snapshot(SessionSnapshot),
    /// A completed round trip
    Exchange(ChatExchange),
}

/// Presenter that forwards updates over a channel
#[derive(Debug, Clone)]
pub struct ChannelPresenter {
    tx: mpsc::UnboundedSender<Update>,
}

impl ChannelPresenter {
    /// Create a presenter and the receiving end of its updates
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Update>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Presenter for ChannelPresenter {
    fn render(&mut self, snapshot: &SessionSnapshot) {
        // Receiver gone means nobody is watching; the session carries on
        let _ = self.tx.send(Update::Snapshot(snapshot.clone()));
    }

    fn exchange(&mut self, exchange: &ChatExchange) {
        let _ = self.tx.send(Update::Exchange(exchange.clone()));
    }
}

/// Adapters the controller drives
pub struct Ports {
    /// Speech recognition
    pub capture: Arc<dyn SpeechCapture>,
    /// Speech synthesis
    pub output: Arc<dyn SpeechOutput>,
    /// Reply service
    pub service: Arc<dyn ResponseService>,
}

/// Cloneable sender of user intents
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    tx: mpsc::UnboundedSender<Event>,
}

impl ControllerHandle {
    /// Begin listening
    pub fn start_capture(&self) {
        self.send(Event::StartCapture);
    }

    /// Cancel whatever is in progress
    pub fn cancel(&self) {
        self.send(Event::Cancel);
    }

    /// Submit typed text
    pub fn submit_text(&self, text: impl Into<String>) {
        self.send(Event::SubmitText(text.into()));
    }

    /// Select the voice for the next utterance
    pub fn select_voice(&self, id: impl Into<String>) {
        self.send(Event::SelectVoice(id.into()));
    }

    /// Replace the voice catalog
    pub fn voices_changed(&self, voices: Vec<VoiceDescriptor>) {
        self.send(Event::VoicesChanged(voices));
    }

    /// Stop the controller
    pub fn shutdown(&self) {
        self.send(Event::Shutdown);
    }

    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::warn!("controller has stopped; intent dropped");
        }
    }
}

/// The interaction state machine
pub struct Controller {
    session: Session,
    voices: Arc<[VoiceDescriptor]>,
    capture: Arc<dyn SpeechCapture>,
    output: Arc<dyn SpeechOutput>,
    service: Arc<dyn ResponseService>,
    presenter: Box<dyn Presenter>,
    events: mpsc::UnboundedSender<Event>,
    request: Option<JoinHandle<()>>,
    utterance: Option<UtteranceHandle>,
}

impl Controller {
    /// Create a controller and the event queue it consumes
    ///
    /// The initial voice catalog is read from the output adapter. The first
    /// snapshot is rendered immediately.
    pub fn new(
        ports: Ports,
        presenter: Box<dyn Presenter>,
        selected_voice_id: Option<String>,
    ) -> (Self, mpsc::UnboundedReceiver<Event>) {
        let (events, rx) = mpsc::unbounded_channel();
        let voices: Arc<[VoiceDescriptor]> = Arc::from(ports.output.voices());

        let mut controller = Self {
            session: Session::with_voice(selected_voice_id),
            voices,
            capture: ports.capture,
            output: ports.output,
            service: ports.service,
            presenter,
            events,
            request: None,
            utterance: None,
        };
        controller.publish();

        (controller, rx)
    }

    /// Sender for user intents
    #[must_use]
    pub fn handle(&self) -> ControllerHandle {
        ControllerHandle {
            tx: self.events.clone(),
        }
    }

    /// Current session
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.session.snapshot(&self.voices)
    }

    /// Process events until [`Event::Shutdown`] or the queue closes
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<Event>) {
        tracing::debug!("controller running");

        while let Some(event) = events.recv().await {
            if self.dispatch(event).is_break() {
                break;
            }
        }

        self.dispose();
        tracing::debug!("controller stopped");
    }

    /// Process one event to completion
    pub fn dispatch(&mut self, event: Event) -> ControlFlow<()> {
        match event {
            Event::StartCapture => self.start_capture(),
            Event::Cancel => self.cancel(),
            Event::SubmitText(text) => self.submit_text(&text),
            Event::SelectVoice(id) => self.select_voice(id),
            Event::VoicesChanged(voices) => self.voices_changed(voices),
            Event::Capture { generation, event } => self.on_capture(generation, event),
            Event::Reply { generation, result } => self.on_reply(generation, result),
            Event::Speech { generation, event } => self.on_speech(generation, event),
            Event::Shutdown => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }

    /// Stop capture, abort the request and silence output
    pub fn dispose(&mut self) {
        self.session.advance();
        if self.session.status == Status::Listening {
            self.capture.stop();
        }
        self.abort_request();
        self.stop_speaking();
        self.session.status = Status::Idle;
    }

    fn start_capture(&mut self) {
        match self.session.status {
            Status::Listening => {
                tracing::debug!("already listening");
                return;
            }
            Status::Submitting => {
                tracing::debug!("reply pending, ignoring start capture");
                return;
            }
            Status::Speaking => {
                tracing::debug!("capture supersedes current utterance");
                self.session.advance();
                self.stop_speaking();
                self.transition(Status::Idle);
            }
            Status::Idle | Status::Error => {}
        }

        if !self.capture.is_available() {
            self.fail(SessionError::new(ErrorKind::CaptureUnavailable));
            return;
        }

        let generation = self.session.advance();
        self.session.error = None;
        self.transition(Status::Listening);

        if let Err(e) = self
            .capture
            .start(CaptureEvents::new(generation, self.events.clone()))
        {
            tracing::warn!(error = %e, "capture failed to start");
            self.session.advance();
            self.fail(SessionError::with_message(
                ErrorKind::CaptureFailure,
                e.to_string(),
            ));
        }
    }

    fn cancel(&mut self) {
        match self.session.status {
            Status::Listening => {
                self.session.advance();
                self.capture.stop();
                self.fail(SessionError::new(ErrorKind::UserCancelled));
            }
            Status::Submitting => {
                self.session.advance();
                self.abort_request();
                self.transition(Status::Idle);
            }
            Status::Speaking => {
                self.session.advance();
                self.stop_speaking();
                self.transition(Status::Idle);
            }
            Status::Idle | Status::Error => tracing::debug!("nothing to cancel"),
        }
    }

    fn submit_text(&mut self, text: &str) {
        if !matches!(self.session.status, Status::Idle | Status::Error) {
            tracing::warn!(status = %self.session.status, "typed input ignored while busy");
            return;
        }

        let trimmed = text.trim();
        if trimmed.is_empty() {
            self.fail(SessionError::new(ErrorKind::EmptyInput));
            return;
        }

        let generation = self.session.advance();
        self.begin_submit(generation, trimmed.to_string());
    }

    fn select_voice(&mut self, id: String) {
        if !self.voices.is_empty() && !self.voices.iter().any(|v| v.id == id) {
            tracing::warn!(voice = %id, "selected voice is not in the current catalog");
        }
        tracing::debug!(voice = %id, "voice selected");
        self.session.selected_voice_id = Some(id);
        self.publish();
    }

    fn voices_changed(&mut self, voices: Vec<VoiceDescriptor>) {
        self.voices = Arc::from(voices);

        if let Some(selected) = &self.session.selected_voice_id {
            if !self.voices.iter().any(|v| &v.id == selected) {
                tracing::info!(voice = %selected, "selected voice left the catalog, using default");
                self.session.selected_voice_id = None;
            }
        }

        tracing::debug!(count = self.voices.len(), "voice catalog refreshed");
        self.publish();
    }

    fn on_capture(&mut self, generation: Generation, event: CaptureEvent) {
        if !self.session.is_current(generation) {
            tracing::trace!(%generation, ?event, "discarding stale capture event");
            return;
        }
        if self.session.status != Status::Listening {
            tracing::trace!(status = %self.session.status, ?event, "capture event after cycle moved on");
            return;
        }

        match event {
            CaptureEvent::Started => tracing::debug!(%generation, "capture started"),
            CaptureEvent::Result(result) => {
                let trimmed = result.transcript.trim();
                if trimmed.is_empty() {
                    self.capture.stop();
                    self.fail(SessionError::new(ErrorKind::EmptyInput));
                } else {
                    tracing::debug!(%generation, transcript = %trimmed, "speech recognized");
                    self.begin_submit(generation, trimmed.to_string());
                }
            }
            CaptureEvent::Error(kind) => {
                self.capture.stop();
                self.fail(SessionError::with_message(
                    ErrorKind::CaptureFailure,
                    kind.to_string(),
                ));
            }
            CaptureEvent::Ended => {
                tracing::debug!(%generation, "capture ended without a result");
                self.transition(Status::Idle);
            }
        }
    }

    fn on_reply(&mut self, generation: Generation, result: Result<ServiceReply, ServiceError>) {
        if !self.session.is_current(generation) || self.session.status != Status::Submitting {
            tracing::debug!(%generation, "discarding stale reply");
            return;
        }
        self.request = None;

        match result {
            Ok(reply) => {
                self.session.current_response = Some(reply.response.clone());
                self.presenter.exchange(&ChatExchange {
                    user_input: self.session.current_input.clone(),
                    response: reply.response.clone(),
                });
                self.transition(Status::Speaking);

                let utterance = Utterance {
                    text: reply.response,
                    voice_id: self.session.selected_voice_id.clone(),
                };
                match self
                    .output
                    .speak(utterance, SpeechEvents::new(generation, self.events.clone()))
                {
                    Ok(handle) => self.utterance = Some(handle),
                    Err(e) => {
                        tracing::warn!(error = %e, "speech output refused the reply");
                        self.transition(Status::Idle);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "reply service failed");
                self.fail(SessionError::with_message(e.kind(), e.to_string()));
            }
        }
    }

    fn on_speech(&mut self, generation: Generation, event: SpeechEvent) {
        if !self.session.is_current(generation) || self.session.status != Status::Speaking {
            tracing::trace!(%generation, ?event, "discarding stale speech event");
            return;
        }
        self.utterance = None;

        match event {
            SpeechEvent::Finished => tracing::debug!(%generation, "reply spoken"),
            SpeechEvent::Cancelled => tracing::debug!(%generation, "reply superseded"),
            SpeechEvent::Failed(reason) => tracing::warn!(%generation, reason = %reason, "reply not spoken"),
        }
        self.transition(Status::Idle);
    }

    fn begin_submit(&mut self, generation: Generation, text: String) {
        self.session.current_input.clone_from(&text);
        self.session.error = None;
        self.transition(Status::Submitting);

        let service = Arc::clone(&self.service);
        let events = self.events.clone();
        self.request = Some(tokio::spawn(async move {
            let result = service.submit(&text).await;
            // Controller gone means the session is over
            let _ = events.send(Event::Reply { generation, result });
        }));
    }

    /// Surface a failure, then reset to idle
    fn fail(&mut self, error: SessionError) {
        if error.kind.is_displayed() {
            tracing::warn!(kind = %error.kind, message = %error.message, "interaction failed");
            self.session.error = Some(error);
            self.transition(Status::Error);
        } else {
            tracing::debug!(kind = %error.kind, "cycle reset");
        }

        self.session.error = None;
        self.transition(Status::Idle);
    }

    fn abort_request(&mut self) {
        if let Some(request) = self.request.take() {
            request.abort();
        }
    }

    fn stop_speaking(&mut self) {
        if let Some(utterance) = self.utterance.take() {
            utterance.cancel();
        }
        self.output.cancel_all();
    }

    fn transition(&mut self, status: Status) {
        let from = self.session.status;
        self.session.status = status;
        tracing::debug!(%from, to = %status, generation = %self.session.generation, "transition");
        self.publish();
    }

    fn publish(&mut self) {
        let snapshot = self.session.snapshot(&self.voices);
        self.presenter.render(&snapshot);
    }
}
