//! Shared test utilities
//!
//! Scriptable adapters for driving the controller without audio hardware or
//! a live reply service.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sage_voice::voice::{
    CaptureEvents, SpeechCapture, SpeechEvents, SpeechOutput, Utterance, UtteranceHandle,
};
use sage_voice::{
    ChannelPresenter, ChatExchange, Controller, Error, Event, Ports, ResponseService, ServiceError,
    ServiceReply, SessionSnapshot, Status, Update, VoiceDescriptor,
};
use tokio::sync::mpsc;

/// Capture adapter that records calls and hands out its event sinks
pub struct FakeCapture {
    pub available: AtomicBool,
    pub fail_start: AtomicBool,
    pub starts: AtomicUsize,
    pub stops: AtomicUsize,
    sinks: Mutex<Vec<CaptureEvents>>,
}

impl FakeCapture {
    pub fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
            fail_start: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            sinks: Mutex::new(Vec::new()),
        }
    }

    /// Sink of the most recent capture cycle
    pub fn last_sink(&self) -> CaptureEvents {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("capture was never started")
    }

    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

impl SpeechCapture for FakeCapture {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn start(&self, events: CaptureEvents) -> sage_voice::Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::Capture("device busy".to_string()));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.sinks.lock().unwrap().push(events);
        Ok(())
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

/// Output adapter that records utterances instead of playing them
pub struct FakeOutput {
    pub voices: Vec<VoiceDescriptor>,
    pub refuse: AtomicBool,
    pub cancels: AtomicUsize,
    utterances: Mutex<Vec<(Utterance, UtteranceHandle)>>,
    sinks: Mutex<Vec<SpeechEvents>>,
}

impl FakeOutput {
    pub fn new(voices: Vec<VoiceDescriptor>) -> Self {
        Self {
            voices,
            refuse: AtomicBool::new(false),
            cancels: AtomicUsize::new(0),
            utterances: Mutex::new(Vec::new()),
            sinks: Mutex::new(Vec::new()),
        }
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.utterances
            .lock()
            .unwrap()
            .iter()
            .map(|(u, _)| u.clone())
            .collect()
    }

    /// Handle returned for the most recent utterance
    pub fn last_handle(&self) -> UtteranceHandle {
        self.utterances
            .lock()
            .unwrap()
            .last()
            .map(|(_, h)| h.clone())
            .expect("nothing was spoken")
    }

    pub fn last_sink(&self) -> SpeechEvents {
        self.sinks
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("nothing was spoken")
    }

    pub fn cancels(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

impl SpeechOutput for FakeOutput {
    fn voices(&self) -> Vec<VoiceDescriptor> {
        self.voices.clone()
    }

    fn speak(&self, utterance: Utterance, events: SpeechEvents) -> sage_voice::Result<UtteranceHandle> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::Synthesis("no engine".to_string()));
        }
        let handle = UtteranceHandle::new();
        self.utterances
            .lock()
            .unwrap()
            .push((utterance, handle.clone()));
        self.sinks.lock().unwrap().push(events);
        Ok(handle)
    }

    fn cancel_all(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Reply service that answers from a script
///
/// With an empty script every call hangs until aborted.
pub struct ScriptedService {
    script: Mutex<VecDeque<Result<ServiceReply, ServiceError>>>,
    submitted: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            submitted: Mutex::new(Vec::new()),
        }
    }

    pub fn reply(self, response: &str) -> Self {
        self.push(Ok(ServiceReply {
            response: response.to_string(),
        }))
    }

    pub fn fail(self, error: ServiceError) -> Self {
        self.push(Err(error))
    }

    fn push(self, result: Result<ServiceReply, ServiceError>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }
}

#[async_trait]
impl ResponseService for ScriptedService {
    async fn submit(&self, text: &str) -> Result<ServiceReply, ServiceError> {
        self.submitted.lock().unwrap().push(text.to_string());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(result) => result,
            None => std::future::pending().await,
        }
    }
}

pub fn catalog() -> Vec<VoiceDescriptor> {
    vec![
        VoiceDescriptor::new("alloy", "Alloy", "en-US"),
        VoiceDescriptor::new("nova", "Nova", "en-US"),
    ]
}

/// Controller wired to fakes, driven one event at a time
pub struct Harness {
    pub controller: Controller,
    pub events: mpsc::UnboundedReceiver<Event>,
    pub updates: mpsc::UnboundedReceiver<Update>,
    pub capture: Arc<FakeCapture>,
    pub output: Arc<FakeOutput>,
    pub service: Arc<ScriptedService>,
    pub exchanges: Vec<ChatExchange>,
}

impl Harness {
    pub fn new(service: ScriptedService) -> Self {
        Self::with_output(service, FakeOutput::new(catalog()), None)
    }

    pub fn with_output(
        service: ScriptedService,
        output: FakeOutput,
        voice: Option<String>,
    ) -> Self {
        let capture = Arc::new(FakeCapture::new());
        let output = Arc::new(output);
        let service = Arc::new(service);
        let (presenter, updates) = ChannelPresenter::new();

        let ports = Ports {
            capture: Arc::clone(&capture) as _,
            output: Arc::clone(&output) as _,
            service: Arc::clone(&service) as _,
        };
        let (controller, events) = Controller::new(ports, Box::new(presenter), voice);

        Self {
            controller,
            events,
            updates,
            capture,
            output,
            service,
            exchanges: Vec::new(),
        }
    }

    /// Dispatch an intent directly
    pub fn send(&mut self, event: Event) {
        let _ = self.controller.dispatch(event);
    }

    /// Wait for the next queued callback and dispatch it
    pub async fn pump(&mut self) {
        let event = tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for a controller event")
            .expect("event queue closed");
        let _ = self.controller.dispatch(event);
    }

    /// Dispatch every callback already queued
    pub fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let _ = self.controller.dispatch(event);
        }
    }

    /// Snapshots published since the last call
    pub fn snapshots(&mut self) -> Vec<SessionSnapshot> {
        let mut snapshots = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            match update {
                Update::Snapshot(snapshot) => snapshots.push(snapshot),
                Update::Exchange(exchange) => self.exchanges.push(exchange),
            }
        }
        snapshots
    }

    /// Statuses published since the last call
    pub fn statuses(&mut self) -> Vec<Status> {
        self.snapshots().into_iter().map(|s| s.status).collect()
    }

    pub fn status(&self) -> Status {
        self.controller.session().status()
    }
}
