//! Sage Voice - voice front end for a conversational assistant
//!
//! This library provides the interaction core of the Sage front end:
//! - Speech capture through a microphone and a remote STT provider
//! - Submission of user text to the reply service
//! - Spoken replies through a remote TTS provider and local playback
//! - A single-threaded interaction controller that sequences all of the above
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 Presentation (CLI)                   │
//! │   intents ▼                          ▲ snapshots     │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Interaction Controller                 │
//! │   Session  │  Generation  │  Event reducer          │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                     Adapters                         │
//! │   Microphone + STT  │  Reply service  │  TTS + Speaker │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod service;
pub mod session;
pub mod voice;

pub use config::Config;
pub use controller::{
    ChannelPresenter, Controller, ControllerHandle, Event, Ports, Presenter, Update,
};
pub use error::{Error, ErrorKind, Result};
pub use service::{HttpResponseService, ResponseService, ServiceError, ServiceReply};
pub use session::{
    ChatExchange, Generation, RecognitionResult, Session, SessionError, SessionSnapshot, Status,
    VoiceDescriptor,
};
