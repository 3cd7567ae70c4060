//! Configuration management for the Sage voice front end
//!
//! Every setting resolves as env > TOML file > default.

pub mod file;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::voice::EndpointConfig;
use crate::{Error, Result};

use file::SageConfigFile;

/// Default reply service endpoint (the backend serves `POST /`)
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:5000/";

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Sage front end configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Reply service configuration
    pub service: ServiceConfig,

    /// Voice configuration
    pub voice: VoiceConfig,

    /// Microphone endpointing
    pub capture: CaptureConfig,

    /// API keys
    pub api_keys: ApiKeys,
}

/// Reply service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Endpoint that accepts `POST {"text": ...}`
    pub url: Url,

    /// Request timeout; expiry counts as a network failure
    pub timeout: Duration,
}

impl ServiceConfig {
    /// Service config for a URL with the default timeout
    ///
    /// # Errors
    ///
    /// Returns error if the URL does not parse
    pub fn new(url: &str) -> Result<Self> {
        Ok(Self {
            url: parse_url(url)?,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SttProvider {
    /// `OpenAI` Whisper
    #[default]
    Whisper,
    /// Deepgram
    Deepgram,
}

impl FromStr for SttProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Text-to-speech backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtsProvider {
    /// `OpenAI` TTS
    #[default]
    OpenAi,
    /// `ElevenLabs`
    ElevenLabs,
}

impl FromStr for TtsProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable microphone and speaker adapters
    pub enabled: bool,

    /// STT backend
    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS backend
    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// Initially selected voice; `None` uses the provider default
    pub voice: Option<String>,

    /// TTS speed multiplier (0.25 to 4.0)
    pub tts_speed: f32,
}

/// Microphone endpointing configuration
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// Hard cap on one capture cycle
    pub max_listen_secs: u64,

    /// Trailing silence that ends an utterance
    pub silence_ms: u64,

    /// Silence before any speech that ends the cycle with no result
    pub no_speech_secs: u64,
}

impl CaptureConfig {
    /// Endpointing limits in samples
    #[must_use]
    pub fn endpoint(&self) -> EndpointConfig {
        EndpointConfig::from_durations(self.silence_ms, self.no_speech_secs, self.max_listen_secs)
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_listen_secs: 10,
            silence_ms: 800,
            no_speech_secs: 5,
        }
    }
}

/// API keys for speech providers
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

impl fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "***");
        f.debug_struct("ApiKeys")
            .field("openai", &redact(&self.openai))
            .field("deepgram", &redact(&self.deepgram))
            .field("elevenlabs", &redact(&self.elevenlabs))
            .finish()
    }
}

impl Config {
    /// Load configuration with explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::resolve(|name| std::env::var(name).ok(), fc, disable_voice)?;

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        Ok(config)
    }

    /// Resolve configuration from an env lookup and a parsed config file
    ///
    /// # Errors
    ///
    /// Returns error if a configured value is invalid
    pub fn resolve(
        env: impl Fn(&str) -> Option<String>,
        fc: SageConfigFile,
        disable_voice: bool,
    ) -> Result<Self> {
        let url = env("SAGE_SERVICE_URL")
            .or(fc.service.url)
            .unwrap_or_else(|| DEFAULT_SERVICE_URL.to_string());
        let timeout_secs = env("SAGE_SERVICE_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .or(fc.service.timeout_secs)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        if timeout_secs == 0 {
            return Err(Error::Config(
                "service timeout must be at least one second".to_string(),
            ));
        }

        let service = ServiceConfig {
            url: parse_url(&url)?,
            timeout: Duration::from_secs(timeout_secs),
        };

        let stt_provider = env("SAGE_STT_PROVIDER")
            .or(fc.voice.stt_provider)
            .map(|s| s.parse::<SttProvider>())
            .transpose()?
            .unwrap_or_default();
        let tts_provider = env("SAGE_TTS_PROVIDER")
            .or(fc.voice.tts_provider)
            .map(|s| s.parse::<TtsProvider>())
            .transpose()?
            .unwrap_or_default();

        let default_stt_model = match stt_provider {
            SttProvider::Whisper => "whisper-1",
            SttProvider::Deepgram => "nova-2",
        };
        let default_tts_model = match tts_provider {
            TtsProvider::OpenAi => "tts-1",
            TtsProvider::ElevenLabs => "eleven_monolingual_v1",
        };

        let voice = VoiceConfig {
            enabled: !disable_voice && fc.voice.enabled.unwrap_or(true),
            stt_provider,
            stt_model: env("SAGE_STT_MODEL")
                .or(fc.voice.stt_model)
                .unwrap_or_else(|| default_stt_model.to_string()),
            tts_provider,
            tts_model: env("SAGE_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| default_tts_model.to_string()),
            voice: env("SAGE_VOICE").or(fc.voice.voice),
            tts_speed: fc.voice.tts_speed.unwrap_or(1.0).clamp(0.25, 4.0),
        };

        let defaults = CaptureConfig::default();
        let capture = CaptureConfig {
            max_listen_secs: fc.capture.max_listen_secs.unwrap_or(defaults.max_listen_secs),
            silence_ms: fc.capture.silence_ms.unwrap_or(defaults.silence_ms),
            no_speech_secs: fc.capture.no_speech_secs.unwrap_or(defaults.no_speech_secs),
        };

        let api_keys = ApiKeys {
            openai: env("OPENAI_API_KEY").or(fc.api_keys.openai),
            deepgram: env("DEEPGRAM_API_KEY").or(fc.api_keys.deepgram),
            elevenlabs: env("ELEVENLABS_API_KEY").or(fc.api_keys.elevenlabs),
        };

        Ok(Self {
            service,
            voice,
            capture,
            api_keys,
        })
    }

    /// Override the reply service URL
    ///
    /// # Errors
    ///
    /// Returns error if the URL does not parse
    pub fn with_service_url(mut self, url: &str) -> Result<Self> {
        self.service.url = parse_url(url)?;
        Ok(self)
    }
}

fn parse_url(url: &str) -> Result<Url> {
    let parsed =
        Url::parse(url).map_err(|e| Error::Config(format!("invalid service URL {url:?}: {e}")))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "service URL must be http(s): {url}"
        )));
    }

    Ok(parsed)
}
