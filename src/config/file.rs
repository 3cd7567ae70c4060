//! TOML configuration file loading
//!
//! Supports `~/.config/sage/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct SageConfigFile {
    /// Reply service configuration
    #[serde(default)]
    pub service: ServiceFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Microphone endpointing
    #[serde(default)]
    pub capture: CaptureFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// Reply service configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServiceFileConfig {
    /// Endpoint that accepts `POST {"text": ...}`
    pub url: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: Option<u64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// Initially selected voice identifier (e.g. "alloy")
    pub voice: Option<String>,

    /// TTS speed multiplier
    pub tts_speed: Option<f32>,
}

/// Microphone endpointing configuration
#[derive(Debug, Default, Deserialize)]
pub struct CaptureFileConfig {
    pub max_listen_secs: Option<u64>,
    pub silence_ms: Option<u64>,
    pub no_speech_secs: Option<u64>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub openai: Option<String>,
    pub deepgram: Option<String>,
    pub elevenlabs: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `SageConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> SageConfigFile {
    config_file_path().map_or_else(SageConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// A missing file yields defaults silently; an unreadable or unparsable one
/// yields defaults with a warning.
pub fn load_from(path: &Path) -> SageConfigFile {
    if !path.exists() {
        return SageConfigFile::default();
    }

    match read(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            SageConfigFile::default()
        }
    }
}

/// Read and parse a TOML config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read(path: &Path) -> Result<SageConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/sage/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("sage").join("config.toml"))
}
