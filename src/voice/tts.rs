//! Text-to-speech (TTS) processing

use url::Url;

use crate::config::{ApiKeys, TtsProvider, VoiceConfig};
use crate::session::VoiceDescriptor;
use crate::{Error, Result};

/// `OpenAI` voice used when none is selected
const OPENAI_DEFAULT_VOICE: &str = "alloy";

/// `ElevenLabs` voice ("Rachel") used when none is selected
const ELEVENLABS_DEFAULT_VOICE: &str = "21m00Tcm4TlvDq8ikWAM";

/// `ElevenLabs` synthesis endpoint; the voice id is appended as a path segment
const ELEVENLABS_TTS_URL: &str = "https://api.elevenlabs.io/v1/text-to-speech";

/// Built-in `OpenAI` voices: (id, display name)
const OPENAI_VOICES: &[(&str, &str)] = &[
    ("alloy", "Alloy"),
    ("echo", "Echo"),
    ("fable", "Fable"),
    ("onyx", "Onyx"),
    ("nova", "Nova"),
    ("shimmer", "Shimmer"),
];

#[derive(serde::Deserialize)]
struct ElevenLabsVoices {
    voices: Vec<ElevenLabsVoice>,
}

#[derive(serde::Deserialize)]
struct ElevenLabsVoice {
    voice_id: String,
    name: String,
    #[serde(default)]
    labels: ElevenLabsLabels,
}

#[derive(Default, serde::Deserialize)]
struct ElevenLabsLabels {
    #[serde(default)]
    language: Option<String>,
}

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: String,
    speed: f32,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a synthesizer for the configured provider
    ///
    /// # Errors
    ///
    /// Returns error if the provider's API key is missing
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let (api_key, name) = match voice.tts_provider {
            TtsProvider::OpenAi => (keys.openai.clone(), "OpenAI"),
            TtsProvider::ElevenLabs => (keys.elevenlabs.clone(), "ElevenLabs"),
        };

        let api_key = api_key
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::Config(format!("{name} API key required for TTS")))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            speed: voice.tts_speed,
            model: voice.tts_model.clone(),
            provider: voice.tts_provider,
        })
    }

    /// Voices known without a network call
    #[must_use]
    pub fn builtin_voices(&self) -> Vec<VoiceDescriptor> {
        match self.provider {
            TtsProvider::OpenAi => OPENAI_VOICES
                .iter()
                .map(|(id, name)| VoiceDescriptor::new(*id, *name, "en-US"))
                .collect(),
            TtsProvider::ElevenLabs => Vec::new(),
        }
    }

    /// Fetch the provider's full voice catalog
    ///
    /// # Errors
    ///
    /// Returns error if the catalog request fails
    pub async fn fetch_voices(&self) -> Result<Vec<VoiceDescriptor>> {
        match self.provider {
            TtsProvider::OpenAi => Ok(self.builtin_voices()),
            TtsProvider::ElevenLabs => {
                let response = self
                    .client
                    .get("https://api.elevenlabs.io/v1/voices")
                    .header("xi-api-key", &self.api_key)
                    .send()
                    .await?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::Tts(format!("ElevenLabs voices error {status}: {body}")));
                }

                let catalog: ElevenLabsVoices = response.json().await?;
                Ok(elevenlabs_catalog(catalog))
            }
        }
    }

    /// Synthesize text to MP3 audio
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str, voice: Option<&str>) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAi => {
                self.synthesize_openai(text, voice.unwrap_or(OPENAI_DEFAULT_VOICE))
                    .await
            }
            TtsProvider::ElevenLabs => {
                self.synthesize_elevenlabs(text, voice.unwrap_or(ELEVENLABS_DEFAULT_VOICE))
                    .await
            }
        }
    }

    async fn synthesize_openai(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(voice, bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }

    async fn synthesize_elevenlabs(&self, text: &str, voice: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
        }

        let url = elevenlabs_speech_url(voice)?;

        let response = self
            .client
            .post(url)
            .header("xi-api-key", &self.api_key)
            .json(&ElevenLabsRequest {
                text,
                model_id: &self.model,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(voice, bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }
}

/// Synthesis URL for a voice id, escaped as a single path segment
fn elevenlabs_speech_url(voice: &str) -> Result<Url> {
    let mut url = Url::parse(ELEVENLABS_TTS_URL).map_err(|e| Error::Tts(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| Error::Tts("synthesis URL cannot take a path".to_string()))?
        .push(voice);
    Ok(url)
}

fn elevenlabs_catalog(catalog: ElevenLabsVoices) -> Vec<VoiceDescriptor> {
    catalog
        .voices
        .into_iter()
        .map(|v| {
            let language = v.labels.language.unwrap_or_else(|| "en".to_string());
            VoiceDescriptor::new(v.voice_id, v.name, language)
        })
        .collect()
}
