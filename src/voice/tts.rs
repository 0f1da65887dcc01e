//! Text-to-speech (TTS) backends
//!
//! All backends produce MP3 audio; faults become [`Error::Tts`] at the shim
//! boundary.

use async_trait::async_trait;
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// MIME type of synthesized audio
pub const SYNTHESIS_MIME: &str = "audio/mpeg";

/// Synthesizes speech from text
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns [`Error::Tts`] on any underlying fault; never panics.
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>>;

    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Whether the backend can actually serve requests
    fn is_configured(&self) -> bool {
        true
    }
}

/// Request body for the Google Text-to-Speech REST API
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleSynthesizeRequest<'a> {
    input: GoogleSynthesisInput<'a>,
    voice: GoogleVoiceSelection<'a>,
    audio_config: GoogleAudioConfig,
}

#[derive(serde::Serialize)]
struct GoogleSynthesisInput<'a> {
    text: &'a str,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleVoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleAudioConfig {
    audio_encoding: &'static str,
}

/// Response from the Google Text-to-Speech REST API
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleSynthesizeResponse {
    audio_content: String,
}

/// Google Cloud Text-to-Speech over the API-key REST endpoint
pub struct GoogleTextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    language_code: String,
    voice_name: String,
}

impl GoogleTextToSpeech {
    /// Create a new Google TTS backend
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, language_code: String, voice_name: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("Google API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            language_code,
            voice_name,
        })
    }
}

#[async_trait]
impl Synthesizer for GoogleTextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        tracing::debug!(chars = text.len(), "starting Google synthesis");

        let request = GoogleSynthesizeRequest {
            input: GoogleSynthesisInput { text },
            voice: GoogleVoiceSelection {
                language_code: &self.language_code,
                name: &self.voice_name,
            },
            audio_config: GoogleAudioConfig {
                audio_encoding: "MP3",
            },
        };

        let url = format!(
            "https://texttospeech.googleapis.com/v1/text:synthesize?key={}",
            self.api_key.expose_secret()
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("Google TTS request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google TTS API error");
            return Err(Error::Tts(format!("Google TTS API error {status}")));
        }

        let result: GoogleSynthesizeResponse = response
            .json()
            .await
            .map_err(|e| Error::Tts(format!("failed to parse Google TTS response: {e}")))?;

        let audio = base64::engine::general_purpose::STANDARD
            .decode(result.audio_content)
            .map_err(|e| Error::Tts(format!("invalid audio content encoding: {e}")))?;

        tracing::debug!(audio_bytes = audio.len(), "synthesis complete");
        Ok(audio)
    }

    fn name(&self) -> &'static str {
        "google-tts"
    }
}

/// OpenAI text-to-speech backend
pub struct OpenAiTextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    speed: f64,
    model: String,
}

impl OpenAiTextToSpeech {
    /// Create a new OpenAI TTS backend
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, voice: String, speed: f64, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            voice,
            speed,
            model,
        })
    }
}

#[async_trait]
impl Synthesizer for OpenAiTextToSpeech {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f64,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            speed: self.speed,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Tts(format!("OpenAI TTS request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "OpenAI TTS API error");
            return Err(Error::Tts(format!("OpenAI TTS error {status}")));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| Error::Tts(format!("failed to read OpenAI TTS body: {e}")))?;
        Ok(audio.to_vec())
    }

    fn name(&self) -> &'static str {
        "openai-tts"
    }
}

/// Ordered chain of synthesis backends
///
/// From the conversation core's perspective this is a single atomic call;
/// the fallback order is internal.
pub struct TtsChain {
    backends: Vec<Box<dyn Synthesizer>>,
}

impl TtsChain {
    /// Create a chain from an ordered list of backends
    #[must_use]
    pub fn new(backends: Vec<Box<dyn Synthesizer>>) -> Self {
        Self { backends }
    }

    /// Create an empty chain (synthesis unavailable, sessions degrade to text)
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Synthesizer for TtsChain {
    async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        for backend in &self.backends {
            match backend.synthesize(text).await {
                Ok(audio) => return Ok(audio),
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        error = %e,
                        "synthesis backend failed, trying next"
                    );
                }
            }
        }
        Err(Error::Tts("all synthesis backends failed".to_string()))
    }

    fn name(&self) -> &'static str {
        "tts-chain"
    }

    fn is_configured(&self) -> bool {
        !self.backends.is_empty()
    }
}
