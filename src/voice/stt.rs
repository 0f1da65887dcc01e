//! Speech-to-text (STT) backends
//!
//! Every backend converts its faults into [`Error::Stt`]; the conversation
//! core never sees a transport- or vendor-specific failure.

use async_trait::async_trait;
use base64::Engine as _;
use secrecy::{ExposeSecret, SecretString};

use super::AudioEncoding;
use crate::{Error, Result};

/// Transcribes an audio buffer into text
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe audio to text
    ///
    /// # Errors
    ///
    /// Returns [`Error::Stt`] on any underlying fault; never panics.
    async fn transcribe(&self, audio: &[u8], hint: AudioEncoding) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Whether the backend can actually serve requests
    fn is_configured(&self) -> bool {
        true
    }
}

/// Request body for the Google Speech REST API
#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRecognizeRequest {
    config: GoogleRecognitionConfig,
    audio: GoogleRecognitionAudio,
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRecognitionConfig {
    encoding: &'static str,
    sample_rate_hertz: u32,
    language_code: String,
    enable_automatic_punctuation: bool,
}

#[derive(serde::Serialize)]
struct GoogleRecognitionAudio {
    content: String,
}

/// Response from the Google Speech REST API
#[derive(serde::Deserialize)]
struct GoogleRecognizeResponse {
    #[serde(default)]
    results: Vec<GoogleSpeechResult>,
}

#[derive(serde::Deserialize)]
struct GoogleSpeechResult {
    #[serde(default)]
    alternatives: Vec<GoogleSpeechAlternative>,
}

#[derive(serde::Deserialize)]
struct GoogleSpeechAlternative {
    #[serde(default)]
    transcript: String,
}

/// Response from the OpenAI Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Google Cloud Speech-to-Text over the API-key REST endpoint
pub struct GoogleSpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    language_code: String,
    sample_rate_hertz: u32,
}

impl GoogleSpeechToText {
    /// Create a new Google STT backend
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, language_code: String, sample_rate_hertz: u32) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config("Google API key required for STT".to_string()));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            language_code,
            sample_rate_hertz,
        })
    }

    /// Effective sample rate: WAV uploads declare their own in the header
    fn sample_rate_for(&self, audio: &[u8], hint: AudioEncoding) -> u32 {
        if hint == AudioEncoding::Linear16 {
            if let Some(rate) = super::wav_sample_rate(audio) {
                return rate;
            }
        }
        self.sample_rate_hertz
    }
}

#[async_trait]
impl Transcriber for GoogleSpeechToText {
    async fn transcribe(&self, audio: &[u8], hint: AudioEncoding) -> Result<String> {
        tracing::debug!(
            audio_bytes = audio.len(),
            encoding = hint.google_name(),
            "starting Google transcription"
        );

        let request = GoogleRecognizeRequest {
            config: GoogleRecognitionConfig {
                encoding: hint.google_name(),
                sample_rate_hertz: self.sample_rate_for(audio, hint),
                language_code: self.language_code.clone(),
                enable_automatic_punctuation: true,
            },
            audio: GoogleRecognitionAudio {
                content: base64::engine::general_purpose::STANDARD.encode(audio),
            },
        };

        let url = format!(
            "https://speech.googleapis.com/v1/speech:recognize?key={}",
            self.api_key.expose_secret()
        );

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Stt(format!("Google Speech request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Google Speech API error");
            return Err(Error::Stt(format!("Google Speech API error {status}")));
        }

        let result: GoogleRecognizeResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("failed to parse Google Speech response: {e}")))?;

        let transcript = result
            .results
            .iter()
            .filter_map(|r| r.alternatives.first())
            .map(|a| a.transcript.as_str())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();

        tracing::info!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }

    fn name(&self) -> &'static str {
        "google-speech"
    }
}

/// OpenAI Whisper transcription backend
pub struct WhisperSpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl WhisperSpeechToText {
    /// Create a new Whisper backend
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for Whisper".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        })
    }
}

#[async_trait]
impl Transcriber for WhisperSpeechToText {
    async fn transcribe(&self, audio: &[u8], hint: AudioEncoding) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name(hint.file_name())
                    .mime_str(hint.mime())
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Stt(format!("Whisper request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}")));
        }

        let result: WhisperResponse = response
            .json()
            .await
            .map_err(|e| Error::Stt(format!("failed to parse Whisper response: {e}")))?;

        tracing::info!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    fn name(&self) -> &'static str {
        "openai-whisper"
    }
}

/// Ordered chain of transcription backends
///
/// Backends are tried in order until one succeeds; only when all are
/// exhausted does the failure reach the caller.
pub struct SttChain {
    backends: Vec<Box<dyn Transcriber>>,
}

impl SttChain {
    /// Create a chain from an ordered list of backends
    #[must_use]
    pub fn new(backends: Vec<Box<dyn Transcriber>>) -> Self {
        Self { backends }
    }

    /// Create an empty chain (transcription unavailable)
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl Transcriber for SttChain {
    async fn transcribe(&self, audio: &[u8], hint: AudioEncoding) -> Result<String> {
        for backend in &self.backends {
            match backend.transcribe(audio, hint).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(
                        backend = backend.name(),
                        error = %e,
                        "transcription backend failed, trying next"
                    );
                }
            }
        }
        Err(Error::Stt("all transcription backends failed".to_string()))
    }

    fn name(&self) -> &'static str {
        "stt-chain"
    }

    fn is_configured(&self) -> bool {
        !self.backends.is_empty()
    }
}
