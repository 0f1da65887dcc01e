//! Voice API endpoints for speech-to-text and text-to-speech

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::post,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};

use super::ApiState;
use crate::voice::AudioEncoding;
use crate::voice::tts::SYNTHESIS_MIME;

/// Build voice router
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/transcribe", post(transcribe))
        .route("/synthesize", post(synthesize))
        .route("/say", post(say))
        .route("/capabilities", axum::routing::get(capabilities))
        .with_state(state)
}

/// Voice capabilities response
#[derive(Debug, Serialize)]
pub struct VoiceCapabilities {
    pub stt_available: bool,
    pub tts_available: bool,
}

/// Get voice capabilities
///
/// Clients use this to decide whether to offer recording and playback UI.
async fn capabilities(State(state): State<Arc<ApiState>>) -> Json<VoiceCapabilities> {
    Json(VoiceCapabilities {
        stt_available: state.pipeline.transcriber.is_configured(),
        tts_available: state.pipeline.synthesizer.is_configured(),
    })
}

/// Transcription response
#[derive(Debug, Serialize)]
pub struct TranscribeResponse {
    pub text: String,
}

/// Transcribe audio to text
///
/// The request `Content-Type` selects the encoding hint; absent or unknown
/// types fall back to `WebM/Opus` (the browser recorder default)
async fn transcribe(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<TranscribeResponse>, VoiceError> {
    if !state.pipeline.transcriber.is_configured() {
        return Err(VoiceError::NotConfigured("STT not configured (no API keys)"));
    }

    if body.is_empty() {
        return Err(VoiceError::BadRequest("Empty audio data"));
    }

    let encoding = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map_or(AudioEncoding::WebmOpus, AudioEncoding::from_mime);

    let text = state
        .pipeline
        .transcriber
        .transcribe(&body, encoding)
        .await
        .map_err(|e| VoiceError::TranscriptionFailed(e.to_string()))?;

    Ok(Json(TranscribeResponse { text }))
}

/// Synthesis request
#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
}

/// Synthesize text to speech
///
/// Returns audio in MP3 format
async fn synthesize(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Response, VoiceError> {
    if !state.pipeline.synthesizer.is_configured() {
        return Err(VoiceError::NotConfigured("TTS not configured (no API keys)"));
    }

    if request.text.is_empty() {
        return Err(VoiceError::BadRequest("Empty text"));
    }

    let audio = state
        .pipeline
        .synthesizer
        .synthesize(&request.text)
        .await
        .map_err(|e| VoiceError::SynthesisFailed(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, SYNTHESIS_MIME)],
        audio,
    )
        .into_response())
}

/// Synthesize text and return an autoplaying HTML audio snippet
///
/// Embeds the audio as a base64 data URL so the snippet is self-contained
async fn say(
    State(state): State<Arc<ApiState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Result<Html<String>, VoiceError> {
    if !state.pipeline.synthesizer.is_configured() {
        return Err(VoiceError::NotConfigured("TTS not configured (no API keys)"));
    }

    if request.text.is_empty() {
        return Err(VoiceError::BadRequest("Empty text"));
    }

    let audio = state
        .pipeline
        .synthesizer
        .synthesize(&request.text)
        .await
        .map_err(|e| VoiceError::SynthesisFailed(e.to_string()))?;

    Ok(Html(autoplay_html(SYNTHESIS_MIME, &audio)))
}

/// Render an `<audio autoplay>` element with the payload inlined as a
/// base64 data URL
#[must_use]
pub fn autoplay_html(mime: &str, audio: &[u8]) -> String {
    let encoded = BASE64.encode(audio);
    format!(
        "<audio autoplay=\"true\">\n<source src=\"data:{mime};base64,{encoded}\" type=\"{mime}\">\n</audio>"
    )
}

/// Voice API errors
#[derive(Debug)]
pub enum VoiceError {
    NotConfigured(&'static str),
    BadRequest(&'static str),
    TranscriptionFailed(String),
    SynthesisFailed(String),
}

impl IntoResponse for VoiceError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: ErrorBody,
        }

        #[derive(Serialize)]
        struct ErrorBody {
            code: &'static str,
            message: String,
        }

        let (status, code, message) = match self {
            Self::NotConfigured(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "not_configured", msg.to_string())
            }
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.to_string()),
            Self::TranscriptionFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "transcription_failed", msg)
            }
            Self::SynthesisFailed(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "synthesis_failed", msg)
            }
        };

        (
            status,
            Json(ErrorResponse {
                error: ErrorBody { code, message },
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autoplay_snippet_embeds_data_url() {
        let html = autoplay_html("audio/mpeg", b"abc");
        assert!(html.starts_with("<audio autoplay"));
        assert!(html.contains("data:audio/mpeg;base64,YWJj"));
        assert!(html.contains("type=\"audio/mpeg\""));
    }

    #[test]
    fn autoplay_snippet_handles_empty_audio() {
        let html = autoplay_html("audio/mpeg", b"");
        assert!(html.contains("data:audio/mpeg;base64,\""));
    }
}
