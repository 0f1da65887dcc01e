//! Voice processing: transcription and synthesis shims
//!
//! The gateway core never talks to a speech API directly; it goes through
//! the [`stt::Transcriber`] and [`tts::Synthesizer`] contracts, each backed
//! by an ordered chain of HTTP backends.

pub mod stt;
pub mod tts;

use std::io::Cursor;

use serde::{Deserialize, Serialize};

pub use stt::{GoogleSpeechToText, SttChain, Transcriber, WhisperSpeechToText};
pub use tts::{GoogleTextToSpeech, OpenAiTextToSpeech, Synthesizer, TtsChain};

/// Container/codec hint for captured audio
///
/// Browser recorder widgets typically emit WEBM/OPUS; WAV and FLAC uploads
/// are also accepted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioEncoding {
    #[default]
    WebmOpus,
    Linear16,
    Flac,
}

impl AudioEncoding {
    /// Derive the encoding from a filename extension
    #[must_use]
    pub fn from_extension(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".wav") {
            Self::Linear16
        } else if lower.ends_with(".flac") {
            Self::Flac
        } else {
            Self::WebmOpus
        }
    }

    /// Derive the encoding from a MIME type
    #[must_use]
    pub fn from_mime(mime: &str) -> Self {
        let lower = mime.to_lowercase();
        if lower.contains("wav") {
            Self::Linear16
        } else if lower.contains("flac") {
            Self::Flac
        } else {
            Self::WebmOpus
        }
    }

    /// Encoding name in the Google Speech API vocabulary
    #[must_use]
    pub const fn google_name(self) -> &'static str {
        match self {
            Self::WebmOpus => "WEBM_OPUS",
            Self::Linear16 => "LINEAR16",
            Self::Flac => "FLAC",
        }
    }

    /// MIME type for upload bodies
    #[must_use]
    pub const fn mime(self) -> &'static str {
        match self {
            Self::WebmOpus => "audio/webm",
            Self::Linear16 => "audio/wav",
            Self::Flac => "audio/flac",
        }
    }

    /// Filename to attach to multipart uploads
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::WebmOpus => "audio.webm",
            Self::Linear16 => "audio.wav",
            Self::Flac => "audio.flac",
        }
    }
}

/// Read the sample rate from a WAV (RIFF) header, if the bytes parse as WAV
///
/// Used to override the configured default rate when a WAV upload declares
/// its own.
#[must_use]
pub fn wav_sample_rate(audio: &[u8]) -> Option<u32> {
    hound::WavReader::new(Cursor::new(audio))
        .ok()
        .map(|r| r.spec().sample_rate)
}
