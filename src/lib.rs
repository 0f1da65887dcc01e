//! Parley Gateway - Voice chatbot gateway
//!
//! This library provides the core functionality for the Parley gateway:
//! - Conversation sessions with a turn-taking state machine
//! - Voice processing (STT and TTS fallback chains)
//! - Reply generation (rule-based or LLM-backed)
//! - HTTP/WebSocket API for browser clients
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │              Browser client                   │
//! │   recorder  │  playback  │  transcript view  │
//! └──────────────────┬───────────────────────────┘
//!                    │ HTTP + WebSocket
//! ┌──────────────────▼───────────────────────────┐
//! │              Parley Gateway                   │
//! │   Sessions  │  State machine  │  Registry    │
//! └──────────────────┬───────────────────────────┘
//!                    │
//! ┌──────────────────▼───────────────────────────┐
//! │             Pipeline shims                    │
//! │   STT chain │ Responder │ TTS chain          │
//! └──────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod responder;
pub mod session;
pub mod voice;

pub use config::{Config, ResponderMode};
pub use error::{Error, Result};
pub use responder::Responder;
pub use session::{
    Conversation, Phase, Pipeline, Role, SessionEvent, SessionRegistry, Transcript, Turn,
};
pub use voice::{AudioEncoding, Synthesizer, Transcriber};
