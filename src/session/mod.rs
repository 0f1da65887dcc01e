//! Conversation sessions: transcript model, turn-taking state machine, and
//! the registry of live sessions

pub mod machine;
pub mod registry;
pub mod transcript;

pub use machine::{Conversation, Phase, Pipeline, SessionEvent};
pub use registry::SessionRegistry;
pub use transcript::{Role, Transcript, Turn};
