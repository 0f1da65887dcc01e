//! Reply generation
//!
//! The [`Responder`] contract is total: `respond` always returns text. The
//! LLM-backed implementation catches every fault internally and degrades to
//! a fixed apology rather than propagating.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::session::{Role, Turn};
use crate::{Error, Result};

/// Apology used whenever reply generation cannot proceed
pub const APOLOGY: &str = "I'm having trouble understanding. Could you please repeat that?";

/// Generates the next assistant utterance from the conversation so far
#[async_trait]
pub trait Responder: Send + Sync {
    /// Produce a reply. Total: never fails, never panics.
    async fn respond(&self, transcript: &[Turn]) -> String;
}

/// Canned keyword-matching responder, always available
///
/// Matches whole words of the most recent user turn so "hi" does not fire
/// inside "this".
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleBasedResponder;

impl RuleBasedResponder {
    fn reply_to(last_user: &str) -> String {
        let lower = last_user.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let has_word = |w: &str| words.contains(&w);

        if has_word("hello") || has_word("hi") || has_word("hey") {
            "Hello! How can I help you today?".to_string()
        } else if lower.contains("how are you") {
            "I'm doing well, thank you for asking! How can I assist you?".to_string()
        } else if has_word("bye") || has_word("goodbye") || lower.contains("see you") {
            "Goodbye! Have a great day!".to_string()
        } else if has_word("name") {
            "I'm your voice assistant. How can I help you?".to_string()
        } else if has_word("thank") || has_word("thanks") {
            "You're welcome! Is there anything else I can help with?".to_string()
        } else {
            format!("I heard you say: '{last_user}'. How can I assist you with that?")
        }
    }
}

#[async_trait]
impl Responder for RuleBasedResponder {
    async fn respond(&self, transcript: &[Turn]) -> String {
        transcript
            .iter()
            .rev()
            .find(|t| t.speaker == Role::User)
            .map_or_else(
                || "How can I help you today?".to_string(),
                |turn| Self::reply_to(&turn.text),
            )
    }
}

/// Chat completion request/response shapes (OpenAI-compatible)
#[derive(serde::Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(serde::Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(serde::Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(serde::Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(serde::Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// System prompt for the LLM-backed responder
const SYSTEM_PROMPT: &str =
    "You are a friendly voice assistant. Keep responses short, conversational, and speakable.";

/// Max tokens for generated replies
const MAX_TOKENS: u32 = 256;

/// LLM-backed responder over an OpenAI-compatible chat completions API
///
/// Faults (transport, auth, empty choices) degrade to [`APOLOGY`]; the
/// total contract holds regardless of what the remote service does.
pub struct LlmResponder {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
}

impl LlmResponder {
    /// Create a new LLM responder
    ///
    /// # Errors
    ///
    /// Returns error if the API key is empty
    pub fn new(api_key: SecretString, model: String) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "OpenAI API key required for LLM responder".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
        })
    }

    /// Map transcript turns to chat messages
    fn build_messages(transcript: &[Turn]) -> Vec<ChatMessage> {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        }];

        for turn in transcript {
            messages.push(ChatMessage {
                role: match turn.speaker {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                },
                content: turn.text.clone(),
            });
        }

        messages
    }

    async fn try_respond(&self, transcript: &[Turn]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: Self::build_messages(transcript),
            max_tokens: MAX_TOKENS,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "chat completion error");
            return Err(Error::Responder(format!("chat completion error {status}")));
        }

        let result: ChatResponse = response.json().await?;
        result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| Error::Responder("chat completion returned no content".to_string()))
    }
}

#[async_trait]
impl Responder for LlmResponder {
    async fn respond(&self, transcript: &[Turn]) -> String {
        match self.try_respond(transcript).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "LLM responder degraded to apology");
                APOLOGY.to_string()
            }
        }
    }
}
