//! Ordered conversation transcript
//!
//! Turns are immutable once appended; sequence numbers follow insertion
//! order and are the only meaningful ordering.

use serde::{Deserialize, Serialize};

/// Who produced a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One utterance in transcript order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Role,
    pub text: String,
    pub sequence: u64,
}

/// Append-only ordered sequence of turns
///
/// Owned exclusively by the conversation state machine; readers only ever
/// see point-in-time snapshots.
#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
    next_sequence: u64,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub const fn new() -> Self {
        Self {
            turns: Vec::new(),
            next_sequence: 0,
        }
    }

    /// Create a transcript seeded with an assistant greeting
    #[must_use]
    pub fn seeded(greeting: &str) -> Self {
        let mut transcript = Self::new();
        transcript.append(Role::Assistant, greeting);
        transcript
    }

    /// Append a turn, assigning the next sequence number
    pub fn append(&mut self, speaker: Role, text: impl Into<String>) -> Turn {
        let turn = Turn {
            speaker,
            text: text.into(),
            sequence: self.next_sequence,
        };
        self.next_sequence += 1;
        self.turns.push(turn.clone());
        turn
    }

    /// Point-in-time snapshot of all turns
    #[must_use]
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the transcript has no turns
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The most recent turn, if any
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The most recent user turn, if any
    ///
    /// Tolerates irregular shapes (consecutive user turns, missing
    /// assistant replies) by scanning backwards.
    #[must_use]
    pub fn last_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.speaker == Role::User)
            .map(|t| t.text.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_follows_insertion_order() {
        let mut transcript = Transcript::new();
        let a = transcript.append(Role::Assistant, "hi");
        let b = transcript.append(Role::User, "hello");
        let c = transcript.append(Role::Assistant, "how can I help?");

        assert_eq!(a.sequence, 0);
        assert_eq!(b.sequence, 1);
        assert_eq!(c.sequence, 2);
    }

    #[test]
    fn seeded_transcript_has_one_assistant_turn() {
        let transcript = Transcript::seeded("Hi there!");
        assert_eq!(transcript.len(), 1);
        let turn = transcript.last().unwrap();
        assert_eq!(turn.speaker, Role::Assistant);
        assert_eq!(turn.text, "Hi there!");
        assert_eq!(turn.sequence, 0);
    }

    #[test]
    fn snapshot_is_detached_from_later_appends() {
        let mut transcript = Transcript::seeded("Hi");
        let snapshot = transcript.snapshot();
        transcript.append(Role::User, "hello");

        assert_eq!(snapshot.len(), 1);
        assert_eq!(transcript.len(), 2);
    }

    #[test]
    fn last_user_text_skips_assistant_turns() {
        let mut transcript = Transcript::seeded("Hi");
        assert_eq!(transcript.last_user_text(), None);

        transcript.append(Role::User, "first");
        transcript.append(Role::User, "second");
        transcript.append(Role::Assistant, "reply");

        assert_eq!(transcript.last_user_text(), Some("second"));
    }

    #[test]
    fn role_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        assert_eq!(
            serde_json::to_string(&Role::Assistant).unwrap(),
            "\"assistant\""
        );
    }
}
