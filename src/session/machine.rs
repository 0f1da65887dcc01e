//! Conversation turn-taking state machine
//!
//! The sole arbiter of "what happens next" in a voice conversation. One
//! pipeline instance at most is in flight per session: audio submitted
//! while any phase other than `Idle` is active is dropped, never queued.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;

use super::transcript::{Role, Transcript, Turn};
use crate::config::{Config, ResponderMode};
use crate::responder::{LlmResponder, Responder, RuleBasedResponder};
use crate::voice::{
    AudioEncoding, GoogleSpeechToText, GoogleTextToSpeech, OpenAiTextToSpeech, SttChain,
    Synthesizer, Transcriber, TtsChain, WhisperSpeechToText, tts::SYNTHESIS_MIME,
};

/// Transcriber output the original pipeline used as an in-band error marker;
/// treated the same as an empty transcript.
const ERROR_SENTINEL: &str = "Could not transcribe audio. Please try again.";

/// Current stage of the in-flight pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Transcribing,
    Responding,
    Synthesizing,
    Playing,
}

/// Notification for the presentation layer
///
/// The presentation layer renders these; it never drives the state machine.
#[derive(Debug)]
pub enum SessionEvent {
    /// A user turn was appended after successful transcription
    UserTurn(Turn),
    /// An assistant turn was appended
    AssistantTurn(Turn),
    /// Synthesized audio ready for playback; ownership of the buffer moves
    /// with the event
    Playback { mime: &'static str, audio: Vec<u8> },
    /// Transcription failed; no turn was appended
    TranscriptionFailed { reason: String },
    /// Synthesis failed; the assistant text turn stands, playback is skipped
    SynthesisFailed { reason: String },
}

/// The external-call shims a conversation runs against
pub struct Pipeline {
    pub transcriber: Arc<dyn Transcriber>,
    pub responder: Arc<dyn Responder>,
    pub synthesizer: Arc<dyn Synthesizer>,
    /// Budget for each external call; a timeout is the same failure as any
    /// other backend fault
    pub call_timeout: Duration,
}

impl Pipeline {
    /// Build the shim stack from configuration
    ///
    /// Builds the STT/TTS fallback chains from whichever API keys are
    /// present; empty chains simply report failure, which the state machine
    /// already degrades through.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let mut stt: Vec<Box<dyn Transcriber>> = Vec::new();
        if let Some(key) = &config.api_keys.google {
            match GoogleSpeechToText::new(
                key.clone(),
                config.voice.language_code.clone(),
                config.voice.sample_rate_hertz,
            ) {
                Ok(backend) => stt.push(Box::new(backend)),
                Err(e) => tracing::warn!(error = %e, "skipping Google STT backend"),
            }
        }
        if let Some(key) = &config.api_keys.openai {
            match WhisperSpeechToText::new(key.clone(), config.voice.stt_model.clone()) {
                Ok(backend) => stt.push(Box::new(backend)),
                Err(e) => tracing::warn!(error = %e, "skipping Whisper STT backend"),
            }
        }

        let mut tts: Vec<Box<dyn Synthesizer>> = Vec::new();
        if let Some(key) = &config.api_keys.google {
            match GoogleTextToSpeech::new(
                key.clone(),
                config.voice.language_code.clone(),
                config.voice.voice_name.clone(),
            ) {
                Ok(backend) => tts.push(Box::new(backend)),
                Err(e) => tracing::warn!(error = %e, "skipping Google TTS backend"),
            }
        }
        if let Some(key) = &config.api_keys.openai {
            match OpenAiTextToSpeech::new(
                key.clone(),
                config.voice.tts_voice.clone(),
                config.voice.tts_speed,
                config.voice.tts_model.clone(),
            ) {
                Ok(backend) => tts.push(Box::new(backend)),
                Err(e) => tracing::warn!(error = %e, "skipping OpenAI TTS backend"),
            }
        }

        let responder: Arc<dyn Responder> = match &config.responder {
            ResponderMode::Rules => Arc::new(RuleBasedResponder),
            ResponderMode::Llm { model } => config.api_keys.openai.as_ref().map_or_else(
                || {
                    tracing::warn!("LLM responder requested but no OpenAI key, using rules");
                    Arc::new(RuleBasedResponder) as Arc<dyn Responder>
                },
                |key| match LlmResponder::new(key.clone(), model.clone()) {
                    Ok(responder) => Arc::new(responder) as Arc<dyn Responder>,
                    Err(e) => {
                        tracing::warn!(error = %e, "LLM responder unavailable, using rules");
                        Arc::new(RuleBasedResponder)
                    }
                },
            ),
        };

        tracing::info!(
            stt_backends = stt.len(),
            tts_backends = tts.len(),
            "pipeline assembled"
        );

        Self {
            transcriber: Arc::new(SttChain::new(stt)),
            responder,
            synthesizer: Arc::new(TtsChain::new(tts)),
            call_timeout: Duration::from_secs(config.call_timeout_secs),
        }
    }
}

/// Mutable per-session state, guarded by the conversation's mutex
struct SessionState {
    transcript: Transcript,
    phase: Phase,
    /// Recorded audio held only while a turn is entering transcription
    pending_audio: Option<Vec<u8>>,
    /// Bumped by `reset()`; a pipeline started under an older epoch
    /// discards its late results instead of writing into the fresh state
    epoch: u64,
}

/// One voice conversation: ordered transcript plus the turn pipeline
///
/// Exactly one `Conversation` exists per active session; nothing is shared
/// between sessions.
pub struct Conversation {
    id: String,
    greeting: String,
    pipeline: Arc<Pipeline>,
    events: mpsc::Sender<SessionEvent>,
    state: Mutex<SessionState>,
}

impl Conversation {
    /// Create a session seeded with the assistant greeting
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        greeting: impl Into<String>,
        pipeline: Arc<Pipeline>,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let greeting = greeting.into();
        Self {
            id: id.into(),
            state: Mutex::new(SessionState {
                transcript: Transcript::seeded(&greeting),
                phase: Phase::Idle,
                pending_audio: None,
                epoch: 0,
            }),
            greeting,
            pipeline,
            events,
        }
    }

    /// Session identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state().phase
    }

    /// Point-in-time transcript snapshot
    ///
    /// Never exposes a partially appended turn: appends happen under the
    /// same lock this snapshot takes.
    #[must_use]
    pub fn transcript(&self) -> Vec<Turn> {
        self.state().transcript.snapshot()
    }

    /// Restore the session to its initial seeded state from any phase
    pub fn reset(&self) {
        let mut state = self.state();
        state.transcript = Transcript::seeded(&self.greeting);
        state.phase = Phase::Idle;
        state.pending_audio = None;
        state.epoch += 1;
        tracing::debug!(session_id = %self.id, "session reset");
    }

    /// Submit recorded audio, running one full turn of the pipeline
    ///
    /// No-op when a turn is already in flight: overlapping audio is dropped
    /// entirely (backpressure, not queueing). On return the session is back
    /// at `Idle`, whatever happened in between.
    pub async fn submit_audio(&self, audio: Vec<u8>, hint: AudioEncoding) {
        let epoch = {
            let mut state = self.state();
            if state.phase != Phase::Idle {
                tracing::debug!(
                    session_id = %self.id,
                    phase = ?state.phase,
                    dropped_bytes = audio.len(),
                    "pipeline busy, dropping audio"
                );
                return;
            }
            state.phase = Phase::Transcribing;
            state.pending_audio = Some(audio);
            state.epoch
        };

        // Restores Idle and releases the pending buffer on every exit path
        let _guard = IdleGuard {
            session: self,
            epoch,
        };
        self.run_turn(epoch, hint).await;
    }

    /// Drive one turn: transcribe, respond, synthesize, hand off playback
    async fn run_turn(&self, epoch: u64, hint: AudioEncoding) {
        let Some(audio) = self.advance(epoch, |s| s.pending_audio.take()).flatten() else {
            return;
        };

        let transcribed = timeout(
            self.pipeline.call_timeout,
            self.pipeline.transcriber.transcribe(&audio, hint),
        )
        .await;
        drop(audio);

        let text = match transcribed {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                self.emit(SessionEvent::TranscriptionFailed {
                    reason: e.to_string(),
                })
                .await;
                return;
            }
            Err(_) => {
                self.emit(SessionEvent::TranscriptionFailed {
                    reason: "transcription timed out".to_string(),
                })
                .await;
                return;
            }
        };

        let text = text.trim().to_string();
        if text.is_empty() || text == ERROR_SENTINEL {
            tracing::debug!(session_id = %self.id, "discarding empty transcription");
            self.emit(SessionEvent::TranscriptionFailed {
                reason: "nothing transcribed".to_string(),
            })
            .await;
            return;
        }

        let Some((user_turn, history)) = self.advance(epoch, |s| {
            let turn = s.transcript.append(Role::User, text.clone());
            s.phase = Phase::Responding;
            (turn, s.transcript.snapshot())
        }) else {
            return;
        };
        self.emit(SessionEvent::UserTurn(user_turn)).await;

        // Total by contract: the responder degrades internally, never fails
        let reply = self.pipeline.responder.respond(&history).await;

        let Some(assistant_turn) = self.advance(epoch, |s| {
            let turn = s.transcript.append(Role::Assistant, reply.clone());
            s.phase = Phase::Synthesizing;
            turn
        }) else {
            return;
        };
        self.emit(SessionEvent::AssistantTurn(assistant_turn)).await;

        let synthesized = timeout(
            self.pipeline.call_timeout,
            self.pipeline.synthesizer.synthesize(&reply),
        )
        .await;

        match synthesized {
            Ok(Ok(mp3)) => {
                if self.advance(epoch, |s| s.phase = Phase::Playing).is_none() {
                    return;
                }
                // Buffer ownership moves to the presentation layer
                self.emit(SessionEvent::Playback {
                    mime: SYNTHESIS_MIME,
                    audio: mp3,
                })
                .await;
            }
            Ok(Err(e)) => {
                // Text-only degradation: the assistant turn stands
                self.emit(SessionEvent::SynthesisFailed {
                    reason: e.to_string(),
                })
                .await;
            }
            Err(_) => {
                self.emit(SessionEvent::SynthesisFailed {
                    reason: "synthesis timed out".to_string(),
                })
                .await;
            }
        }
    }

    /// Mutate state if the session has not been reset since the turn began
    fn advance<T>(&self, epoch: u64, f: impl FnOnce(&mut SessionState) -> T) -> Option<T> {
        let mut state = self.state();
        if state.epoch != epoch {
            tracing::debug!(session_id = %self.id, "session reset mid-turn, discarding result");
            return None;
        }
        Some(f(&mut state))
    }

    async fn emit(&self, event: SessionEvent) {
        if self.events.send(event).await.is_err() {
            tracing::trace!(session_id = %self.id, "event receiver gone");
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the session to `Idle` and clears the pending buffer when the
/// pipeline exits, on success and failure paths alike
struct IdleGuard<'a> {
    session: &'a Conversation,
    epoch: u64,
}

impl Drop for IdleGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.session.state();
        if state.epoch == self.epoch {
            state.phase = Phase::Idle;
            state.pending_audio = None;
        }
    }
}
