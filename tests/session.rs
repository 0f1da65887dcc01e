//! Conversation state machine integration tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Notify, mpsc};

use parley_gateway::responder::RuleBasedResponder;
use parley_gateway::voice::AudioEncoding;
use parley_gateway::{Conversation, Phase, Pipeline, Result, Role, SessionEvent, Transcriber};

mod common;
use common::{
    FailingSynthesizer, FailingTranscriber, FixedResponder, GatedTranscriber, StubSynthesizer,
    StubTranscriber, pipeline,
};

const GREETING: &str = "Hi! I'm your voice assistant. How can I help you today?";

fn session(pipeline: Arc<Pipeline>) -> (Arc<Conversation>, mpsc::Receiver<SessionEvent>) {
    let (tx, rx) = mpsc::channel(32);
    (Arc::new(Conversation::new("test", GREETING, pipeline, tx)), rx)
}

/// Poll until the session leaves `Idle` or the deadline passes
async fn wait_for_busy(session: &Conversation) {
    for _ in 0..200 {
        if session.phase() != Phase::Idle {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("session never left Idle");
}

#[tokio::test]
async fn round_trip_appends_user_then_assistant() {
    let (session, mut events) = session(pipeline(
        Arc::new(StubTranscriber("hello there")),
        Arc::new(FixedResponder("Hello! How can I help you today?")),
        Arc::new(StubSynthesizer(b"MP3")),
    ));

    session.submit_audio(b"blob".to_vec(), AudioEncoding::WebmOpus).await;

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[0].speaker, Role::Assistant);
    assert_eq!(transcript[1].speaker, Role::User);
    assert_eq!(transcript[1].text, "hello there");
    assert_eq!(transcript[2].speaker, Role::Assistant);
    assert_eq!(transcript[2].text, "Hello! How can I help you today?");
    assert_eq!(session.phase(), Phase::Idle);

    // Ordering: user turn, assistant turn, playback
    assert!(matches!(events.recv().await, Some(SessionEvent::UserTurn(t)) if t.speaker == Role::User));
    assert!(matches!(events.recv().await, Some(SessionEvent::AssistantTurn(_))));
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::Playback { audio, .. }) if audio == b"MP3"
    ));
}

#[tokio::test]
async fn audio_submitted_while_busy_is_dropped() {
    let gate = Arc::new(Notify::new());
    let (session, mut events) = session(pipeline(
        Arc::new(GatedTranscriber {
            gate: Arc::clone(&gate),
            text: "first recording",
        }),
        Arc::new(FixedResponder("ok")),
        Arc::new(StubSynthesizer(b"MP3")),
    ));

    let running = Arc::clone(&session);
    let turn = tokio::spawn(async move {
        running.submit_audio(b"A".to_vec(), AudioEncoding::WebmOpus).await;
    });

    wait_for_busy(&session).await;

    // Second submission hits a busy session and is discarded outright
    session.submit_audio(b"B".to_vec(), AudioEncoding::WebmOpus).await;
    assert_ne!(session.phase(), Phase::Idle);

    gate.notify_one();
    turn.await.expect("turn task");

    // Only the first recording produced a user turn
    let transcript = session.transcript();
    let user_turns: Vec<_> = transcript.iter().filter(|t| t.speaker == Role::User).collect();
    assert_eq!(user_turns.len(), 1);
    assert_eq!(user_turns[0].text, "first recording");
    assert_eq!(session.phase(), Phase::Idle);

    assert!(matches!(events.recv().await, Some(SessionEvent::UserTurn(_))));
}

#[tokio::test]
async fn transcription_failure_leaves_transcript_untouched() {
    let (session, mut events) = session(pipeline(
        Arc::new(FailingTranscriber),
        Arc::new(FixedResponder("unreachable")),
        Arc::new(StubSynthesizer(b"MP3")),
    ));

    session.submit_audio(b"blob".to_vec(), AudioEncoding::WebmOpus).await;

    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.phase(), Phase::Idle);
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::TranscriptionFailed { .. })
    ));
    // Failure ends the turn; nothing else follows
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn empty_transcription_is_treated_as_failure() {
    let (session, mut events) = session(pipeline(
        Arc::new(StubTranscriber("")),
        Arc::new(FixedResponder("unreachable")),
        Arc::new(StubSynthesizer(b"MP3")),
    ));

    session.submit_audio(b"blob".to_vec(), AudioEncoding::WebmOpus).await;

    assert_eq!(session.transcript().len(), 1);
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::TranscriptionFailed { .. })
    ));
}

#[tokio::test]
async fn synthesis_failure_keeps_text_reply() {
    let (session, mut events) = session(pipeline(
        Arc::new(StubTranscriber("hello")),
        Arc::new(FixedResponder("Hello!")),
        Arc::new(FailingSynthesizer),
    ));

    session.submit_audio(b"blob".to_vec(), AudioEncoding::WebmOpus).await;

    // Both turns stand even though playback never happens
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[2].text, "Hello!");
    assert_eq!(session.phase(), Phase::Idle);

    assert!(matches!(events.recv().await, Some(SessionEvent::UserTurn(_))));
    assert!(matches!(events.recv().await, Some(SessionEvent::AssistantTurn(_))));
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::SynthesisFailed { .. })
    ));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn reset_is_idempotent() {
    let (session, _events) = session(pipeline(
        Arc::new(StubTranscriber("hello")),
        Arc::new(FixedResponder("Hello!")),
        Arc::new(StubSynthesizer(b"MP3")),
    ));

    session.submit_audio(b"blob".to_vec(), AudioEncoding::WebmOpus).await;
    assert_eq!(session.transcript().len(), 3);

    session.reset();
    session.reset();

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].text, GREETING);
    assert_eq!(session.phase(), Phase::Idle);
}

#[tokio::test]
async fn reset_mid_turn_discards_the_in_flight_result() {
    let gate = Arc::new(Notify::new());
    let (session, _events) = session(pipeline(
        Arc::new(GatedTranscriber {
            gate: Arc::clone(&gate),
            text: "late arrival",
        }),
        Arc::new(FixedResponder("ok")),
        Arc::new(StubSynthesizer(b"MP3")),
    ));

    let running = Arc::clone(&session);
    let turn = tokio::spawn(async move {
        running.submit_audio(b"A".to_vec(), AudioEncoding::WebmOpus).await;
    });

    wait_for_busy(&session).await;
    session.reset();
    assert_eq!(session.phase(), Phase::Idle);

    gate.notify_one();
    turn.await.expect("turn task");

    // The zombie turn's transcription never lands in the fresh transcript
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].text, GREETING);
    assert_eq!(session.phase(), Phase::Idle);

    // And the session accepts new audio normally afterwards
    session.submit_audio(b"B".to_vec(), AudioEncoding::WebmOpus).await;
}

#[tokio::test]
async fn external_call_timeout_counts_as_failure() {
    struct SlowTranscriber;

    #[async_trait]
    impl Transcriber for SlowTranscriber {
        async fn transcribe(&self, _audio: &[u8], _hint: AudioEncoding) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok("too late".to_string())
        }

        fn name(&self) -> &'static str {
            "slow"
        }
    }

    let pipeline = Arc::new(Pipeline {
        transcriber: Arc::new(SlowTranscriber),
        responder: Arc::new(FixedResponder("unreachable")),
        synthesizer: Arc::new(StubSynthesizer(b"MP3")),
        call_timeout: Duration::from_millis(50),
    });
    let (session, mut events) = session(pipeline);

    session.submit_audio(b"blob".to_vec(), AudioEncoding::WebmOpus).await;

    assert_eq!(session.transcript().len(), 1);
    assert_eq!(session.phase(), Phase::Idle);
    assert!(matches!(
        events.recv().await,
        Some(SessionEvent::TranscriptionFailed { reason }) if reason.contains("timed out")
    ));
}

#[tokio::test]
async fn thanks_gets_youre_welcome_with_one_playback() {
    let (session, mut events) = session(pipeline(
        Arc::new(StubTranscriber("thank you so much")),
        Arc::new(RuleBasedResponder),
        Arc::new(StubSynthesizer(b"REPLY-MP3")),
    ));

    session.submit_audio(b"blob".to_vec(), AudioEncoding::WebmOpus).await;

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(
        transcript[2].text,
        "You're welcome! Is there anything else I can help with?"
    );

    let mut playbacks = 0;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::Playback { audio, .. } = event {
            assert_eq!(audio, b"REPLY-MP3");
            playbacks += 1;
        }
    }
    assert_eq!(playbacks, 1);
}
