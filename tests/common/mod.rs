//! Shared test utilities: canned pipeline shims
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use parley_gateway::responder::Responder;
use parley_gateway::voice::AudioEncoding;
use parley_gateway::{Error, Pipeline, Result, Synthesizer, Transcriber, Turn};

/// Transcriber returning a fixed string
pub struct StubTranscriber(pub &'static str);

#[async_trait]
impl Transcriber for StubTranscriber {
    async fn transcribe(&self, _audio: &[u8], _hint: AudioEncoding) -> Result<String> {
        Ok(self.0.to_string())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Transcriber that blocks until released, for busy-phase tests
pub struct GatedTranscriber {
    pub gate: Arc<Notify>,
    pub text: &'static str,
}

#[async_trait]
impl Transcriber for GatedTranscriber {
    async fn transcribe(&self, _audio: &[u8], _hint: AudioEncoding) -> Result<String> {
        self.gate.notified().await;
        Ok(self.text.to_string())
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

/// Transcriber that always fails
pub struct FailingTranscriber;

#[async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe(&self, _audio: &[u8], _hint: AudioEncoding) -> Result<String> {
        Err(Error::Stt("backend down".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Responder returning a fixed reply
pub struct FixedResponder(pub &'static str);

#[async_trait]
impl Responder for FixedResponder {
    async fn respond(&self, _transcript: &[Turn]) -> String {
        self.0.to_string()
    }
}

/// Synthesizer returning fixed bytes
pub struct StubSynthesizer(pub &'static [u8]);

#[async_trait]
impl Synthesizer for StubSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Ok(self.0.to_vec())
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}

/// Synthesizer that always fails
pub struct FailingSynthesizer;

#[async_trait]
impl Synthesizer for FailingSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Err(Error::Tts("backend down".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Assemble a pipeline from arbitrary shims
#[must_use]
pub fn pipeline(
    transcriber: Arc<dyn Transcriber>,
    responder: Arc<dyn Responder>,
    synthesizer: Arc<dyn Synthesizer>,
) -> Arc<Pipeline> {
    Arc::new(Pipeline {
        transcriber,
        responder,
        synthesizer,
        call_timeout: Duration::from_secs(5),
    })
}
