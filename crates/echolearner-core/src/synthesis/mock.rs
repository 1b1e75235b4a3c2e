//! Offline provider returning deterministic payloads.

use super::{SpeechSynthesizer, SynthesisRequest};
use crate::artifact::AudioArtifact;
use crate::error::{EchoError, EchoResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Stand-in provider for demos and tests.
///
/// The payload for a request is the UTF-8 bytes of `"<voice>:<text>"`, so a
/// merge of several artifacts can be checked byte for byte. Failures can be
/// scripted per text.
#[derive(Debug, Default)]
pub struct MockSynthesizer {
    delay: Duration,
    calls: AtomicUsize,
    requests: Mutex<Vec<SynthesisRequest>>,
    failures: Mutex<HashMap<String, EchoError>>,
}

impl MockSynthesizer {
    /// Create a provider that answers immediately
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Suspend for `delay` before answering each call
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every call whose text equals `text` with `error`
    pub fn fail_on<S: Into<String>>(&self, text: S, error: EchoError) {
        self.failures.lock().insert(text.into(), error);
    }

    /// Stop failing calls for `text`
    pub fn clear_failure(&self, text: &str) {
        self.failures.lock().remove(text);
    }

    /// Payload produced for `request`
    #[must_use]
    pub fn payload_for(request: &SynthesisRequest) -> Vec<u8> {
        format!("{}:{}", request.voice, request.text).into_bytes()
    }

    /// Number of calls that reached the provider (blank text excluded)
    #[must_use]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests that reached the provider, in call order
    #[must_use]
    pub fn requests(&self) -> Vec<SynthesisRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SpeechSynthesizer for MockSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> EchoResult<AudioArtifact> {
        request.validate()?;

        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        debug!(voice = %request.voice, text = %request.text, "Mock synthesis");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let failure = self.failures.lock().get(&request.text).cloned();
        match failure {
            Some(err) => Err(err),
            None => Ok(AudioArtifact::from_bytes(Self::payload_for(request))),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
