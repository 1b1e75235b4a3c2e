//! Sentence synthesis clients.
//!
//! A [`SpeechSynthesizer`] turns one [`SynthesisRequest`] into one
//! [`AudioArtifact`]. Implementations are pure request/response boundaries:
//! they never touch the document and never retry. Blank text fails with
//! `EmptyInput` before any network call.

mod gateway;
mod mock;
mod volcengine;

pub use gateway::GatewaySynthesizer;
pub use mock::MockSynthesizer;
pub use volcengine::{VolcengineCredentials, VolcengineSynthesizer, VOLCENGINE_ENDPOINT};

use crate::artifact::AudioArtifact;
use crate::document::{Block, Sentence};
use crate::error::{EchoError, EchoResult};
use crate::voice::{Prosody, VoiceId};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One unit of text plus the voice parameters to render it with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisRequest {
    /// Text to synthesize
    pub text: String,
    /// Voice profile
    pub voice: VoiceId,
    /// Pitch token
    pub pitch: String,
    /// Speed token
    pub speed: String,
}

impl SynthesisRequest {
    /// Create a request with default prosody
    #[must_use]
    pub fn new<S: Into<String>>(text: S, voice: VoiceId) -> Self {
        Self {
            text: text.into(),
            voice,
            pitch: crate::document::DEFAULT_PROSODY.to_string(),
            speed: crate::document::DEFAULT_PROSODY.to_string(),
        }
    }

    /// Build the request for a sentence of a block
    #[must_use]
    pub fn for_sentence(block: &Block, sentence: &Sentence) -> Self {
        Self {
            text: sentence.text.clone(),
            voice: block.voice.clone(),
            pitch: sentence.pitch.clone(),
            speed: sentence.speed.clone(),
        }
    }

    /// Set the pitch token
    #[must_use]
    pub fn with_pitch<S: Into<String>>(mut self, pitch: S) -> Self {
        self.pitch = pitch.into();
        self
    }

    /// Set the speed token
    #[must_use]
    pub fn with_speed<S: Into<String>>(mut self, speed: S) -> Self {
        self.speed = speed.into();
        self
    }

    /// Pitch as a provider ratio
    #[must_use]
    pub fn pitch_ratio(&self) -> f32 {
        Prosody::Pitch.ratio(&self.pitch)
    }

    /// Speed as a provider ratio
    #[must_use]
    pub fn speed_ratio(&self) -> f32 {
        Prosody::Speed.ratio(&self.speed)
    }

    /// Reject blank text
    ///
    /// # Errors
    ///
    /// Returns `EmptyInput` if the trimmed text is empty
    pub fn validate(&self) -> EchoResult<()> {
        if self.text.trim().is_empty() {
            return Err(EchoError::empty_input("sentence text is blank"));
        }
        Ok(())
    }
}

/// Converts one text unit into one audio artifact
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize `request` into an artifact
    ///
    /// # Errors
    ///
    /// - `EmptyInput` if the text is blank (no network call is made)
    /// - `Unauthenticated` if the provider rejects the credentials
    /// - `ProviderError` for any other failure
    async fn synthesize(&self, request: &SynthesisRequest) -> EchoResult<AudioArtifact>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// Error body returned by the web gateway on non-success responses
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: Option<String>,
}

pub(crate) fn http_client(timeout: Duration) -> EchoResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| EchoError::configuration(format!("Failed to build HTTP client: {e}")))
}

pub(crate) fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}
