//! Client for the application's own `/api/tts` endpoint.

use super::{http_client, is_auth_failure, ErrorBody, SpeechSynthesizer, SynthesisRequest};
use crate::artifact::AudioArtifact;
use crate::error::{EchoError, EchoResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TtsResponse {
    audio_url: String,
}

/// Synthesizes through the web gateway, which holds the provider credentials
#[derive(Debug, Clone)]
pub struct GatewaySynthesizer {
    client: reqwest::Client,
    endpoint: String,
    session_token: Option<String>,
}

impl GatewaySynthesizer {
    /// Create a client for the gateway at `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> EchoResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/api/tts", base_url.trim_end_matches('/')),
            session_token: None,
        })
    }

    /// Send `token` as a bearer credential on every call
    #[must_use]
    pub fn with_session_token<S: Into<String>>(mut self, token: S) -> Self {
        self.session_token = Some(token.into());
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for GatewaySynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> EchoResult<AudioArtifact> {
        request.validate()?;

        debug!(voice = %request.voice, chars = request.text.len(), "POST {}", self.endpoint);
        let mut call = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.session_token {
            call = call.bearer_auth(token);
        }
        let response = call.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            let message = body
                .error
                .unwrap_or_else(|| format!("generation failed ({status})"));
            if is_auth_failure(status) {
                return Err(EchoError::unauthenticated(message));
            }
            return Err(EchoError::provider(message));
        }

        let body: TtsResponse = response.json().await?;
        AudioArtifact::from_data_uri(&body.audio_url)
            .map_err(|e| EchoError::provider(format!("gateway returned an unusable artifact: {e}")))
    }

    fn name(&self) -> &'static str {
        "gateway"
    }
}
