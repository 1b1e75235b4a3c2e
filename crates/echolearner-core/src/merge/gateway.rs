//! Client for the application's `/api/synthesize` merge endpoint.

use super::AudioMerger;
use crate::artifact::AudioArtifact;
use crate::error::{EchoError, EchoResult};
use crate::synthesis::{http_client, is_auth_failure, ErrorBody};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MergeRequest {
    audio_datas: Vec<AudioData>,
}

#[derive(Debug, Serialize)]
struct AudioData {
    base64: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MergeResponse {
    synthesis_url: String,
}

/// Merges remotely through the web gateway
#[derive(Debug, Clone)]
pub struct GatewayMerger {
    client: reqwest::Client,
    endpoint: String,
    session_token: Option<String>,
}

impl GatewayMerger {
    /// Create a client for the gateway at `base_url`
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: &str, timeout: Duration) -> EchoResult<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: format!("{}/api/synthesize", base_url.trim_end_matches('/')),
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
impl AudioMerger for GatewayMerger {
    async fn merge(&self, artifacts: &[AudioArtifact]) -> EchoResult<AudioArtifact> {
        match artifacts {
            [] => return Err(EchoError::empty_input("no artifacts to merge")),
            [single] => return Ok(single.clone()),
            _ => {}
        }

        let body = MergeRequest {
            audio_datas: artifacts
                .iter()
                .map(|a| AudioData { base64: a.to_base64() })
                .collect(),
        };
        debug!(parts = artifacts.len(), "POST {}", self.endpoint);

        let mut call = self.client.post(&self.endpoint).json(&body);
        if let Some(token) = &self.session_token {
            call = call.bearer_auth(token);
        }
        let response = call
            .send()
            .await
            .map_err(|e| EchoError::merge(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: ErrorBody = response.json().await.unwrap_or_default();
            let message = body.error.unwrap_or_else(|| format!("merge failed ({status})"));
            if is_auth_failure(status) {
                return Err(EchoError::unauthenticated(message));
            }
            return Err(EchoError::merge(message));
        }

        let body: MergeResponse = response
            .json()
            .await
            .map_err(|e| EchoError::merge(format!("malformed merge response: {e}")))?;
        AudioArtifact::from_data_uri(&body.synthesis_url).map_err(|e| EchoError::merge(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "gateway"
    }
}
