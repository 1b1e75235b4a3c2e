//! Volcengine (openspeech) TTS provider.

use super::{http_client, is_auth_failure, SpeechSynthesizer, SynthesisRequest};
use crate::artifact::AudioArtifact;
use crate::error::{EchoError, EchoResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// Public HTTP endpoint of the provider
pub const VOLCENGINE_ENDPOINT: &str = "https://openspeech.bytedance.com/api/v1/tts";

const SUCCESS_CODE: i64 = 3000;
const SAMPLE_RATE: u32 = 24_000;

/// Account parameters issued by the provider console
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VolcengineCredentials {
    /// Application id
    pub app_id: String,
    /// Access token
    pub token: String,
    /// Service cluster (e.g. `volcano_tts`)
    pub cluster: String,
    /// End-user id forwarded with every request
    pub uid: String,
}

impl VolcengineCredentials {
    /// Whether every field needed for a call is present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.app_id.is_empty() && !self.token.is_empty() && !self.cluster.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct ProviderRequest<'a> {
    app: AppSection<'a>,
    user: UserSection<'a>,
    audio: AudioSection<'a>,
    request: RequestSection<'a>,
}

#[derive(Debug, Serialize)]
struct AppSection<'a> {
    appid: &'a str,
    token: &'a str,
    cluster: &'a str,
}

#[derive(Debug, Serialize)]
struct UserSection<'a> {
    uid: &'a str,
}

#[derive(Debug, Serialize)]
struct AudioSection<'a> {
    voice_type: &'a str,
    encoding: &'a str,
    rate: u32,
    compression_rate: u32,
    speed_ratio: f32,
    volume_ratio: f32,
    pitch_ratio: f32,
    emotion: &'a str,
}

#[derive(Debug, Serialize)]
struct RequestSection<'a> {
    reqid: String,
    text: &'a str,
    text_type: &'a str,
    operation: &'a str,
    silence_duration: &'a str,
    with_frontend: &'a str,
    frontend_type: &'a str,
    pure_english_opt: &'a str,
}

#[derive(Debug, Deserialize)]
struct ProviderResponse {
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<String>,
}

/// Calls the provider directly with account credentials
#[derive(Debug, Clone)]
pub struct VolcengineSynthesizer {
    client: reqwest::Client,
    endpoint: String,
    credentials: VolcengineCredentials,
}

impl VolcengineSynthesizer {
    /// Create a client for the public endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are incomplete or the HTTP client
    /// cannot be built
    pub fn new(credentials: VolcengineCredentials, timeout: Duration) -> EchoResult<Self> {
        Self::with_endpoint(VOLCENGINE_ENDPOINT, credentials, timeout)
    }

    /// Create a client for a custom endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the credentials are incomplete or the HTTP client
    /// cannot be built
    pub fn with_endpoint(
        endpoint: &str,
        credentials: VolcengineCredentials,
        timeout: Duration,
    ) -> EchoResult<Self> {
        if !credentials.is_complete() {
            return Err(EchoError::configuration(
                "Volcengine app_id, token and cluster are required",
            ));
        }
        Ok(Self {
            client: http_client(timeout)?,
            endpoint: endpoint.to_string(),
            credentials,
        })
    }

    fn body<'a>(&'a self, request: &'a SynthesisRequest) -> ProviderRequest<'a> {
        ProviderRequest {
            app: AppSection {
                appid: &self.credentials.app_id,
                token: &self.credentials.token,
                cluster: &self.credentials.cluster,
            },
            user: UserSection {
                uid: &self.credentials.uid,
            },
            audio: AudioSection {
                voice_type: request.voice.as_str(),
                encoding: "mp3",
                rate: SAMPLE_RATE,
                compression_rate: 1,
                speed_ratio: request.speed_ratio(),
                volume_ratio: 1.0,
                pitch_ratio: request.pitch_ratio(),
                emotion: "neutral",
            },
            request: RequestSection {
                reqid: Uuid::new_v4().to_string(),
                text: &request.text,
                text_type: "plain",
                operation: "query",
                silence_duration: "125",
                with_frontend: "1",
                frontend_type: "unitTson",
                pure_english_opt: "1",
            },
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for VolcengineSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> EchoResult<AudioArtifact> {
        request.validate()?;

        let body = self.body(request);
        debug!(reqid = %body.request.reqid, voice = %request.voice, "Calling Volcengine TTS");

        let response = self
            .client
            .post(&self.endpoint)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer;{}", self.credentials.token),
            )
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if is_auth_failure(status) {
            let message = response.text().await.unwrap_or_default();
            return Err(EchoError::unauthenticated(if message.is_empty() {
                format!("provider rejected credentials ({status})")
            } else {
                message
            }));
        }

        let text = response.text().await?;
        let parsed: ProviderResponse = serde_json::from_str(&text).map_err(|e| {
            EchoError::provider(format!("unexpected response ({status}): {e}"))
        })?;

        match parsed.data {
            Some(data) if parsed.code == SUCCESS_CODE && !data.is_empty() => {
                AudioArtifact::from_base64(&data).map_err(|e| EchoError::provider(e.to_string()))
            }
            _ => {
                warn!(code = parsed.code, "Volcengine TTS call failed");
                let message = if parsed.message.is_empty() {
                    "TTS service call failed".to_string()
                } else {
                    parsed.message
                };
                Err(EchoError::provider(format!("{message} (code {})", parsed.code)))
            }
        }
    }

    fn name(&self) -> &'static str {
        "volcengine"
    }
}
