//! Engine configuration.
//!
//! Values come from, in increasing precedence: built-in defaults, a TOML file
//! (explicit path or `config.toml` in the platform config directory), and
//! environment variables.

use crate::auth::CredentialGate;
use crate::document::DocumentStore;
use crate::error::{EchoError, EchoResult};
use crate::merge::{AudioMerger, GatewayMerger, LocalMerger};
use crate::orchestrator::Orchestrator;
use crate::playback::{AudioSink, CommandSink, DeviceConfig, SimulatedDevice, DEFAULT_PLAYER, NOMINAL_BITRATE_KBPS};
use crate::synthesis::{
    GatewaySynthesizer, MockSynthesizer, SpeechSynthesizer, VolcengineCredentials,
    VolcengineSynthesizer, VOLCENGINE_ENDPOINT,
};
use crate::voice::VoiceId;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default base URL of the web gateway
pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:3000";

/// Synthesis backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// The application's `/api/tts` endpoint
    #[default]
    Gateway,
    /// Volcengine directly, with local credentials
    Volcengine,
    /// Offline deterministic provider
    Mock,
}

impl std::str::FromStr for ProviderKind {
    type Err = EchoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gateway" => Ok(Self::Gateway),
            "volcengine" => Ok(Self::Volcengine),
            "mock" => Ok(Self::Mock),
            other => Err(EchoError::configuration(format!("unknown provider '{other}'"))),
        }
    }
}

/// Where artifacts are merged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// In-process concatenation
    #[default]
    Local,
    /// The application's `/api/synthesize` endpoint
    Gateway,
}

/// Audio output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    /// Sleep for the estimated duration
    #[default]
    Simulated,
    /// Pipe into an external player
    Command,
}

/// Playback settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Output used by the sequencer
    pub sink: SinkKind,
    /// Player command line for [`SinkKind::Command`]
    pub command: Vec<String>,
    /// Bitrate assumed by the simulated device
    pub bitrate_kbps: u32,
    /// Cap on one simulated step, in milliseconds
    pub max_step_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::default(),
            command: DEFAULT_PLAYER.iter().map(ToString::to_string).collect(),
            bitrate_kbps: NOMINAL_BITRATE_KBPS,
            max_step_ms: 100,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EchoConfig {
    /// Synthesis backend
    pub provider: ProviderKind,
    /// Base URL of the web gateway
    pub gateway_url: String,
    /// Bearer token sent to the gateway
    pub session_token: Option<String>,
    /// Volcengine account
    pub volcengine: VolcengineCredentials,
    /// Volcengine endpoint
    pub volcengine_endpoint: String,
    /// Merge backend
    pub merge: MergeMode,
    /// Timeout applied to every HTTP request, in seconds
    pub request_timeout_secs: u64,
    /// Voice for new blocks
    pub default_voice: VoiceId,
    /// Artificial latency of the mock provider, in milliseconds
    pub mock_delay_ms: u64,
    /// Playback settings
    pub playback: PlaybackConfig,
}

impl Default for EchoConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            session_token: None,
            volcengine: VolcengineCredentials::default(),
            volcengine_endpoint: VOLCENGINE_ENDPOINT.to_string(),
            merge: MergeMode::default(),
            request_timeout_secs: 30,
            default_voice: VoiceId::default(),
            mock_delay_ms: 0,
            playback: PlaybackConfig::default(),
        }
    }
}

impl EchoConfig {
    /// `config.toml` in the platform config directory
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "EchoLearner", "echolearner")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path`, or from [`Self::default_path`] if it exists, then
    /// apply environment overrides and validate
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing or unparsable, or the
    /// resulting configuration is invalid
    pub fn load(path: Option<&Path>) -> EchoResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => {
                    debug!("No configuration file, using defaults");
                    Self::default()
                }
            },
        };
        config.apply_env_from(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn from_file(path: &Path) -> EchoResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            EchoError::file(format!("Failed to read config {}: {e}", path.display()))
        })?;
        let config = toml::from_str(&text)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from an environment lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = var("VOLC_TTS_APPID") {
            self.volcengine.app_id = v;
        }
        if let Some(v) = var("VOLC_TTS_TOKEN") {
            self.volcengine.token = v;
        }
        if let Some(v) = var("VOLC_TTS_CLUSTER") {
            self.volcengine.cluster = v;
        }
        if let Some(v) = var("VOLC_TTS_UID") {
            self.volcengine.uid = v;
        }
        if let Some(v) = var("ECHOLEARNER_GATEWAY_URL") {
            self.gateway_url = v;
        }
        if let Some(kind) = var("ECHOLEARNER_PROVIDER").and_then(|v| v.parse().ok()) {
            self.provider = kind;
        }
        if var("VOLC_TTS_MOCK").is_some_and(|v| is_truthy(&v)) {
            self.provider = ProviderKind::Mock;
        }
    }

    /// Check that the selected backends have what they need
    ///
    /// # Errors
    ///
    /// Returns a configuration error describing the first problem found
    pub fn validate(&self) -> EchoResult<()> {
        if self.request_timeout_secs == 0 {
            return Err(EchoError::configuration("request_timeout_secs must be positive"));
        }
        if self.default_voice.as_str().trim().is_empty() {
            return Err(EchoError::configuration("default_voice cannot be empty"));
        }
        let uses_gateway =
            self.provider == ProviderKind::Gateway || self.merge == MergeMode::Gateway;
        if uses_gateway
            && !(self.gateway_url.starts_with("http://") || self.gateway_url.starts_with("https://"))
        {
            return Err(EchoError::configuration(format!(
                "gateway_url must be an http(s) URL, got '{}'",
                self.gateway_url
            )));
        }
        if self.provider == ProviderKind::Volcengine && !self.volcengine.is_complete() {
            return Err(EchoError::configuration(
                "volcengine provider needs VOLC_TTS_APPID, VOLC_TTS_TOKEN and VOLC_TTS_CLUSTER",
            ));
        }
        if self.playback.sink == SinkKind::Command && self.playback.command.is_empty() {
            return Err(EchoError::configuration("playback.command cannot be empty"));
        }
        if self.playback.bitrate_kbps == 0 {
            return Err(EchoError::configuration("playback.bitrate_kbps must be positive"));
        }
        Ok(())
    }

    /// HTTP request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Build the configured synthesis provider
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be constructed
    pub fn build_synthesizer(&self) -> EchoResult<Arc<dyn SpeechSynthesizer>> {
        let synthesizer: Arc<dyn SpeechSynthesizer> = match self.provider {
            ProviderKind::Gateway => {
                let mut client = GatewaySynthesizer::new(&self.gateway_url, self.request_timeout())?;
                if let Some(token) = &self.session_token {
                    client = client.with_session_token(token.clone());
                }
                Arc::new(client)
            }
            ProviderKind::Volcengine => Arc::new(VolcengineSynthesizer::with_endpoint(
                &self.volcengine_endpoint,
                self.volcengine.clone(),
                self.request_timeout(),
            )?),
            ProviderKind::Mock => Arc::new(
                MockSynthesizer::new().with_delay(Duration::from_millis(self.mock_delay_ms)),
            ),
        };
        info!(provider = synthesizer.name(), "Synthesis provider ready");
        Ok(synthesizer)
    }

    /// Build the configured merger
    ///
    /// # Errors
    ///
    /// Returns an error if the merger cannot be constructed
    pub fn build_merger(&self) -> EchoResult<Arc<dyn AudioMerger>> {
        Ok(match self.merge {
            MergeMode::Local => Arc::new(LocalMerger::new()),
            MergeMode::Gateway => {
                let mut client = GatewayMerger::new(&self.gateway_url, self.request_timeout())?;
                if let Some(token) = &self.session_token {
                    client = client.with_session_token(token.clone());
                }
                Arc::new(client)
            }
        })
    }

    /// Build the credential gate matching the provider
    #[must_use]
    pub fn build_auth_gate(&self) -> Arc<CredentialGate> {
        let (has_credentials, hint) = match self.provider {
            ProviderKind::Gateway => (
                self.session_token.is_some(),
                "set session_token in the configuration file",
            ),
            ProviderKind::Volcengine => (
                self.volcengine.is_complete(),
                "check VOLC_TTS_APPID, VOLC_TTS_TOKEN and VOLC_TTS_CLUSTER",
            ),
            ProviderKind::Mock => (true, "the mock provider needs no login"),
        };
        Arc::new(CredentialGate::new(has_credentials, hint))
    }

    /// Build the configured playback sink
    ///
    /// # Errors
    ///
    /// Returns an error if the player command is empty
    pub fn build_sink(&self) -> EchoResult<Arc<dyn AudioSink>> {
        Ok(match self.playback.sink {
            SinkKind::Simulated => Arc::new(SimulatedDevice::with_config(DeviceConfig {
                bitrate_kbps: self.playback.bitrate_kbps,
                max_step: Duration::from_millis(self.playback.max_step_ms),
            })),
            SinkKind::Command => Arc::new(CommandSink::from_command_line(&self.playback.command)?),
        })
    }

    /// Wire an orchestrator over `store` from this configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a backend cannot be constructed
    pub fn build_orchestrator(&self, store: Arc<DocumentStore>) -> EchoResult<Orchestrator> {
        Ok(Orchestrator::new(
            store,
            self.build_synthesizer()?,
            self.build_merger()?,
            self.build_auth_gate(),
        )
        .with_default_voice(self.default_voice.clone()))
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
