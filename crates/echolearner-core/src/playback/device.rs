//! Simulated output device for tests and headless hosts.

use super::AudioSink;
use crate::artifact::AudioArtifact;
use crate::error::{EchoError, EchoResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

/// Nominal MP3 bitrate used to estimate playback length
pub const NOMINAL_BITRATE_KBPS: u32 = 128;

/// Playback state enumeration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    /// Audio is stopped
    #[default]
    Stopped,
    /// Audio is currently playing
    Playing,
    /// Audio playback encountered an error
    Error,
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "Stopped"),
            Self::Playing => write!(f, "Playing"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Simulated device configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Bitrate used to turn payload size into a duration
    pub bitrate_kbps: u32,
    /// Upper bound on the simulated duration of one artifact
    pub max_step: Duration,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            bitrate_kbps: NOMINAL_BITRATE_KBPS,
            max_step: Duration::from_millis(100),
        }
    }
}

/// Device that "plays" an artifact by sleeping for its estimated length
#[derive(Debug, Default)]
pub struct SimulatedDevice {
    config: DeviceConfig,
    state: Arc<RwLock<PlaybackState>>,
    history: Mutex<Vec<AudioArtifact>>,
}

impl SimulatedDevice {
    /// Create a device with default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DeviceConfig::default())
    }

    /// Create a device with custom configuration
    #[must_use]
    pub fn with_config(config: DeviceConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(PlaybackState::Stopped)),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Estimated play time of `artifact`, before capping
    #[must_use]
    pub fn estimate_duration(&self, artifact: &AudioArtifact) -> Duration {
        let bits_per_sec = u64::from(self.config.bitrate_kbps.max(1)) * 1000;
        let bits = artifact.len() as u64 * 8;
        Duration::from_millis(bits * 1000 / bits_per_sec)
    }

    /// Get current playback state
    pub async fn state(&self) -> PlaybackState {
        *self.state.read().await
    }

    /// Check if audio is currently playing
    pub async fn is_playing(&self) -> bool {
        *self.state.read().await == PlaybackState::Playing
    }

    /// Artifacts played so far, in order
    #[must_use]
    pub fn history(&self) -> Vec<AudioArtifact> {
        self.history.lock().clone()
    }

    /// Get current device configuration
    #[must_use]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

#[async_trait]
impl AudioSink for SimulatedDevice {
    async fn play(&self, artifact: &AudioArtifact) -> EchoResult<()> {
        if artifact.is_empty() {
            *self.state.write().await = PlaybackState::Error;
            return Err(EchoError::playback("artifact has no audio"));
        }

        let duration = self.estimate_duration(artifact).min(self.config.max_step);
        debug!(bytes = artifact.len(), ?duration, "Simulated playback");

        *self.state.write().await = PlaybackState::Playing;
        tokio::time::sleep(duration).await;
        self.history.lock().push(artifact.clone());
        *self.state.write().await = PlaybackState::Stopped;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_state_display() {
        assert_eq!(PlaybackState::Stopped.to_string(), "Stopped");
        assert_eq!(PlaybackState::Playing.to_string(), "Playing");
        assert_eq!(PlaybackState::Error.to_string(), "Error");
    }

    #[test]
    fn test_estimate_duration() {
        let device = SimulatedDevice::new();
        // 16000 bytes at 128 kbps is one second
        let artifact = AudioArtifact::from_bytes(vec![0u8; 16_000]);
        assert_eq!(device.estimate_duration(&artifact), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_play_records_history() {
        let device = SimulatedDevice::new();
        let a = AudioArtifact::from_bytes(b"one".to_vec());
        let b = AudioArtifact::from_bytes(b"two".to_vec());

        device.play(&a).await.unwrap();
        device.play(&b).await.unwrap();

        assert_eq!(device.history(), vec![a, b]);
        assert_eq!(device.state().await, PlaybackState::Stopped);
    }

    #[tokio::test]
    async fn test_play_empty_fails() {
        let device = SimulatedDevice::new();
        let result = device.play(&AudioArtifact::from_bytes(Vec::new())).await;

        assert!(matches!(result, Err(EchoError::PlaybackError { .. })));
        assert_eq!(device.state().await, PlaybackState::Error);
    }

    #[tokio::test]
    async fn test_play_is_capped() {
        let device = SimulatedDevice::with_config(DeviceConfig {
            bitrate_kbps: 1,
            max_step: Duration::from_millis(5),
        });
        let started = std::time::Instant::now();
        device
            .play(&AudioArtifact::from_bytes(vec![1u8; 4096]))
            .await
            .unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
