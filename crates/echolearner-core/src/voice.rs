//! Voice profiles and prosody tokens.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Voice used for new blocks when nothing else is configured
pub const DEFAULT_VOICE: &str = "BV511_streaming";

/// Accepted range for numeric pitch and speed ratios
pub const RATIO_RANGE: std::ops::RangeInclusive<f32> = 0.1..=3.0;

/// Provider voice-profile identifier (e.g. `BV027_streaming`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoiceId(String);

impl VoiceId {
    /// Create a voice identifier
    #[must_use]
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Identifier as sent to the provider
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VoiceId {
    fn default() -> Self {
        Self::new(DEFAULT_VOICE)
    }
}

impl From<&str> for VoiceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which prosody parameter a token controls
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prosody {
    /// Voice pitch (`low` / `normal` / `high`)
    Pitch,
    /// Speaking rate (`slow` / `normal` / `fast`)
    Speed,
}

impl Prosody {
    /// Resolve a free-form token into a provider ratio.
    ///
    /// Unknown or out-of-range tokens resolve to `1.0`.
    #[must_use]
    pub fn ratio(self, token: &str) -> f32 {
        let token = token.trim();
        let named = match (self, token.to_ascii_lowercase().as_str()) {
            (_, "" | "normal" | "default") => Some(1.0),
            (Self::Pitch, "low") | (Self::Speed, "slow") => Some(0.8),
            (Self::Pitch, "high") | (Self::Speed, "fast") => Some(1.2),
            _ => None,
        };
        if let Some(ratio) = named {
            return ratio;
        }

        match token.parse::<f32>() {
            Ok(ratio) if RATIO_RANGE.contains(&ratio) => ratio,
            _ => {
                warn!(prosody = ?self, token, "Unrecognized prosody token, using 1.0");
                1.0
            }
        }
    }
}
