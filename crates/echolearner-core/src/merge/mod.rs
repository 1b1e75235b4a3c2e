//! Merging of ordered artifacts into one.

mod gateway;

pub use gateway::GatewayMerger;

use crate::artifact::AudioArtifact;
use crate::error::{EchoError, EchoResult};
use async_trait::async_trait;
use tracing::debug;

/// Concatenates an ordered, non-empty list of artifacts
#[async_trait]
pub trait AudioMerger: Send + Sync {
    /// Merge `artifacts` in order.
    ///
    /// A single artifact is returned unchanged.
    ///
    /// # Errors
    ///
    /// - `EmptyInput` if `artifacts` is empty
    /// - `Unauthenticated` if a remote merger rejects the session
    /// - `MergeFailure` for any other failure
    async fn merge(&self, artifacts: &[AudioArtifact]) -> EchoResult<AudioArtifact>;

    /// Merger name for logs
    fn name(&self) -> &'static str;
}

/// In-process byte concatenation
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalMerger;

impl LocalMerger {
    /// Create a local merger
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AudioMerger for LocalMerger {
    async fn merge(&self, artifacts: &[AudioArtifact]) -> EchoResult<AudioArtifact> {
        match artifacts {
            [] => Err(EchoError::empty_input("no artifacts to merge")),
            [single] => Ok(single.clone()),
            many => {
                let total: usize = many.iter().map(AudioArtifact::len).sum();
                let mut payload = Vec::with_capacity(total);
                for artifact in many {
                    payload.extend_from_slice(artifact.bytes());
                }
                debug!(parts = many.len(), bytes = total, "Merged artifacts locally");
                Ok(AudioArtifact::from_bytes(payload))
            }
        }
    }

    fn name(&self) -> &'static str {
        "local"
    }
}
