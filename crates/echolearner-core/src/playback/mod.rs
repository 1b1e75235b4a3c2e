//! Back-to-back playback of a block's artifacts.

mod command;
mod device;

pub use command::{CommandSink, DEFAULT_PLAYER};
pub use device::{DeviceConfig, PlaybackState, SimulatedDevice, NOMINAL_BITRATE_KBPS};

use crate::artifact::AudioArtifact;
use crate::document::{BlockId, SentenceId};
use crate::error::{EchoError, EchoResult};
use crate::orchestrator::Orchestrator;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Audio output
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Play `artifact`, returning at its natural end
    ///
    /// # Errors
    ///
    /// Returns a `PlaybackError` if the artifact cannot be played
    async fn play(&self, artifact: &AudioArtifact) -> EchoResult<()>;

    /// Sink name for logs
    fn name(&self) -> &'static str;
}

type ActiveBlocks = Arc<Mutex<HashMap<BlockId, Option<SentenceId>>>>;

/// Marks a block as playing; the mark is removed on drop
struct PlayingGuard {
    active: ActiveBlocks,
    block_id: BlockId,
}

impl PlayingGuard {
    fn acquire(active: &ActiveBlocks, block_id: BlockId) -> EchoResult<Self> {
        let mut blocks = active.lock();
        if blocks.contains_key(&block_id) {
            return Err(EchoError::PlaybackBusy { block_id });
        }
        blocks.insert(block_id, None);
        Ok(Self {
            active: Arc::clone(active),
            block_id,
        })
    }

    fn now_playing(&self, sentence_id: SentenceId) {
        if let Some(slot) = self.active.lock().get_mut(&self.block_id) {
            *slot = Some(sentence_id);
        }
    }
}

impl Drop for PlayingGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.block_id);
    }
}

/// Plays blocks through an [`AudioSink`], generating stale sentences first
pub struct PlaybackSequencer {
    orchestrator: Arc<Orchestrator>,
    sink: Arc<dyn AudioSink>,
    active: ActiveBlocks,
}

impl std::fmt::Debug for PlaybackSequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackSequencer")
            .field("sink", &self.sink.name())
            .field("active", &self.active.lock().len())
            .finish_non_exhaustive()
    }
}

impl PlaybackSequencer {
    /// Create a sequencer playing through `sink`
    #[must_use]
    pub fn new(orchestrator: Arc<Orchestrator>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            orchestrator,
            sink,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Play every ready sentence of a block in document order.
    ///
    /// Runs [`Orchestrator::generate_block`] first if any non-blank sentence
    /// is not ready. The playing mark is cleared on every exit path.
    ///
    /// # Errors
    ///
    /// - `PlaybackBusy` if the block is already playing
    /// - Any generation error
    /// - The first `PlaybackError` from the sink; the rest of the block is
    ///   skipped
    pub async fn play_block(&self, block_id: BlockId) -> EchoResult<()> {
        let guard = PlayingGuard::acquire(&self.active, block_id)?;

        let fresh = self
            .orchestrator
            .snapshot()
            .block(block_id)
            .ok_or(EchoError::block_not_found(block_id))?
            .is_fresh();
        if !fresh {
            debug!(%block_id, "Block has stale sentences, generating before playback");
            self.orchestrator.generate_block(block_id).await?;
        }

        let queue: Vec<(SentenceId, AudioArtifact)> = self
            .orchestrator
            .snapshot()
            .block(block_id)
            .ok_or(EchoError::block_not_found(block_id))?
            .artifacts()
            .map(|(id, artifact)| (id, artifact.clone()))
            .collect();

        info!(%block_id, sentences = queue.len(), sink = self.sink.name(), "Playing block");
        for (sentence_id, artifact) in queue {
            guard.now_playing(sentence_id);
            if let Err(err) = self.sink.play(&artifact).await {
                warn!(%block_id, %sentence_id, error = %err, "Playback aborted");
                return Err(err);
            }
        }

        Ok(())
    }

    /// Play every block of the document in order
    ///
    /// # Errors
    ///
    /// Returns the first error from [`Self::play_block`]
    pub async fn play_all(&self) -> EchoResult<()> {
        let blocks: Vec<BlockId> = self.orchestrator.snapshot().blocks().map(|b| b.id).collect();
        for block_id in blocks {
            self.play_block(block_id).await?;
        }
        Ok(())
    }

    /// Whether a playback sequence is running for the block
    #[must_use]
    pub fn is_playing(&self, block_id: BlockId) -> bool {
        self.active.lock().contains_key(&block_id)
    }

    /// Sentence currently being played in the block
    #[must_use]
    pub fn now_playing(&self, block_id: BlockId) -> Option<SentenceId> {
        self.active.lock().get(&block_id).copied().flatten()
    }
}
