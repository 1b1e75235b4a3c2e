//! Generation workflows over the document.
//!
//! The [`Orchestrator`] is the only component that both mutates the document
//! and calls the providers. Every provider call is bracketed by two store
//! transformations: one that marks the sentence `Loading` with a fresh
//! [`GenerationToken`](crate::document::GenerationToken), and one that settles
//! it, applied only if the sentence still carries that token. Calls within a
//! block or document pass are strictly sequential, in document order.

use crate::artifact::AudioArtifact;
use crate::auth::AuthGate;
use crate::document::{
    BlockId, BlockUpdate, Document, DocumentStore, GenerationToken, SentenceField, SentenceId,
    SynthesisStatus,
};
use crate::error::{EchoError, EchoResult};
use crate::merge::AudioMerger;
use crate::synthesis::{SpeechSynthesizer, SynthesisRequest};
use crate::voice::VoiceId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Coordinates document edits with synthesis and merge calls
pub struct Orchestrator {
    store: Arc<DocumentStore>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    merger: Arc<dyn AudioMerger>,
    auth: Arc<dyn AuthGate>,
    default_voice: VoiceId,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("version", &self.store.version())
            .field("synthesizer", &self.synthesizer.name())
            .field("merger", &self.merger.name())
            .field("default_voice", &self.default_voice)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Create an orchestrator over `store`
    #[must_use]
    pub fn new(
        store: Arc<DocumentStore>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        merger: Arc<dyn AudioMerger>,
        auth: Arc<dyn AuthGate>,
    ) -> Self {
        Self {
            store,
            synthesizer,
            merger,
            auth,
            default_voice: VoiceId::default(),
        }
    }

    /// Voice given to blocks created by [`Self::add_block`]
    #[must_use]
    pub fn with_default_voice(mut self, voice: VoiceId) -> Self {
        self.default_voice = voice;
        self
    }

    /// Shared document store
    #[must_use]
    pub fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<Document> {
        self.store.snapshot()
    }

    // Editing

    /// Append a block using the default voice
    ///
    /// # Errors
    ///
    /// Infallible today; kept fallible like every other store transformation
    pub fn add_block(&self) -> EchoResult<BlockId> {
        self.add_block_with_voice(self.default_voice.clone())
    }

    /// Append a block using `voice`
    ///
    /// # Errors
    ///
    /// Infallible today; kept fallible like every other store transformation
    pub fn add_block_with_voice(&self, voice: VoiceId) -> EchoResult<BlockId> {
        self.store
            .update_with(|doc| Ok(doc.add_block(voice)))
            .map(|(id, _)| id)
    }

    /// Remove a block and its sentences
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not exist
    pub fn remove_block(&self, block_id: BlockId) -> EchoResult<()> {
        self.store.update(|doc| doc.remove_block(block_id)).map(drop)
    }

    /// Change a block's voice, invalidating all of its sentences
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not exist
    pub fn set_voice(&self, block_id: BlockId, voice: VoiceId) -> EchoResult<()> {
        self.store
            .update(|doc| doc.update_block(block_id, BlockUpdate::voice(voice)))
            .map(drop)
    }

    /// Append an empty sentence to a block
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not exist
    pub fn add_sentence(&self, block_id: BlockId) -> EchoResult<SentenceId> {
        self.store
            .update_with(|doc| doc.add_sentence(block_id))
            .map(|(id, _)| id)
    }

    /// Insert an empty sentence after `sentence_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn insert_sentence_after(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
    ) -> EchoResult<SentenceId> {
        self.store
            .update_with(|doc| doc.insert_sentence_after(block_id, sentence_id))
            .map(|(id, _)| id)
    }

    /// Remove a sentence; an in-flight call for it is left to finish and its
    /// result is dropped
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn remove_sentence(&self, block_id: BlockId, sentence_id: SentenceId) -> EchoResult<()> {
        self.store
            .update(|doc| doc.remove_sentence(block_id, sentence_id))
            .map(drop)
    }

    /// Edit a sentence's text
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn set_text<S: Into<String>>(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
        text: S,
    ) -> EchoResult<()> {
        self.set_field(block_id, sentence_id, SentenceField::Text(text.into()))
    }

    /// Edit a sentence's pitch token
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn set_pitch<S: Into<String>>(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
        pitch: S,
    ) -> EchoResult<()> {
        self.set_field(block_id, sentence_id, SentenceField::Pitch(pitch.into()))
    }

    /// Edit a sentence's speed token
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn set_speed<S: Into<String>>(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
        speed: S,
    ) -> EchoResult<()> {
        self.set_field(block_id, sentence_id, SentenceField::Speed(speed.into()))
    }

    fn set_field(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
        field: SentenceField,
    ) -> EchoResult<()> {
        self.store
            .update(|doc| doc.set_sentence_field(block_id, sentence_id, field))
            .map(drop)
    }

    // Generation

    /// Ensure one sentence has a fresh artifact.
    ///
    /// A `Ready` sentence is returned as is without a provider call.
    ///
    /// # Errors
    ///
    /// - Not-found errors if the sentence is missing, before or after the call
    /// - `Superseded` if the sentence was edited or regenerated meanwhile; the
    ///   result is dropped
    /// - `Unauthenticated` after the auth gate was asked to log in; the
    ///   sentence keeps its previous status, or `Idle` if that was a
    ///   superseded `Loading`
    /// - Content errors (see [`EchoError::is_content_error`]), also stored on
    ///   the sentence as `Failed`
    pub async fn generate_sentence(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
    ) -> EchoResult<AudioArtifact> {
        if let Some(artifact) = self
            .snapshot()
            .sentence(block_id, sentence_id)?
            .status
            .artifact()
        {
            debug!(%sentence_id, "Sentence already ready");
            return Ok(artifact.clone());
        }

        let ((token, previous, request), _) = self.store.update_with(|doc| {
            let block = doc.block(block_id).ok_or(EchoError::block_not_found(block_id))?;
            let sentence = block
                .sentence(sentence_id)
                .ok_or(EchoError::sentence_not_found(sentence_id))?;
            let request = SynthesisRequest::for_sentence(block, sentence);
            let (next, (token, previous)) = doc.begin_generation(block_id, sentence_id)?;
            Ok((next, (token, previous, request)))
        })?;

        debug!(
            %sentence_id,
            provider = self.synthesizer.name(),
            voice = %request.voice,
            "Synthesizing sentence"
        );

        match self.synthesizer.synthesize(&request).await {
            Ok(artifact) => {
                self.settle(block_id, sentence_id, token, SynthesisStatus::Ready(artifact.clone()))?;
                Ok(artifact)
            }
            Err(err) if err.is_content_error() => {
                warn!(%sentence_id, error = %err, "Sentence synthesis failed");
                self.settle(block_id, sentence_id, token, SynthesisStatus::Failed(err.clone()))?;
                Err(err)
            }
            Err(err) => {
                // A superseded call's token must not come back; nothing would resolve it
                let restored = if previous.is_loading() {
                    SynthesisStatus::Idle
                } else {
                    previous
                };
                if let Err(settle_err) = self.settle(block_id, sentence_id, token, restored) {
                    debug!(%sentence_id, error = %settle_err, "Could not restore status");
                }
                if matches!(err, EchoError::Unauthenticated { .. }) {
                    self.auth.request_login().await;
                } else {
                    warn!(%sentence_id, error = %err, "Sentence synthesis aborted");
                }
                Err(err)
            }
        }
    }

    /// Synthesize every stale, non-blank sentence of a block in order.
    ///
    /// Stops at the first failure and records it on the block; earlier
    /// successes are kept. Sentences removed or regenerated elsewhere during
    /// the pass are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first failure, or `BlockNotFound`
    pub async fn generate_block(&self, block_id: BlockId) -> EchoResult<()> {
        let pending: Vec<SentenceId> = self
            .snapshot()
            .block(block_id)
            .ok_or(EchoError::block_not_found(block_id))?
            .pending_sentences()
            .map(|s| s.id)
            .collect();

        info!(%block_id, pending = pending.len(), "Generating block");

        for sentence_id in pending {
            match self.generate_sentence(block_id, sentence_id).await {
                Ok(_) => {}
                Err(EchoError::SentenceNotFound { .. } | EchoError::Superseded { .. }) => {
                    debug!(%sentence_id, "Sentence changed during block generation, skipping");
                }
                Err(err @ (EchoError::Unauthenticated { .. } | EchoError::BlockNotFound { .. })) => {
                    return Err(err);
                }
                Err(err) => {
                    self.record_block_error(block_id, Some(err.clone()));
                    return Err(err);
                }
            }
        }

        self.record_block_error(block_id, None);
        Ok(())
    }

    /// Synthesize every non-blank sentence of the document and merge the
    /// artifacts, in block then sentence order.
    ///
    /// The merged artifact is returned, never stored. A single artifact is
    /// returned without calling the merger.
    ///
    /// # Errors
    ///
    /// - `NoContent` if every sentence is blank
    /// - The first sentence failure; nothing is merged
    /// - `Unauthenticated`, `MergeFailure` from the merge step
    pub async fn synthesize_document(&self) -> EchoResult<AudioArtifact> {
        let result = self.run_document().await;
        match &result {
            Ok(artifact) => {
                info!(bytes = artifact.len(), "Document synthesized");
                self.record_document_error(None);
            }
            Err(EchoError::Unauthenticated { .. }) => {}
            Err(err) => {
                if err.is_user_error() {
                    info!(error = %err, "Nothing to synthesize");
                } else {
                    warn!(error = %err, "Document synthesis failed");
                }
                self.record_document_error(Some(err.clone()));
            }
        }
        result
    }

    async fn run_document(&self) -> EchoResult<AudioArtifact> {
        let snapshot = self.snapshot();
        let mut artifacts = Vec::new();

        for block in snapshot.blocks() {
            for sentence in block.sentences.iter().filter(|s| !s.is_blank()) {
                match self.generate_sentence(block.id, sentence.id).await {
                    Ok(artifact) => artifacts.push(artifact),
                    Err(err) if err.is_not_found() => {
                        debug!(sentence_id = %sentence.id, "Sentence removed during document pass");
                    }
                    Err(err) => return Err(err),
                }
            }
        }

        if artifacts.len() <= 1 {
            return artifacts.pop().ok_or(EchoError::NoContent);
        }

        debug!(parts = artifacts.len(), merger = self.merger.name(), "Merging document");
        match self.merger.merge(&artifacts).await {
            Ok(merged) => Ok(merged),
            Err(err @ EchoError::Unauthenticated { .. }) => {
                self.auth.request_login().await;
                Err(err)
            }
            Err(err @ EchoError::MergeFailure { .. }) => Err(err),
            Err(err) => Err(EchoError::merge(err.to_string())),
        }
    }

    fn settle(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
        token: GenerationToken,
        status: SynthesisStatus,
    ) -> EchoResult<()> {
        self.store
            .update(|doc| doc.resolve_generation(block_id, sentence_id, token, status))
            .map(drop)
            .map_err(|err| {
                debug!(%sentence_id, reason = err.category(), "Dropping late synthesis result");
                err
            })
    }

    fn record_block_error(&self, block_id: BlockId, error: Option<EchoError>) {
        let current = self.snapshot();
        let unchanged = current
            .block(block_id)
            .map_or(true, |b| b.last_error == error);
        if unchanged {
            return;
        }
        if let Err(err) = self.store.update(|doc| doc.set_block_error(block_id, error)) {
            debug!(%block_id, error = %err, "Block vanished before its error was recorded");
        }
    }

    fn record_document_error(&self, error: Option<EchoError>) {
        if self.snapshot().last_error() == error.as_ref() {
            return;
        }
        if let Err(err) = self.store.update(|doc| Ok(doc.set_document_error(error))) {
            debug!(error = %err, "Document error was not recorded");
        }
    }
}
