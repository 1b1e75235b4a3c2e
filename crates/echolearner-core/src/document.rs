//! Document model: voice blocks of sentences and their synthesis status.
//!
//! A [`Document`] is an immutable value. Every editing operation takes
//! `&self` and returns a new snapshot with a bumped version; blocks are shared
//! between snapshots behind [`Arc`] and copied only when a transformation
//! touches them. [`DocumentStore`] owns the current snapshot and is the single
//! entry point through which transformations are applied.

use crate::artifact::AudioArtifact;
use crate::error::{EchoError, EchoResult};
use crate::voice::VoiceId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

/// Default pitch and speed token for new sentences
pub const DEFAULT_PROSODY: &str = "1.0";

/// Unique block identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(Uuid);

impl BlockId {
    /// Generate a fresh random identifier
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BlockId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Unique sentence identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SentenceId(Uuid);

impl SentenceId {
    /// Generate a fresh random identifier
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SentenceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SentenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies one in-flight synthesis call for a sentence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GenerationToken(u64);

impl GenerationToken {
    /// Issue a token never handed out before in this process
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

/// Synthesis status of a sentence
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SynthesisStatus {
    /// No valid artifact
    #[default]
    Idle,
    /// A synthesis call carrying this token is in flight
    Loading(GenerationToken),
    /// Artifact is fresh for the current text and voice
    Ready(AudioArtifact),
    /// The last synthesis attempt failed
    Failed(EchoError),
}

impl SynthesisStatus {
    /// Artifact if the status is `Ready`
    #[must_use]
    pub const fn artifact(&self) -> Option<&AudioArtifact> {
        match self {
            Self::Ready(artifact) => Some(artifact),
            _ => None,
        }
    }

    /// Error if the status is `Failed`
    #[must_use]
    pub const fn error(&self) -> Option<&EchoError> {
        match self {
            Self::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the status is `Ready`
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    /// Whether a synthesis call is in flight
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Loading(_))
    }

    /// Short label for logs and listings
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading(_) => "loading",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Smallest text unit submitted for synthesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sentence {
    /// Unique identifier
    pub id: SentenceId,
    /// Text to synthesize
    pub text: String,
    /// Pitch token (e.g. `normal`, `high`, `1.0`)
    pub pitch: String,
    /// Speed token (e.g. `slow`, `fast`, `1.0`)
    pub speed: String,
    /// Current synthesis status
    pub status: SynthesisStatus,
}

impl Sentence {
    /// Create an idle sentence with empty text
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: SentenceId::new(),
            text: String::new(),
            pitch: DEFAULT_PROSODY.to_string(),
            speed: DEFAULT_PROSODY.to_string(),
            status: SynthesisStatus::Idle,
        }
    }

    /// Set the text
    #[must_use]
    pub fn with_text<S: Into<String>>(mut self, text: S) -> Self {
        self.text = text.into();
        self
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

    /// Whether the text is empty after trimming
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// Whether this sentence must be synthesized before merge or playback
    #[must_use]
    pub fn needs_synthesis(&self) -> bool {
        !self.is_blank() && !self.status.is_ready()
    }

    fn invalidate(&mut self) {
        if self.status != SynthesisStatus::Idle {
            debug!(sentence_id = %self.id, from = self.status.label(), "Invalidating sentence");
        }
        self.status = SynthesisStatus::Idle;
    }
}

impl Default for Sentence {
    fn default() -> Self {
        Self::new()
    }
}

/// Ordered group of sentences sharing one voice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Unique identifier
    pub id: BlockId,
    /// Voice profile for every sentence in the block
    pub voice: VoiceId,
    /// Sentences in playback order
    pub sentences: Vec<Sentence>,
    /// Error from the last aborted block generation
    pub last_error: Option<EchoError>,
}

impl Block {
    /// Create a block with one empty seed sentence
    #[must_use]
    pub fn new(voice: VoiceId) -> Self {
        Self::with_sentences(voice, vec![Sentence::new()])
    }

    /// Create a block from existing sentences
    #[must_use]
    pub fn with_sentences(voice: VoiceId, sentences: Vec<Sentence>) -> Self {
        Self {
            id: BlockId::new(),
            voice,
            sentences,
            last_error: None,
        }
    }

    /// Look up a sentence by id
    #[must_use]
    pub fn sentence(&self, id: SentenceId) -> Option<&Sentence> {
        self.sentences.iter().find(|s| s.id == id)
    }

    /// Sentences that still need synthesis, in document order
    pub fn pending_sentences(&self) -> impl Iterator<Item = &Sentence> {
        self.sentences.iter().filter(|s| s.needs_synthesis())
    }

    /// Whether every non-blank sentence is ready
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        self.pending_sentences().next().is_none()
    }

    /// Ready artifacts in document order
    pub fn artifacts(&self) -> impl Iterator<Item = (SentenceId, &AudioArtifact)> {
        self.sentences
            .iter()
            .filter_map(|s| s.status.artifact().map(|a| (s.id, a)))
    }

    fn sentence_mut(&mut self, id: SentenceId) -> EchoResult<&mut Sentence> {
        self.sentences
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(EchoError::sentence_not_found(id))
    }

    fn position(&self, id: SentenceId) -> EchoResult<usize> {
        self.sentences
            .iter()
            .position(|s| s.id == id)
            .ok_or(EchoError::sentence_not_found(id))
    }
}

/// Partial update of a block's own fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockUpdate {
    /// New voice; a different voice invalidates every sentence in the block
    pub voice: Option<VoiceId>,
}

impl BlockUpdate {
    /// Update that changes the voice
    #[must_use]
    pub fn voice(voice: VoiceId) -> Self {
        Self { voice: Some(voice) }
    }
}

/// Editable sentence field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SentenceField {
    /// Sentence text; a different value invalidates the artifact
    Text(String),
    /// Pitch token
    Pitch(String),
    /// Speed token
    Speed(String),
}

/// Immutable snapshot of the whole document
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    version: u64,
    blocks: Vec<Arc<Block>>,
    last_error: Option<EchoError>,
}

impl Document {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a document from blocks in order
    #[must_use]
    pub fn with_blocks(blocks: Vec<Block>) -> Self {
        Self {
            version: 0,
            blocks: blocks.into_iter().map(Arc::new).collect(),
            last_error: None,
        }
    }

    /// Snapshot version; every transformation increments it
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Error from the last failed document synthesis
    #[must_use]
    pub const fn last_error(&self) -> Option<&EchoError> {
        self.last_error.as_ref()
    }

    /// Blocks in document order
    pub fn blocks(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter().map(AsRef::as_ref)
    }

    /// Number of blocks
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the document has no blocks
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Look up a block by id
    #[must_use]
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id).map(AsRef::as_ref)
    }

    /// Look up a sentence
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn sentence(&self, block_id: BlockId, sentence_id: SentenceId) -> EchoResult<&Sentence> {
        self.block(block_id)
            .ok_or(EchoError::block_not_found(block_id))?
            .sentence(sentence_id)
            .ok_or(EchoError::sentence_not_found(sentence_id))
    }

    /// Append a block with one seed sentence
    #[must_use]
    pub fn add_block(&self, voice: VoiceId) -> (Self, BlockId) {
        let block = Block::new(voice);
        let id = block.id;
        let mut next = self.next();
        next.blocks.push(Arc::new(block));
        (next, id)
    }

    /// Remove a block together with its sentences
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not exist
    pub fn remove_block(&self, id: BlockId) -> EchoResult<Self> {
        let index = self.block_index(id)?;
        let mut next = self.next();
        next.blocks.remove(index);
        Ok(next)
    }

    /// Apply a partial update to a block
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not exist
    pub fn update_block(&self, id: BlockId, update: BlockUpdate) -> EchoResult<Self> {
        self.map_block(id, |block| {
            if let Some(voice) = update.voice {
                if voice != block.voice {
                    block.voice = voice;
                    block.sentences.iter_mut().for_each(Sentence::invalidate);
                }
            }
            Ok(())
        })
        .map(|(doc, ())| doc)
    }

    /// Append an empty sentence to a block
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not exist
    pub fn add_sentence(&self, block_id: BlockId) -> EchoResult<(Self, SentenceId)> {
        self.map_block(block_id, |block| {
            let sentence = Sentence::new();
            let id = sentence.id;
            block.sentences.push(sentence);
            Ok(id)
        })
    }

    /// Insert an empty sentence right after `sentence_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn insert_sentence_after(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
    ) -> EchoResult<(Self, SentenceId)> {
        self.map_block(block_id, |block| {
            let index = block.position(sentence_id)?;
            let sentence = Sentence::new();
            let id = sentence.id;
            block.sentences.insert(index + 1, sentence);
            Ok(id)
        })
    }

    /// Remove a sentence; an in-flight call for it is not cancelled
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn remove_sentence(&self, block_id: BlockId, sentence_id: SentenceId) -> EchoResult<Self> {
        self.map_block(block_id, |block| {
            let index = block.position(sentence_id)?;
            block.sentences.remove(index);
            Ok(())
        })
        .map(|(doc, ())| doc)
    }

    /// Edit one sentence field
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn set_sentence_field(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
        field: SentenceField,
    ) -> EchoResult<Self> {
        self.map_block(block_id, |block| {
            let sentence = block.sentence_mut(sentence_id)?;
            match field {
                SentenceField::Text(text) => {
                    if text != sentence.text {
                        sentence.text = text;
                        sentence.invalidate();
                    }
                }
                SentenceField::Pitch(pitch) => sentence.pitch = pitch,
                SentenceField::Speed(speed) => sentence.speed = speed,
            }
            Ok(())
        })
        .map(|(doc, ())| doc)
    }

    /// Move a sentence into `Loading` with a fresh token.
    ///
    /// Returns the token and the status it replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the block or the sentence does not exist
    pub fn begin_generation(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
    ) -> EchoResult<(Self, (GenerationToken, SynthesisStatus))> {
        self.map_block(block_id, |block| {
            let sentence = block.sentence_mut(sentence_id)?;
            let token = GenerationToken::next();
            let previous = std::mem::replace(&mut sentence.status, SynthesisStatus::Loading(token));
            Ok((token, previous))
        })
    }

    /// Settle the call identified by `token` with `status`.
    ///
    /// # Errors
    ///
    /// Returns a not-found error if the sentence is gone, or `Superseded` if
    /// it no longer carries `token`
    pub fn resolve_generation(
        &self,
        block_id: BlockId,
        sentence_id: SentenceId,
        token: GenerationToken,
        status: SynthesisStatus,
    ) -> EchoResult<Self> {
        match self.sentence(block_id, sentence_id)?.status {
            SynthesisStatus::Loading(current) if current == token => {}
            _ => return Err(EchoError::superseded(sentence_id)),
        }
        self.map_block(block_id, |block| {
            block.sentence_mut(sentence_id)?.status = status;
            Ok(())
        })
        .map(|(doc, ())| doc)
    }

    /// Record or clear a block's last error
    ///
    /// # Errors
    ///
    /// Returns an error if the block does not exist
    pub fn set_block_error(&self, block_id: BlockId, error: Option<EchoError>) -> EchoResult<Self> {
        self.map_block(block_id, |block| {
            block.last_error = error;
            Ok(())
        })
        .map(|(doc, ())| doc)
    }

    /// Record or clear the document's last error
    #[must_use]
    pub fn set_document_error(&self, error: Option<EchoError>) -> Self {
        let mut next = self.next();
        next.last_error = error;
        next
    }

    fn next(&self) -> Self {
        Self {
            version: self.version + 1,
            blocks: self.blocks.clone(),
            last_error: self.last_error.clone(),
        }
    }

    fn block_index(&self, id: BlockId) -> EchoResult<usize> {
        self.blocks
            .iter()
            .position(|b| b.id == id)
            .ok_or(EchoError::block_not_found(id))
    }

    fn map_block<R>(
        &self,
        id: BlockId,
        f: impl FnOnce(&mut Block) -> EchoResult<R>,
    ) -> EchoResult<(Self, R)> {
        let index = self.block_index(id)?;
        let mut next = self.next();
        let result = f(Arc::make_mut(&mut next.blocks[index]))?;
        Ok((next, result))
    }
}

/// Owner of the current snapshot.
///
/// Transformations run against the current snapshot under a write lock that
/// is never held across an await point, so each one is applied atomically.
#[derive(Debug)]
pub struct DocumentStore {
    current: RwLock<Arc<Document>>,
    changes: watch::Sender<Arc<Document>>,
}

impl DocumentStore {
    /// Create a store seeded with `document`
    #[must_use]
    pub fn new(document: Document) -> Self {
        let document = Arc::new(document);
        let (changes, _) = watch::channel(Arc::clone(&document));
        Self {
            current: RwLock::new(document),
            changes,
        }
    }

    /// Current snapshot
    #[must_use]
    pub fn snapshot(&self) -> Arc<Document> {
        Arc::clone(&self.current.read())
    }

    /// Version of the current snapshot
    #[must_use]
    pub fn version(&self) -> u64 {
        self.current.read().version()
    }

    /// Receive every new snapshot as it is published
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Document>> {
        self.changes.subscribe()
    }

    /// Apply a transformation producing a new snapshot
    ///
    /// # Errors
    ///
    /// Returns the transformation's error; the current snapshot is unchanged
    pub fn update<F>(&self, f: F) -> EchoResult<Arc<Document>>
    where
        F: FnOnce(&Document) -> EchoResult<Document>,
    {
        self.update_with(|doc| f(doc).map(|next| (next, ())))
            .map(|((), doc)| doc)
    }

    /// Apply a transformation that also yields a value
    ///
    /// # Errors
    ///
    /// Returns the transformation's error; the current snapshot is unchanged
    pub fn update_with<F, R>(&self, f: F) -> EchoResult<(R, Arc<Document>)>
    where
        F: FnOnce(&Document) -> EchoResult<(Document, R)>,
    {
        let mut current = self.current.write();
        let (next, value) = f(&current)?;
        let next = Arc::new(next);
        *current = Arc::clone(&next);
        self.changes.send_replace(Arc::clone(&next));
        Ok((value, next))
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::new(Document::new())
    }
}
