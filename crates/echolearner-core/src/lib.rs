//! # EchoLearner Core
//!
//! Speech-synthesis orchestration for voice-tagged dialogue scripts.
//!
//! ## Features
//!
//! - Immutable document snapshots of blocks and sentences
//! - Per-sentence synthesis with staleness tracking and late-result rejection
//! - Gateway, Volcengine and offline mock providers
//! - Local or remote merging of a whole document into one artifact
//! - Back-to-back block playback through pluggable sinks
//!
//! ## Example
//!
//! ```rust,no_run
//! use echolearner_core::{DocumentStore, EchoConfig, PlaybackSequencer};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EchoConfig::load(None)?;
//!     let store = Arc::new(DocumentStore::default());
//!     let orchestrator = Arc::new(config.build_orchestrator(store)?);
//!
//!     let block = orchestrator.add_block()?;
//!     let sentence = orchestrator.snapshot().block(block).unwrap().sentences[0].id;
//!     orchestrator.set_text(block, sentence, "Hello, world!")?;
//!
//!     let audio = orchestrator.synthesize_document().await?;
//!     echolearner_core::export_artifact(&audio, "hello.mp3").await?;
//!
//!     let sequencer = PlaybackSequencer::new(orchestrator, config.build_sink()?);
//!     sequencer.play_block(block).await?;
//!
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod artifact;
pub mod auth;
pub mod config;
pub mod document;
pub mod error;
pub mod merge;
pub mod orchestrator;
pub mod playback;
pub mod synthesis;
pub mod voice;

// Re-export main types for convenience
pub use artifact::{export_artifact, AudioArtifact, AudioFormat};
pub use auth::{AuthGate, CredentialGate};
pub use config::{EchoConfig, MergeMode, PlaybackConfig, ProviderKind, SinkKind};
pub use document::{
    Block, BlockId, BlockUpdate, Document, DocumentStore, GenerationToken, Sentence,
    SentenceField, SentenceId, SynthesisStatus,
};
pub use error::{EchoError, EchoResult};
pub use merge::{AudioMerger, GatewayMerger, LocalMerger};
pub use orchestrator::Orchestrator;
pub use playback::{AudioSink, CommandSink, PlaybackSequencer, PlaybackState, SimulatedDevice};
pub use synthesis::{
    GatewaySynthesizer, MockSynthesizer, SpeechSynthesizer, SynthesisRequest,
    VolcengineCredentials, VolcengineSynthesizer,
};
pub use voice::{Prosody, VoiceId, DEFAULT_VOICE};

/// Version information for the echolearner-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
