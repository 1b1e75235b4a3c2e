//! Integration tests for block playback

use async_trait::async_trait;
use echolearner_core::playback::DeviceConfig;
use echolearner_core::{
    AudioArtifact, AudioSink, Block, BlockId, CredentialGate, Document, DocumentStore, EchoError,
    EchoResult, LocalMerger, MockSynthesizer, Orchestrator, PlaybackSequencer, Sentence,
    SimulatedDevice, VoiceId,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Sink that fails on the n-th artifact
struct FlakySink {
    fail_at: usize,
    played: Mutex<Vec<AudioArtifact>>,
}

#[async_trait]
impl AudioSink for FlakySink {
    async fn play(&self, artifact: &AudioArtifact) -> EchoResult<()> {
        let mut played = self.played.lock();
        if played.len() == self.fail_at {
            return Err(EchoError::playback("device unplugged"));
        }
        played.push(artifact.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

fn setup(texts: &[&str]) -> (Arc<MockSynthesizer>, Arc<Orchestrator>, BlockId) {
    let block = Block::with_sentences(
        VoiceId::from("BV001"),
        texts.iter().map(|t| Sentence::new().with_text(*t)).collect(),
    );
    let block_id = block.id;
    let synth = Arc::new(MockSynthesizer::new());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(DocumentStore::new(Document::with_blocks(vec![block]))),
        synth.clone(),
        Arc::new(LocalMerger::new()),
        Arc::new(CredentialGate::new(true, "test")),
    ));
    (synth, orchestrator, block_id)
}

fn block_artifacts(orchestrator: &Orchestrator, block_id: BlockId) -> Vec<AudioArtifact> {
    orchestrator
        .snapshot()
        .block(block_id)
        .unwrap()
        .artifacts()
        .map(|(_, a)| a.clone())
        .collect()
}

#[tokio::test]
async fn test_ready_block_plays_without_generation() {
    let (synth, orchestrator, block_id) = setup(&["Hello", "World"]);
    orchestrator.generate_block(block_id).await.unwrap();
    assert_eq!(synth.calls(), 2);

    let device = Arc::new(SimulatedDevice::new());
    let sequencer = PlaybackSequencer::new(orchestrator.clone(), device.clone());
    sequencer.play_block(block_id).await.unwrap();

    assert_eq!(synth.calls(), 2);
    assert_eq!(device.history(), block_artifacts(&orchestrator, block_id));
    assert_eq!(device.history()[0].bytes(), b"BV001:Hello");
}

#[tokio::test]
async fn test_stale_block_is_generated_first() {
    let (synth, orchestrator, block_id) = setup(&["Hello", " ", "World"]);
    let device = Arc::new(SimulatedDevice::new());
    let sequencer = PlaybackSequencer::new(orchestrator.clone(), device.clone());

    sequencer.play_block(block_id).await.unwrap();

    assert_eq!(synth.calls(), 2);
    assert_eq!(device.history().len(), 2);
    assert!(!sequencer.is_playing(block_id));
}

#[tokio::test]
async fn test_generation_failure_aborts_playback() {
    let (synth, orchestrator, block_id) = setup(&["Hello", "World"]);
    synth.fail_on("World", EchoError::provider("quota exceeded"));
    let device = Arc::new(SimulatedDevice::new());
    let sequencer = PlaybackSequencer::new(orchestrator, device.clone());

    let result = sequencer.play_block(block_id).await;

    assert!(matches!(result, Err(EchoError::ProviderError { .. })));
    assert!(device.history().is_empty());
    assert!(!sequencer.is_playing(block_id));
}

#[tokio::test]
async fn test_playback_error_aborts_sequence() {
    let (_, orchestrator, block_id) = setup(&["one", "two", "three"]);
    let sink = Arc::new(FlakySink {
        fail_at: 1,
        played: Mutex::new(Vec::new()),
    });
    let sequencer = PlaybackSequencer::new(orchestrator, sink.clone());

    let result = sequencer.play_block(block_id).await;

    assert!(matches!(result, Err(EchoError::PlaybackError { .. })));
    assert_eq!(sink.played.lock().len(), 1);
    assert!(!sequencer.is_playing(block_id));
    assert_eq!(sequencer.now_playing(block_id), None);
}

#[tokio::test]
async fn test_second_play_is_rejected_while_busy() {
    let (_, orchestrator, block_id) = setup(&["Good morning, could you tell me the way to the station?"]);
    orchestrator.generate_block(block_id).await.unwrap();
    let sentence_id = orchestrator.snapshot().block(block_id).unwrap().sentences[0].id;

    let device = Arc::new(SimulatedDevice::with_config(DeviceConfig {
        bitrate_kbps: 1,
        max_step: Duration::from_millis(300),
    }));
    let sequencer = Arc::new(PlaybackSequencer::new(orchestrator, device));

    let background = sequencer.clone();
    let first = tokio::spawn(async move { background.play_block(block_id).await });

    let mut waited = Duration::ZERO;
    while sequencer.now_playing(block_id).is_none() && waited < Duration::from_secs(2) {
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += Duration::from_millis(5);
    }
    assert!(sequencer.is_playing(block_id));
    assert_eq!(sequencer.now_playing(block_id), Some(sentence_id));

    let second = sequencer.play_block(block_id).await;
    assert_eq!(second, Err(EchoError::PlaybackBusy { block_id }));

    first.await.unwrap().unwrap();
    assert!(!sequencer.is_playing(block_id));
    assert_eq!(sequencer.now_playing(block_id), None);
}

#[tokio::test]
async fn test_play_all_in_document_order() {
    let first = Block::with_sentences(VoiceId::from("A"), vec![Sentence::new().with_text("one")]);
    let second = Block::with_sentences(VoiceId::from("B"), vec![Sentence::new().with_text("two")]);
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(DocumentStore::new(Document::with_blocks(vec![first, second]))),
        Arc::new(MockSynthesizer::new()),
        Arc::new(LocalMerger::new()),
        Arc::new(CredentialGate::new(true, "test")),
    ));
    let device = Arc::new(SimulatedDevice::new());

    PlaybackSequencer::new(orchestrator, device.clone())
        .play_all()
        .await
        .unwrap();

    let played: Vec<Vec<u8>> = device.history().iter().map(|a| a.bytes().to_vec()).collect();
    assert_eq!(played, vec![b"A:one".to_vec(), b"B:two".to_vec()]);
}
