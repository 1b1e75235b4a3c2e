//! Integration tests for generation workflows

use async_trait::async_trait;
use echolearner_core::{
    AudioArtifact, AudioMerger, AuthGate, Block, BlockId, CredentialGate, Document, DocumentStore,
    EchoError, EchoResult, LocalMerger, MockSynthesizer, Orchestrator, Sentence, SentenceId,
    SynthesisRequest, SynthesisStatus, VoiceId,
};
use mockall::mock;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

mock! {
    pub Gate {}

    #[async_trait]
    impl AuthGate for Gate {
        async fn is_authenticated(&self) -> bool;
        async fn request_login(&self);
    }
}

/// Local merger that counts invocations
#[derive(Default)]
struct CountingMerger {
    calls: AtomicUsize,
}

#[async_trait]
impl AudioMerger for CountingMerger {
    async fn merge(&self, artifacts: &[AudioArtifact]) -> EchoResult<AudioArtifact> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        LocalMerger::new().merge(artifacts).await
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

struct Harness {
    synth: Arc<MockSynthesizer>,
    merger: Arc<CountingMerger>,
    orchestrator: Arc<Orchestrator>,
}

fn harness_with(document: Document, synth: MockSynthesizer, gate: Arc<dyn AuthGate>) -> Harness {
    let synth = Arc::new(synth);
    let merger = Arc::new(CountingMerger::default());
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(DocumentStore::new(document)),
        synth.clone(),
        merger.clone(),
        gate,
    ));
    Harness {
        synth,
        merger,
        orchestrator,
    }
}

fn harness(document: Document) -> Harness {
    harness_with(
        document,
        MockSynthesizer::new(),
        Arc::new(CredentialGate::new(true, "test")),
    )
}

fn block(voice: &str, texts: &[&str]) -> Block {
    Block::with_sentences(
        VoiceId::from(voice),
        texts.iter().map(|t| Sentence::new().with_text(*t)).collect(),
    )
}

fn ids(document: &Document, block_index: usize) -> (BlockId, Vec<SentenceId>) {
    let block = document.blocks().nth(block_index).expect("block exists");
    (block.id, block.sentences.iter().map(|s| s.id).collect())
}

fn payload(voice: &str, text: &str) -> Vec<u8> {
    MockSynthesizer::payload_for(&SynthesisRequest::new(text, VoiceId::from(voice)))
}

fn status(orchestrator: &Orchestrator, block_id: BlockId, sentence_id: SentenceId) -> SynthesisStatus {
    orchestrator
        .snapshot()
        .sentence(block_id, sentence_id)
        .expect("sentence exists")
        .status
        .clone()
}

#[tokio::test]
async fn test_generate_sentence_is_idempotent() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["Hello"])]));
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);

    let first = h.orchestrator.generate_sentence(b, s[0]).await.unwrap();
    let second = h.orchestrator.generate_sentence(b, s[0]).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.synth.calls(), 1);
    assert!(status(&h.orchestrator, b, s[0]).is_ready());
}

#[tokio::test]
async fn test_block_generates_in_order() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["Hello", "World"])]));
    let (b, _) = ids(&h.orchestrator.snapshot(), 0);

    h.orchestrator.generate_block(b).await.unwrap();

    let snapshot = h.orchestrator.snapshot();
    let artifacts: Vec<Vec<u8>> = snapshot
        .block(b)
        .unwrap()
        .artifacts()
        .map(|(_, a)| a.bytes().to_vec())
        .collect();
    assert_eq!(artifacts, vec![payload("BV001", "Hello"), payload("BV001", "World")]);
    assert!(snapshot.block(b).unwrap().is_fresh());
}

#[tokio::test]
async fn test_generate_block_is_idempotent() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["One", "Two", "Three"])]));
    let (b, _) = ids(&h.orchestrator.snapshot(), 0);

    h.orchestrator.generate_block(b).await.unwrap();
    assert_eq!(h.synth.calls(), 3);
    let version = h.orchestrator.snapshot().version();

    h.orchestrator.generate_block(b).await.unwrap();
    assert_eq!(h.synth.calls(), 3);
    assert_eq!(h.orchestrator.snapshot().version(), version);
}

#[tokio::test]
async fn test_hello_world_blocks_merge_in_block_order() {
    let h = harness(Document::with_blocks(vec![
        block("BV001", &["Hello"]),
        block("BV002", &["World"]),
    ]));

    let merged = h.orchestrator.synthesize_document().await.unwrap();

    assert_eq!(h.synth.calls(), 2);
    assert_eq!(h.merger.calls.load(Ordering::SeqCst), 1);
    let texts: Vec<String> = h.synth.requests().into_iter().map(|r| r.text).collect();
    assert_eq!(texts, vec!["Hello", "World"]);

    let expected = [payload("BV001", "Hello"), payload("BV002", "World")].concat();
    assert_eq!(merged.bytes(), expected.as_slice());
}

#[tokio::test]
async fn test_whitespace_sentence_never_reaches_provider() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["   \t"])]));
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);

    let result = h.orchestrator.generate_sentence(b, s[0]).await;

    assert!(matches!(result, Err(EchoError::EmptyInput { .. })));
    assert_eq!(h.synth.calls(), 0);
}

#[tokio::test]
async fn test_block_generation_skips_blank_sentences() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["Hello", "  ", "World"])]));
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);

    h.orchestrator.generate_block(b).await.unwrap();

    assert_eq!(h.synth.calls(), 2);
    assert_eq!(status(&h.orchestrator, b, s[1]), SynthesisStatus::Idle);
}

#[tokio::test]
async fn test_text_edit_invalidates_only_on_change() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["Hello"])]));
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);
    h.orchestrator.generate_sentence(b, s[0]).await.unwrap();

    h.orchestrator.set_text(b, s[0], "Hello").unwrap();
    assert!(status(&h.orchestrator, b, s[0]).is_ready());

    h.orchestrator.set_pitch(b, s[0], "high").unwrap();
    h.orchestrator.set_speed(b, s[0], "slow").unwrap();
    assert!(status(&h.orchestrator, b, s[0]).is_ready());

    h.orchestrator.set_text(b, s[0], "Hello there").unwrap();
    assert_eq!(status(&h.orchestrator, b, s[0]), SynthesisStatus::Idle);

    let artifact = h.orchestrator.generate_sentence(b, s[0]).await.unwrap();
    assert_eq!(artifact.bytes(), payload("BV001", "Hello there"));
    assert_eq!(h.synth.calls(), 2);
}

#[tokio::test]
async fn test_voice_change_invalidates_whole_block() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["Hello", "World"])]));
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);
    h.orchestrator.generate_block(b).await.unwrap();

    h.orchestrator.set_voice(b, VoiceId::from("BV002")).unwrap();
    for id in &s {
        assert_eq!(status(&h.orchestrator, b, *id), SynthesisStatus::Idle);
    }

    h.orchestrator.generate_block(b).await.unwrap();
    let requests = h.synth.requests();
    assert_eq!(requests.len(), 4);
    assert_eq!(requests[3].voice.as_str(), "BV002");
}

#[tokio::test]
async fn test_document_merges_once_in_order() {
    let h = harness(Document::with_blocks(vec![
        block("BV138_streaming", &["Hi there!", "How are you?"]),
        block("BV027_streaming", &["I'm good."]),
    ]));

    let merged = h.orchestrator.synthesize_document().await.unwrap();

    let mut expected = payload("BV138_streaming", "Hi there!");
    expected.extend(payload("BV138_streaming", "How are you?"));
    expected.extend(payload("BV027_streaming", "I'm good."));
    assert_eq!(merged.bytes(), expected.as_slice());
    assert_eq!(h.synth.calls(), 3);
    assert_eq!(h.merger.calls.load(Ordering::SeqCst), 1);
    assert!(h.orchestrator.snapshot().last_error().is_none());
}

#[tokio::test]
async fn test_single_artifact_skips_merge() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["Only", " "])]));
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);

    let merged = h.orchestrator.synthesize_document().await.unwrap();

    assert_eq!(h.merger.calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        Some(&merged),
        status(&h.orchestrator, b, s[0]).artifact()
    );
}

#[tokio::test]
async fn test_blank_document_has_no_content() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["", "  "])]));

    let result = h.orchestrator.synthesize_document().await;

    assert_eq!(result, Err(EchoError::NoContent));
    assert_eq!(h.synth.calls(), 0);
    assert_eq!(h.merger.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.orchestrator.snapshot().last_error(), Some(&EchoError::NoContent));
}

#[tokio::test]
async fn test_block_failure_aborts_and_keeps_earlier_results() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["one", "two", "three"])]));
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);
    h.synth.fail_on("two", EchoError::provider("quota exceeded"));

    let result = h.orchestrator.generate_block(b).await;

    assert!(matches!(result, Err(EchoError::ProviderError { .. })));
    assert!(status(&h.orchestrator, b, s[0]).is_ready());
    assert!(matches!(status(&h.orchestrator, b, s[1]), SynthesisStatus::Failed(_)));
    assert_eq!(status(&h.orchestrator, b, s[2]), SynthesisStatus::Idle);
    assert_eq!(h.synth.calls(), 2);
    assert!(h.orchestrator.snapshot().block(b).unwrap().last_error.is_some());

    h.synth.clear_failure("two");
    h.orchestrator.generate_block(b).await.unwrap();

    assert_eq!(h.synth.calls(), 4);
    assert!(h.orchestrator.snapshot().block(b).unwrap().last_error.is_none());
}

#[tokio::test]
async fn test_document_failure_recorded_then_cleared() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["one", "two"])]));
    h.synth.fail_on("two", EchoError::provider("boom"));

    assert!(h.orchestrator.synthesize_document().await.is_err());
    assert!(matches!(
        h.orchestrator.snapshot().last_error(),
        Some(EchoError::ProviderError { .. })
    ));
    assert_eq!(h.merger.calls.load(Ordering::SeqCst), 0);

    h.synth.clear_failure("two");
    h.orchestrator.synthesize_document().await.unwrap();
    assert!(h.orchestrator.snapshot().last_error().is_none());
}

#[tokio::test]
async fn test_unauthenticated_restores_status_and_requests_login_once() {
    let mut gate = MockGate::new();
    gate.expect_request_login().times(1).return_const(());
    gate.expect_is_authenticated().return_const(false);

    let h = harness_with(
        Document::with_blocks(vec![block("BV001", &["Hello", "World"])]),
        MockSynthesizer::new(),
        Arc::new(gate),
    );
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);
    h.synth.fail_on("Hello", EchoError::unauthenticated("session expired"));

    let result = h.orchestrator.generate_block(b).await;

    assert!(matches!(result, Err(EchoError::Unauthenticated { .. })));
    assert_eq!(status(&h.orchestrator, b, s[0]), SynthesisStatus::Idle);
    assert_eq!(status(&h.orchestrator, b, s[1]), SynthesisStatus::Idle);
    assert!(h.orchestrator.snapshot().block(b).unwrap().last_error.is_none());
    assert_eq!(h.synth.calls(), 1);
}

#[tokio::test]
async fn test_unauthenticated_keeps_previous_failure() {
    let mut gate = MockGate::new();
    gate.expect_request_login().times(1).return_const(());

    let h = harness_with(
        Document::with_blocks(vec![block("BV001", &["Hello"])]),
        MockSynthesizer::new(),
        Arc::new(gate),
    );
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);

    h.synth.fail_on("Hello", EchoError::provider("busy"));
    assert!(h.orchestrator.generate_sentence(b, s[0]).await.is_err());
    let failed = status(&h.orchestrator, b, s[0]);

    h.synth.fail_on("Hello", EchoError::unauthenticated("expired"));
    assert!(h.orchestrator.synthesize_document().await.is_err());

    assert_eq!(status(&h.orchestrator, b, s[0]), failed);
    assert!(h.orchestrator.snapshot().last_error().is_none());
}

#[tokio::test]
async fn test_late_result_after_removal_is_dropped() {
    let h = harness_with(
        Document::with_blocks(vec![block("BV001", &["Hello", "World"])]),
        MockSynthesizer::new().with_delay(Duration::from_millis(100)),
        Arc::new(CredentialGate::new(true, "test")),
    );
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);

    let orchestrator = h.orchestrator.clone();
    let target = s[0];
    let pending = tokio::spawn(async move { orchestrator.generate_sentence(b, target).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    h.orchestrator.remove_sentence(b, s[0]).unwrap();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(EchoError::SentenceNotFound { .. })));

    let snapshot = h.orchestrator.snapshot();
    let remaining: Vec<SentenceId> = snapshot.block(b).unwrap().sentences.iter().map(|s| s.id).collect();
    assert_eq!(remaining, vec![s[1]]);
}

#[tokio::test]
async fn test_late_result_after_edit_is_dropped() {
    let h = harness_with(
        Document::with_blocks(vec![block("BV001", &["Hello"])]),
        MockSynthesizer::new().with_delay(Duration::from_millis(100)),
        Arc::new(CredentialGate::new(true, "test")),
    );
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);

    let orchestrator = h.orchestrator.clone();
    let target = s[0];
    let pending = tokio::spawn(async move { orchestrator.generate_sentence(b, target).await });

    tokio::time::sleep(Duration::from_millis(20)).await;
    h.orchestrator.set_text(b, s[0], "Goodbye").unwrap();

    let result = pending.await.unwrap();
    assert!(matches!(result, Err(EchoError::Superseded { .. })));
    assert_eq!(status(&h.orchestrator, b, s[0]), SynthesisStatus::Idle);
}

#[tokio::test]
async fn test_second_call_supersedes_first() {
    let h = harness_with(
        Document::with_blocks(vec![block("BV001", &["Hello"])]),
        MockSynthesizer::new().with_delay(Duration::from_millis(50)),
        Arc::new(CredentialGate::new(true, "test")),
    );
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);

    let (first, second) = tokio::join!(
        h.orchestrator.generate_sentence(b, s[0]),
        async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            h.orchestrator.generate_sentence(b, s[0]).await
        }
    );

    assert!(matches!(first, Err(EchoError::Superseded { .. })));
    assert!(second.is_ok());
    assert_eq!(h.synth.calls(), 2);
    assert!(status(&h.orchestrator, b, s[0]).is_ready());
}

#[tokio::test]
async fn test_unauthenticated_after_supersede_leaves_sentence_idle() {
    let mut gate = MockGate::new();
    gate.expect_request_login().times(1).return_const(());

    let h = harness_with(
        Document::with_blocks(vec![block("BV001", &["Hello"])]),
        MockSynthesizer::new().with_delay(Duration::from_millis(100)),
        Arc::new(gate),
    );
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);
    let target = s[0];

    let first = h.orchestrator.clone();
    let first = tokio::spawn(async move { first.generate_sentence(b, target).await });
    tokio::time::sleep(Duration::from_millis(30)).await;
    let second = h.orchestrator.clone();
    let second = tokio::spawn(async move { second.generate_sentence(b, target).await });

    assert!(matches!(first.await.unwrap(), Err(EchoError::Superseded { .. })));
    h.synth.fail_on("Hello", EchoError::unauthenticated("session expired"));

    assert!(matches!(second.await.unwrap(), Err(EchoError::Unauthenticated { .. })));
    let settled = status(&h.orchestrator, b, target);
    assert!(!settled.is_loading());
    assert_eq!(settled, SynthesisStatus::Idle);
}

#[tokio::test]
async fn test_only_content_errors_mark_sentence_failed() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["Hello", "World"])]));
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);

    h.synth.fail_on("Hello", EchoError::configuration("client misconfigured"));
    h.synth.fail_on("World", EchoError::provider("quota exceeded"));

    assert!(h.orchestrator.generate_sentence(b, s[0]).await.is_err());
    assert!(h.orchestrator.generate_sentence(b, s[1]).await.is_err());

    assert_eq!(status(&h.orchestrator, b, s[0]), SynthesisStatus::Idle);
    assert_eq!(
        status(&h.orchestrator, b, s[1]),
        SynthesisStatus::Failed(EchoError::provider("quota exceeded"))
    );
}

#[tokio::test]
async fn test_editing_passthroughs() {
    let h = harness(Document::new());

    let b = h.orchestrator.add_block().unwrap();
    let snapshot = h.orchestrator.snapshot();
    let block = snapshot.block(b).unwrap();
    assert_eq!(block.voice.as_str(), "BV511_streaming");
    assert_eq!(block.sentences.len(), 1);
    let seed = block.sentences[0].id;

    let appended = h.orchestrator.add_sentence(b).unwrap();
    let inserted = h.orchestrator.insert_sentence_after(b, seed).unwrap();
    let order: Vec<SentenceId> = h
        .orchestrator
        .snapshot()
        .block(b)
        .unwrap()
        .sentences
        .iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(order, vec![seed, inserted, appended]);

    h.orchestrator.remove_block(b).unwrap();
    assert!(h.orchestrator.snapshot().is_empty());
    assert!(matches!(
        h.orchestrator.add_sentence(b),
        Err(EchoError::BlockNotFound { .. })
    ));
}

#[tokio::test]
async fn test_store_notifies_subscribers() {
    let h = harness(Document::with_blocks(vec![block("BV001", &["Hello"])]));
    let mut changes = h.orchestrator.store().subscribe();
    let (b, s) = ids(&h.orchestrator.snapshot(), 0);
    let before = h.orchestrator.store().version();

    h.orchestrator.generate_sentence(b, s[0]).await.unwrap();

    assert!(changes.has_changed().unwrap());
    let latest = changes.borrow_and_update().clone();
    assert!(latest.version() > before);
    assert!(latest.sentence(b, s[0]).unwrap().status.is_ready());
}
