use super::*;
use crate::error::ErrorCode;
use crate::services::diagnosis::fallback_related_images;
use crate::services::speech::{Utterance, Voice};
use crate::state::{ImageContext, Role, test_helpers};
use crate::upstream::types::{RawDiagnosis, UpstreamError};
use serde_json::json;
use tokio::sync::oneshot;

// =========================================================================
// MockVision
// =========================================================================

/// Replies are consumed in order; each may be gated on a oneshot so tests
/// control completion order.
struct MockVision {
    replies: Mutex<Vec<(Option<oneshot::Receiver<()>>, Result<RawDiagnosis, UpstreamError>)>>,
    calls: Mutex<usize>,
}

impl MockVision {
    fn new(replies: Vec<Result<RawDiagnosis, UpstreamError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|r| (None, r)).collect()),
            calls: Mutex::new(0),
        })
    }

    fn gated(replies: Vec<(oneshot::Receiver<()>, RawDiagnosis)>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|(rx, r)| (Some(rx), Ok(r))).collect()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl VisionService for MockVision {
    async fn analyze(&self, _image: &ImageFile) -> Result<RawDiagnosis, UpstreamError> {
        *self.calls.lock().unwrap() += 1;
        let (gate, reply) = self.replies.lock().unwrap().remove(0);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        reply
    }
}

// =========================================================================
// MockChat
// =========================================================================

struct MockChat {
    fail: bool,
    requests: Mutex<Vec<(Vec<ChatTurn>, Option<ImageContext>)>>,
}

impl MockChat {
    fn ok() -> Arc<Self> {
        Arc::new(Self { fail: false, requests: Mutex::new(Vec::new()) })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self { fail: true, requests: Mutex::new(Vec::new()) })
    }

    fn requests(&self) -> Vec<(Vec<ChatTurn>, Option<ImageContext>)> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChatService for MockChat {
    async fn reply(&self, turns: &[ChatTurn], context: Option<&ImageContext>) -> Result<String, UpstreamError> {
        self.requests
            .lock()
            .unwrap()
            .push((turns.to_vec(), context.cloned()));
        if self.fail {
            return Err(UpstreamError::Request("network unreachable".into()));
        }
        Ok(format!("reply {}", turns.len()))
    }
}

/// Each call waits on its own oneshot before answering with the paired text.
struct GatedChat {
    replies: Mutex<Vec<(oneshot::Receiver<()>, String)>>,
    calls: Mutex<usize>,
}

impl GatedChat {
    fn new(replies: Vec<(oneshot::Receiver<()>, &str)>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(|(rx, text)| (rx, text.to_string())).collect()),
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl ChatService for GatedChat {
    async fn reply(&self, _turns: &[ChatTurn], _context: Option<&ImageContext>) -> Result<String, UpstreamError> {
        *self.calls.lock().unwrap() += 1;
        let (gate, text) = self.replies.lock().unwrap().remove(0);
        let _ = gate.await;
        Ok(text)
    }
}

/// Never answers.
struct HangingChat;

#[async_trait::async_trait]
impl ChatService for HangingChat {
    async fn reply(&self, _turns: &[ChatTurn], _context: Option<&ImageContext>) -> Result<String, UpstreamError> {
        std::future::pending().await
    }
}

// =========================================================================
// RecordingSynth
// =========================================================================

struct RecordingSynth {
    spoken: Mutex<Vec<String>>,
    cancels: Mutex<usize>,
}

impl RecordingSynth {
    fn new() -> Arc<Self> {
        Arc::new(Self { spoken: Mutex::new(Vec::new()), cancels: Mutex::new(0) })
    }
}

impl SpeechSynthesizer for RecordingSynth {
    fn voices(&self) -> Vec<Voice> {
        vec![Voice::new("Samantha", "en-US")]
    }

    fn speak(&self, utterance: &Utterance) {
        self.spoken.lock().unwrap().push(utterance.text.clone());
    }

    fn cancel(&self) {
        *self.cancels.lock().unwrap() += 1;
    }
}

// =========================================================================
// Helpers
// =========================================================================

fn tomato_raw() -> RawDiagnosis {
    RawDiagnosis {
        plant: Some("Tomato".into()),
        disease: Some("Early blight".into()),
        confidence: Some(json!(0.88)),
        advice: Some("...".into()),
        related_images: Some(Vec::new()),
    }
}

fn maize_raw() -> RawDiagnosis {
    RawDiagnosis { plant: Some("Maize".into()), disease: Some("Rust".into()), ..RawDiagnosis::default() }
}

fn orchestrator(
    vision: Arc<MockVision>,
    chat: Arc<dyn ChatService>,
    synth: Option<Arc<RecordingSynth>>,
    voice_enabled: bool,
) -> Orchestrator {
    let clients = UpstreamClients { vision, chat };
    let synth = synth.map(|s| s as Arc<dyn SpeechSynthesizer>);
    Orchestrator::new(clients, synth, OrchestratorSettings { request_timeout: Duration::from_secs(120), voice_enabled })
}

// =========================================================================
// Image intake
// =========================================================================

#[test]
fn select_image_rejects_missing_file() {
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), None, false);
    assert!(matches!(orch.select_image(None), Err(OrchestratorError::InvalidInput(_))));
}

#[test]
fn reselecting_releases_previous_preview() {
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), None, false);
    let first = orch.select_image(Some(test_helpers::dummy_image())).unwrap();
    let second = orch.select_image(Some(test_helpers::dummy_image())).unwrap();
    assert!(orch.preview(first).is_none());
    assert!(orch.preview(second).is_some());
    assert_eq!(orch.snapshot().preview_url, Some(format!("/api/session/preview/{second}")));
}

#[tokio::test]
async fn diagnose_selected_without_image_is_invalid_input() {
    let vision = MockVision::new(vec![]);
    let orch = orchestrator(vision.clone(), MockChat::ok(), None, false);
    let err = orch.diagnose_selected().await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidInput(_)));
    assert_eq!(vision.calls(), 0);
}

#[tokio::test]
async fn diagnose_empty_payload_makes_no_call() {
    let vision = MockVision::new(vec![]);
    let orch = orchestrator(vision.clone(), MockChat::ok(), None, false);
    let empty = ImageFile { name: "x.jpg".into(), content_type: None, bytes: Vec::new() };
    assert!(matches!(orch.diagnose(&empty).await, Err(OrchestratorError::InvalidInput(_))));
    assert_eq!(vision.calls(), 0);
}

// =========================================================================
// Diagnosis scenarios
// =========================================================================

#[tokio::test]
async fn tomato_scenario_uses_fallback_images_and_appends_summary() {
    let orch = orchestrator(MockVision::new(vec![Ok(tomato_raw())]), MockChat::ok(), None, false);
    orch.select_image(Some(test_helpers::dummy_image())).unwrap();

    let d = orch.diagnose_selected().await.unwrap();

    assert_eq!(d.related_images, fallback_related_images());
    assert_eq!(orch.diagnosis(), Some(d));
    let transcript = orch.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].role, Role::Assistant);
    assert!(transcript[0].text.contains("Tomato"));
    assert!(transcript[0].text.contains("Early blight"));
    assert!(transcript[0].text.contains("88%"));
}

#[tokio::test]
async fn new_diagnosis_replaces_old_wholesale() {
    let orch = orchestrator(MockVision::new(vec![Ok(tomato_raw()), Ok(maize_raw())]), MockChat::ok(), None, false);
    let image = test_helpers::dummy_image();
    orch.diagnose(&image).await.unwrap();
    let second = orch.diagnose(&image).await.unwrap();

    let current = orch.diagnosis().unwrap();
    assert_eq!(current, second);
    assert_eq!(current.plant, "Maize");
    assert!(current.advice.is_empty());
    assert_eq!(orch.transcript().len(), 2);
}

#[tokio::test]
async fn failed_diagnosis_keeps_previous_state() {
    let orch = orchestrator(
        MockVision::new(vec![Ok(tomato_raw()), Err(UpstreamError::Response { status: 502, body: "bad gateway".into() })]),
        MockChat::ok(),
        None,
        false,
    );
    let image = test_helpers::dummy_image();
    let first = orch.diagnose(&image).await.unwrap();

    let err = orch.diagnose(&image).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::DiagnosisFailed(ref d) if d.contains("bad gateway")));
    assert!(err.retryable());
    assert_eq!(orch.diagnosis(), Some(first));
    assert_eq!(orch.transcript().len(), 1);
}

#[tokio::test]
async fn stale_diagnosis_is_discarded() {
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let vision = MockVision::gated(vec![(first_rx, tomato_raw()), (second_rx, maize_raw())]);
    let orch = orchestrator(vision.clone(), MockChat::ok(), None, false);
    let image = test_helpers::dummy_image();

    let older = {
        let orch = orch.clone();
        let image = image.clone();
        tokio::spawn(async move { orch.diagnose(&image).await })
    };
    while vision.calls() < 1 {
        tokio::task::yield_now().await;
    }
    let newer = {
        let orch = orch.clone();
        let image = image.clone();
        tokio::spawn(async move { orch.diagnose(&image).await })
    };
    while vision.calls() < 2 {
        tokio::task::yield_now().await;
    }

    second_tx.send(()).unwrap();
    let newer = newer.await.unwrap().unwrap();
    first_tx.send(()).unwrap();
    let older = older.await.unwrap();

    assert!(matches!(older, Err(OrchestratorError::Superseded)));
    assert_eq!(newer.plant, "Maize");
    assert_eq!(orch.diagnosis().map(|d| d.plant), Some("Maize".to_string()));
    assert_eq!(orch.transcript().len(), 1);
}

#[test]
fn clear_image_drops_diagnosis_but_keeps_transcript() {
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), None, false);
    let id = orch.select_image(Some(test_helpers::dummy_image())).unwrap();
    orch.session().diagnosis = Some(test_helpers::tomato_diagnosis());
    orch.session().transcript.push(ChatTurn::user("hi"));

    orch.clear_image();

    assert!(orch.preview(id).is_none());
    assert!(orch.diagnosis().is_none());
    assert_eq!(orch.transcript().len(), 1);
}

// =========================================================================
// Conversation scenarios
// =========================================================================

#[tokio::test]
async fn blank_turn_makes_no_call() {
    let chat = MockChat::ok();
    let orch = orchestrator(MockVision::new(vec![]), chat.clone(), None, false);

    assert_eq!(orch.send_turn("").await.unwrap(), None);
    assert_eq!(orch.send_turn("   ").await.unwrap(), None);

    assert!(chat.requests().is_empty());
    assert!(orch.transcript().is_empty());
}

#[tokio::test]
async fn send_turn_carries_context_and_full_transcript() {
    let chat = MockChat::ok();
    let orch = orchestrator(MockVision::new(vec![Ok(tomato_raw())]), chat.clone(), None, false);
    orch.diagnose(&test_helpers::dummy_image()).await.unwrap();

    let reply = orch.send_turn("What fungicide?").await.unwrap();

    assert_eq!(reply.as_deref(), Some("reply 2"));
    let requests = chat.requests();
    assert_eq!(requests.len(), 1);
    let (turns, context) = &requests[0];
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0].role, Role::Assistant);
    assert_eq!(turns[1], ChatTurn::user("What fungicide?"));
    assert_eq!(context.as_ref(), Some(&ImageContext { plant: "Tomato".into(), disease: "Early blight".into() }));

    let transcript = orch.transcript();
    assert_eq!(transcript.len(), 3);
    assert_eq!(transcript[2], ChatTurn::assistant("reply 2"));
}

#[tokio::test]
async fn send_turn_without_diagnosis_omits_context() {
    let chat = MockChat::ok();
    let orch = orchestrator(MockVision::new(vec![]), chat.clone(), None, false);
    orch.send_turn("hello").await.unwrap();
    assert!(chat.requests()[0].1.is_none());
}

#[tokio::test]
async fn failed_chat_keeps_user_turn() {
    let chat = MockChat::failing();
    let orch = orchestrator(MockVision::new(vec![]), chat.clone(), None, false);
    orch.session().diagnosis = Some(test_helpers::tomato_diagnosis());

    let err = orch.send_turn("What fungicide?").await.unwrap_err();

    assert!(matches!(err, OrchestratorError::ChatFailed(ref d) if d.contains("network unreachable")));
    assert_eq!(err.error_code(), "E_CHAT_FAILED");
    assert_eq!(orch.transcript(), vec![ChatTurn::user("What fungicide?")]);
    assert_eq!(chat.requests()[0].1, Some(ImageContext { plant: "Tomato".into(), disease: "Early blight".into() }));
}

#[tokio::test]
async fn turns_append_in_send_order() {
    let chat = MockChat::ok();
    let orch = orchestrator(MockVision::new(vec![]), chat.clone(), None, false);
    orch.send_turn("one").await.unwrap();
    orch.send_turn("two").await.unwrap();

    let roles_and_text: Vec<(Role, String)> = orch
        .transcript()
        .into_iter()
        .map(|t| (t.role, t.text))
        .collect();
    assert_eq!(
        roles_and_text,
        vec![
            (Role::User, "one".into()),
            (Role::Assistant, "reply 1".into()),
            (Role::User, "two".into()),
            (Role::Assistant, "reply 3".into()),
        ]
    );
}

#[tokio::test]
async fn overlapping_turns_reply_in_send_order() {
    let (first_tx, first_rx) = oneshot::channel();
    let (second_tx, second_rx) = oneshot::channel();
    let chat = GatedChat::new(vec![(first_rx, "answer one"), (second_rx, "answer two")]);
    let orch = orchestrator(MockVision::new(vec![]), chat.clone(), None, false);

    let first = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.send_turn("one").await })
    };
    while chat.calls() < 1 {
        tokio::task::yield_now().await;
    }
    let second = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.send_turn("two").await })
    };
    while orch.transcript().len() < 2 {
        tokio::task::yield_now().await;
    }

    second_tx.send(()).unwrap();
    first_tx.send(()).unwrap();
    assert_eq!(first.await.unwrap().unwrap().as_deref(), Some("answer one"));
    assert_eq!(second.await.unwrap().unwrap().as_deref(), Some("answer two"));

    assert_eq!(
        orch.transcript(),
        vec![
            ChatTurn::user("one"),
            ChatTurn::user("two"),
            ChatTurn::assistant("answer one"),
            ChatTurn::assistant("answer two"),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn chat_timeout_keeps_user_turn() {
    let orch = orchestrator(MockVision::new(vec![]), Arc::new(HangingChat), None, false);

    let err = orch.send_turn("still there?").await.unwrap_err();

    assert!(matches!(err, OrchestratorError::UpstreamTimeout { action: Action::Chat, secs: 120 }));
    assert_eq!(err.error_code(), "E_UPSTREAM_TIMEOUT");
    assert!(err.retryable());
    assert_eq!(orch.transcript(), vec![ChatTurn::user("still there?")]);
}

#[tokio::test]
async fn reply_after_end_session_is_dropped() {
    let (tx, rx) = oneshot::channel();
    let chat = GatedChat::new(vec![(rx, "late reply")]);
    let synth = RecordingSynth::new();
    let orch = orchestrator(MockVision::new(vec![]), chat.clone(), Some(synth.clone()), true);

    let pending = {
        let orch = orch.clone();
        tokio::spawn(async move { orch.send_turn("old question").await })
    };
    while chat.calls() < 1 {
        tokio::task::yield_now().await;
    }

    orch.end_session();
    tx.send(()).unwrap();
    let result = pending.await.unwrap();

    assert!(matches!(result, Err(OrchestratorError::SessionEnded)));
    assert!(orch.transcript().is_empty());
    assert!(synth.spoken.lock().unwrap().is_empty());
    assert!(!orch.is_speaking());
}

#[tokio::test]
async fn send_clears_chat_input() {
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), None, false);
    orch.select_suggestion("My maize has wilting: show diagnosis and treatment options.");
    assert_eq!(orch.chat_input(), "My maize has wilting: show diagnosis and treatment options.");
    assert!(orch.transcript().is_empty());

    let text = orch.chat_input();
    orch.send_turn(&text).await.unwrap();
    assert!(orch.chat_input().is_empty());
}

// =========================================================================
// Speech
// =========================================================================

#[tokio::test]
async fn reply_is_voiced_when_enabled() {
    let synth = RecordingSynth::new();
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), Some(synth.clone()), true);
    orch.send_turn("hello").await.unwrap();
    assert_eq!(*synth.spoken.lock().unwrap(), vec!["reply 1".to_string()]);
    assert!(orch.is_speaking());
    assert!(orch.snapshot().speaking);
}

#[tokio::test]
async fn reply_is_silent_when_disabled() {
    let synth = RecordingSynth::new();
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), Some(synth.clone()), true);
    orch.set_voice_enabled(false);
    orch.send_turn("hello").await.unwrap();
    assert!(synth.spoken.lock().unwrap().is_empty());
    assert!(!orch.is_speaking());
}

#[tokio::test]
async fn consecutive_replies_cancel_previous_utterance() {
    let synth = RecordingSynth::new();
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), Some(synth.clone()), true);
    orch.send_turn("one").await.unwrap();
    orch.send_turn("two").await.unwrap();
    assert_eq!(synth.spoken.lock().unwrap().len(), 2);
    assert_eq!(*synth.cancels.lock().unwrap(), 1);
}

#[test]
fn toggle_playback_plays_last_then_stops() {
    let synth = RecordingSynth::new();
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), Some(synth.clone()), true);
    assert!(!orch.toggle_playback());

    orch.session().transcript.push(ChatTurn::assistant("last reply"));
    assert!(orch.toggle_playback());
    assert_eq!(*synth.spoken.lock().unwrap(), vec!["last reply".to_string()]);

    assert!(!orch.toggle_playback());
    assert!(!orch.is_speaking());
    assert_eq!(*synth.cancels.lock().unwrap(), 1);
}

#[test]
fn utterance_finished_clears_speaking_flag() {
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), Some(RecordingSynth::new()), true);
    let id = orch.speak("hello").unwrap();
    assert!(orch.is_speaking());
    assert!(!orch.utterance_finished(Uuid::new_v4()));
    assert!(orch.is_speaking());
    assert!(orch.utterance_finished(id));
    assert!(!orch.is_speaking());
}

#[test]
fn speak_without_synthesizer_is_silent() {
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), None, true);
    assert!(orch.speak("hello").is_none());
    assert!(!orch.is_speaking());
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test]
async fn end_session_releases_everything() {
    let synth = RecordingSynth::new();
    let orch = orchestrator(MockVision::new(vec![Ok(tomato_raw())]), MockChat::ok(), Some(synth.clone()), true);
    let preview = orch.select_image(Some(test_helpers::dummy_image())).unwrap();
    orch.diagnose_selected().await.unwrap();
    orch.speak("hello");

    orch.end_session();

    assert!(orch.preview(preview).is_none());
    assert!(orch.diagnosis().is_none());
    assert!(orch.transcript().is_empty());
    assert!(!orch.is_speaking());
    assert_eq!(*synth.cancels.lock().unwrap(), 1);
}

#[test]
fn copy_transcript_labels_turns() {
    let orch = orchestrator(MockVision::new(vec![]), MockChat::ok(), None, false);
    orch.session().transcript.push(ChatTurn::user("hi"));
    orch.session().transcript.push(ChatTurn::assistant("hello"));
    assert_eq!(orch.copy_transcript(), "You: hi\n\nShibo AI: hello");
}
