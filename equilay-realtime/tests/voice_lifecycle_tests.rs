//! Lifecycle scenarios for the voice session manager, driven by a scripted
//! model and the virtual audio backend.

use async_trait::async_trait;
use bytes::Bytes;
use equilay_realtime::audio::{AudioFormat, encode_samples_to_pcm16};
use equilay_realtime::{
    BoxedSession, OutboundMessage, RealtimeConfig, RealtimeError, RealtimeModel, RealtimeSession,
    Result, ServerEvent, ToolCall, ToolDefinition, ToolDispatcher, ToolResponse,
    VirtualAudioBackend, VoiceConfig, VoiceHandle, VoiceObserver, VoiceSessionManager, VoiceStatus,
};
use equilay_realtime::events::MediaBlob;
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Scripted transport
// ---------------------------------------------------------------------------

/// Test-side view of one connection.
#[derive(Clone)]
struct Peer {
    events: mpsc::UnboundedSender<Result<ServerEvent>>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    closes: Arc<AtomicUsize>,
    open: Arc<AtomicBool>,
}

impl Peer {
    fn push(&self, event: ServerEvent) {
        self.events.send(Ok(event)).unwrap();
    }

    fn tool_responses(&self) -> Vec<ToolResponse> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::ToolResponses(r) => Some(r.clone()),
                _ => None,
            })
            .flatten()
            .collect()
    }

    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    fn audio_frames(&self) -> Vec<MediaBlob> {
        self.sent
            .lock()
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Audio(media) => Some(media.clone()),
                _ => None,
            })
            .collect()
    }
}

struct ScriptedSession {
    events: tokio::sync::Mutex<mpsc::UnboundedReceiver<Result<ServerEvent>>>,
    sent: Arc<Mutex<Vec<OutboundMessage>>>,
    closes: Arc<AtomicUsize>,
    open: Arc<AtomicBool>,
}

#[async_trait]
impl RealtimeSession for ScriptedSession {
    fn session_id(&self) -> &str {
        "scripted"
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    async fn send_realtime_input(&self, media: MediaBlob) -> Result<()> {
        self.sent.lock().push(OutboundMessage::Audio(media));
        Ok(())
    }

    async fn send_tool_responses(&self, responses: Vec<ToolResponse>) -> Result<()> {
        self.sent.lock().push(OutboundMessage::ToolResponses(responses));
        Ok(())
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        self.sent.lock().push(OutboundMessage::Text(text.to_string()));
        Ok(())
    }

    async fn next_event(&self) -> Option<Result<ServerEvent>> {
        let next = self.events.lock().await.recv().await;
        if next.is_none() {
            self.open.store(false, Ordering::SeqCst);
        }
        next
    }

    async fn close(&self) -> Result<()> {
        if self.open.swap(false, Ordering::SeqCst) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Behavior {
    Open,
    Reject,
    Hang,
    OpenAfter(Duration),
}

struct ScriptedModel {
    behavior: Behavior,
    configs: Mutex<Vec<RealtimeConfig>>,
    peers: Mutex<Vec<Peer>>,
}

impl ScriptedModel {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self { behavior, configs: Mutex::default(), peers: Mutex::default() })
    }

    fn peer(&self) -> Peer {
        self.peers.lock().last().cloned().expect("no session was opened")
    }

    fn connects(&self) -> usize {
        self.configs.lock().len()
    }

    fn open_session(&self) -> BoxedSession {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = Peer {
            events: tx,
            sent: Arc::default(),
            closes: Arc::default(),
            open: Arc::new(AtomicBool::new(true)),
        };
        let session = ScriptedSession {
            events: tokio::sync::Mutex::new(rx),
            sent: peer.sent.clone(),
            closes: peer.closes.clone(),
            open: peer.open.clone(),
        };
        self.peers.lock().push(peer);
        Box::new(session)
    }
}

#[async_trait]
impl RealtimeModel for ScriptedModel {
    fn provider(&self) -> &str {
        "scripted"
    }

    fn model_id(&self) -> &str {
        "scripted-voice"
    }

    fn supported_input_formats(&self) -> Vec<AudioFormat> {
        vec![AudioFormat::pcm16_16khz()]
    }

    fn supported_output_formats(&self) -> Vec<AudioFormat> {
        vec![AudioFormat::pcm16_24khz()]
    }

    async fn connect(&self, config: RealtimeConfig) -> Result<BoxedSession> {
        self.configs.lock().push(config);
        match self.behavior {
            Behavior::Open => Ok(self.open_session()),
            Behavior::Reject => Err(RealtimeError::connection("handshake rejected")),
            Behavior::Hang => std::future::pending().await,
            Behavior::OpenAfter(delay) => {
                tokio::time::sleep(delay).await;
                Ok(self.open_session())
            }
        }
    }
}

#[derive(Default)]
struct Recorder {
    statuses: Mutex<Vec<VoiceStatus>>,
    opened: AtomicUsize,
    errors: Mutex<Vec<String>>,
    closed: AtomicUsize,
}

#[async_trait]
impl VoiceObserver for Recorder {
    async fn on_status(&self, status: VoiceStatus) {
        self.statuses.lock().push(status);
    }

    async fn on_opened(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_error(&self, error: &RealtimeError) {
        self.errors.lock().push(error.to_string());
    }

    async fn on_closed(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

struct Fixture {
    model: Arc<ScriptedModel>,
    backend: VirtualAudioBackend,
    recorder: Arc<Recorder>,
    voice: VoiceHandle,
    automation: Arc<AtomicBool>,
}

fn dispatcher(automation: Arc<AtomicBool>) -> ToolDispatcher {
    let mut dispatcher = ToolDispatcher::new();
    dispatcher.register_fn(
        ToolDefinition::new("toggle_automation").with_description("Toggle automation"),
        move |_| {
            automation.fetch_xor(true, Ordering::SeqCst);
            Ok("Automation toggled".to_string())
        },
    );
    dispatcher
}

fn fixture(behavior: Behavior, config: VoiceConfig) -> Fixture {
    let model = ScriptedModel::new(behavior);
    let backend = VirtualAudioBackend::new();
    let recorder = Arc::new(Recorder::default());
    let automation = Arc::new(AtomicBool::new(false));
    let voice = VoiceSessionManager::new(
        model.clone(),
        Arc::new(backend.clone()),
        dispatcher(automation.clone()),
        config,
    )
    .with_instruction(|| "PnL snapshot: £0.00".to_string())
    .with_observer(recorder.clone())
    .spawn();
    Fixture { model, backend, recorder, voice, automation }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..400 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition was not reached");
}

async fn active(behavior: Behavior) -> Fixture {
    let f = fixture(behavior, VoiceConfig::default().with_frame_size(1024));
    f.voice.start().unwrap();
    f.voice.wait_until(|s| s.is_active).await.unwrap();
    f
}

fn speech(seconds: f64) -> Bytes {
    let samples = vec![0.2; (24_000.0 * seconds) as usize];
    Bytes::from(encode_samples_to_pcm16(&samples))
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_happy_path_reaches_active() {
    let f = active(Behavior::Open).await;

    assert_eq!(
        f.voice.status(),
        VoiceStatus { is_active: true, is_connecting: false, is_speaking: false }
    );
    let statuses = f.recorder.statuses.lock().clone();
    assert_eq!(statuses.first().map(|s| s.is_connecting), Some(true));
    assert_eq!(f.recorder.opened.load(Ordering::SeqCst), 1);

    let config = f.model.configs.lock()[0].clone();
    assert_eq!(config.instruction.as_deref(), Some("PnL snapshot: £0.00"));
    assert_eq!(config.modalities, Some(vec!["AUDIO".to_string()]));
    assert_eq!(config.tools.unwrap()[0].name, "toggle_automation");

    assert_eq!(f.backend.stats().captures_opened, 1);
    assert_eq!(f.backend.stats().playbacks_opened, 1);
    assert!(f.backend.capture_started());
}

#[tokio::test]
async fn test_microphone_frames_are_streamed() {
    let f = active(Behavior::Open).await;
    let peer = f.model.peer();

    f.backend.push_input(&[0.25; 1500]);
    f.backend.push_input(&[0.25; 600]);

    eventually(|| peer.audio_frames().len() == 2).await;
    let frames = peer.audio_frames();
    assert!(frames.iter().all(|m| m.mime_type == "audio/pcm;rate=16000"));
}

#[tokio::test]
async fn test_speaking_follows_playback() {
    let f = active(Behavior::Open).await;
    let peer = f.model.peer();

    peer.push(ServerEvent::Audio { data: speech(0.5), mime_type: "audio/pcm;rate=24000".into() });
    peer.push(ServerEvent::Audio { data: speech(0.5), mime_type: "audio/pcm;rate=24000".into() });
    f.voice.wait_until(|s| s.is_speaking).await.unwrap();
    eventually(|| f.backend.scheduled().len() == 2).await;

    f.backend.advance(0.5);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(f.voice.status().is_speaking);

    f.backend.advance(0.5);
    f.voice.wait_until(|s| !s.is_speaking).await.unwrap();
    assert!(f.voice.status().is_active);
}

#[tokio::test]
async fn test_interruption_drops_queued_speech() {
    let f = active(Behavior::Open).await;
    let peer = f.model.peer();

    for _ in 0..3 {
        peer.push(ServerEvent::Audio { data: speech(0.4), mime_type: String::new() });
    }
    eventually(|| f.backend.scheduled().len() == 3).await;

    peer.push(ServerEvent::Interrupted);
    f.voice.wait_until(|s| !s.is_speaking).await.unwrap();
    assert!(f.backend.scheduled().is_empty());

    // New speech after the barge-in starts from the current clock.
    f.backend.advance(0.1);
    peer.push(ServerEvent::Audio { data: speech(0.2), mime_type: String::new() });
    eventually(|| f.backend.scheduled().len() == 1).await;
    assert!((f.backend.scheduled()[0].start_at - 0.1).abs() < 1e-9);
}

#[tokio::test]
async fn test_every_tool_call_is_answered() {
    let f = active(Behavior::Open).await;
    let peer = f.model.peer();

    peer.push(ServerEvent::ToolCall {
        calls: vec![
            ToolCall::new("c1", "toggle_automation", json!({})),
            ToolCall::new("c2", "place_order", json!({"size": 3})),
        ],
    });

    eventually(|| peer.tool_responses().len() == 2).await;
    assert_eq!(
        peer.tool_responses(),
        vec![
            ToolResponse::new("c1", "toggle_automation", "Automation toggled"),
            ToolResponse::new("c2", "place_order", "ok"),
        ]
    );
    assert!(f.automation.load(Ordering::SeqCst));

    let messages = peer
        .sent
        .lock()
        .iter()
        .filter(|m| matches!(m, OutboundMessage::ToolResponses(_)))
        .count();
    assert_eq!(messages, 2);
}

#[tokio::test]
async fn test_stop_then_remote_close_tears_down_once() {
    let f = active(Behavior::Open).await;
    let peer = f.model.peer();
    peer.push(ServerEvent::Audio { data: speech(1.0), mime_type: String::new() });
    f.voice.wait_until(|s| s.is_speaking).await.unwrap();

    f.voice.stop().unwrap();
    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();

    // The server hangs up afterwards and the user presses stop again.
    let closes = peer.closes.clone();
    drop(peer);
    f.model.peers.lock().clear();
    f.voice.stop().unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(f.voice.status(), VoiceStatus::default());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
    let stats = f.backend.stats();
    assert_eq!(stats.captures_closed, 1);
    assert_eq!(stats.playbacks_closed, 1);
    assert!(f.backend.scheduled().is_empty());
    assert_eq!(f.recorder.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_remote_close_returns_to_idle() {
    let f = active(Behavior::Open).await;
    {
        let mut peers = f.model.peers.lock();
        // Dropping the only event sender ends the server stream.
        peers.clear();
    }

    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();
    assert_eq!(f.backend.stats().captures_closed, 1);
    assert_eq!(f.recorder.closed.load(Ordering::SeqCst), 1);

    // A fresh start opens a new session.
    f.voice.toggle().unwrap();
    f.voice.wait_until(|s| s.is_active).await.unwrap();
    assert_eq!(f.model.connects(), 2);
}

#[tokio::test]
async fn test_session_error_does_not_tear_down() {
    let f = active(Behavior::Open).await;
    let peer = f.model.peer();

    peer.events.send(Err(RealtimeError::server("500", "transient"))).unwrap();
    eventually(|| f.recorder.errors.lock().len() == 1).await;
    assert!(f.voice.status().is_active);

    peer.open.store(false, Ordering::SeqCst);
    peer.events.send(Err(RealtimeError::connection("reset by peer"))).unwrap();
    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();
    assert_eq!(f.recorder.errors.lock().len(), 2);
}

#[tokio::test]
async fn test_denied_microphone_leaves_no_resources() {
    let f = fixture(Behavior::Open, VoiceConfig::default());
    f.backend.deny_microphone(true);

    f.voice.start().unwrap();
    eventually(|| f.recorder.errors.lock().len() == 1).await;
    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();

    assert_eq!(f.model.connects(), 0);
    assert_eq!(f.backend.stats().playbacks_opened, 0);
    assert_eq!(f.recorder.opened.load(Ordering::SeqCst), 0);
    assert!(f.recorder.errors.lock()[0].contains("microphone"));
}

#[tokio::test]
async fn test_rejected_connect_releases_devices() {
    let f = fixture(Behavior::Reject, VoiceConfig::default());
    f.voice.start().unwrap();

    eventually(|| f.backend.stats().playbacks_closed == 1).await;
    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();
    assert_eq!(f.backend.stats().captures_closed, 1);
    assert!(f.recorder.errors.lock()[0].contains("handshake rejected"));
    assert_eq!(f.recorder.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_connect_timeout() {
    let f = fixture(Behavior::Hang, VoiceConfig::default().with_connect_timeout(Duration::from_secs(3)));
    f.voice.start().unwrap();
    f.voice.wait_until(|s| s.is_connecting).await.unwrap();

    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();
    assert!(f.recorder.errors.lock()[0].starts_with("Timeout"));
    assert_eq!(f.backend.stats().captures_closed, 1);
}

#[tokio::test]
async fn test_toggle_while_connecting_stops() {
    let f = fixture(Behavior::Hang, VoiceConfig::default());
    f.voice.toggle().unwrap();
    f.voice.wait_until(|s| s.is_connecting).await.unwrap();

    f.voice.toggle().unwrap();
    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();
    assert!(f.recorder.errors.lock().is_empty());
    assert_eq!(f.backend.stats().playbacks_closed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_connect_never_activates() {
    let f = fixture(Behavior::OpenAfter(Duration::from_millis(200)), VoiceConfig::default());
    f.voice.start().unwrap();
    f.voice.wait_until(|s| s.is_connecting).await.unwrap();
    f.voice.stop().unwrap();
    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();

    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(f.recorder.statuses.lock().iter().all(|s| !s.is_active));
    for peer in f.model.peers.lock().iter() {
        assert!(!peer.open.load(Ordering::SeqCst));
    }
}

#[tokio::test]
async fn test_shutdown_stops_manager() {
    let f = active(Behavior::Open).await;
    f.voice.shutdown().await;

    assert!(!f.voice.is_running());
    assert!(f.voice.start().is_err());
    assert_eq!(f.model.peer().closes.load(Ordering::SeqCst), 1);
    assert_eq!(f.recorder.closed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_start_while_active_stops() {
    let f = active(Behavior::Open).await;
    let peer = f.model.peer();

    f.voice.start().unwrap();
    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();

    assert_eq!(f.model.connects(), 1);
    assert_eq!(peer.closes.load(Ordering::SeqCst), 1);
    assert_eq!(f.backend.stats().captures_closed, 1);
    assert_eq!(f.recorder.closed.load(Ordering::SeqCst), 1);

    // The next start opens a fresh session.
    f.voice.start().unwrap();
    f.voice.wait_until(|s| s.is_active).await.unwrap();
    assert_eq!(f.model.connects(), 2);
}

#[tokio::test]
async fn test_text_turn_reaches_session() {
    let f = fixture(Behavior::Open, VoiceConfig::default());

    // Nothing is open yet, so this turn is dropped.
    f.voice.send_text("ignored").unwrap();
    f.voice.start().unwrap();
    f.voice.wait_until(|s| s.is_active).await.unwrap();
    let peer = f.model.peer();

    f.voice.send_text("what is my liability?").unwrap();
    eventually(|| !peer.texts().is_empty()).await;
    assert_eq!(peer.texts(), vec!["what is my liability?".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_lifecycle_on_multi_thread_runtime() {
    let f = active(Behavior::Open).await;
    f.voice.toggle().unwrap();
    f.voice.wait_until(VoiceStatus::is_idle).await.unwrap();

    let stats = f.backend.stats();
    assert_eq!(stats.captures_opened, 1);
    assert_eq!(stats.captures_closed, 1);
    assert_eq!(stats.playbacks_closed, 1);
    f.voice.shutdown().await;
}
