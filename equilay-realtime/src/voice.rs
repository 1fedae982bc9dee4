//! Voice session lifecycle: Idle → Connecting → Active → Idle.
//!
//! [`VoiceSessionManager`] runs as a single task that owns the session, the
//! capture and playback contexts, and the playback scheduler. Everything that
//! can change that state (user commands, connect results, server events,
//! playback completions) arrives on one channel and is handled in order, so
//! no lock guards the lifecycle.
//!
//! Each start opens a new generation. Inputs produced for an older generation
//! are discarded when they arrive; a session that finishes connecting after
//! the user already stopped is closed on the spot.

use crate::capture::{CapturePipeline, CaptureStats};
use crate::config::{RealtimeConfig, VoiceConfig};
use crate::device::{AudioBackend, CaptureContext, EndedCallback, SourceId, blocking_device_call};
use crate::dispatch::ToolDispatcher;
use crate::error::{RealtimeError, Result};
use crate::events::{OutboundMessage, ServerEvent, ToolCall};
use crate::model::BoxedModel;
use crate::playback::PlaybackScheduler;
use crate::session::{RealtimeSession, RealtimeSessionExt};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::Instrument;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// UI-facing lifecycle flags.
///
/// Derived from the manager's state on every change; never set directly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceStatus {
    /// A session is open and streaming.
    pub is_active: bool,
    /// A start is in progress.
    pub is_connecting: bool,
    /// At least one speech segment is scheduled or playing.
    pub is_speaking: bool,
}

impl VoiceStatus {
    /// Neither active nor connecting.
    pub fn is_idle(&self) -> bool {
        !self.is_active && !self.is_connecting
    }
}

/// Lifecycle callbacks. All methods default to no-ops.
#[async_trait]
pub trait VoiceObserver: Send + Sync {
    /// The status flags changed.
    async fn on_status(&self, _status: VoiceStatus) {}

    /// The session is open and audio is streaming.
    async fn on_opened(&self) {}

    /// A start attempt or a running session reported an error.
    async fn on_error(&self, _error: &RealtimeError) {}

    /// A started session was torn down. Called once per start.
    async fn on_closed(&self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpVoiceObserver;

#[async_trait]
impl VoiceObserver for NoOpVoiceObserver {}

/// Produces the system instruction at connect time.
pub type InstructionProvider = Arc<dyn Fn() -> String + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Toggle,
    Start,
    Stop,
    SendText(String),
    Shutdown,
}

enum Input {
    Command(Command),
    Connected { generation: u64, result: Result<Arc<dyn RealtimeSession>> },
    Event { generation: u64, event: ServerEvent },
    SessionError { generation: u64, error: RealtimeError },
    Closed { generation: u64 },
    PlaybackEnded { generation: u64, id: SourceId },
}

/// Builder and owner of the voice session actor.
pub struct VoiceSessionManager {
    model: BoxedModel,
    backend: Arc<dyn AudioBackend>,
    dispatcher: ToolDispatcher,
    config: VoiceConfig,
    instruction: InstructionProvider,
    observer: Arc<dyn VoiceObserver>,
}

impl VoiceSessionManager {
    /// Create a manager. Nothing is opened until a start command arrives.
    pub fn new(
        model: BoxedModel,
        backend: Arc<dyn AudioBackend>,
        dispatcher: ToolDispatcher,
        config: VoiceConfig,
    ) -> Self {
        Self {
            model,
            backend,
            dispatcher,
            config,
            instruction: Arc::new(String::new),
            observer: Arc::new(NoOpVoiceObserver),
        }
    }

    /// Build the system instruction from a fresh snapshot on every start.
    pub fn with_instruction<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.instruction = Arc::new(provider);
        self
    }

    /// Receive lifecycle callbacks.
    pub fn with_observer(mut self, observer: Arc<dyn VoiceObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Spawn the actor on the current tokio runtime.
    pub fn spawn(self) -> VoiceHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let (status_tx, status_rx) = watch::channel(VoiceStatus::default());
        let actor = Actor {
            settings: self,
            inputs: tx.downgrade(),
            status_tx,
            phase: Phase::Idle,
            generation: 0,
            live: None,
            resources: Resources::default(),
        };
        tokio::spawn(actor.run(rx).instrument(tracing::info_span!("voice_manager")));
        VoiceHandle { inputs: tx, status: status_rx }
    }
}

impl std::fmt::Debug for VoiceSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceSessionManager")
            .field("model", &self.model.model_id())
            .field("dispatcher", &self.dispatcher)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Cloneable front end to a running [`VoiceSessionManager`].
///
/// Commands are queued and never block. They fail only once the manager has
/// shut down.
#[derive(Clone)]
pub struct VoiceHandle {
    inputs: mpsc::UnboundedSender<Input>,
    status: watch::Receiver<VoiceStatus>,
}

impl VoiceHandle {
    /// Start when idle, stop otherwise.
    pub fn toggle(&self) -> Result<()> {
        self.command(Command::Toggle)
    }

    /// Start a session. A start while one is connecting or active stops it.
    pub fn start(&self) -> Result<()> {
        self.command(Command::Start)
    }

    /// Stop the current session. Ignored when idle.
    pub fn stop(&self) -> Result<()> {
        self.command(Command::Stop)
    }

    /// Send a typed user turn on the active session.
    ///
    /// Dropped with a warning when no session is active.
    pub fn send_text(&self, text: impl Into<String>) -> Result<()> {
        self.command(Command::SendText(text.into()))
    }

    /// Tear down any session and wait for the manager task to exit.
    pub async fn shutdown(&self) {
        let _ = self.inputs.send(Input::Command(Command::Shutdown));
        self.inputs.closed().await;
    }

    /// Whether the manager task is still running.
    pub fn is_running(&self) -> bool {
        !self.inputs.is_closed()
    }

    /// Current status flags.
    pub fn status(&self) -> VoiceStatus {
        *self.status.borrow()
    }

    /// Watch status changes.
    pub fn subscribe(&self) -> watch::Receiver<VoiceStatus> {
        self.status.clone()
    }

    /// Wait until the status satisfies `predicate`.
    pub async fn wait_until<F>(&self, mut predicate: F) -> Result<VoiceStatus>
    where
        F: FnMut(&VoiceStatus) -> bool,
    {
        let mut rx = self.status.clone();
        let status = rx.wait_for(|s| predicate(s)).await.map(|s| *s);
        status.map_err(|_| RealtimeError::SessionClosed)
    }

    fn command(&self, command: Command) -> Result<()> {
        self.inputs.send(Input::Command(command)).map_err(|_| RealtimeError::SessionClosed)
    }
}

impl std::fmt::Debug for VoiceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoiceHandle").field("status", &self.status()).finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Connecting,
    Active,
}

#[derive(Default)]
struct Resources {
    session: Option<Arc<dyn RealtimeSession>>,
    capture: Option<Box<dyn CaptureContext>>,
    scheduler: Option<PlaybackScheduler>,
    control_tx: Option<mpsc::UnboundedSender<OutboundMessage>>,
    audio_tx: Option<mpsc::Sender<OutboundMessage>>,
    capture_stats: Option<Arc<CaptureStats>>,
    tasks: Vec<JoinHandle<()>>,
}

struct Actor {
    settings: VoiceSessionManager,
    inputs: mpsc::WeakUnboundedSender<Input>,
    status_tx: watch::Sender<VoiceStatus>,
    phase: Phase,
    generation: u64,
    live: Option<u64>,
    resources: Resources,
}

impl Actor {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Input>) {
        while let Some(input) = rx.recv().await {
            match input {
                Input::Command(Command::Shutdown) => break,
                Input::Command(Command::Toggle | Command::Start) => {
                    if self.phase == Phase::Idle {
                        self.start().await;
                    } else {
                        self.teardown("user stop").await;
                    }
                }
                Input::Command(Command::Stop) => {
                    if self.phase != Phase::Idle {
                        self.teardown("user stop").await;
                    }
                }
                Input::Command(Command::SendText(text)) => self.send_text(text),
                Input::Connected { generation, result } => {
                    self.on_connected(generation, result).await;
                }
                Input::Event { generation, event } if self.is_live(generation) => {
                    self.on_event(event).await;
                }
                Input::SessionError { generation, error } if self.is_live(generation) => {
                    tracing::warn!(error = %error, "voice session error");
                    self.settings.observer.on_error(&error).await;
                }
                Input::Closed { generation } if self.is_live(generation) => {
                    self.teardown("remote close").await;
                }
                Input::PlaybackEnded { generation, id } if self.is_live(generation) => {
                    if let Some(scheduler) = self.resources.scheduler.as_mut() {
                        scheduler.on_ended(id);
                    }
                    self.publish().await;
                }
                _ => tracing::trace!("discarding input from a previous session"),
            }
        }
        self.teardown("shutdown").await;
    }

    fn is_live(&self, generation: u64) -> bool {
        self.live == Some(generation)
    }

    fn status(&self) -> VoiceStatus {
        VoiceStatus {
            is_active: self.phase == Phase::Active,
            is_connecting: self.phase == Phase::Connecting,
            is_speaking: self.resources.scheduler.as_ref().is_some_and(|s| s.is_speaking()),
        }
    }

    async fn publish(&mut self) {
        let status = self.status();
        let changed = self.status_tx.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
        if changed {
            self.settings.observer.on_status(status).await;
        }
    }

    async fn start(&mut self) {
        if self.phase != Phase::Idle {
            return;
        }
        let Some(inputs) = self.inputs.upgrade() else {
            return;
        };

        self.generation += 1;
        let generation = self.generation;
        self.live = Some(generation);
        self.phase = Phase::Connecting;
        self.publish().await;
        tracing::info!(generation, model = self.settings.model.model_id(), "starting voice session");

        if let Err(e) = self.open_devices(generation) {
            self.fail(e).await;
            return;
        }

        let config = self.session_config();
        let model = self.settings.model.clone();
        let timeout = self.settings.config.connect_timeout;
        let connect = async move {
            let result: Result<Arc<dyn RealtimeSession>> =
                match tokio::time::timeout(timeout, model.connect(config)).await {
                    Ok(result) => result.map(Arc::from),
                    Err(_) => Err(RealtimeError::timeout(format!(
                        "session not opened within {:.1}s",
                        timeout.as_secs_f64()
                    ))),
                };
            if let Err(mpsc::error::SendError(Input::Connected { result: Ok(session), .. })) =
                inputs.send(Input::Connected { generation, result })
            {
                let _ = session.close().await;
            }
        };
        let task = tokio::spawn(connect.instrument(tracing::info_span!("voice_connect", generation)));
        self.resources.tasks.push(task);
    }

    fn open_devices(&mut self, generation: u64) -> Result<()> {
        let config = &self.settings.config;
        let backend = &self.settings.backend;
        let capture = blocking_device_call(|| backend.open_capture(config.input_sample_rate))?;
        self.resources.capture = Some(capture);

        let inputs = self.inputs.clone();
        let on_ended: EndedCallback = Arc::new(move |id| {
            if let Some(tx) = inputs.upgrade() {
                let _ = tx.send(Input::PlaybackEnded { generation, id });
            }
        });
        let playback =
            blocking_device_call(|| backend.open_playback(config.output_sample_rate, on_ended))?;
        self.resources.scheduler = Some(PlaybackScheduler::new(playback));
        Ok(())
    }

    fn session_config(&self) -> RealtimeConfig {
        let mut config = RealtimeConfig::new()
            .with_audio_only()
            .with_instruction((self.settings.instruction)())
            .with_tools(self.settings.dispatcher.definitions());
        config.voice = self.settings.config.voice.clone();
        config
    }

    async fn on_connected(&mut self, generation: u64, result: Result<Arc<dyn RealtimeSession>>) {
        if !self.is_live(generation) || self.phase != Phase::Connecting {
            if let Ok(session) = result {
                tracing::debug!(generation, "closing session from a cancelled start");
                close_session(session.as_ref()).await;
            }
            return;
        }

        let session = match result {
            Ok(session) => session,
            Err(e) => {
                self.fail(e).await;
                return;
            }
        };
        let Some(inputs) = self.inputs.upgrade() else {
            close_session(session.as_ref()).await;
            return;
        };
        tracing::info!(generation, session_id = session.session_id(), "voice session opened");

        let config = &self.settings.config;
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (audio_tx, audio_rx) = mpsc::channel(config.audio_queue_capacity.max(1));
        let pipeline = CapturePipeline::new(audio_tx.clone(), config.frame_size, config.input_sample_rate);

        self.resources.tasks.push(tokio::spawn(
            run_writer(session.clone(), control_rx, audio_rx)
                .instrument(tracing::debug_span!("voice_writer", generation)),
        ));
        self.resources.tasks.push(tokio::spawn(
            run_reader(generation, session.clone(), inputs)
                .instrument(tracing::debug_span!("voice_reader", generation)),
        ));
        self.resources.session = Some(session);
        self.resources.control_tx = Some(control_tx);
        self.resources.audio_tx = Some(audio_tx);
        self.resources.capture_stats = Some(pipeline.stats());

        let started = match self.resources.capture.as_mut() {
            Some(capture) => capture.start(pipeline.sink()),
            None => Err(RealtimeError::device("microphone was released before the session opened")),
        };
        if let Err(e) = started {
            self.fail(e).await;
            return;
        }

        self.phase = Phase::Active;
        self.publish().await;
        self.settings.observer.on_opened().await;
    }

    async fn on_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::Audio { data, .. } => {
                if let Some(scheduler) = self.resources.scheduler.as_mut() {
                    if let Err(e) = scheduler.enqueue(&data) {
                        tracing::warn!(error = %e, bytes = data.len(), "dropping speech segment");
                    }
                }
                self.publish().await;
            }
            ServerEvent::Interrupted => {
                if let Some(scheduler) = self.resources.scheduler.as_mut() {
                    let stopped = scheduler.interrupt();
                    tracing::debug!(stopped, "speech interrupted");
                }
                self.publish().await;
            }
            ServerEvent::ToolCall { calls } => self.dispatch_tools(calls),
            ServerEvent::SetupComplete => tracing::debug!("setup acknowledged"),
            ServerEvent::TurnComplete => tracing::debug!("turn complete"),
            ServerEvent::Text { text } => tracing::info!(text = %text, "model text"),
            ServerEvent::GoAway { time_left } => {
                tracing::warn!(time_left = ?time_left, "server will close the session soon");
            }
            ServerEvent::Unknown => tracing::trace!("ignoring unrecognized server message"),
        }
    }

    fn send_text(&self, text: String) {
        match &self.resources.control_tx {
            Some(control) if self.phase == Phase::Active => {
                tracing::debug!(chars = text.chars().count(), "queueing text turn");
                let _ = control.send(OutboundMessage::Text(text));
            }
            _ => tracing::warn!("no active voice session, dropping text turn"),
        }
    }

    fn dispatch_tools(&mut self, calls: Vec<ToolCall>) {
        let Some(control) = self.resources.control_tx.clone() else {
            return;
        };
        let dispatcher = self.settings.dispatcher.clone();
        self.resources.tasks.retain(|task| !task.is_finished());
        self.resources.tasks.push(tokio::spawn(async move {
            for call in calls {
                let response = dispatcher.dispatch(&call).await;
                if control.send(OutboundMessage::ToolResponses(vec![response])).is_err() {
                    tracing::debug!(call_id = %call.call_id, "session ended before tool response was queued");
                    break;
                }
            }
        }));
    }

    async fn fail(&mut self, error: RealtimeError) {
        tracing::error!(error = %error, "voice session failed");
        self.settings.observer.on_error(&error).await;
        self.teardown("error").await;
    }

    /// Release everything in order: session, capture, playback, handles, flags.
    async fn teardown(&mut self, reason: &'static str) {
        let started = self.live.take().is_some();
        for task in self.resources.tasks.drain(..) {
            task.abort();
        }
        if let Some(session) = self.resources.session.take() {
            close_session(session.as_ref()).await;
        }
        if let Some(mut capture) = self.resources.capture.take() {
            blocking_device_call(|| capture.close());
        }
        if let Some(mut scheduler) = self.resources.scheduler.take() {
            blocking_device_call(|| scheduler.context().close());
            scheduler.stop_all();
        }
        self.resources.control_tx = None;
        self.resources.audio_tx = None;
        if let Some(stats) = self.resources.capture_stats.take() {
            tracing::debug!(
                sent = stats.frames_sent(),
                dropped = stats.frames_dropped(),
                "capture statistics"
            );
        }

        self.phase = Phase::Idle;
        self.publish().await;
        if started {
            tracing::info!(reason, "voice session closed");
            self.settings.observer.on_closed().await;
        }
    }
}

async fn close_session(session: &dyn RealtimeSession) {
    match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(error = %e, "session close reported an error"),
        Err(_) => tracing::warn!("session close timed out"),
    }
}

/// Drain both outbound queues into the session, control messages first.
async fn run_writer(
    session: Arc<dyn RealtimeSession>,
    mut control: mpsc::UnboundedReceiver<OutboundMessage>,
    mut audio: mpsc::Receiver<OutboundMessage>,
) {
    loop {
        let message = tokio::select! {
            biased;
            Some(message) = control.recv() => message,
            Some(message) = audio.recv() => message,
            else => break,
        };
        let kind = message.kind();
        if let Err(e) = session.send_outbound(message).await {
            if !session.is_open() {
                tracing::debug!(kind, "session closed, writer stopping");
                break;
            }
            tracing::warn!(kind, error = %e, "failed to send outbound message");
        }
    }
}

/// Forward server events until the session ends.
async fn run_reader(
    generation: u64,
    session: Arc<dyn RealtimeSession>,
    inputs: mpsc::UnboundedSender<Input>,
) {
    loop {
        match session.next_event().await {
            Some(Ok(event)) => {
                if inputs.send(Input::Event { generation, event }).is_err() {
                    break;
                }
            }
            Some(Err(error)) => {
                let open = session.is_open();
                if inputs.send(Input::SessionError { generation, error }).is_err() {
                    break;
                }
                if !open {
                    let _ = inputs.send(Input::Closed { generation });
                    break;
                }
            }
            None => {
                let _ = inputs.send(Input::Closed { generation });
                break;
            }
        }
    }
}
