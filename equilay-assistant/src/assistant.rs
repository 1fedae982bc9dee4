use crate::instruction::build_system_instruction;
use crate::observer::ActivityLogObserver;
use crate::tools::trading_tools;
use equilay_realtime::{AudioBackend, BoxedModel, VoiceConfig, VoiceHandle, VoiceSessionManager};
use equilay_state::{AppStore, MarketFeed};
use std::sync::Arc;

/// Entry point that wires the voice pipeline to the trading desk.
#[derive(Debug, Clone, Copy, Default)]
pub struct VoiceAssistant;

impl VoiceAssistant {
    /// Spawn a voice session manager bound to `store`.
    ///
    /// The session instruction is rebuilt from a fresh snapshot each time the
    /// session starts. Tool calls act on `store`; market refreshes go through
    /// `feed`. Must be called inside a tokio runtime.
    pub fn spawn(
        config: VoiceConfig,
        store: AppStore,
        feed: Arc<dyn MarketFeed>,
        model: BoxedModel,
        devices: Arc<dyn AudioBackend>,
    ) -> VoiceHandle {
        let span = equilay_telemetry::voice_session_span(model.model_id());
        let _enter = span.enter();

        let tools = trading_tools(store.clone(), feed);
        let instruction_store = store.clone();
        tracing::info!(tools = tools.len(), "starting voice assistant");

        VoiceSessionManager::new(model, devices, tools, config)
            .with_instruction(move || build_system_instruction(&instruction_store.snapshot()))
            .with_observer(Arc::new(ActivityLogObserver::new(store)))
            .spawn()
    }
}
