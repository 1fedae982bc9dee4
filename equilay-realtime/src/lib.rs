//! # equilay-realtime
//!
//! Realtime bidirectional voice sessions for the EquiLay trading assistant.
//!
//! Microphone audio is framed, encoded and streamed to a hosted speech model;
//! model speech comes back as PCM segments that are scheduled gaplessly on the
//! speakers; tool calls are dispatched to local handlers and always answered.
//!
//! ## Architecture
//!
//! ```text
//!   VoiceHandle ──commands──▶ VoiceSessionManager (single task)
//!                                 │          ▲
//!             ┌───────────────────┤          │ events / closed / playback ended
//!             ▼                   ▼          │
//!     CaptureContext ──frames──▶ writer ──▶ RealtimeSession ──▶ reader
//!     (AudioBackend)          (control first,                     │
//!                               then audio)          ┌────────────┴────────────┐
//!                                                    ▼                         ▼
//!                                           PlaybackScheduler          ToolDispatcher
//!                                           (PlaybackContext)
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use equilay_realtime::gemini::GeminiRealtimeModel;
//! use equilay_realtime::{ToolDispatcher, VirtualAudioBackend, VoiceConfig, VoiceSessionManager};
//! use std::sync::Arc;
//!
//! let model = Arc::new(GeminiRealtimeModel::with_default_model(api_key));
//! let voice = VoiceSessionManager::new(
//!     model,
//!     Arc::new(VirtualAudioBackend::new()),
//!     ToolDispatcher::new(),
//!     VoiceConfig::default(),
//! )
//! .with_instruction(|| "You are a trading assistant.".to_string())
//! .spawn();
//!
//! voice.toggle()?;
//! voice.wait_until(|s| s.is_active).await?;
//! ```

pub mod audio;
pub mod capture;
pub mod config;
pub mod device;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod model;
pub mod playback;
pub mod session;
pub mod voice;

// Provider implementations
#[cfg(feature = "gemini")]
pub mod gemini;

// Re-exports
pub use audio::{AudioEncoding, AudioFormat, SampleBuffer};
pub use capture::{CaptureFramer, CapturePipeline};
pub use config::{RealtimeConfig, RealtimeConfigBuilder, ToolDefinition, VoiceConfig};
#[cfg(feature = "desktop-audio")]
pub use device::CpalAudioBackend;
pub use device::{AudioBackend, CaptureContext, PlaybackContext, SourceId, VirtualAudioBackend};
pub use dispatch::{FnToolHandler, ToolDispatcher, ToolHandler};
pub use error::{RealtimeError, Result};
pub use events::{MediaBlob, OutboundMessage, ServerEvent, ToolCall, ToolResponse};
pub use model::{BoxedModel, RealtimeModel};
pub use playback::{PlaybackHandle, PlaybackScheduler};
pub use session::{BoxedSession, RealtimeSession, RealtimeSessionExt};
pub use voice::{
    InstructionProvider, NoOpVoiceObserver, VoiceHandle, VoiceObserver, VoiceSessionManager,
    VoiceStatus,
};
