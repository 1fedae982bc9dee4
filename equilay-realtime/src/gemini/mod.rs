//! Gemini Live API provider.
//!
//! Connects to Google's WebSocket-based BidiGenerateContent endpoint.
//!
//! - Input audio: 16kHz mono PCM
//! - Output audio: 24kHz mono PCM
//! - Tool calls arrive as `toolCall.functionCalls` and are answered with
//!   `toolResponse.functionResponses`
//!
//! # Example
//!
//! ```rust,ignore
//! use equilay_realtime::gemini::GeminiRealtimeModel;
//! use equilay_realtime::{RealtimeModel, RealtimeConfig};
//!
//! let model = GeminiRealtimeModel::new(std::env::var("GOOGLE_API_KEY")?, DEFAULT_MODEL);
//! let session = model
//!     .connect(RealtimeConfig::default().with_instruction("You are a trading assistant."))
//!     .await?;
//! session.close().await?;
//! ```

mod model;
mod session;

pub use model::GeminiRealtimeModel;
pub use session::{GeminiRealtimeSession, translate_message};

/// Gemini Live API WebSocket URL.
pub const GEMINI_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1beta.GenerativeService.BidiGenerateContent";

/// Default model for Gemini Live.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-native-audio-preview-12-2025";

/// Available voices for Gemini Live (varies by model).
pub const GEMINI_VOICES: &[&str] = &["Puck", "Charon", "Kore", "Fenrir", "Aoede"];
