//! Core RealtimeModel trait definition.

use crate::audio::AudioFormat;
use crate::config::RealtimeConfig;
use crate::error::Result;
use crate::session::BoxedSession;
use async_trait::async_trait;

/// A factory for creating real-time sessions.
///
/// A successful [`connect`](RealtimeModel::connect) means the transport is open
/// and the setup message has been sent.
#[async_trait]
pub trait RealtimeModel: Send + Sync {
    /// Get the provider name (e.g., "gemini").
    fn provider(&self) -> &str;

    /// Get the model identifier.
    fn model_id(&self) -> &str;

    /// Get supported input audio formats.
    fn supported_input_formats(&self) -> Vec<AudioFormat>;

    /// Get supported output audio formats.
    fn supported_output_formats(&self) -> Vec<AudioFormat>;

    /// Connect and create a new realtime session.
    async fn connect(&self, config: RealtimeConfig) -> Result<BoxedSession>;
}

/// A shared model type for thread-safe access.
pub type BoxedModel = std::sync::Arc<dyn RealtimeModel>;
