//! Core RealtimeSession trait definition.

use crate::error::Result;
use crate::events::{MediaBlob, OutboundMessage, ServerEvent, ToolResponse};
use async_trait::async_trait;

/// A real-time bidirectional streaming session.
///
/// Sessions are shared between a reader (pulling [`ServerEvent`]s) and a
/// writer (pushing input), so every method takes `&self`.
///
/// # Example
///
/// ```rust,ignore
/// use equilay_realtime::{RealtimeSession, ServerEvent};
///
/// async fn pump(session: &dyn RealtimeSession) -> Result<()> {
///     while let Some(event) = session.next_event().await {
///         if let ServerEvent::ToolCall { calls } = event? {
///             for call in calls {
///                 let response = ToolResponse::new(call.call_id, call.name, "ok");
///                 session.send_tool_responses(vec![response]).await?;
///             }
///         }
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait RealtimeSession: Send + Sync {
    /// Get the session ID.
    fn session_id(&self) -> &str;

    /// Whether the connection is still open.
    fn is_open(&self) -> bool;

    /// Send a realtime media chunk (base64 payload + MIME type).
    async fn send_realtime_input(&self, media: MediaBlob) -> Result<()>;

    /// Send tool/function responses.
    async fn send_tool_responses(&self, responses: Vec<ToolResponse>) -> Result<()>;

    /// Send a user text turn.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Get the next event from the server.
    ///
    /// Returns `None` once the session is closed.
    async fn next_event(&self) -> Option<Result<ServerEvent>>;

    /// Close the session. Closing an already closed session is a no-op.
    async fn close(&self) -> Result<()>;
}

/// Extension trait for RealtimeSession with convenience methods.
#[async_trait]
pub trait RealtimeSessionExt: RealtimeSession {
    /// Route a queued outbound message to the matching send method.
    async fn send_outbound(&self, message: OutboundMessage) -> Result<()> {
        match message {
            OutboundMessage::Audio(media) => self.send_realtime_input(media).await,
            OutboundMessage::ToolResponses(responses) => self.send_tool_responses(responses).await,
            OutboundMessage::Text(text) => self.send_text(&text).await,
        }
    }
}

// Blanket implementation
impl<T: RealtimeSession + ?Sized> RealtimeSessionExt for T {}

/// A boxed session type for dynamic dispatch.
pub type BoxedSession = Box<dyn RealtimeSession>;
