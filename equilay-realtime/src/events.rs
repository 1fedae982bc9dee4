//! Event types for realtime communication.
//!
//! Provider transports translate their wire messages into [`ServerEvent`]s and
//! accept [`OutboundMessage`]s. Audio is carried as raw bytes inside the crate
//! and base64-encoded only at the transport boundary.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Events received from the realtime server.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    /// The provider acknowledged the setup message.
    SetupComplete,

    /// A segment of model speech (PCM16 at the output rate).
    Audio {
        /// Raw PCM bytes.
        data: Bytes,
        /// MIME type reported by the server.
        mime_type: String,
    },

    /// Model text output.
    Text {
        /// Text fragment.
        text: String,
    },

    /// The user barged in; queued speech must be dropped.
    Interrupted,

    /// The model finished its turn.
    TurnComplete,

    /// The model requested one or more tool invocations.
    ToolCall {
        /// Requested calls, in server order.
        calls: Vec<ToolCall>,
    },

    /// The server announced it will close the connection soon.
    GoAway {
        /// Time left before disconnect, as reported by the server.
        time_left: Option<String>,
    },

    /// Unrecognized message.
    Unknown,
}

/// A tool call request from the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID.
    pub call_id: String,
    /// Tool/function name.
    pub name: String,
    /// Parsed arguments.
    pub arguments: Value,
}

impl ToolCall {
    /// Create a new tool call.
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self { call_id: call_id.into(), name: name.into(), arguments }
    }
}

/// Response to a tool call, carrying a single `result` text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResponse {
    /// The call ID being responded to.
    pub call_id: String,
    /// Name of the tool that was called.
    pub name: String,
    /// Result text returned to the model.
    pub result: String,
}

impl ToolResponse {
    /// Create a new tool response.
    pub fn new(
        call_id: impl Into<String>,
        name: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self { call_id: call_id.into(), name: name.into(), result: result.into() }
    }

    /// The `response` object as sent on the wire.
    pub fn response_payload(&self) -> Value {
        serde_json::json!({ "result": self.result })
    }
}

/// A media payload for realtime input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaBlob {
    /// Base64-encoded payload.
    pub data: String,
    /// MIME type, e.g. `audio/pcm;rate=16000`.
    pub mime_type: String,
}

/// Messages queued for the session writer.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    /// Streamed microphone audio.
    Audio(MediaBlob),
    /// Tool responses for one or more calls.
    ToolResponses(Vec<ToolResponse>),
    /// A user text turn.
    Text(String),
}

impl OutboundMessage {
    /// Short label used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Audio(_) => "audio",
            Self::ToolResponses(_) => "tool_response",
            Self::Text(_) => "text",
        }
    }
}
