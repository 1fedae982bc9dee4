use crate::config::{RealtimeConfig, ToolDefinition};
use crate::error::{RealtimeError, Result};
use crate::events::{MediaBlob, ServerEvent, ToolCall, ToolResponse};
use crate::session::RealtimeSession;
use async_trait::async_trait;
use base64::prelude::*;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;
type WsSink = futures::stream::SplitSink<WsStream, Message>;
type WsSource = futures::stream::SplitStream<WsStream>;

// ── Outbound wire format ────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiClientMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    setup: Option<GeminiSetup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    realtime_input: Option<GeminiRealtimeInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_response: Option<GeminiToolResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_content: Option<GeminiClientContent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiSetup {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    generation_config: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiClientContent {
    turns: Vec<GeminiTurn>,
    turn_complete: bool,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiTurn {
    role: String,
    parts: Vec<GeminiTextPart>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiTextPart>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiTextPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRealtimeInput {
    media_chunks: Vec<MediaBlob>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolResponse {
    function_responses: Vec<GeminiFunctionResponse>,
}

#[derive(Debug, Clone, Serialize)]
struct GeminiFunctionResponse {
    id: String,
    name: String,
    response: Value,
}

// ── Inbound wire format ─────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiServerMessage {
    setup_complete: Option<Value>,
    server_content: Option<GeminiServerContent>,
    tool_call: Option<GeminiToolCall>,
    go_away: Option<GeminiGoAway>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiServerContent {
    model_turn: Option<GeminiModelTurn>,
    #[serde(default)]
    interrupted: bool,
    #[serde(default)]
    turn_complete: bool,
}

#[derive(Debug, Default, Deserialize)]
struct GeminiModelTurn {
    #[serde(default)]
    parts: Vec<GeminiInboundPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInboundPart {
    text: Option<String>,
    inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolCall {
    #[serde(default)]
    function_calls: Vec<GeminiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGoAway {
    time_left: Option<String>,
}

/// Translate one raw server message into unified events, in the order they
/// must be handled: speech, interruption, turn completion, tool calls.
///
/// A malformed part is skipped; the rest of the message is still delivered.
pub fn translate_message(raw: &str) -> Result<Vec<ServerEvent>> {
    let message: GeminiServerMessage = serde_json::from_str(raw).map_err(|e| {
        RealtimeError::protocol(format!("Parse error: {} ({} bytes)", e, raw.len()))
    })?;

    let mut events = Vec::new();

    if message.setup_complete.is_some() {
        events.push(ServerEvent::SetupComplete);
    }

    if let Some(content) = message.server_content {
        for part in content.model_turn.map(|turn| turn.parts).unwrap_or_default() {
            if let Some(inline) = part.inline_data {
                match BASE64_STANDARD.decode(&inline.data) {
                    Ok(data) => events.push(ServerEvent::Audio {
                        data: Bytes::from(data),
                        mime_type: inline.mime_type,
                    }),
                    Err(e) => tracing::warn!(
                        error = %e,
                        len = inline.data.len(),
                        "skipping inlineData part with invalid base64"
                    ),
                }
            }
            if let Some(text) = part.text {
                events.push(ServerEvent::Text { text });
            }
        }
        if content.interrupted {
            events.push(ServerEvent::Interrupted);
        }
        if content.turn_complete {
            events.push(ServerEvent::TurnComplete);
        }
    }

    if let Some(tool_call) = message.tool_call {
        let calls: Vec<ToolCall> = tool_call
            .function_calls
            .into_iter()
            .map(|call| {
                if call.name.is_empty() {
                    tracing::warn!(call_id = %call.id, "function call without a name");
                }
                ToolCall {
                    call_id: call.id,
                    name: call.name,
                    arguments: call.args.unwrap_or_else(|| json!({})),
                }
            })
            .collect();
        if !calls.is_empty() {
            events.push(ServerEvent::ToolCall { calls });
        }
    }

    if let Some(go_away) = message.go_away {
        events.push(ServerEvent::GoAway { time_left: go_away.time_left });
    }

    if events.is_empty() {
        events.push(ServerEvent::Unknown);
    }
    Ok(events)
}

/// Gemini Live session.
///
/// Manages a WebSocket connection to Google's Gemini Live API.
pub struct GeminiRealtimeSession {
    session_id: String,
    connected: AtomicBool,
    sender: Mutex<WsSink>,
    receiver: Mutex<WsSource>,
    pending: parking_lot::Mutex<VecDeque<ServerEvent>>,
}

impl GeminiRealtimeSession {
    /// Connect to Gemini Live API and send the setup message.
    pub async fn connect(
        endpoint: &str,
        api_key: &str,
        model: &str,
        config: RealtimeConfig,
    ) -> Result<Self> {
        let url = format!("{}?key={}", endpoint, api_key);
        let request = url.into_client_request().map_err(|e| {
            RealtimeError::connection(format!("Failed to create client request: {}", e))
        })?;
        let (stream, _response) = connect_async(request)
            .await
            .map_err(|e| RealtimeError::connection(format!("WebSocket connect error: {}", e)))?;

        let (sink, source) = stream.split();

        let session = Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            connected: AtomicBool::new(true),
            sender: Mutex::new(sink),
            receiver: Mutex::new(source),
            pending: parking_lot::Mutex::new(VecDeque::new()),
        };

        session.send_setup(model, config).await?;

        Ok(session)
    }

    /// Send initial setup message.
    async fn send_setup(&self, model: &str, config: RealtimeConfig) -> Result<()> {
        let setup = build_setup(model, config);
        tracing::info!(session_id = %self.session_id, model_id = %model, "Sending setup message");
        self.send_raw(&GeminiClientMessage { setup: Some(setup), ..Default::default() }).await
    }

    /// Send a raw message.
    async fn send_raw<T: Serialize>(&self, value: &T) -> Result<()> {
        if !self.is_open() {
            return Err(RealtimeError::SessionClosed);
        }

        let msg = serde_json::to_string(value)
            .map_err(|e| RealtimeError::protocol(format!("JSON serialize error: {}", e)))?;

        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Text(msg.into()))
            .await
            .map_err(|e| RealtimeError::connection(format!("Send error: {}", e)))?;

        Ok(())
    }

    /// Receive frames until at least one event is available.
    async fn receive_raw(&self) -> Option<Result<ServerEvent>> {
        loop {
            if let Some(event) = self.pending.lock().pop_front() {
                return Some(Ok(event));
            }

            let frame = {
                let mut receiver = self.receiver.lock().await;
                receiver.next().await
            };

            let text = match frame {
                Some(Ok(Message::Text(text))) => text.as_str().to_owned(),
                Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                    Ok(text) => text.to_string(),
                    Err(e) => {
                        return Some(Err(RealtimeError::protocol(format!(
                            "Invalid UTF-8 in binary message: {}",
                            e
                        ))));
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    tracing::debug!(session_id = %self.session_id, ?frame, "Server closed session");
                    self.connected.store(false, Ordering::SeqCst);
                    return None;
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Some(Err(RealtimeError::connection(format!("Receive error: {}", e))));
                }
                None => {
                    self.connected.store(false, Ordering::SeqCst);
                    return None;
                }
            };

            match translate_message(&text) {
                Ok(events) => self.pending.lock().extend(events),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

#[async_trait]
impl RealtimeSession for GeminiRealtimeSession {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn is_open(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_realtime_input(&self, media: MediaBlob) -> Result<()> {
        let msg = GeminiClientMessage {
            realtime_input: Some(GeminiRealtimeInput { media_chunks: vec![media] }),
            ..Default::default()
        };
        self.send_raw(&msg).await
    }

    async fn send_tool_responses(&self, responses: Vec<ToolResponse>) -> Result<()> {
        let msg = GeminiClientMessage {
            tool_response: Some(GeminiToolResponse {
                function_responses: responses
                    .into_iter()
                    .map(|r| GeminiFunctionResponse {
                        response: r.response_payload(),
                        id: r.call_id,
                        name: r.name,
                    })
                    .collect(),
            }),
            ..Default::default()
        };
        self.send_raw(&msg).await
    }

    async fn send_text(&self, text: &str) -> Result<()> {
        let msg = GeminiClientMessage {
            client_content: Some(GeminiClientContent {
                turns: vec![GeminiTurn {
                    role: "user".to_string(),
                    parts: vec![GeminiTextPart { text: text.to_string() }],
                }],
                turn_complete: true,
            }),
            ..Default::default()
        };
        self.send_raw(&msg).await
    }

    async fn next_event(&self) -> Option<Result<ServerEvent>> {
        self.receive_raw().await
    }

    async fn close(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }

        let mut sender = self.sender.lock().await;
        sender
            .send(Message::Close(None))
            .await
            .map_err(|e| RealtimeError::connection(format!("Close error: {}", e)))?;

        Ok(())
    }
}

impl std::fmt::Debug for GeminiRealtimeSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiRealtimeSession")
            .field("session_id", &self.session_id)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish()
    }
}

fn build_setup(model: &str, config: RealtimeConfig) -> GeminiSetup {
    let mut generation_config = json!({
        "responseModalities": config.modalities.unwrap_or_else(|| vec!["AUDIO".to_string()]),
    });

    if let Some(voice) = &config.voice {
        generation_config["speechConfig"] = json!({
            "voiceConfig": {
                "prebuiltVoiceConfig": {
                    "voiceName": voice
                }
            }
        });
    }

    if let Some(temp) = config.temperature {
        generation_config["temperature"] = json!(temp);
    }

    let model = if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    };

    GeminiSetup {
        model,
        system_instruction: config
            .instruction
            .map(|text| GeminiContent { parts: vec![GeminiTextPart { text }] }),
        generation_config,
        tools: convert_tools(config.tools),
    }
}

fn convert_tools(tools: Option<Vec<ToolDefinition>>) -> Option<Vec<Value>> {
    tools.filter(|t| !t.is_empty()).map(|t_vec| {
        let function_declarations: Vec<Value> = t_vec
            .into_iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description.unwrap_or_default(),
                    "parameters": t.parameters.unwrap_or_else(|| json!({ "type": "object", "properties": {} }))
                })
            })
            .collect();

        vec![json!({
            "functionDeclarations": function_declarations
        })]
    })
}
