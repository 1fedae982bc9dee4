//! Tool-call dispatch: named remote requests to local actions.

use crate::config::ToolDefinition;
use crate::error::{RealtimeError, Result};
use crate::events::{ToolCall, ToolResponse};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::Instrument;

/// Result text sent for tools that are not registered.
pub const UNKNOWN_TOOL_RESULT: &str = "ok";

/// Handler for tool calls.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Execute a tool call and return the result text.
    async fn execute(&self, call: &ToolCall) -> Result<String>;
}

/// A simple function-based tool handler.
pub struct FnToolHandler<F>
where
    F: Fn(&ToolCall) -> Result<String> + Send + Sync,
{
    handler: F,
}

impl<F> FnToolHandler<F>
where
    F: Fn(&ToolCall) -> Result<String> + Send + Sync,
{
    /// Create a new function-based tool handler.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> ToolHandler for FnToolHandler<F>
where
    F: Fn(&ToolCall) -> Result<String> + Send + Sync,
{
    async fn execute(&self, call: &ToolCall) -> Result<String> {
        (self.handler)(call)
    }
}

/// Registry of tools the model may invoke.
///
/// [`dispatch`](Self::dispatch) is total: every call yields exactly one
/// [`ToolResponse`] with the original call id, so the remote side is never
/// left waiting for an acknowledgement.
#[derive(Clone, Default)]
pub struct ToolDispatcher {
    tools: BTreeMap<String, (ToolDefinition, Arc<dyn ToolHandler>)>,
}

impl ToolDispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool, replacing any tool with the same name.
    pub fn register(&mut self, definition: ToolDefinition, handler: impl ToolHandler + 'static) {
        let name = definition.name.clone();
        self.tools.insert(name, (definition, Arc::new(handler)));
    }

    /// Register a tool with a sync function handler.
    pub fn register_fn<F>(&mut self, definition: ToolDefinition, handler: F)
    where
        F: Fn(&ToolCall) -> Result<String> + Send + Sync + 'static,
    {
        self.register(definition, FnToolHandler::new(handler));
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_tool(mut self, definition: ToolDefinition, handler: impl ToolHandler + 'static) -> Self {
        self.register(definition, handler);
        self
    }

    /// Declarations for the session setup, ordered by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|(def, _)| def.clone()).collect()
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run the matching handler and wrap its outcome in a response.
    pub async fn dispatch(&self, call: &ToolCall) -> ToolResponse {
        async {
            let Some((_, handler)) = self.tools.get(&call.name) else {
                tracing::warn!("unknown tool requested, acknowledging");
                return ToolResponse::new(&call.call_id, &call.name, UNKNOWN_TOOL_RESULT);
            };

            let result = match handler.execute(call).await {
                Ok(text) => {
                    tracing::debug!(result = %text, "tool executed");
                    text
                }
                Err(e) => {
                    tracing::warn!(error = %e, "tool failed");
                    format!("error: {}", failure_text(&e))
                }
            };
            ToolResponse::new(&call.call_id, &call.name, result)
        }
        .instrument(equilay_telemetry::tool_dispatch_span(&call.name, &call.call_id))
        .await
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher").field("tools", &self.tools.keys().collect::<Vec<_>>()).finish()
    }
}

fn failure_text(error: &RealtimeError) -> String {
    match error {
        RealtimeError::ToolError(message) => message.clone(),
        other => other.to_string(),
    }
}
