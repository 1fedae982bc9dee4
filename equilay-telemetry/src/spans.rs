//! Span helpers for EquiLay operations

use tracing::Span;

/// Create a span covering one voice session attempt
///
/// # Example
/// ```
/// use equilay_telemetry::voice_session_span;
/// let span = voice_session_span("gemini-2.5-flash-native-audio-preview-12-2025");
/// let _enter = span.enter();
/// ```
pub fn voice_session_span(model_name: &str) -> Span {
    tracing::info_span!("voice.session", model.name = model_name, otel.kind = "client")
}

/// Create a span for one tool invocation requested by the model
///
/// # Example
/// ```
/// use equilay_telemetry::tool_dispatch_span;
/// let span = tool_dispatch_span("set_max_liability", "c2");
/// let _enter = span.enter();
/// ```
pub fn tool_dispatch_span(tool_name: &str, call_id: &str) -> Span {
    tracing::info_span!(
        "tool.dispatch",
        tool.name = tool_name,
        tool.call_id = call_id,
        otel.kind = "internal"
    )
}

/// Create a span for a search-grounded market refresh
pub fn market_refresh_span(model_name: &str) -> Span {
    tracing::info_span!("market.refresh", model.name = model_name, otel.kind = "client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spans_can_be_entered() {
        let span = tool_dispatch_span("toggle_automation", "c1");
        let _enter = span.enter();
        let _inner = market_refresh_span("gemini-3-flash-preview").entered();
        let _voice = voice_session_span("live").entered();
    }
}
