//! The tools the voice model can call to operate the trading desk.

use equilay_realtime::{RealtimeError, ToolCall, ToolDefinition, ToolDispatcher};
use equilay_state::{AppStore, MarketFeed, RiskUpdate, format_number};
use serde_json::{Value, json};
use std::sync::Arc;

pub const TOGGLE_AUTOMATION: &str = "toggle_automation";
pub const SET_MAX_LIABILITY: &str = "set_max_liability";
pub const REFRESH_MARKET_DATA: &str = "refresh_market_data";

fn toggle_automation_definition() -> ToolDefinition {
    ToolDefinition::new(TOGGLE_AUTOMATION)
        .with_description("Starts or pauses the automated betting system.")
        .with_parameters(json!({ "type": "object", "properties": {} }))
}

fn set_max_liability_definition() -> ToolDefinition {
    ToolDefinition::new(SET_MAX_LIABILITY)
        .with_description("Sets the maximum liability allowed per race.")
        .with_parameters(json!({
            "type": "object",
            "properties": {
                "amount": { "type": "number", "description": "The amount in GBP." }
            },
            "required": ["amount"]
        }))
}

fn refresh_market_data_definition() -> ToolDefinition {
    ToolDefinition::new(REFRESH_MARKET_DATA)
        .with_description("Triggers a real-time search for upcoming UK and Ireland races.")
        .with_parameters(json!({ "type": "object", "properties": {} }))
}

/// Read `amount` as a number. Models sometimes send numbers as strings.
fn parse_amount(call: &ToolCall) -> equilay_realtime::Result<f64> {
    let amount = match call.arguments.get("amount") {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
        None => return Err(RealtimeError::tool("missing required argument: amount")),
    };
    amount
        .filter(|a| a.is_finite())
        .ok_or_else(|| RealtimeError::tool(format!("amount is not a number: {}", call.arguments["amount"])))
}

/// Build the dispatcher for the trading tools, bound to `store` and `feed`.
///
/// `refresh_market_data` runs in the background; the call is answered before
/// the search completes, so it must be dispatched inside a tokio runtime.
pub fn trading_tools(store: AppStore, feed: Arc<dyn MarketFeed>) -> ToolDispatcher {
    let mut tools = ToolDispatcher::new();

    let toggle_store = store.clone();
    tools.register_fn(toggle_automation_definition(), move |_call| {
        let live = toggle_store.toggle_live();
        tracing::info!(live, "automation toggled by voice");
        Ok("Automation toggled".to_string())
    });

    let risk_store = store.clone();
    tools.register_fn(set_max_liability_definition(), move |call| {
        let amount = parse_amount(call)?;
        risk_store
            .update_risk(RiskUpdate::max_liability(amount))
            .map_err(|e| RealtimeError::tool(e.to_string()))?;
        Ok(format!("Liability set to {}", format_number(amount)))
    });

    tools.register_fn(refresh_market_data_definition(), move |_call| {
        let store = store.clone();
        let feed = feed.clone();
        tokio::spawn(async move {
            store.refresh_races(feed.as_ref()).await;
        });
        Ok("Market data refresh triggered".to_string())
    });

    tools
}
