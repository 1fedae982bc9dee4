use equilay_state::{AppState, format_gbp};

/// System instruction for a new voice session, built from `state`.
///
/// Called on every start so the model sees current figures.
pub fn build_system_instruction(state: &AppState) -> String {
    let status = if state.is_live { "ACTIVE" } else { "PAUSED" };
    format!(
        "You are the EquiLay AI Voice Agent. You control a real-time automated horse race betting application.\n\
         Context: Total PnL: {pnl}, Today: {today}, Liability: {liability}.\n\
         Automation Status: {status}.\n\
         Risk: Max Liability {max_liability}, Target {target}.\n\
         \n\
         Instructions:\n\
         1. You are a professional trader's assistant.\n\
         2. You can control the app using tools.\n\
         3. You provide live market updates and status reports.\n\
         4. Keep responses concise and focused on betting operations.",
        pnl = format_gbp(state.total_pnl),
        today = format_gbp(state.today_profit),
        liability = format_gbp(state.active_liability),
        max_liability = format_gbp(state.risk.max_liability_per_race),
        target = format_gbp(state.risk.target_profit),
    )
}
