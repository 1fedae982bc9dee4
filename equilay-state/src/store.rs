//! Shared, observable application state.

use crate::error::{Result, StateError};
use crate::feed::MarketFeed;
use crate::format::format_number;
use crate::log::{ActivityLog, LogEntry, LogLevel};
use crate::model::{AppState, Bet, BetStatus, NewBet, RiskConfig, RiskUpdate, StrategyConfig, StrategyUpdate};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

struct Inner {
    state: RwLock<AppState>,
    log: RwLock<ActivityLog>,
    revision: watch::Sender<u64>,
}

/// Cloneable handle to the application state.
///
/// Locks are never held across an await point; async operations such as
/// [`refresh_races`](Self::refresh_races) take short write sections before and
/// after the remote call.
#[derive(Clone)]
pub struct AppStore {
    inner: Arc<Inner>,
}

impl Default for AppStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AppStore {
    /// Create a store with default risk and strategy settings.
    pub fn new() -> Self {
        Self::with_state(AppState::default())
    }

    /// Create a store from an existing snapshot.
    pub fn with_state(state: AppState) -> Self {
        let (revision, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(state),
                log: RwLock::new(ActivityLog::default()),
                revision,
            }),
        }
    }

    /// Owned copy of the current state.
    pub fn snapshot(&self) -> AppState {
        self.inner.state.read().clone()
    }

    /// Whether automation is running.
    pub fn is_live(&self) -> bool {
        self.inner.state.read().is_live
    }

    /// Watch the revision counter, bumped on every change including log entries.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    /// Current revision.
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    fn bump(&self) {
        self.inner.revision.send_modify(|r| *r += 1);
    }

    /// Append an activity-log entry and mirror it to tracing.
    pub fn add_log(&self, text: impl Into<String>, level: LogLevel) {
        let entry = LogEntry::new(text, level);
        match level {
            LogLevel::Info | LogLevel::Success => tracing::info!(level = %level, "{}", entry.text),
            LogLevel::Warning => tracing::warn!("{}", entry.text),
            LogLevel::Error => tracing::error!("{}", entry.text),
        }
        self.inner.log.write().push(entry);
        self.bump();
    }

    /// Activity log, newest first.
    pub fn log_messages(&self) -> Vec<LogEntry> {
        self.inner.log.read().to_vec()
    }

    /// Flip automation on or off. Returns the new value.
    pub fn toggle_live(&self) -> bool {
        let live = {
            let mut state = self.inner.state.write();
            state.is_live = !state.is_live;
            state.is_live
        };
        if live {
            self.add_log("Automation sequence initiated", LogLevel::Success);
        } else {
            self.add_log("Automation suspended", LogLevel::Warning);
        }
        live
    }

    /// Merge a partial risk update. Returns the resulting configuration.
    pub fn update_risk(&self, update: RiskUpdate) -> Result<RiskConfig> {
        let risk = {
            let mut state = self.inner.state.write();
            let merged = update.apply_to(&state.risk)?;
            state.risk = merged.clone();
            merged
        };
        self.add_log(format!("Risk parameters updated: {}", update.fields().join(", ")), LogLevel::Info);
        Ok(risk)
    }

    /// Merge a partial strategy update. Returns the resulting configuration.
    pub fn update_strategy(&self, update: StrategyUpdate) -> Result<StrategyConfig> {
        let strategy = {
            let mut state = self.inner.state.write();
            let merged = update.apply_to(&state.strategy)?;
            state.strategy = merged.clone();
            merged
        };
        self.add_log("Strategy logic updated", LogLevel::Info);
        Ok(strategy)
    }

    /// Record a new lay bet as processing and add its liability.
    pub fn place_lay_bet(&self, request: NewBet) -> Result<Bet> {
        request.validate()?;
        let bet = Bet {
            id: Uuid::new_v4().simple().to_string(),
            time: request.time,
            venue: request.venue,
            horse: request.horse,
            odds: request.odds,
            stake: request.stake,
            status: BetStatus::Processing,
            pnl: None,
        };
        {
            let mut state = self.inner.state.write();
            state.active_liability += bet.liability();
            state.bets.insert(0, bet.clone());
        }
        tracing::debug!(bet_id = %bet.id, horse = %bet.horse, odds = bet.odds, stake = bet.stake, "lay bet placed");
        self.bump();
        Ok(bet)
    }

    /// Mark a bet as matched by the exchange.
    pub fn mark_matched(&self, bet_id: &str) -> Result<Bet> {
        let bet = {
            let mut state = self.inner.state.write();
            let bet = state
                .bets
                .iter_mut()
                .find(|b| b.id == bet_id)
                .ok_or_else(|| StateError::BetNotFound(bet_id.to_string()))?;
            bet.status = BetStatus::Matched;
            bet.clone()
        };
        self.add_log(
            format!("Lay bet matched: {} @ {}", bet.horse, format_number(bet.odds)),
            LogLevel::Success,
        );
        Ok(bet)
    }

    fn set_loading(&self, loading: bool) {
        self.inner.state.write().is_loading_data = loading;
        self.bump();
    }

    /// Pull fresh race data from `feed`.
    ///
    /// Failures are recorded in the activity log and never returned; the
    /// report is returned on success. The loading flag is cleared either way.
    pub async fn refresh_races(&self, feed: &dyn MarketFeed) -> Option<String> {
        self.set_loading(true);
        self.add_log("Searching for live race markets in UK & Ireland...", LogLevel::Info);

        let outcome = feed.fetch_upcoming_races().await;
        let report = match outcome {
            Ok(report) => {
                self.inner.state.write().latest_market_report = Some(report.clone());
                self.add_log("Real-time market data synchronized", LogLevel::Success);
                tracing::debug!(report = %report, "racing data");
                Some(report)
            }
            Err(e) => {
                tracing::warn!(error = %e, "market refresh failed");
                self.add_log("Error synchronizing live data", LogLevel::Error);
                None
            }
        };

        self.set_loading(false);
        report
    }
}

impl std::fmt::Debug for AppStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppStore").field("revision", &self.revision()).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bet(horse: &str, odds: f64, stake: f64) -> NewBet {
        NewBet { time: "15:10".into(), venue: "Cheltenham".into(), horse: horse.into(), odds, stake }
    }

    #[test]
    fn test_toggle_live_logs_both_directions() {
        let store = AppStore::new();
        assert!(store.toggle_live());
        assert!(!store.toggle_live());

        let log = store.log_messages();
        assert_eq!(log[0].text, "Automation suspended");
        assert_eq!(log[0].level, LogLevel::Warning);
        assert_eq!(log[1].text, "Automation sequence initiated");
        assert_eq!(log[1].level, LogLevel::Success);
    }

    #[test]
    fn test_update_risk_logs_fields() {
        let store = AppStore::new();
        let risk = store.update_risk(RiskUpdate::max_liability(250.0)).unwrap();
        assert_eq!(risk.max_liability_per_race, 250.0);
        assert_eq!(store.snapshot().risk.max_liability_per_race, 250.0);
        assert_eq!(store.log_messages()[0].text, "Risk parameters updated: maxLiabilityPerRace");
    }

    #[test]
    fn test_rejected_update_changes_nothing() {
        let store = AppStore::new();
        let before = store.revision();
        assert!(store.update_risk(RiskUpdate::max_liability(-1.0)).is_err());
        assert_eq!(store.snapshot().risk, RiskConfig::default());
        assert!(store.log_messages().is_empty());
        assert_eq!(store.revision(), before);
    }

    #[test]
    fn test_place_and_match_bet() {
        let store = AppStore::new();
        let placed = store.place_lay_bet(bet("Desert Orchid", 3.5, 20.0)).unwrap();
        assert_eq!(placed.status, BetStatus::Processing);
        assert_eq!(store.snapshot().active_liability, 50.0);

        store.place_lay_bet(bet("Arkle", 2.0, 10.0)).unwrap();
        let state = store.snapshot();
        assert_eq!(state.bets[0].horse, "Arkle");
        assert_eq!(state.active_liability, 60.0);

        let matched = store.mark_matched(&placed.id).unwrap();
        assert_eq!(matched.status, BetStatus::Matched);
        assert_eq!(store.log_messages()[0].text, "Lay bet matched: Desert Orchid @ 3.5");
        assert!(matches!(store.mark_matched("missing"), Err(StateError::BetNotFound(_))));
    }

    #[test]
    fn test_revision_advances() {
        let store = AppStore::new();
        let rx = store.subscribe();
        store.toggle_live();
        assert!(rx.has_changed().unwrap());
        assert!(store.revision() > 0);
    }
}
