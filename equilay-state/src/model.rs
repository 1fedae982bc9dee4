//! Trading state types.

use crate::error::{Result, StateError};
use serde::{Deserialize, Serialize};

/// Risk limits applied to automated lay betting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskConfig {
    /// Largest liability accepted on a single race.
    pub max_liability_per_race: f64,
    /// Loss at which automation stops for the day.
    pub daily_stop_loss: f64,
    /// Profit at which automation stops for the day.
    pub target_profit: f64,
    /// Lowest decimal odds to lay.
    pub min_odds: f64,
    /// Highest decimal odds to lay.
    pub max_odds: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_liability_per_race: 100.0,
            daily_stop_loss: 500.0,
            target_profit: 200.0,
            min_odds: 2.0,
            max_odds: 6.0,
        }
    }
}

/// Partial update of [`RiskConfig`]. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskUpdate {
    pub max_liability_per_race: Option<f64>,
    pub daily_stop_loss: Option<f64>,
    pub target_profit: Option<f64>,
    pub min_odds: Option<f64>,
    pub max_odds: Option<f64>,
}

impl RiskUpdate {
    /// Update only the per-race liability cap.
    pub fn max_liability(amount: f64) -> Self {
        Self { max_liability_per_race: Some(amount), ..Self::default() }
    }

    fn entries(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("maxLiabilityPerRace", self.max_liability_per_race),
            ("dailyStopLoss", self.daily_stop_loss),
            ("targetProfit", self.target_profit),
            ("minOdds", self.min_odds),
            ("maxOdds", self.max_odds),
        ]
    }

    /// Names of the fields this update sets, in declaration order.
    pub fn fields(&self) -> Vec<&'static str> {
        self.entries().into_iter().filter(|(_, v)| v.is_some()).map(|(k, _)| k).collect()
    }

    /// Whether the update sets nothing.
    pub fn is_empty(&self) -> bool {
        self.fields().is_empty()
    }

    /// Merge into `current`, rejecting values that are negative or not finite.
    pub fn apply_to(&self, current: &RiskConfig) -> Result<RiskConfig> {
        for (field, value) in self.entries() {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(StateError::invalid_update(field, "must be a finite number"));
                }
                if value < 0.0 {
                    return Err(StateError::invalid_update(field, "must not be negative"));
                }
            }
        }

        let merged = RiskConfig {
            max_liability_per_race: self.max_liability_per_race.unwrap_or(current.max_liability_per_race),
            daily_stop_loss: self.daily_stop_loss.unwrap_or(current.daily_stop_loss),
            target_profit: self.target_profit.unwrap_or(current.target_profit),
            min_odds: self.min_odds.unwrap_or(current.min_odds),
            max_odds: self.max_odds.unwrap_or(current.max_odds),
        };
        if merged.min_odds > merged.max_odds {
            return Err(StateError::invalid_update("minOdds", "must not exceed maxOdds"));
        }
        Ok(merged)
    }
}

/// When bets are placed relative to the off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionTiming {
    #[default]
    PreRace,
    InPlay,
}

/// Which markets the automation trades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyConfig {
    /// Minimum matched volume of a market.
    pub volume_min: f64,
    /// Maximum matched volume of a market.
    pub volume_max: f64,
    /// Accepted track surfaces, e.g. `Turf`.
    pub track_surfaces: Vec<String>,
    /// Accepted race types, e.g. `Handicap`.
    pub race_types: Vec<String>,
    pub execution_timing: ExecutionTiming,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            volume_min: 1000.0,
            volume_max: 1_000_000.0,
            track_surfaces: vec!["Turf".to_string()],
            race_types: vec!["Handicap".to_string()],
            execution_timing: ExecutionTiming::PreRace,
        }
    }
}

/// Partial update of [`StrategyConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StrategyUpdate {
    pub volume_min: Option<f64>,
    pub volume_max: Option<f64>,
    pub track_surfaces: Option<Vec<String>>,
    pub race_types: Option<Vec<String>>,
    pub execution_timing: Option<ExecutionTiming>,
}

impl StrategyUpdate {
    /// Merge into `current`. The volume range must stay ordered.
    pub fn apply_to(&self, current: &StrategyConfig) -> Result<StrategyConfig> {
        let merged = StrategyConfig {
            volume_min: self.volume_min.unwrap_or(current.volume_min),
            volume_max: self.volume_max.unwrap_or(current.volume_max),
            track_surfaces: self.track_surfaces.clone().unwrap_or_else(|| current.track_surfaces.clone()),
            race_types: self.race_types.clone().unwrap_or_else(|| current.race_types.clone()),
            execution_timing: self.execution_timing.unwrap_or(current.execution_timing),
        };
        if !(merged.volume_min.is_finite() && merged.volume_max.is_finite()) {
            return Err(StateError::invalid_update("volumeMin", "volume bounds must be finite"));
        }
        if merged.volume_min > merged.volume_max {
            return Err(StateError::invalid_update("volumeMin", "must not exceed volumeMax"));
        }
        Ok(merged)
    }
}

/// Lifecycle of a bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetStatus {
    Pending,
    Placed,
    Matched,
    Won,
    Lost,
    Processing,
}

/// A lay bet in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet {
    pub id: String,
    /// Race off time as shown on the card, e.g. `14:30`.
    pub time: String,
    pub venue: String,
    pub horse: String,
    /// Decimal odds.
    pub odds: f64,
    pub stake: f64,
    pub status: BetStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
}

impl Bet {
    /// Exposure if the horse wins.
    pub fn liability(&self) -> f64 {
        liability(self.stake, self.odds)
    }
}

/// Bet request before an id and status are assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBet {
    pub time: String,
    pub venue: String,
    pub horse: String,
    pub odds: f64,
    pub stake: f64,
}

impl NewBet {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.stake.is_finite() && self.stake > 0.0) {
            return Err(StateError::InvalidBet(format!("stake must be positive, got {}", self.stake)));
        }
        if !(self.odds.is_finite() && self.odds >= 1.0) {
            return Err(StateError::InvalidBet(format!("odds must be at least 1.0, got {}", self.odds)));
        }
        Ok(())
    }

    /// Exposure if the horse wins.
    pub fn liability(&self) -> f64 {
        liability(self.stake, self.odds)
    }
}

fn liability(stake: f64, odds: f64) -> f64 {
    stake * (odds - 1.0)
}

/// Snapshot of everything the dashboard and the assistant read.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    /// Automation running.
    pub is_live: bool,
    #[serde(rename = "totalPnL")]
    pub total_pnl: f64,
    pub active_liability: f64,
    pub today_profit: f64,
    /// Newest first.
    pub bets: Vec<Bet>,
    pub risk: RiskConfig,
    pub strategy: StrategyConfig,
    pub is_loading_data: bool,
    /// Text of the last successful market refresh.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_market_report: Option<String>,
}
