//! # equilay-state
//!
//! The headless application state behind the EquiLay assistant: automation
//! flag, PnL and liability figures, risk and strategy parameters, the bet log
//! and a capped activity log.
//!
//! [`AppStore`] is a cheap-to-clone handle. Readers take an owned
//! [`AppState`] snapshot; writers go through the named mutation methods, each
//! of which records an activity-log entry and bumps a revision counter that
//! observers can watch.
//!
//! ```rust
//! use equilay_state::{AppStore, RiskUpdate};
//!
//! let store = AppStore::new();
//! store.toggle_live();
//! store.update_risk(RiskUpdate { max_liability_per_race: Some(250.0), ..Default::default() })?;
//! assert!(store.snapshot().is_live);
//! # Ok::<(), equilay_state::StateError>(())
//! ```

pub mod error;
pub mod feed;
pub mod format;
pub mod log;
pub mod model;
pub mod store;

pub use error::{Result, StateError};
pub use feed::MarketFeed;
pub use format::{format_gbp, format_number};
pub use log::{LogEntry, LogLevel, MAX_LOG_ENTRIES};
pub use model::{
    AppState, Bet, BetStatus, ExecutionTiming, NewBet, RiskConfig, RiskUpdate, StrategyConfig,
    StrategyUpdate,
};
pub use store::AppStore;
