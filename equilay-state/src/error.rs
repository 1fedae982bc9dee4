//! Error types for state mutations.

use thiserror::Error;

/// Result type for state operations.
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors returned by [`AppStore`](crate::AppStore) mutations and market feeds.
#[derive(Error, Debug)]
pub enum StateError {
    /// A configuration update carried an unusable value.
    #[error("Invalid update for {field}: {reason}")]
    InvalidUpdate {
        /// Field name as it appears in the configuration.
        field: &'static str,
        /// What was wrong with the value.
        reason: String,
    },

    /// A bet could not be placed.
    #[error("Invalid bet: {0}")]
    InvalidBet(String),

    /// No bet with this id exists.
    #[error("Bet not found: {0}")]
    BetNotFound(String),

    /// The market data source failed.
    #[error("Market feed error: {0}")]
    Feed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StateError {
    /// Create an invalid update error.
    pub fn invalid_update(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidUpdate { field, reason: reason.into() }
    }

    /// Wrap a market feed failure.
    pub fn feed(error: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Feed(error.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = StateError::invalid_update("maxLiabilityPerRace", "must be finite");
        assert_eq!(err.to_string(), "Invalid update for maxLiabilityPerRace: must be finite");
        assert_eq!(StateError::feed("timeout").to_string(), "Market feed error: timeout");
    }
}
