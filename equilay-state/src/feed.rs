//! Source of live race market information.

use crate::error::Result;
use async_trait::async_trait;

/// Fetches a human-readable summary of upcoming races.
#[async_trait]
pub trait MarketFeed: Send + Sync {
    /// Return the next fixtures with runners and approximate odds.
    async fn fetch_upcoming_races(&self) -> Result<String>;
}
