//! # equilay-market
//!
//! One-shot, search-grounded text generation used to pull today's UK & Ireland
//! race cards into the EquiLay activity log.
//!
//! [`GeminiSearchClient`] implements [`equilay_state::MarketFeed`], so it can be
//! handed straight to [`AppStore::refresh_races`](equilay_state::AppStore::refresh_races).
//!
//! ```rust,no_run
//! use equilay_market::GeminiSearchClient;
//! use equilay_state::AppStore;
//!
//! # async fn run() -> Result<(), equilay_market::MarketError> {
//! let client = GeminiSearchClient::new(std::env::var("GOOGLE_API_KEY").unwrap_or_default(), "gemini-3-flash-preview")?;
//! let store = AppStore::new();
//! if let Some(report) = store.refresh_races(&client).await {
//!     println!("{report}");
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod error;
pub mod model;

pub use client::{DEFAULT_BASE_URL, DEFAULT_SEARCH_MODEL, EMPTY_REPORT, FIXTURES_PROMPT, GeminiSearchClient};
pub use error::{MarketError, Result};
