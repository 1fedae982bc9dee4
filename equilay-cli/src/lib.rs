//! # equilay-cli
//!
//! The `equilay` binary: an interactive voice console over the trading desk
//! and a one-shot market refresh.
//!
//! ```bash
//! # Voice console with the system microphone and speakers
//! equilay voice
//!
//! # Headless: the virtual device stands in for audio hardware
//! equilay voice --no-audio
//!
//! # Print today's race cards
//! equilay markets --config ./equilay.toml
//! ```

pub mod app;
pub mod cli;
pub mod config;
pub mod console;

pub use app::run;
pub use cli::{Cli, Commands};
pub use config::AppConfig;
