//! # EquiLay Telemetry
//!
//! Structured logging and distributed tracing for the EquiLay workspace.
//!
//! ## Features
//! - Structured logging with `tracing`, filtered through `RUST_LOG`
//! - Optional JSON output for log shipping
//! - OpenTelemetry OTLP export of spans
//! - Span helpers for voice sessions, tool dispatch and market refreshes
//!
//! ## Usage
//!
//! ```rust
//! use equilay_telemetry::{init_telemetry, info};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     init_telemetry("equilay")?;
//!     info!("ready");
//!     Ok(())
//! }
//! ```

pub mod init;
pub mod spans;

// Re-export tracing macros for convenience
pub use tracing::{Span, debug, error, info, instrument, trace, warn};

pub use init::{TelemetryConfig, init_telemetry, init_with_config, init_with_otlp, shutdown_telemetry};
pub use spans::{market_refresh_span, tool_dispatch_span, voice_session_span};
