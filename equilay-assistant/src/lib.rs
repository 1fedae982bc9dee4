//! # equilay-assistant
//!
//! Glue between the realtime voice pipeline and the trading state: the system
//! instruction the model is primed with, the tools it can call, and the
//! observer that writes voice lifecycle events into the activity log.
//!
//! ```rust,ignore
//! use equilay_assistant::VoiceAssistant;
//!
//! let voice = VoiceAssistant::spawn(VoiceConfig::default(), store, feed, model, devices);
//! voice.toggle()?;
//! ```

mod assistant;
mod instruction;
mod observer;
pub mod tools;

pub use assistant::VoiceAssistant;
pub use instruction::build_system_instruction;
pub use observer::ActivityLogObserver;
pub use tools::trading_tools;
