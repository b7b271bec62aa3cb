#![forbid(unsafe_code)]

//! Core domain model and business logic for the Zenith wellness tracker.
//!
//! This crate provides:
//! - Domain types (fasting sessions, the persisted record)
//! - The session store and its persistence adapter
//! - Fasting phase resolution and progress
//! - The breathing cycle engine and its timer queue
//! - History statistics and CSV export

pub mod types;
pub mod error;
pub mod clock;
pub mod config;
pub mod logging;
pub mod state;
pub mod store;
pub mod phases;
pub mod resolver;
pub mod timer;
pub mod breathing;
pub mod stats;
pub mod format;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use store::{JsonFileSink, MemorySink, SessionStore, StartOutcome, StateSink, StopOutcome};
pub use phases::{phases, FastingPhase, FastingPreset, PRESETS};
pub use resolver::{progress_percent, resolve_phase, FastingSnapshot};
pub use breathing::{BreathEvent, BreathPhase, BreathingEngine, BreathingLevel, LEVELS};
pub use stats::{daily_totals, EfficiencyTier, HistoryStats};
pub use export::export_history_csv;
