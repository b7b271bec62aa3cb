//! Core domain types for the Zenith wellness tracker.
//!
//! This module defines the persisted record and the values stored in it:
//! - Archived fasting sessions
//! - The active (in-progress) fast
//! - The selected screen and breathing level

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MS_PER_HOUR: f64 = 3_600_000.0;

/// Longest fasting target accepted, in hours (30 days)
pub const MAX_TARGET_HOURS: f64 = 720.0;

/// Whether `hours` can be used as a fasting target
///
/// Non-finite values would be written to the record as `null`, so they are
/// refused along with zero, negatives and anything past [`MAX_TARGET_HOURS`].
pub fn is_valid_target(hours: f64) -> bool {
    hours.is_finite() && hours > 0.0 && hours <= MAX_TARGET_HOURS
}

// ============================================================================
// Navigation
// ============================================================================

/// Screen the user last looked at
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AppTab {
    #[default]
    Fasting,
    Breathing,
    History,
}

impl std::str::FromStr for AppTab {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "fasting" => Ok(AppTab::Fasting),
            "breathing" => Ok(AppTab::Breathing),
            "history" => Ok(AppTab::History),
            other => Err(crate::Error::Other(format!("Unknown tab: {}", other))),
        }
    }
}

// ============================================================================
// Fasting Types
// ============================================================================

/// A completed fast, archived to history
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct FastingSession {
    pub id: Uuid,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub start_time: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub end_time: DateTime<Utc>,
    pub target_hours: f64,
    pub actual_hours: f64,
}

impl FastingSession {
    /// Build an archived session, or `None` if `end_time` precedes `start_time`
    pub fn new(
        id: Uuid,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        target_hours: f64,
    ) -> Option<Self> {
        if end_time < start_time {
            return None;
        }
        let duration_ms = (end_time - start_time).num_milliseconds();
        Some(Self {
            id,
            start_time,
            end_time,
            target_hours,
            actual_hours: round_hours(duration_ms as f64 / MS_PER_HOUR),
        })
    }

    pub fn duration_ms(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }

    pub fn reached_target(&self) -> bool {
        self.actual_hours >= self.target_hours
    }
}

/// Round to two decimal places
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// Fields describing the fast currently in progress
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveFasting {
    pub is_fasting: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub target_hours: f64,
}

// ============================================================================
// Persisted Record
// ============================================================================

/// Everything the client persists, stored as one record
///
/// Every field falls back to its default when missing so older or partial
/// files still load.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppState {
    pub current_tab: AppTab,
    pub is_fasting: bool,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "null_as_default_target")]
    pub target_hours: f64,
    /// Most recent first
    pub history: Vec<FastingSession>,
    pub breathing_level: usize,
}

// A non-finite target saved by an older build reads back as `null`
fn null_as_default_target<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let hours = Option::<f64>::deserialize(deserializer)?;
    Ok(hours.unwrap_or_else(|| AppState::default().target_hours))
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            current_tab: AppTab::Fasting,
            is_fasting: false,
            start_time: None,
            target_hours: 16.0,
            history: Vec::new(),
            breathing_level: 0,
        }
    }
}

impl AppState {
    pub fn active(&self) -> ActiveFasting {
        ActiveFasting {
            is_fasting: self.is_fasting,
            start_time: self.start_time,
            target_hours: self.target_hours,
        }
    }

    /// Bring a freshly loaded record back inside the ranges the engine accepts
    pub fn sanitize(&mut self) {
        let max_level = crate::breathing::LEVELS.len() - 1;
        if self.breathing_level > max_level {
            tracing::warn!(
                "Persisted breathing level {} out of range, clamping to {}",
                self.breathing_level,
                max_level
            );
            self.breathing_level = max_level;
        }
        if !is_valid_target(self.target_hours) {
            tracing::warn!(
                "Persisted target of {} hours is out of range, resetting",
                self.target_hours
            );
            self.target_hours = AppState::default().target_hours;
        }
        if self.is_fasting && self.start_time.is_none() {
            tracing::warn!("Persisted record is fasting without a start time, clearing");
            self.is_fasting = false;
        }
    }
}
