//! Aggregates over archived fasting sessions for the history view.

use crate::FastingSession;
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use serde::Serialize;

/// Totals across the whole history
#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct HistoryStats {
    pub total_sessions: usize,
    pub total_hours: f64,
    pub longest_hours: f64,
    pub average_hours: f64,
    pub targets_reached: usize,
}

impl HistoryStats {
    pub fn from_history(history: &[FastingSession]) -> Self {
        if history.is_empty() {
            return Self::default();
        }

        let total_hours: f64 = history.iter().map(|s| s.actual_hours).sum();
        let longest_hours = history
            .iter()
            .map(|s| s.actual_hours)
            .fold(0.0, f64::max);

        Self {
            total_sessions: history.len(),
            total_hours,
            longest_hours,
            average_hours: total_hours / history.len() as f64,
            targets_reached: history.iter().filter(|s| s.reached_target()).count(),
        }
    }
}

/// Hours fasted on one calendar day (by end time)
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub hours: f64,
    /// Bar height relative to the chart ceiling, in `[0, 100]`
    pub fill_percent: f64,
}

/// Per-day totals for the `days` days ending on `today`, oldest first
///
/// Days are calendar days in `tz`; a session counts toward the day it ended.
pub fn daily_totals<Tz: TimeZone>(
    history: &[FastingSession],
    today: NaiveDate,
    days: u32,
    max_hours: f64,
    tz: &Tz,
) -> Vec<DailyTotal> {
    (0..days)
        .rev()
        .filter_map(|back| today.checked_sub_days(Days::new(back as u64)))
        .map(|date| {
            let hours: f64 = history
                .iter()
                .filter(|s| local_date(s.end_time, tz) == date)
                .map(|s| s.actual_hours)
                .sum();
            let fill_percent = if max_hours > 0.0 {
                (hours / max_hours * 100.0).clamp(0.0, 100.0)
            } else {
                0.0
            };
            DailyTotal {
                date,
                hours,
                fill_percent,
            }
        })
        .collect()
}

fn local_date<Tz: TimeZone>(at: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    at.with_timezone(tz).date_naive()
}

/// Rough grade of a single fast by its length
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EfficiencyTier {
    Light,
    FatBurn,
    Deep,
    Extended,
}

impl EfficiencyTier {
    pub fn for_hours(hours: f64) -> Self {
        if hours < 16.0 {
            EfficiencyTier::Light
        } else if hours < 20.0 {
            EfficiencyTier::FatBurn
        } else if hours < 36.0 {
            EfficiencyTier::Deep
        } else {
            EfficiencyTier::Extended
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            EfficiencyTier::Light => "light",
            EfficiencyTier::FatBurn => "fat burn",
            EfficiencyTier::Deep => "deep",
            EfficiencyTier::Extended => "extended",
        }
    }
}
