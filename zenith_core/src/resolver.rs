//! Fasting phase resolution.
//!
//! Maps elapsed fasting time onto the phase table and derives the progress
//! figures shown while a fast is running. Everything here is pure.

use crate::phases::{phases, FastingPhase};
use crate::types::{ActiveFasting, MS_PER_HOUR};
use chrono::{DateTime, TimeDelta, Utc};

fn hours(elapsed_ms: i64) -> f64 {
    elapsed_ms as f64 / MS_PER_HOUR
}

/// Index of the phase covering `elapsed_ms` in `table`
///
/// `None` only when the elapsed time precedes the first phase, which happens
/// after the start time was corrected into the future.
pub fn phase_index_in(table: &[FastingPhase], elapsed_ms: i64) -> Option<usize> {
    let current_hour = hours(elapsed_ms);
    table.iter().position(|p| p.contains_hour(current_hour))
}

pub fn phase_index(elapsed_ms: i64) -> Option<usize> {
    phase_index_in(phases(), elapsed_ms)
}

/// The phase covering `elapsed_ms`, or `None` while still preparing
pub fn resolve_phase(elapsed_ms: i64) -> Option<&'static FastingPhase> {
    phase_index(elapsed_ms).map(|i| &phases()[i])
}

/// First phase starting strictly after `elapsed_ms`
pub fn next_phase(elapsed_ms: i64) -> Option<&'static FastingPhase> {
    let current_hour = hours(elapsed_ms);
    phases().iter().find(|p| p.hours_start > current_hour)
}

/// Milliseconds until the next phase begins, or `None` in the last phase
pub fn time_to_next_phase(elapsed_ms: i64) -> Option<i64> {
    next_phase(elapsed_ms).map(|p| (p.hours_start * MS_PER_HOUR).round() as i64 - elapsed_ms)
}

/// Progress toward the target as a percentage in `[0, 100]`
///
/// Keeps reporting 100 once the target is passed; fasting beyond the goal is
/// allowed.
pub fn progress_percent(elapsed_ms: i64, target_hours: f64) -> f64 {
    if !(target_hours > 0.0) {
        return 100.0;
    }
    let pct = elapsed_ms as f64 / (target_hours * MS_PER_HOUR) * 100.0;
    pct.clamp(0.0, 100.0)
}

/// When a fast started at `start` reaches `target_hours`
///
/// `None` when the target is not a usable number of hours or the result
/// would fall outside the representable range.
pub fn expected_end(start: DateTime<Utc>, target_hours: f64) -> Option<DateTime<Utc>> {
    let ms = (target_hours * MS_PER_HOUR).round();
    if !ms.is_finite() || ms < 0.0 || ms > i64::MAX as f64 {
        return None;
    }
    let delta = TimeDelta::try_milliseconds(ms as i64)?;
    start.checked_add_signed(delta)
}

/// Read model for a running (or idle) fast at a given instant
#[derive(Clone, Debug)]
pub struct FastingSnapshot {
    pub is_fasting: bool,
    pub start_time: Option<DateTime<Utc>>,
    pub target_hours: f64,
    pub elapsed_ms: i64,
    pub phase: Option<&'static FastingPhase>,
    pub next_phase: Option<&'static FastingPhase>,
    pub time_to_next_phase_ms: Option<i64>,
    pub progress_percent: f64,
    pub expected_end: Option<DateTime<Utc>>,
}

impl FastingSnapshot {
    pub fn at(active: &ActiveFasting, now: DateTime<Utc>) -> Self {
        let start = active.start_time.filter(|_| active.is_fasting);
        let elapsed_ms = start.map_or(0, |s| (now - s).num_milliseconds());

        let (phase, next, to_next) = match start {
            Some(_) => (
                resolve_phase(elapsed_ms),
                next_phase(elapsed_ms),
                time_to_next_phase(elapsed_ms),
            ),
            None => (None, None, None),
        };

        Self {
            is_fasting: start.is_some(),
            start_time: start,
            target_hours: active.target_hours,
            elapsed_ms,
            phase,
            next_phase: next,
            time_to_next_phase_ms: to_next,
            progress_percent: if start.is_some() {
                progress_percent(elapsed_ms, active.target_hours)
            } else {
                0.0
            },
            expected_end: start.and_then(|s| expected_end(s, active.target_hours)),
        }
    }

    /// Fasting but before the first phase
    pub fn is_preparing(&self) -> bool {
        self.is_fasting && self.phase.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::from_epoch_ms;

    const HOUR: i64 = 3_600_000;

    #[test]
    fn test_resolves_phase_by_hour() {
        assert_eq!(resolve_phase(0).unwrap().id, "digestion");
        assert_eq!(resolve_phase(4 * HOUR - 1).unwrap().id, "digestion");
        assert_eq!(resolve_phase(4 * HOUR).unwrap().id, "glycogen");
        assert_eq!(resolve_phase(16 * HOUR).unwrap().id, "metabolic_switch");
        assert_eq!(resolve_phase(1_000 * HOUR).unwrap().id, "immune_reset");
    }

    #[test]
    fn test_negative_elapsed_is_preparation() {
        assert!(resolve_phase(-1).is_none());
        assert_eq!(next_phase(-HOUR).unwrap().id, "digestion");
        assert_eq!(time_to_next_phase(-HOUR), Some(HOUR));
    }

    #[test]
    fn test_phase_index_is_monotonic() {
        let mut last = None;
        let mut t = -2 * HOUR;
        while t < 100 * HOUR {
            let idx = phase_index(t);
            assert!(idx >= last, "phase index went backwards at {}ms", t);
            last = idx;
            t += HOUR / 7;
        }
        assert_eq!(last, Some(phases().len() - 1));
    }

    #[test]
    fn test_next_phase_and_countdown() {
        let elapsed = 13 * HOUR;
        assert_eq!(next_phase(elapsed).unwrap().id, "fat_burning");
        assert_eq!(time_to_next_phase(elapsed), Some(5 * HOUR));
    }

    #[test]
    fn test_no_next_phase_in_last_phase() {
        assert!(next_phase(80 * HOUR).is_none());
        assert!(time_to_next_phase(80 * HOUR).is_none());
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(progress_percent(0, 16.0), 0.0);
        assert_eq!(progress_percent(8 * HOUR, 16.0), 50.0);
        assert_eq!(progress_percent(16 * HOUR, 16.0), 100.0);
        assert_eq!(progress_percent(40 * HOUR, 16.0), 100.0);
        assert_eq!(progress_percent(-HOUR, 16.0), 0.0);

        let mut t = 0;
        while t < 200 * HOUR {
            let pct = progress_percent(t, 13.0);
            assert!((0.0..=100.0).contains(&pct));
            t += HOUR / 3;
        }
    }

    #[test]
    fn test_progress_with_degenerate_target() {
        assert_eq!(progress_percent(HOUR, 0.0), 100.0);
    }

    #[test]
    fn test_snapshot_while_fasting() {
        let active = ActiveFasting {
            is_fasting: true,
            start_time: from_epoch_ms(0),
            target_hours: 16.0,
        };
        let snap = FastingSnapshot::at(&active, from_epoch_ms(20 * HOUR).unwrap());

        assert!(snap.is_fasting);
        assert_eq!(snap.elapsed_ms, 20 * HOUR);
        assert_eq!(snap.phase.unwrap().id, "fat_burning");
        assert_eq!(snap.next_phase.unwrap().id, "autophagy");
        assert_eq!(snap.time_to_next_phase_ms, Some(4 * HOUR));
        assert_eq!(snap.progress_percent, 100.0);
        assert_eq!(snap.expected_end, from_epoch_ms(16 * HOUR));
    }

    #[test]
    fn test_expected_end_out_of_range() {
        let start = from_epoch_ms(0).unwrap();
        assert_eq!(expected_end(start, 16.0), from_epoch_ms(16 * HOUR));
        assert_eq!(expected_end(start, 1e10), None);
        assert_eq!(expected_end(start, f64::INFINITY), None);
        assert_eq!(expected_end(start, f64::NAN), None);
        assert_eq!(expected_end(start, -1.0), None);
    }

    #[test]
    fn test_snapshot_with_huge_target_does_not_overflow() {
        let active = ActiveFasting {
            is_fasting: true,
            start_time: from_epoch_ms(0),
            target_hours: 1e10,
        };
        let snap = FastingSnapshot::at(&active, from_epoch_ms(HOUR).unwrap());
        assert!(snap.expected_end.is_none());
        assert!(snap.progress_percent < 0.01);
    }

    #[test]
    fn test_snapshot_idle() {
        let active = ActiveFasting {
            is_fasting: false,
            start_time: None,
            target_hours: 16.0,
        };
        let snap = FastingSnapshot::at(&active, from_epoch_ms(HOUR).unwrap());
        assert!(!snap.is_fasting);
        assert!(snap.phase.is_none());
        assert!(!snap.is_preparing());
        assert_eq!(snap.progress_percent, 0.0);
    }

    #[test]
    fn test_snapshot_preparing_after_future_start() {
        let active = ActiveFasting {
            is_fasting: true,
            start_time: from_epoch_ms(2 * HOUR),
            target_hours: 16.0,
        };
        let snap = FastingSnapshot::at(&active, from_epoch_ms(HOUR).unwrap());
        assert!(snap.is_preparing());
        assert_eq!(snap.progress_percent, 0.0);
    }
}
