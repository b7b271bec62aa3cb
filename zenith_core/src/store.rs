//! The session store: the single owner of persisted client state.
//!
//! Every successful mutation is followed by a flush through a
//! [`StateSink`]. Flushes are fire-and-forget: a failure is logged and the
//! in-memory state stays as mutated.

use crate::clock::Clock;
use crate::resolver::FastingSnapshot;
use crate::types::is_valid_target;
use crate::{AppState, AppTab, Error, FastingSession, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Persistence adapter for the whole record
pub trait StateSink {
    fn save(&mut self, state: &AppState) -> Result<()>;
}

/// Writes the record to a JSON file with locking and atomic replace
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateSink for JsonFileSink {
    fn save(&mut self, state: &AppState) -> Result<()> {
        state.save(&self.path)
    }
}

/// Keeps every flushed record in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    pub saved: Vec<AppState>,
}

impl MemorySink {
    pub fn last(&self) -> Option<&AppState> {
        self.saved.last()
    }
}

impl StateSink for MemorySink {
    fn save(&mut self, state: &AppState) -> Result<()> {
        self.saved.push(state.clone());
        Ok(())
    }
}

/// Result of [`SessionStore::start_fasting`]
#[derive(Clone, Debug, PartialEq)]
pub enum StartOutcome {
    Started,
    /// A fast was already running; its start was dropped without archiving
    Restarted { discarded_start: DateTime<Utc> },
}

/// Result of [`SessionStore::stop_fasting`]
#[derive(Clone, Debug, PartialEq)]
pub enum StopOutcome {
    /// The fast was archived at the front of history
    Archived(FastingSession),
    /// Nothing was running
    NotFasting,
    /// The end preceded the start; nothing changed and the fast is still active
    Rejected {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// Owns the persisted record and exposes its mutation API
pub struct SessionStore<C: Clock, S: StateSink> {
    state: AppState,
    clock: C,
    sink: S,
}

impl<C: Clock, S: StateSink> SessionStore<C, S> {
    /// Wrap an already hydrated record
    pub fn new(state: AppState, clock: C, sink: S) -> Self {
        Self { state, clock, sink }
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn history(&self) -> &[FastingSession] {
        &self.state.history
    }

    pub fn is_fasting(&self) -> bool {
        self.state.is_fasting
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Phase and progress of the current fast as of now
    pub fn snapshot(&self) -> FastingSnapshot {
        FastingSnapshot::at(&self.state.active(), self.clock.now())
    }

    pub fn find_session(&self, id: Uuid) -> Option<&FastingSession> {
        self.state.history.iter().find(|s| s.id == id)
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Begin a fast now
    ///
    /// Starting over a running fast drops that fast without archiving it;
    /// the outcome reports what was discarded. A target outside
    /// `(0, MAX_TARGET_HOURS]` is refused and nothing changes.
    pub fn start_fasting(&mut self, target_hours: f64) -> Result<StartOutcome> {
        if !is_valid_target(target_hours) {
            return Err(Error::InvalidTarget(target_hours));
        }

        let now = self.clock.now();
        let outcome = match self.state.start_time.filter(|_| self.state.is_fasting) {
            Some(previous) => {
                tracing::warn!(
                    "Starting a new fast over one running since {}; the old fast is not archived",
                    previous
                );
                StartOutcome::Restarted {
                    discarded_start: previous,
                }
            }
            None => StartOutcome::Started,
        };

        self.state.is_fasting = true;
        self.state.start_time = Some(now);
        self.state.target_hours = target_hours;
        tracing::info!("Started {}h fast at {}", target_hours, now);

        self.flush();
        Ok(outcome)
    }

    /// Move the start of the running fast; no validation happens until stop
    ///
    /// Returns false when there is no running fast to correct.
    pub fn update_start_time(&mut self, new_start: DateTime<Utc>) -> bool {
        if !self.state.is_fasting {
            tracing::debug!("Ignoring start correction: not fasting");
            return false;
        }
        if new_start > self.clock.now() {
            tracing::warn!("Fast start moved into the future: {}", new_start);
        }
        self.state.start_time = Some(new_start);
        tracing::info!("Corrected fast start to {}", new_start);
        self.flush();
        true
    }

    /// End the running fast at `custom_end` (or now) and archive it
    pub fn stop_fasting(&mut self, custom_end: Option<DateTime<Utc>>) -> StopOutcome {
        let Some(start) = self.state.start_time else {
            if self.state.is_fasting {
                self.state.is_fasting = false;
                self.flush();
            }
            return StopOutcome::NotFasting;
        };

        let end = custom_end.unwrap_or_else(|| self.clock.now());
        let Some(session) =
            FastingSession::new(Uuid::now_v7(), start, end, self.state.target_hours)
        else {
            tracing::warn!("Rejected stop: end {} precedes start {}", end, start);
            return StopOutcome::Rejected { start, end };
        };

        tracing::info!(
            "Archived fast {} ({}h of {}h)",
            session.id,
            session.actual_hours,
            session.target_hours
        );
        self.state.history.insert(0, session.clone());
        self.state.is_fasting = false;
        self.state.start_time = None;

        self.flush();
        StopOutcome::Archived(session)
    }

    /// Remove an archived session; returns false if the id is unknown
    pub fn delete_session(&mut self, id: Uuid) -> bool {
        let before = self.state.history.len();
        self.state.history.retain(|s| s.id != id);
        if self.state.history.len() == before {
            tracing::debug!("No session {} to delete", id);
            return false;
        }
        tracing::info!("Deleted session {}", id);
        self.flush();
        true
    }

    pub fn set_breathing_level(&mut self, level: usize) -> Result<()> {
        if crate::breathing::level(level).is_none() {
            return Err(Error::Breathing(format!(
                "level {} does not exist (0..={})",
                level,
                crate::breathing::LEVELS.len() - 1
            )));
        }
        self.state.breathing_level = level;
        self.flush();
        Ok(())
    }

    pub fn set_tab(&mut self, tab: AppTab) {
        self.state.current_tab = tab;
        self.flush();
    }

    fn flush(&mut self) {
        if let Err(e) = self.sink.save(&self.state) {
            tracing::warn!("Failed to persist state: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{from_epoch_ms, ManualClock};
    use chrono::Duration;

    const HOUR: i64 = 3_600_000;

    fn store(clock: &ManualClock) -> SessionStore<&ManualClock, MemorySink> {
        crate::logging::init_test();
        SessionStore::new(AppState::default(), clock, MemorySink::default())
    }

    fn archive(store: &mut SessionStore<&ManualClock, MemorySink>, hours: i64) -> FastingSession {
        store.start_fasting(16.0).unwrap();
        let end = store.now() + Duration::hours(hours);
        match store.stop_fasting(Some(end)) {
            StopOutcome::Archived(session) => session,
            other => panic!("expected archive, got {:?}", other),
        }
    }

    struct FailingSink;

    impl StateSink for FailingSink {
        fn save(&mut self, _state: &AppState) -> Result<()> {
            Err(Error::State("disk full".into()))
        }
    }

    #[test]
    fn test_start_sets_active_fields() {
        let clock = ManualClock::at_epoch();
        clock.advance(Duration::minutes(5));
        let mut store = store(&clock);

        assert_eq!(store.start_fasting(18.0).unwrap(), StartOutcome::Started);

        let state = store.state();
        assert!(state.is_fasting);
        assert_eq!(state.start_time, from_epoch_ms(300_000));
        assert_eq!(state.target_hours, 18.0);
        assert_eq!(store.sink().saved.len(), 1);
    }

    #[test]
    fn test_out_of_range_target_is_refused() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);
        archive(&mut store, 2);
        let before = store.state().clone();
        let saves = store.sink().saved.len();

        for bad in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN, 1e10, 0.0, -1.0] {
            let err = store.start_fasting(bad).unwrap_err();
            assert!(matches!(err, Error::InvalidTarget(_)), "target {}", bad);
        }

        assert_eq!(store.state(), &before);
        assert_eq!(store.sink().saved.len(), saves);
        assert!(store.snapshot().expected_end.is_none());
    }

    #[test]
    fn test_refused_target_keeps_running_fast() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        store.start_fasting(16.0).unwrap();
        assert!(store.start_fasting(f64::INFINITY).is_err());

        assert!(store.is_fasting());
        assert_eq!(store.state().target_hours, 16.0);
        assert_eq!(store.snapshot().expected_end, from_epoch_ms(16 * HOUR));
    }

    #[test]
    fn test_history_survives_reload_after_refused_target() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = crate::state::state_path(temp_dir.path());
        let clock = ManualClock::at_epoch();

        let mut store =
            SessionStore::new(AppState::default(), &clock, JsonFileSink::new(&path));
        store.start_fasting(16.0).unwrap();
        store.stop_fasting(from_epoch_ms(2 * HOUR));
        assert!(store.start_fasting(f64::INFINITY).is_err());
        assert!(store.start_fasting(1e10).is_err());

        let reloaded = AppState::load(&path).unwrap();
        assert_eq!(reloaded.history.len(), 1);
        assert_eq!(reloaded.history[0].actual_hours, 2.0);
        assert_eq!(reloaded.target_hours, 16.0);
    }

    #[test]
    fn test_sixteen_hour_scenario() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        store.start_fasting(16.0).unwrap();
        let outcome = store.stop_fasting(from_epoch_ms(16 * HOUR));

        let StopOutcome::Archived(session) = outcome else {
            panic!("stop should archive");
        };
        assert_eq!(session.target_hours, 16.0);
        assert_eq!(session.actual_hours, 16.0);
        assert_eq!(store.history(), &[session]);
        assert!(!store.is_fasting());
        assert!(store.state().start_time.is_none());
    }

    #[test]
    fn test_stop_uses_clock_when_no_end_given() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        store.start_fasting(16.0).unwrap();
        clock.advance(Duration::minutes(90));

        let StopOutcome::Archived(session) = store.stop_fasting(None) else {
            panic!("stop should archive");
        };
        assert_eq!(session.actual_hours, 1.5);
        assert_eq!(session.end_time, clock.now());
    }

    #[test]
    fn test_stop_rounds_to_two_decimals() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        for (end_ms, expected) in [(1, 0.0), (20_000, 0.01), (12_345_678, 3.43), (HOUR, 1.0)] {
            store.start_fasting(16.0).unwrap();
            let before = store.history().len();
            let StopOutcome::Archived(session) = store.stop_fasting(from_epoch_ms(end_ms)) else {
                panic!("stop should archive");
            };
            assert_eq!(session.actual_hours, expected, "end at {}ms", end_ms);
            assert_eq!(store.history().len(), before + 1);
        }
    }

    #[test]
    fn test_rejected_stop_leaves_state_untouched() {
        let clock = ManualClock::at_epoch();
        clock.advance(Duration::hours(10));
        let mut store = store(&clock);
        archive(&mut store, 1);

        store.start_fasting(16.0).unwrap();
        let before = store.state().clone();
        let saves = store.sink().saved.len();

        let end = clock.now() - Duration::minutes(1);
        let outcome = store.stop_fasting(Some(end));

        assert_eq!(
            outcome,
            StopOutcome::Rejected {
                start: clock.now(),
                end
            }
        );
        assert_eq!(store.state(), &before);
        assert_eq!(store.sink().saved.len(), saves);
    }

    #[test]
    fn test_future_start_correction_rejected_at_stop() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        store.start_fasting(16.0).unwrap();
        let future = clock.now() + Duration::hours(2);
        assert!(store.update_start_time(future));
        assert_eq!(store.state().start_time, Some(future));
        assert!(store.snapshot().is_preparing());

        let outcome = store.stop_fasting(None);
        assert!(matches!(outcome, StopOutcome::Rejected { .. }));
        assert!(store.is_fasting());
        assert!(store.history().is_empty());
    }

    #[test]
    fn test_earlier_start_correction_extends_fast() {
        let clock = ManualClock::at_epoch();
        clock.advance(Duration::hours(3));
        let mut store = store(&clock);

        store.start_fasting(16.0).unwrap();
        store.update_start_time(from_epoch_ms(0).unwrap());

        let StopOutcome::Archived(session) = store.stop_fasting(None) else {
            panic!("stop should archive");
        };
        assert_eq!(session.actual_hours, 3.0);
    }

    #[test]
    fn test_correction_without_fast_is_ignored() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        assert!(!store.update_start_time(clock.now()));
        assert!(store.state().start_time.is_none());
        assert!(store.sink().saved.is_empty());
    }

    #[test]
    fn test_stop_without_fast_is_noop() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        assert_eq!(store.stop_fasting(None), StopOutcome::NotFasting);
        assert!(store.history().is_empty());
        assert!(!store.is_fasting());
    }

    #[test]
    fn test_stop_clears_orphaned_flag() {
        let clock = ManualClock::at_epoch();
        let state = AppState {
            is_fasting: true,
            start_time: None,
            ..AppState::default()
        };
        let mut store = SessionStore::new(state, &clock, MemorySink::default());

        assert_eq!(store.stop_fasting(None), StopOutcome::NotFasting);
        assert!(!store.is_fasting());
        assert_eq!(store.sink().saved.len(), 1);
    }

    #[test]
    fn test_restart_discards_running_fast() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        store.start_fasting(16.0).unwrap();
        let first_start = clock.now();
        clock.advance(Duration::hours(5));

        let outcome = store.start_fasting(24.0).unwrap();

        assert_eq!(
            outcome,
            StartOutcome::Restarted {
                discarded_start: first_start
            }
        );
        assert!(store.history().is_empty());
        assert_eq!(store.state().start_time, Some(clock.now()));
        assert_eq!(store.state().target_hours, 24.0);
    }

    #[test]
    fn test_history_is_most_recent_first() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        let first = archive(&mut store, 1);
        clock.advance(Duration::hours(2));
        let second = archive(&mut store, 2);

        assert_eq!(store.history()[0].id, second.id);
        assert_eq!(store.history()[1].id, first.id);
    }

    #[test]
    fn test_ids_are_unique_for_rapid_stops() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        for _ in 0..50 {
            archive(&mut store, 0);
        }
        let mut ids: Vec<_> = store.history().iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn test_delete_removes_only_match() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        let a = archive(&mut store, 1);
        let b = archive(&mut store, 2);
        let c = archive(&mut store, 3);

        assert_eq!(store.find_session(b.id), Some(&b));
        assert!(store.delete_session(b.id));
        assert!(store.find_session(b.id).is_none());
        assert_eq!(store.find_session(a.id), Some(&a));

        let ids: Vec<_> = store.history().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![c.id, a.id]);
    }

    #[test]
    fn test_delete_unknown_id_changes_nothing() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);
        archive(&mut store, 1);

        let before = store.state().clone();
        let saves = store.sink().saved.len();

        assert!(!store.delete_session(Uuid::now_v7()));
        assert_eq!(store.state(), &before);
        assert_eq!(store.sink().saved.len(), saves);
    }

    #[test]
    fn test_breathing_level_bounds() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        store.set_breathing_level(12).unwrap();
        assert_eq!(store.state().breathing_level, 12);

        assert!(store.set_breathing_level(13).is_err());
        assert_eq!(store.state().breathing_level, 12);
    }

    #[test]
    fn test_tab_is_persisted() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        store.set_tab(AppTab::Breathing);
        assert_eq!(
            store.sink().last().unwrap().current_tab,
            AppTab::Breathing
        );
    }

    #[test]
    fn test_every_mutation_flushes() {
        let clock = ManualClock::at_epoch();
        let mut store = store(&clock);

        store.start_fasting(16.0).unwrap();
        store.update_start_time(clock.now());
        let session = archive(&mut store, 1);
        store.delete_session(session.id);

        let last = store.sink().last().unwrap();
        assert_eq!(last, store.state());
        assert!(last.history.is_empty());
    }

    #[test]
    fn test_flush_failure_keeps_mutation() {
        let clock = ManualClock::at_epoch();
        let mut store = SessionStore::new(AppState::default(), &clock, FailingSink);

        store.start_fasting(16.0).unwrap();
        assert!(store.is_fasting());
    }

    #[test]
    fn test_json_file_sink_persists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = crate::state::state_path(temp_dir.path());
        let clock = ManualClock::at_epoch();

        let mut store =
            SessionStore::new(AppState::default(), &clock, JsonFileSink::new(&path));
        store.start_fasting(20.0).unwrap();

        let loaded = AppState::load(&path).unwrap();
        assert!(loaded.is_fasting);
        assert_eq!(loaded.target_hours, 20.0);
        assert_eq!(store.sink().path(), path.as_path());
    }
}
