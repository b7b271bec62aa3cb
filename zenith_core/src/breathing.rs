//! Guided breathing: the level table and the cycle engine.
//!
//! ## Cycle
//!
//! ```text
//! Idle --start--> Inhale --inhale s--> Hold --hold s--> Exhale --exhale s--> Inhale ...
//!   ^                                                                          |
//!   +------------------------------- stop (any state) -------------------------+
//! ```
//!
//! The engine owns two timers in a [`TimerQueue`]: a one-shot timer for the
//! end of the current phase and a repeating one-second countdown. Both are
//! re-armed on every phase entry and both are cancelled by [`BreathingEngine::stop`].
//! Nothing runs in the background; the host calls [`BreathingEngine::advance`]
//! with the current time, typically after sleeping until
//! [`BreathingEngine::next_deadline`].

use crate::timer::{TimerHandle, TimerQueue};
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Durations, in seconds, of one breathing pattern
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct BreathingLevel {
    pub inhale: u32,
    pub hold: u32,
    pub exhale: u32,
    pub label: &'static str,
}

impl BreathingLevel {
    pub fn duration_secs(&self, phase: BreathPhase) -> u32 {
        match phase {
            BreathPhase::Idle => 0,
            BreathPhase::Inhale => self.inhale,
            BreathPhase::Hold => self.hold,
            BreathPhase::Exhale => self.exhale,
        }
    }

    pub fn cycle_secs(&self) -> u32 {
        self.inhale + self.hold + self.exhale
    }
}

const fn lvl(inhale: u32, hold: u32, exhale: u32, label: &'static str) -> BreathingLevel {
    BreathingLevel {
        inhale,
        hold,
        exhale,
        label,
    }
}

/// Difficulty levels, easiest first. Each keeps the 1:4:2 ratio.
pub const LEVELS: [BreathingLevel; 13] = [
    lvl(4, 16, 8, "Novice"),
    lvl(5, 20, 10, "Foundation"),
    lvl(6, 24, 12, "Student"),
    lvl(7, 28, 14, "Practitioner"),
    lvl(8, 32, 16, "Advanced"),
    lvl(9, 36, 18, "Adept"),
    lvl(10, 40, 20, "Master"),
    lvl(12, 48, 24, "Yogi"),
    lvl(13, 52, 26, "Guru"),
    lvl(15, 60, 30, "Sage"),
    lvl(20, 80, 40, "Titan"),
    lvl(24, 96, 48, "Absolute"),
    lvl(36, 144, 72, "Zenith"),
];

pub fn level(index: usize) -> Option<&'static BreathingLevel> {
    LEVELS.get(index)
}

/// Where in the cycle the engine is
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BreathPhase {
    #[default]
    Idle,
    Inhale,
    Hold,
    Exhale,
}

/// Character of the bell struck on phase entry
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToneIntensity {
    Soft,
    Bright,
    Deep,
}

/// Tone descriptor for a phase entry; synthesis is up to the host
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct ToneCue {
    pub frequency_hz: f64,
    pub intensity: ToneIntensity,
}

impl BreathPhase {
    /// Phase that follows this one in a running cycle
    pub fn next(self) -> BreathPhase {
        match self {
            BreathPhase::Idle => BreathPhase::Inhale,
            BreathPhase::Inhale => BreathPhase::Hold,
            BreathPhase::Hold => BreathPhase::Exhale,
            BreathPhase::Exhale => BreathPhase::Inhale,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BreathPhase::Idle => "Prana",
            BreathPhase::Inhale => "Inhale",
            BreathPhase::Hold => "Hold",
            BreathPhase::Exhale => "Exhale",
        }
    }

    pub fn cue(self) -> Option<ToneCue> {
        let (frequency_hz, intensity) = match self {
            BreathPhase::Idle => return None,
            BreathPhase::Inhale => (659.25, ToneIntensity::Bright),
            BreathPhase::Hold => (220.00, ToneIntensity::Deep),
            BreathPhase::Exhale => (329.63, ToneIntensity::Soft),
        };
        Some(ToneCue {
            frequency_hz,
            intensity,
        })
    }
}

/// Something the host should render
#[derive(Clone, Debug, PartialEq)]
pub enum BreathEvent {
    PhaseChanged {
        phase: BreathPhase,
        duration_secs: u32,
        at: DateTime<Utc>,
    },
    Tick {
        remaining_secs: u32,
        at: DateTime<Utc>,
    },
    CycleCompleted {
        cycles: u64,
        at: DateTime<Utc>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TimerKind {
    PhaseEnd,
    Countdown,
}

/// Drives the inhale/hold/exhale cycle for one user
#[derive(Debug)]
pub struct BreathingEngine {
    selected: usize,
    /// Pattern in force for the current run; `None` while idle
    pattern: Option<BreathingLevel>,
    phase: BreathPhase,
    remaining_secs: u32,
    cycles: u64,
    timers: TimerQueue<TimerKind>,
    phase_timer: Option<TimerHandle>,
    countdown_timer: Option<TimerHandle>,
}

impl BreathingEngine {
    pub fn new(level_index: usize) -> Result<Self> {
        check_level(level_index)?;
        Ok(Self {
            selected: level_index,
            pattern: None,
            phase: BreathPhase::Idle,
            remaining_secs: 0,
            cycles: 0,
            timers: TimerQueue::new(),
            phase_timer: None,
            countdown_timer: None,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn selected_level(&self) -> usize {
        self.selected
    }

    /// Pattern in force: the latched one while running, else the selection
    pub fn pattern(&self) -> BreathingLevel {
        self.pattern.unwrap_or(LEVELS[self.selected])
    }

    pub fn phase(&self) -> BreathPhase {
        self.phase
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn is_active(&self) -> bool {
        self.phase != BreathPhase::Idle
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Change the selected level; refused while a cycle is running
    pub fn set_level(&mut self, level_index: usize) -> Result<()> {
        if self.is_active() {
            return Err(Error::Breathing(
                "level cannot change while breathing is active".into(),
            ));
        }
        check_level(level_index)?;
        self.selected = level_index;
        Ok(())
    }

    /// Begin a new run at inhale, cancelling anything still pending
    pub fn start(&mut self, now: DateTime<Utc>) -> Vec<BreathEvent> {
        if self.is_active() {
            tracing::debug!("Restarting active breathing run");
        }
        self.cancel_timers();

        let pattern = LEVELS[self.selected];
        tracing::info!(
            "Starting breathing at level {} ({}/{}/{})",
            self.selected,
            pattern.inhale,
            pattern.hold,
            pattern.exhale
        );
        self.pattern = Some(pattern);
        self.cycles = 0;
        vec![self.enter(BreathPhase::Inhale, now)]
    }

    /// Halt immediately: cancel both timers and zero the countdown
    pub fn stop(&mut self) {
        self.cancel_timers();
        if self.is_active() {
            tracing::info!("Stopped breathing after {} cycles", self.cycles);
        }
        self.phase = BreathPhase::Idle;
        self.remaining_secs = 0;
        self.pattern = None;
    }

    /// Fire every timer due at or before `now`, in deadline order
    pub fn advance(&mut self, now: DateTime<Utc>) -> Vec<BreathEvent> {
        let mut events = Vec::new();

        while let Some(fired) = self.timers.pop_due(now) {
            match fired.payload {
                TimerKind::Countdown if self.countdown_timer == Some(fired.handle) => {
                    self.remaining_secs = self.remaining_secs.saturating_sub(1);
                    events.push(BreathEvent::Tick {
                        remaining_secs: self.remaining_secs,
                        at: fired.due,
                    });
                }
                TimerKind::PhaseEnd if self.phase_timer == Some(fired.handle) => {
                    self.phase_timer = None;
                    let next = self.phase.next();
                    if self.phase == BreathPhase::Exhale {
                        self.cycles += 1;
                        events.push(BreathEvent::CycleCompleted {
                            cycles: self.cycles,
                            at: fired.due,
                        });
                    }
                    // Boundaries are anchored to the deadline, not to `now`,
                    // so a late host does not stretch the pattern.
                    events.push(self.enter(next, fired.due));
                }
                _ => {
                    tracing::warn!("Dropping stale breathing timer {:?}", fired.handle);
                    self.timers.cancel(fired.handle);
                }
            }
        }

        events
    }

    fn enter(&mut self, phase: BreathPhase, at: DateTime<Utc>) -> BreathEvent {
        self.cancel_timers();

        let duration_secs = self.pattern().duration_secs(phase);
        self.phase = phase;
        self.remaining_secs = duration_secs;

        // Countdown first so its last tick lands before the transition
        self.countdown_timer = Some(self.timers.schedule_repeating(
            at + Duration::seconds(1),
            Duration::seconds(1),
            TimerKind::Countdown,
        ));
        self.phase_timer = Some(
            self.timers
                .schedule_once(at + Duration::seconds(duration_secs as i64), TimerKind::PhaseEnd),
        );

        tracing::debug!("Breathing phase {:?} for {}s", phase, duration_secs);
        BreathEvent::PhaseChanged {
            phase,
            duration_secs,
            at,
        }
    }

    fn cancel_timers(&mut self) {
        if let Some(handle) = self.phase_timer.take() {
            self.timers.cancel(handle);
        }
        if let Some(handle) = self.countdown_timer.take() {
            self.timers.cancel(handle);
        }
    }
}

fn check_level(level_index: usize) -> Result<()> {
    if level(level_index).is_none() {
        return Err(Error::Breathing(format!(
            "level {} does not exist (0..={})",
            level_index,
            LEVELS.len() - 1
        )));
    }
    Ok(())
}
