use chrono::{DateTime, Local, TimeDelta, Utc};
use clap::{Parser, Subcommand};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use zenith_core::format::{format_duration, format_hms, parse_timestamp};
use zenith_core::state::state_path;
use zenith_core::*;

#[derive(Parser)]
#[command(name = "zenith")]
#[command(about = "Fasting timer and guided breathing tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Fasting timer
    Fast {
        #[command(subcommand)]
        action: FastAction,
    },

    /// Run the guided breathing cycle
    Breathe {
        /// Level to use (also saved as the selected level)
        #[arg(long)]
        level: Option<usize>,

        /// Stop after this many full cycles
        #[arg(long)]
        cycles: Option<u64>,

        /// Stop after this many seconds
        #[arg(long)]
        seconds: Option<i64>,

        /// Run on a simulated clock without waiting
        #[arg(long)]
        simulate: bool,
    },

    /// Show or select the breathing level
    Level {
        /// Level to select
        level: Option<usize>,

        /// List all levels
        #[arg(long, conflicts_with = "level")]
        list: bool,
    },

    /// Archived fasts
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },

    /// Show or set the remembered screen (fasting, breathing, history)
    Tab { tab: Option<String> },
}

#[derive(Subcommand)]
enum FastAction {
    /// Start a fast now
    Start {
        /// Target length in hours
        #[arg(long)]
        target: Option<f64>,

        /// Replace a fast that is already running (it will not be archived)
        #[arg(long)]
        restart: bool,
    },

    /// End the running fast and archive it
    Stop {
        /// End time (RFC 3339, YYYY-MM-DDTHH:MM local, or epoch ms); default now
        #[arg(long)]
        at: Option<String>,
    },

    /// Correct when the running fast started
    Adjust {
        /// New start time (RFC 3339, YYYY-MM-DDTHH:MM local, or epoch ms)
        #[arg(long)]
        start: String,
    },

    /// Show elapsed time, phase and progress (default)
    Status,

    /// List the fasting phases
    Phases,

    /// List the target presets
    Presets,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List archived fasts, most recent first
    List {
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Totals and the recent daily chart
    Stats,

    /// Delete an archived fast by id
    Delete { id: String },

    /// Write the history to a CSV file
    Export { path: PathBuf },
}

type Store = SessionStore<SystemClock, JsonFileSink>;

fn main() -> Result<()> {
    zenith_core::logging::init_with_level("warn");

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());
    tracing::debug!("Using data directory {:?}", data_dir);
    let mut store = open_store(&data_dir, &config)?;

    match cli.command {
        Some(Commands::Fast { action }) => cmd_fast(&mut store, action, &config),
        Some(Commands::Breathe {
            level,
            cycles,
            seconds,
            simulate,
        }) => cmd_breathe(&mut store, level, cycles, seconds, simulate),
        Some(Commands::Level { level, list }) => cmd_level(&mut store, level, list),
        Some(Commands::History { action }) => cmd_history(&mut store, action, &config),
        Some(Commands::Tab { tab }) => cmd_tab(&mut store, tab),
        None => cmd_status(&store),
    }
}

fn open_store(data_dir: &Path, config: &Config) -> Result<Store> {
    let path = state_path(data_dir);
    let fallback = AppState {
        target_hours: config.fasting.default_target_hours,
        breathing_level: config.breathing.default_level,
        ..AppState::default()
    };
    let state = AppState::load_or(&path, fallback)?;
    Ok(SessionStore::new(state, SystemClock, JsonFileSink::new(path)))
}

fn local(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

// ============================================================================
// Fasting
// ============================================================================

fn cmd_fast(store: &mut Store, action: FastAction, config: &Config) -> Result<()> {
    match action {
        FastAction::Start { target, restart } => {
            let target = target.unwrap_or(config.fasting.default_target_hours);
            if !is_valid_target(target) {
                return Err(Error::InvalidTarget(target));
            }

            if store.is_fasting() && !restart {
                let snapshot = store.snapshot();
                eprintln!(
                    "Already fasting for {}. Use --restart to discard it and start over.",
                    format_duration(snapshot.elapsed_ms)
                );
                return Err(Error::State("fast already running".into()));
            }

            if let StartOutcome::Restarted { discarded_start } = store.start_fasting(target)? {
                println!(
                    "Discarded the fast started at {} (not archived).",
                    local(discarded_start)
                );
            }
            let snapshot = store.snapshot();
            println!("✓ Fast started: target {}h", target);
            if let Some(end) = snapshot.expected_end {
                println!("  Finish: {}", local(end));
            }
            Ok(())
        }

        FastAction::Stop { at } => {
            let end = at.map(|s| parse_timestamp(&s, &Local)).transpose()?;
            match store.stop_fasting(end) {
                StopOutcome::Archived(session) => {
                    println!(
                        "✓ Fast archived: {:.2}h of {}h target",
                        session.actual_hours, session.target_hours
                    );
                    println!("  {} → {}", local(session.start_time), local(session.end_time));
                    println!("  id: {}", session.id);
                    Ok(())
                }
                StopOutcome::NotFasting => {
                    println!("Not fasting - nothing to stop.");
                    Ok(())
                }
                StopOutcome::Rejected { start, end } => {
                    eprintln!(
                        "End time {} is before the start {}; the fast is still running.",
                        local(end),
                        local(start)
                    );
                    Err(Error::InvalidTime("end precedes start".into()))
                }
            }
        }

        FastAction::Adjust { start } => {
            let new_start = parse_timestamp(&start, &Local)?;
            if store.update_start_time(new_start) {
                println!("✓ Start moved to {}", local(new_start));
                if new_start > store.now() {
                    println!("  Note: this is in the future; stopping before then will be refused.");
                }
            } else {
                println!("Not fasting - nothing to adjust.");
            }
            Ok(())
        }

        FastAction::Status => cmd_status(store),

        FastAction::Phases => {
            let snapshot = store.snapshot();
            for phase in phases() {
                let marker = match snapshot.phase {
                    Some(current) if current.id == phase.id => "▶",
                    _ => " ",
                };
                let end = phase
                    .hours_end
                    .map(|h| format!("{}h", h))
                    .unwrap_or_else(|| "∞".into());
                println!("{} {:>3}h - {:<4} {}", marker, phase.hours_start, end, phase.name);
                println!("        {}", phase.summary);
                for warning in &phase.warnings {
                    println!("        ⚠ {}", warning);
                }
            }
            Ok(())
        }

        FastAction::Presets => {
            for preset in PRESETS.iter() {
                println!("  {:>3}h  {}", preset.hours, preset.label);
            }
            Ok(())
        }
    }
}

fn cmd_status(store: &Store) -> Result<()> {
    let snapshot = store.snapshot();

    if !snapshot.is_fasting {
        println!("Not fasting.");
        if let Some(last) = store.history().first() {
            println!("  Last fast: {:.2}h ({})", last.actual_hours, local(last.end_time));
        }
        println!("  Breathing level: {}", store.state().breathing_level);
        return Ok(());
    }

    println!("\n╭─────────────────────────────────────────╮");
    println!("│  FASTING {}", format_hms(snapshot.elapsed_ms));
    println!("╰─────────────────────────────────────────╯");
    println!();

    match snapshot.phase {
        Some(phase) => {
            println!("  Phase: {}", phase.name);
            println!("  {}", phase.summary);
            for tip in &phase.tips {
                println!("  → {}", tip);
            }
            for warning in &phase.warnings {
                println!("  ⚠ {}", warning);
            }
        }
        None => println!("  Phase: Preparation (start is in the future)"),
    }

    if let (Some(next), Some(ms)) = (snapshot.next_phase, snapshot.time_to_next_phase_ms) {
        println!("  Next: {} in {}", next.name, format_duration(ms));
    }

    println!();
    println!(
        "  Progress: {:.1}% of {}h",
        snapshot.progress_percent, snapshot.target_hours
    );
    if let Some(end) = snapshot.expected_end {
        println!("  Finish: {}", local(end));
    }
    println!();
    Ok(())
}

// ============================================================================
// Breathing
// ============================================================================

fn cmd_breathe(
    store: &mut Store,
    level: Option<usize>,
    cycles: Option<u64>,
    seconds: Option<i64>,
    simulate: bool,
) -> Result<()> {
    if let Some(level) = level {
        store.set_breathing_level(level)?;
    }
    let mut engine = BreathingEngine::new(store.state().breathing_level)?;
    let pattern = engine.pattern();
    println!(
        "Level {} ({}): inhale {}s, hold {}s, exhale {}s",
        engine.selected_level(),
        pattern.label,
        pattern.inhale,
        pattern.hold,
        pattern.exhale
    );

    // Without any limit a simulation would never end
    let cycles = if simulate && cycles.is_none() && seconds.is_none() {
        Some(1)
    } else {
        cycles
    };

    if simulate {
        let clock = ManualClock::new(Utc::now());
        run_breathing(&mut engine, &clock, cycles, seconds, false, |at| clock.set(at))
    } else {
        let clock = SystemClock;
        run_breathing(&mut engine, &clock, cycles, seconds, true, |at| {
            if let Ok(wait) = (at - Utc::now()).to_std() {
                std::thread::sleep(wait);
            }
        })
    }
}

/// Drive the engine from a single loop: wait for the next deadline, advance
fn run_breathing<C: Clock>(
    engine: &mut BreathingEngine,
    clock: &C,
    max_cycles: Option<u64>,
    max_seconds: Option<i64>,
    show_ticks: bool,
    mut wait_until: impl FnMut(DateTime<Utc>),
) -> Result<()> {
    let started = clock.now();
    let limit = match max_seconds {
        Some(secs) => Some(
            TimeDelta::try_seconds(secs)
                .and_then(|d| started.checked_add_signed(d))
                .ok_or_else(|| Error::Other(format!("--seconds {} is out of range", secs)))?,
        ),
        None => None,
    };

    let mut events = engine.start(started);
    'run: loop {
        for event in events.drain(..) {
            match event {
                BreathEvent::PhaseChanged {
                    phase,
                    duration_secs,
                    at,
                } => {
                    if show_ticks {
                        println!();
                    }
                    let cue = phase
                        .cue()
                        .map(|c| format!(" ({:.2} Hz {:?})", c.frequency_hz, c.intensity))
                        .unwrap_or_default();
                    println!(
                        "[{}] {} {}s{}",
                        format_hms((at - started).num_milliseconds()),
                        phase.label(),
                        duration_secs,
                        cue
                    );
                }
                BreathEvent::Tick { remaining_secs, .. } => {
                    if show_ticks {
                        print!("\r  {:>3}s", remaining_secs);
                        io::stdout().flush()?;
                    }
                }
                BreathEvent::CycleCompleted { cycles, .. } => {
                    if show_ticks {
                        println!();
                    }
                    println!("Cycle {} complete", cycles);
                    if max_cycles.is_some_and(|max| cycles >= max) {
                        break 'run;
                    }
                }
            }
        }

        let Some(deadline) = engine.next_deadline() else {
            break;
        };
        if limit.is_some_and(|limit| deadline > limit) {
            break;
        }
        wait_until(deadline);
        events = engine.advance(clock.now());
    }

    let cycles = engine.cycles();
    engine.stop();
    println!("Stopped after {} cycle{}.", cycles, if cycles == 1 { "" } else { "s" });
    Ok(())
}

fn cmd_level(store: &mut Store, level: Option<usize>, list: bool) -> Result<()> {
    let selected = store.state().breathing_level;

    if list {
        for (i, lvl) in LEVELS.iter().enumerate() {
            let marker = if i == selected { "▶" } else { " " };
            println!(
                "{} {:>2}  {:<13} {:>3}s / {:>3}s / {:>3}s",
                marker, i, lvl.label, lvl.inhale, lvl.hold, lvl.exhale
            );
        }
        return Ok(());
    }

    match level {
        Some(level) => {
            store.set_breathing_level(level)?;
            println!("✓ Breathing level set to {} ({})", level, LEVELS[level].label);
        }
        None => {
            let lvl = &LEVELS[selected];
            println!(
                "Breathing level {} ({}): {}s / {}s / {}s",
                selected, lvl.label, lvl.inhale, lvl.hold, lvl.exhale
            );
        }
    }
    Ok(())
}

// ============================================================================
// History
// ============================================================================

fn cmd_history(store: &mut Store, action: HistoryAction, config: &Config) -> Result<()> {
    match action {
        HistoryAction::List { limit } => {
            let history = store.history();
            if history.is_empty() {
                println!("No fasts archived yet.");
                return Ok(());
            }
            for session in history.iter().take(limit.unwrap_or(usize::MAX)) {
                println!(
                    "{}  {}  {:>6.2}h / {}h  {}",
                    session.id,
                    local(session.end_time),
                    session.actual_hours,
                    session.target_hours,
                    EfficiencyTier::for_hours(session.actual_hours).label()
                );
            }
            Ok(())
        }

        HistoryAction::Stats => {
            let stats = HistoryStats::from_history(store.history());
            println!("Sessions: {}", stats.total_sessions);
            println!("Total hours: {:.0}", stats.total_hours);
            println!("Longest: {:.2}h", stats.longest_hours);
            println!("Average: {:.2}h", stats.average_hours);
            println!("Targets reached: {}", stats.targets_reached);
            println!();

            let today = Local::now().date_naive();
            let totals = daily_totals(
                store.history(),
                today,
                config.history.chart_days,
                config.history.chart_max_hours,
                &Local,
            );
            for day in totals {
                let width = (day.fill_percent / 10.0).round() as usize;
                println!(
                    "  {}  {:<10} {:.1}h",
                    day.date.format("%a %d"),
                    "█".repeat(width),
                    day.hours
                );
            }
            Ok(())
        }

        HistoryAction::Delete { id } => {
            let id = uuid::Uuid::parse_str(id.trim())
                .map_err(|e| Error::Other(format!("Invalid session id: {}", e)))?;
            let Some(session) = store.find_session(id).cloned() else {
                println!("No session with id {}", id);
                return Ok(());
            };
            store.delete_session(id);
            println!(
                "✓ Deleted session {} ({:.2}h ended {})",
                id,
                session.actual_hours,
                local(session.end_time)
            );
            Ok(())
        }

        HistoryAction::Export { path } => {
            let count = export_history_csv(store.history(), &path)?;
            println!("✓ Exported {} sessions to {}", count, path.display());
            Ok(())
        }
    }
}

fn cmd_tab(store: &mut Store, tab: Option<String>) -> Result<()> {
    match tab {
        Some(name) => {
            let tab: AppTab = name.parse()?;
            store.set_tab(tab);
            println!("✓ Current tab: {:?}", tab);
        }
        None => println!("Current tab: {:?}", store.state().current_tab),
    }
    Ok(())
}
