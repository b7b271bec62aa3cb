//! Built-in fasting content: physiological phases and target presets.
//!
//! Pure data. Phases are ordered by `hours_start` and contiguous; the last
//! phase is open-ended.

use once_cell::sync::Lazy;
use serde::Serialize;

/// A named stage of a fast, keyed by elapsed-hour range
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct FastingPhase {
    pub id: String,
    pub name: String,
    pub hours_start: f64,
    /// `None` means unbounded
    pub hours_end: Option<f64>,
    pub summary: String,
    pub description: String,
    pub tips: Vec<String>,
    pub warnings: Vec<String>,
}

impl FastingPhase {
    pub fn contains_hour(&self, hour: f64) -> bool {
        hour >= self.hours_start && self.hours_end.map_or(true, |end| hour < end)
    }
}

/// A target offered when starting a fast
#[derive(Clone, Copy, Debug, Serialize, PartialEq)]
pub struct FastingPreset {
    pub hours: f64,
    pub label: &'static str,
}

pub const PRESETS: [FastingPreset; 8] = [
    FastingPreset { hours: 13.0, label: "Gentle" },
    FastingPreset { hours: 16.0, label: "Classic 16:8" },
    FastingPreset { hours: 18.0, label: "Lean 18:6" },
    FastingPreset { hours: 20.0, label: "Warrior 20:4" },
    FastingPreset { hours: 24.0, label: "One meal a day" },
    FastingPreset { hours: 36.0, label: "Monk fast" },
    FastingPreset { hours: 48.0, label: "Two days" },
    FastingPreset { hours: 72.0, label: "Three days" },
];

/// Cached phase table, built once
static PHASES: Lazy<Vec<FastingPhase>> = Lazy::new(build_phases);

/// The ordered phase table
pub fn phases() -> &'static [FastingPhase] {
    &PHASES
}

pub fn find_phase(id: &str) -> Option<&'static FastingPhase> {
    phases().iter().find(|p| p.id == id)
}

fn phase(
    id: &str,
    name: &str,
    hours: (f64, Option<f64>),
    summary: &str,
    description: &str,
    tips: &[&str],
    warnings: &[&str],
) -> FastingPhase {
    FastingPhase {
        id: id.into(),
        name: name.into(),
        hours_start: hours.0,
        hours_end: hours.1,
        summary: summary.into(),
        description: description.into(),
        tips: tips.iter().map(|s| s.to_string()).collect(),
        warnings: warnings.iter().map(|s| s.to_string()).collect(),
    }
}

fn build_phases() -> Vec<FastingPhase> {
    vec![
        phase(
            "digestion",
            "Digestion",
            (0.0, Some(4.0)),
            "Blood sugar rises and insulin handles the last meal.",
            "The body is still absorbing nutrients. Insulin is elevated and \
             excess glucose is stored as glycogen in the liver and muscles.",
            &["Drink water", "Avoid snacking to let insulin settle"],
            &[],
        ),
        phase(
            "glycogen",
            "Glycogen use",
            (4.0, Some(12.0)),
            "Insulin drops and liver glycogen becomes the main fuel.",
            "With digestion finished, insulin falls and glucagon rises. The \
             liver releases stored glycogen to keep blood sugar stable.",
            &["Herbal tea or black coffee are fine", "Light walking helps"],
            &[],
        ),
        phase(
            "metabolic_switch",
            "Metabolic switch",
            (12.0, Some(18.0)),
            "Glycogen runs low and fat oxidation ramps up.",
            "Liver glycogen is largely spent. The body increases lipolysis and \
             the first ketone bodies appear in the blood.",
            &["Keep electrolytes in mind", "Hunger waves pass within minutes"],
            &["Dizziness when standing up quickly is common"],
        ),
        phase(
            "fat_burning",
            "Fat burning",
            (18.0, Some(24.0)),
            "Ketosis deepens and fat becomes the dominant fuel.",
            "Ketone levels keep climbing. Many people report clearer focus as \
             the brain starts using ketones alongside glucose.",
            &["Add a pinch of salt to water", "Keep physical load moderate"],
            &["Stop if you feel faint or your heart races"],
        ),
        phase(
            "autophagy",
            "Autophagy",
            (24.0, Some(48.0)),
            "Cells recycle damaged components.",
            "Autophagy markers rise noticeably. Insulin sits at its lowest and \
             the body relies on fat and ketones almost entirely.",
            &["Rest more than usual", "Sodium, potassium and magnesium matter now"],
            &[
                "Not advised during pregnancy or with diabetes medication",
                "Break the fast if you feel unwell",
            ],
        ),
        phase(
            "growth_hormone",
            "Growth hormone peak",
            (48.0, Some(72.0)),
            "Growth hormone surges to protect muscle.",
            "Growth hormone secretion climbs sharply, preserving lean tissue \
             while fat stores cover energy needs.",
            &["Plan a gentle refeed", "Avoid intense training"],
            &["Extended fasting should be supervised by a physician"],
        ),
        phase(
            "immune_reset",
            "Immune reset",
            (72.0, None),
            "Old immune cells are cleared and stem cells activate.",
            "Prolonged fasting triggers turnover of white blood cells. Refeeding \
             afterwards drives regeneration.",
            &["Refeed slowly with light, easily digested food"],
            &[
                "Refeeding syndrome risk: break the fast carefully",
                "Extended fasting should be supervised by a physician",
            ],
        ),
    ]
}

/// Check the phase table is ordered, contiguous and ends open
pub fn validate(phases: &[FastingPhase]) -> Vec<String> {
    let mut errors = Vec::new();

    if phases.is_empty() {
        errors.push("Phase table is empty".to_string());
        return errors;
    }

    for (i, phase) in phases.iter().enumerate() {
        if phase.id.is_empty() {
            errors.push(format!("Phase #{} has empty ID", i));
        }
        if phase.name.is_empty() {
            errors.push(format!("Phase '{}' has empty name", phase.id));
        }
        if let Some(end) = phase.hours_end {
            if end <= phase.hours_start {
                errors.push(format!(
                    "Phase '{}' ends at {}h before it starts at {}h",
                    phase.id, end, phase.hours_start
                ));
            }
        }

        match (phase.hours_end, phases.get(i + 1)) {
            (Some(end), Some(next)) if end != next.hours_start => errors.push(format!(
                "Phase '{}' ends at {}h but '{}' starts at {}h",
                phase.id, end, next.id, next.hours_start
            )),
            (None, Some(next)) => errors.push(format!(
                "Phase '{}' is unbounded but is followed by '{}'",
                phase.id, next.id
            )),
            (Some(_), None) => {
                errors.push(format!("Last phase '{}' must be unbounded", phase.id))
            }
            _ => {}
        }
    }

    errors
}
