//! Special-Case Evaluators: bespoke spawn rules that outrank the general
//! evaluator.
//!
//! The set is closed: the Reaper (primary) and the Librarian (library
//! rooms). Both evaluators are pure. They read the state and return a
//! decision plus their updated private counters; the director commits.

pub mod librarian;
pub mod reaper;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::state::Occupant;
use crate::types::{LocationId, PlayerSnapshot};
use crate::zone::Zone;

/// The override characters, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideKind {
    /// Primary override.
    Reaper,
    /// Library-context override.
    Librarian,
}

impl fmt::Display for OverrideKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reaper => f.write_str("reaper"),
            Self::Librarian => f.write_str("librarian"),
        }
    }
}

/// Outcome of one override evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideDecision {
    /// Whether the character spawns now.
    pub should_spawn: bool,
    /// Probability the draw was made against (0 when no draw happened).
    pub probability: f64,
    /// Short explanation for logs and diagnostics.
    pub reason: &'static str,
}

impl OverrideDecision {
    pub(crate) fn refuse(reason: &'static str) -> Self {
        Self {
            should_spawn: false,
            probability: 0.0,
            reason,
        }
    }
}

/// What an override evaluator is given for one location entry.
#[derive(Debug, Clone, Copy)]
pub struct OverrideInput<'a> {
    /// Entered location.
    pub location: &'a LocationId,
    /// Its zone.
    pub zone: Zone,
    /// The player.
    pub player: &'a PlayerSnapshot,
    /// Transition counter for this entry.
    pub transition: u64,
    /// Current holder of the location, after departures ran.
    pub occupant: Option<&'a Occupant>,
}

pub(crate) fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() { 0.0 } else { p.clamp(0.0, 1.0) }
}
