//! Departure Sweeper rules: when an ambient occupant leaves on its own.
//!
//! Checked in order, first match wins:
//!
//! 1. resident longer than `max_stay_secs` → leaves;
//! 2. flat `departure_chance` roll (periodic sweeps only) → leaves;
//! 3. location zone not among its preferred zones → leaves unless a
//!    `stay_anyway_chance` roll succeeds.
//!
//! Override occupants and encounter participants are never swept.

use rand::Rng;
use serde::Serialize;

use crate::config::TimingConfig;
use crate::overrides::clamp_probability;
use crate::registry::CharacterDefinition;
use crate::state::Occupant;
use crate::types::{SimTime, secs};
use crate::zone::Zone;

/// Why an occupant left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DepartureReason {
    /// Stayed past the maximum.
    MaxStay,
    /// Lost the flat per-sweep roll.
    Wandered,
    /// Zone no longer suits it.
    ZoneMismatch,
}

/// Which parts of the check to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckMode {
    /// Periodic sweep: every rule.
    Sweep,
    /// On location entry: skips the flat roll.
    Entry,
}

/// Decide whether `occupant` leaves now.
///
/// `def` is `None` when the occupant's definition has vanished from the
/// registry; such an occupant always leaves.
pub fn check<R: Rng + ?Sized>(
    occupant: &Occupant,
    def: Option<&CharacterDefinition>,
    zone: Zone,
    now: SimTime,
    timing: &TimingConfig,
    mode: CheckMode,
    rng: &mut R,
) -> Option<DepartureReason> {
    let Some(def) = def else {
        return Some(DepartureReason::ZoneMismatch);
    };

    if now.saturating_since(occupant.since) > secs(timing.max_stay_secs) {
        return Some(DepartureReason::MaxStay);
    }
    if mode == CheckMode::Sweep && rng.gen_bool(clamp_probability(timing.departure_chance)) {
        return Some(DepartureReason::Wandered);
    }
    if !def.prefers(zone) && !rng.gen_bool(clamp_probability(timing.stay_anyway_chance)) {
        return Some(DepartureReason::ZoneMismatch);
    }
    None
}
