//! The Librarian: library-context override.
//!
//! Appears with a high fixed probability in library-zoned locations. It is
//! the only character allowed to displace the Reaper, and only there.

use rand::Rng;

use super::{OverrideDecision, OverrideInput, OverrideKind, clamp_probability};
use crate::config::LibrarianConfig;
use crate::state::{LibrarianCounters, OccupantKind};
use crate::zone::Zone;

/// Whether the Librarian may push out the current holder of a location.
#[must_use]
pub fn may_displace(holder: OccupantKind, zone: Zone) -> bool {
    match holder {
        OccupantKind::Ambient => true,
        OccupantKind::Override(OverrideKind::Reaper) => zone == Zone::Library,
        OccupantKind::Override(OverrideKind::Librarian) => false,
    }
}

/// Evaluate whether the Librarian appears. `stronger_spawned` is true when
/// the Reaper spawned during this same entry.
pub fn evaluate<R: Rng + ?Sized>(
    config: &LibrarianConfig,
    input: &OverrideInput<'_>,
    counters: &LibrarianCounters,
    stronger_spawned: bool,
    rng: &mut R,
) -> OverrideDecision {
    if input.zone != Zone::Library {
        return OverrideDecision::refuse("not a library");
    }
    if stronger_spawned {
        return OverrideDecision::refuse("stronger override spawned");
    }
    if counters.active_at.is_some() {
        return OverrideDecision::refuse("already active");
    }
    if let Some(occ) = input.occupant {
        if !may_displace(occ.kind, input.zone) {
            return OverrideDecision::refuse("holder cannot be displaced");
        }
    }

    let probability = clamp_probability(config.probability);
    let should_spawn = rng.gen_bool(probability);
    OverrideDecision {
        should_spawn,
        probability,
        reason: if should_spawn { "draw succeeded" } else { "draw failed" },
    }
}
