//! Scheduler State: occupancy table, cooldowns, transition counter and the
//! private counters of the override evaluators.
//!
//! Owned by a [`crate::Director`]; there are no process-wide singletons.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::clock::TaskId;
use crate::encounter::EncounterKind;
use crate::overrides::OverrideKind;
use crate::types::{CharacterId, EncounterId, LocationId, LocationMeta, SimTime};
use crate::zone::{self, Zone};

// ---------------------------------------------------------------------------
// Occupancy
// ---------------------------------------------------------------------------

/// How a character came to occupy a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupantKind {
    /// Placed by the general evaluator (or forced in as an ordinary character).
    Ambient,
    /// Placed by an override rule.
    Override(OverrideKind),
}

/// The character currently holding a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Occupant {
    /// Who.
    pub id: CharacterId,
    /// How it got here.
    pub kind: OccupantKind,
    /// Transition counter when it arrived.
    pub since_transition: u64,
    /// Simulated time when it arrived.
    pub since: SimTime,
}

impl Occupant {
    /// Whether an override rule placed this occupant.
    #[must_use]
    pub fn is_override(&self) -> bool {
        matches!(self.kind, OccupantKind::Override(_))
    }
}

/// A running encounter at a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveEncounter {
    /// Encounter run id.
    pub id: EncounterId,
    /// Classified type.
    pub kind: EncounterKind,
    /// Everyone involved, primary first.
    pub participants: Vec<CharacterId>,
    /// Kind of every participant, parallel to `participants`.
    #[serde(skip)]
    pub participant_kinds: Vec<OccupantKind>,
    /// When it started.
    pub started: SimTime,
    /// When its expiry task is due.
    pub expires: SimTime,
}

/// Per-location state. Created lazily, never deleted during a session.
#[derive(Debug, Clone, Serialize)]
pub struct LocationOccupancy {
    /// Current holder. During an encounter this is the primary participant.
    pub occupant: Option<Occupant>,
    /// Running encounter, if any.
    pub encounter: Option<ActiveEncounter>,
    /// Metadata from the most recent entry.
    pub meta: LocationMeta,
    /// Resolved zone of `meta`.
    pub zone: Zone,
    /// Timers that must die with the current occupant.
    #[serde(skip)]
    pub pending: Vec<TaskId>,
}

impl LocationOccupancy {
    fn new(location: &LocationId, meta: LocationMeta) -> Self {
        let zone = zone::resolve(location, &meta);
        Self {
            occupant: None,
            encounter: None,
            meta,
            zone,
            pending: Vec::new(),
        }
    }

    /// Everyone present: all participants during an encounter, otherwise the occupant.
    #[must_use]
    pub fn present(&self) -> Vec<CharacterId> {
        match (&self.encounter, &self.occupant) {
            (Some(enc), _) => enc.participants.clone(),
            (None, Some(occ)) => vec![occ.id.clone()],
            (None, None) => Vec::new(),
        }
    }

    /// Whether `character` is present here.
    #[must_use]
    pub fn hosts(&self, character: &CharacterId) -> bool {
        match (&self.encounter, &self.occupant) {
            (Some(enc), _) => enc.participants.contains(character),
            (None, Some(occ)) => occ.id == *character,
            (None, None) => false,
        }
    }

    /// Whether an encounter is running.
    #[must_use]
    pub fn in_encounter(&self) -> bool {
        self.encounter.is_some()
    }

    /// The override character holding this location, if any.
    #[must_use]
    pub fn override_holder(&self) -> Option<(&CharacterId, OverrideKind)> {
        self.occupant.as_ref().and_then(|occ| match occ.kind {
            OccupantKind::Override(kind) => Some((&occ.id, kind)),
            OccupantKind::Ambient => None,
        })
    }
}

/// All locations seen this session, keyed and iterated in id order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct OccupancyTable {
    locations: BTreeMap<LocationId, LocationOccupancy>,
}

impl OccupancyTable {
    /// Record for `location`, if it was ever entered.
    #[must_use]
    pub fn get(&self, location: &LocationId) -> Option<&LocationOccupancy> {
        self.locations.get(location)
    }

    /// Mutable record for `location`.
    pub fn get_mut(&mut self, location: &LocationId) -> Option<&mut LocationOccupancy> {
        self.locations.get_mut(location)
    }

    /// Create the record on first sight, or refresh its metadata and zone.
    pub fn touch(&mut self, location: &LocationId, meta: LocationMeta) -> &mut LocationOccupancy {
        let record = self
            .locations
            .entry(location.clone())
            .or_insert_with(|| LocationOccupancy::new(location, LocationMeta::default()));
        record.zone = zone::resolve(location, &meta);
        record.meta = meta;
        record
    }

    /// Where `character` currently is, if anywhere.
    #[must_use]
    pub fn location_of(&self, character: &CharacterId) -> Option<&LocationId> {
        self.locations
            .iter()
            .find(|(_, record)| record.hosts(character))
            .map(|(id, _)| id)
    }

    /// Everyone present at `location`.
    #[must_use]
    pub fn present_at(&self, location: &LocationId) -> Vec<CharacterId> {
        self.locations
            .get(location)
            .map(LocationOccupancy::present)
            .unwrap_or_default()
    }

    /// Iterate records in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&LocationId, &LocationOccupancy)> {
        self.locations.iter()
    }

    /// Location ids in order.
    #[must_use]
    pub fn ids(&self) -> Vec<LocationId> {
        self.locations.keys().cloned().collect()
    }
}

// ---------------------------------------------------------------------------
// Trigger windows
// ---------------------------------------------------------------------------

/// A probability boost that opens when a trigger is first seen and stays
/// open for a fixed number of transitions.
///
/// The window cannot re-open until the trigger has been seen cleared, and
/// it closes immediately when the trigger clears.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TriggerWindow {
    /// Transition at which the window opened.
    pub opened_at: Option<u64>,
    /// Set while the trigger is continuously observed.
    pub latched: bool,
}

impl TriggerWindow {
    /// Observe the trigger at `transition`; returns the next window state and
    /// whether the window is open for this transition.
    #[must_use]
    pub fn observe(self, triggered: bool, transition: u64, length: u64) -> (Self, bool) {
        if !triggered {
            return (Self::default(), false);
        }
        let next = if self.latched {
            self
        } else {
            Self {
                opened_at: Some(transition),
                latched: true,
            }
        };
        let open = next
            .opened_at
            .is_some_and(|opened| transition < opened.saturating_add(length));
        (next, open)
    }
}

// ---------------------------------------------------------------------------
// Override counters
// ---------------------------------------------------------------------------

/// Staged removal sequence in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReaperSequence {
    /// Sequence number, used to ignore stale tasks.
    pub id: u64,
    /// Where it is happening.
    pub location: LocationId,
}

/// Private counters of the Reaper evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReaperCounters {
    /// Transition of the most recent spawn.
    pub last_spawn: Option<u64>,
    /// Rudeness boost window.
    pub rudeness: TriggerWindow,
    /// Flagged-item boost window.
    pub item: TriggerWindow,
    /// Where the Reaper currently is.
    pub active_at: Option<LocationId>,
    /// Removal sequence in progress.
    pub sequence: Option<ReaperSequence>,
    /// Consecutive transitions with at least one window open.
    pub trigger_streak: u64,
}

/// Private counters of the Librarian evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibrarianCounters {
    /// Where the Librarian currently is.
    pub active_at: Option<LocationId>,
    /// Transition of the most recent spawn.
    pub last_spawn: Option<u64>,
}

// ---------------------------------------------------------------------------
// Scheduler state
// ---------------------------------------------------------------------------

/// Mutable scheduler state for one session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerState {
    transition: u64,
    cooldowns: HashMap<CharacterId, SimTime>,
    /// Reaper counters.
    pub reaper: ReaperCounters,
    /// Librarian counters.
    pub librarian: LibrarianCounters,
}

impl SchedulerState {
    /// Current transition counter.
    #[must_use]
    pub fn transition(&self) -> u64 {
        self.transition
    }

    /// Count one location entry. The counter never decreases.
    pub fn advance_transition(&mut self) -> u64 {
        self.transition = self.transition.saturating_add(1);
        self.transition
    }

    /// Whether `character` is still barred from reselection at `now`.
    #[must_use]
    pub fn on_cooldown(&self, character: &CharacterId, now: SimTime) -> bool {
        self.cooldowns.get(character).is_some_and(|until| now < *until)
    }

    /// Cooldown expiry for `character`, if one was ever set.
    #[must_use]
    pub fn cooldown_until(&self, character: &CharacterId) -> Option<SimTime> {
        self.cooldowns.get(character).copied()
    }

    /// Bar `character` until `until`. Never shortens an existing cooldown.
    pub fn start_cooldown(&mut self, character: CharacterId, until: SimTime) {
        let slot = self.cooldowns.entry(character).or_insert(until);
        *slot = (*slot).max(until);
    }
}
