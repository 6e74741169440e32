//! The Director: one scheduler session.
//!
//! Owns the registry, configuration, RNG, virtual clock, task queue,
//! occupancy table and scheduler state. Every public operation follows the
//! same shape: evaluators read state and return decisions, the director
//! commits them and buffers [`Effect`]s, and the buffer is flushed to the
//! [`EventSink`] before the call returns.
//!
//! ## Location entry
//!
//! 1. bump the transition counter;
//! 2. deterministic departure check for the entered location;
//! 3. overrides active elsewhere leave;
//! 4. Reaper, then Librarian;
//! 5. general evaluator, only when no override holds or arrived;
//! 6. an arrival into an occupied location starts an encounter.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{SimClock, TaskId, TaskQueue};
use crate::config::WanderConfig;
use crate::departure::{self, CheckMode, DepartureReason};
use crate::encounter::{self, EncounterConfig, EncounterEffect, EncounterHistory, EncounterRecord};
use crate::error::{Result, WanderError};
use crate::interaction::{
    self, REAPER_COURTEOUS, REAPER_OMINOUS, REAPER_SPARE, REAPER_STAGE_ONE, REAPER_STAGE_TWO,
    ReaperReply, ResponseTicket, TicketId, Tone, UtteranceOutcome,
};
use crate::overrides::{OverrideInput, OverrideKind, librarian, reaper};
use crate::registry::{CharacterDefinition, ConditionContext, Registry};
use crate::sink::{Effect, EventSink};
use crate::spawn::{self, SpawnInput};
use crate::state::{
    ActiveEncounter, LocationOccupancy, Occupant, OccupancyTable, OccupantKind, ReaperSequence,
    SchedulerState,
};
use crate::types::{
    CharacterId, EncounterId, FlagValue, LocationId, LocationMeta, PlayerSnapshot, SimTime, secs,
};
use crate::zone::Zone;

/// Deferred work on the virtual clock.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Task {
    Sweep,
    EncounterLine {
        location: LocationId,
        encounter: EncounterId,
        index: usize,
    },
    EncounterEnd {
        location: LocationId,
        encounter: EncounterId,
    },
    ReaperStrike {
        location: LocationId,
        sequence: u64,
    },
    ReaperSafetyCap {
        sequence: u64,
    },
    ResponseTimeout {
        ticket: TicketId,
    },
}

#[derive(Debug, Clone)]
struct PendingResponse {
    character: CharacterId,
    name: String,
    location: LocationId,
    timeout: TaskId,
}

/// Serializable snapshot returned by [`Director::list_active`].
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    /// Simulated time.
    pub now: SimTime,
    /// Transition counter.
    pub transition: u64,
    /// Where the player last entered.
    pub player_at: Option<LocationId>,
    /// Everyone present, per non-empty location.
    pub active: BTreeMap<LocationId, Vec<CharacterId>>,
    /// Full occupancy table.
    pub locations: OccupancyTable,
    /// Cooldowns and override counters.
    pub state: SchedulerState,
    /// Encounter history, oldest first.
    pub history: Vec<EncounterRecord>,
    /// Live scheduled tasks.
    pub pending_tasks: usize,
    /// Replies still awaited from the host.
    pub pending_responses: usize,
}

/// One scheduler session.
pub struct Director<S> {
    registry: Registry,
    config: WanderConfig,
    rng: StdRng,
    clock: SimClock,
    tasks: TaskQueue<Task>,
    table: OccupancyTable,
    state: SchedulerState,
    history: EncounterHistory,
    pending: HashMap<TicketId, PendingResponse>,
    next_ticket: u64,
    next_sequence: u64,
    overrides: Vec<CharacterId>,
    player_at: Option<LocationId>,
    last_snapshot: PlayerSnapshot,
    outbox: Vec<Effect>,
    sink: S,
}

impl<S> fmt::Debug for Director<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Director")
            .field("now", &self.clock.now())
            .field("transition", &self.state.transition())
            .field("player_at", &self.player_at)
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl<S: EventSink> Director<S> {
    /// Create a session. The RNG is seeded from `config.general.seed`, or
    /// from OS entropy when unset.
    #[must_use]
    pub fn new(registry: Registry, config: WanderConfig, sink: S) -> Self {
        let rng = match config.general.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let overrides = vec![
            CharacterId::new(config.reaper.character.clone()),
            CharacterId::new(config.librarian.character.clone()),
        ];
        let history = EncounterHistory::new(config.encounters.history_capacity);
        let mut director = Self {
            registry,
            config,
            rng,
            clock: SimClock::default(),
            tasks: TaskQueue::new(),
            table: OccupancyTable::default(),
            state: SchedulerState::default(),
            history,
            pending: HashMap::new(),
            next_ticket: 0,
            next_sequence: 0,
            overrides,
            player_at: None,
            last_snapshot: PlayerSnapshot::default(),
            outbox: Vec::new(),
            sink,
        };
        director.schedule_sweep();
        director
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    /// Current simulated time.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.clock.now()
    }

    /// Current transition counter.
    #[must_use]
    pub fn transition(&self) -> u64 {
        self.state.transition()
    }

    /// The character registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &WanderConfig {
        &self.config
    }

    /// Occupancy of every location seen so far.
    #[must_use]
    pub fn occupancy(&self) -> &OccupancyTable {
        &self.table
    }

    /// Cooldowns and override counters.
    #[must_use]
    pub fn state(&self) -> &SchedulerState {
        &self.state
    }

    /// Encounter history.
    #[must_use]
    pub fn history(&self) -> &EncounterHistory {
        &self.history
    }

    /// Where the player last entered.
    #[must_use]
    pub fn player_location(&self) -> Option<&LocationId> {
        self.player_at.as_ref()
    }

    /// Number of live scheduled tasks, including the recurring sweep.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// The injected sink.
    #[must_use]
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// The injected sink, mutably.
    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    // -----------------------------------------------------------------------
    // Location entry
    // -----------------------------------------------------------------------

    /// The player entered `location`. Returns the new transition counter.
    pub fn enter_location(
        &mut self,
        location: &LocationId,
        meta: LocationMeta,
        player: &PlayerSnapshot,
    ) -> u64 {
        let transition = self.state.advance_transition();
        self.player_at = Some(location.clone());
        self.last_snapshot = player.clone();
        let zone = self.table.touch(location, meta).zone;
        debug!(location = %location, %zone, transition, "Location entered");

        self.check_departure(location, CheckMode::Entry);
        self.release_overrides_elsewhere(location);

        let reaper_spawned = self.evaluate_reaper(location, zone, player, transition);
        let librarian_spawned =
            self.evaluate_librarian(location, zone, player, transition, reaper_spawned);

        let blocked = self
            .table
            .get(location)
            .is_some_and(|r| r.in_encounter() || r.override_holder().is_some());
        if !reaper_spawned && !librarian_spawned && !blocked {
            self.evaluate_general(location, zone, player, transition);
        }

        self.flush();
        transition
    }

    fn evaluate_reaper(
        &mut self,
        location: &LocationId,
        zone: Zone,
        player: &PlayerSnapshot,
        transition: u64,
    ) -> bool {
        if self.registry.get(&self.overrides[0]).is_none() {
            return false;
        }
        let Some(record) = self.table.get(location) else {
            return false;
        };
        let occupant = record.occupant.clone();
        let in_encounter = record.in_encounter();
        let input = OverrideInput {
            location,
            zone,
            player,
            transition,
            occupant: occupant.as_ref(),
        };

        if in_encounter {
            // Windows keep counting even when nothing may spawn here.
            let (counters, _, _) = reaper::escalation(
                &self.config.reaper,
                &self.config.triggers,
                &input,
                &self.state.reaper,
            );
            self.state.reaper = counters;
            return false;
        }

        let eval = reaper::evaluate(
            &self.config.reaper,
            &self.config.triggers,
            &input,
            &self.state.reaper,
            &mut self.rng,
        );
        self.state.reaper = eval.counters;
        debug!(
            location = %location,
            transition,
            probability = eval.decision.probability,
            reason = eval.decision.reason,
            spawned = eval.decision.should_spawn,
            "Reaper evaluated"
        );
        if eval.decision.should_spawn {
            self.spawn_override(OverrideKind::Reaper, location, transition);
        }
        eval.decision.should_spawn
    }

    fn evaluate_librarian(
        &mut self,
        location: &LocationId,
        zone: Zone,
        player: &PlayerSnapshot,
        transition: u64,
        reaper_spawned: bool,
    ) -> bool {
        if self.registry.get(&self.overrides[1]).is_none() {
            return false;
        }
        let Some(record) = self.table.get(location) else {
            return false;
        };
        if record.in_encounter() {
            return false;
        }
        let occupant = record.occupant.clone();
        let input = OverrideInput {
            location,
            zone,
            player,
            transition,
            occupant: occupant.as_ref(),
        };
        let decision = librarian::evaluate(
            &self.config.librarian,
            &input,
            &self.state.librarian,
            reaper_spawned,
            &mut self.rng,
        );
        debug!(
            location = %location,
            transition,
            probability = decision.probability,
            reason = decision.reason,
            spawned = decision.should_spawn,
            "Librarian evaluated"
        );
        if decision.should_spawn {
            self.spawn_override(OverrideKind::Librarian, location, transition);
        }
        decision.should_spawn
    }

    fn evaluate_general(
        &mut self,
        location: &LocationId,
        zone: Zone,
        player: &PlayerSnapshot,
        transition: u64,
    ) {
        let Some(meta) = self.table.get(location).map(|r| r.meta.clone()) else {
            return;
        };
        let input = SpawnInput {
            ctx: ConditionContext {
                location,
                meta: &meta,
                zone,
                player,
                transition,
            },
            now: self.clock.now(),
            overrides: &self.overrides,
        };
        let candidates =
            spawn::eligible(&self.registry, &input, &self.table, &self.state, &mut self.rng);
        let winner = spawn::select(&candidates, &mut self.rng).map(|def| def.id.clone());
        debug!(
            location = %location,
            candidates = candidates.len(),
            winner = ?winner,
            "General evaluator ran"
        );
        if let Some(id) = winner {
            self.arrive_ambient(location, &id, transition);
        }
    }

    // -----------------------------------------------------------------------
    // Arrivals and departures
    // -----------------------------------------------------------------------

    fn arrive_ambient(&mut self, location: &LocationId, id: &CharacterId, transition: u64) {
        let now = self.clock.now();
        let Some(record) = self.table.get_mut(location) else {
            return;
        };
        let previous = record.occupant.replace(Occupant {
            id: id.clone(),
            kind: OccupantKind::Ambient,
            since_transition: transition,
            since: now,
        });
        info!(character = %id, location = %location, transition, "Character arrived");
        self.say_entry(location, id);

        match previous {
            Some(prev) => {
                self.start_encounter(
                    location,
                    vec![(id.clone(), OccupantKind::Ambient), (prev.id, prev.kind)],
                );
            }
            None => self.announce_occupants(location),
        }
    }

    fn spawn_override(&mut self, kind: OverrideKind, location: &LocationId, transition: u64) {
        let id = self.override_id(kind);
        let now = self.clock.now();
        let Some(record) = self.table.get_mut(location) else {
            return;
        };
        let previous = record.occupant.replace(Occupant {
            id: id.clone(),
            kind: OccupantKind::Override(kind),
            since_transition: transition,
            since: now,
        });
        match kind {
            OverrideKind::Reaper => {
                self.state.reaper.active_at = Some(location.clone());
                self.state.reaper.last_spawn = Some(transition);
            }
            OverrideKind::Librarian => {
                self.state.librarian.active_at = Some(location.clone());
                self.state.librarian.last_spawn = Some(transition);
            }
        }
        info!(character = %id, %kind, location = %location, transition, "Override character arrived");
        self.say_entry(location, &id);

        match previous {
            Some(prev) if prev.is_override() => {
                // One override pushing out another: a replacement, not a meeting.
                self.cancel_pending(location);
                if let OccupantKind::Override(prev_kind) = prev.kind {
                    self.deactivate_override(prev_kind, location);
                }
                info!(character = %prev.id, location = %location, "Override character displaced");
                self.say_exit(location, &prev.id);
                self.announce_occupants(location);
            }
            Some(prev) => {
                self.start_encounter(
                    location,
                    vec![(id, OccupantKind::Override(kind)), (prev.id, prev.kind)],
                );
            }
            None => self.announce_occupants(location),
        }
    }

    /// Run the departure rules for one location. Only ambient occupants
    /// outside an encounter are considered.
    fn check_departure(&mut self, location: &LocationId, mode: CheckMode) {
        let now = self.clock.now();
        let Some(record) = self.table.get(location) else {
            return;
        };
        if record.in_encounter() {
            return;
        }
        let Some(occupant) = record.occupant.as_ref().filter(|o| !o.is_override()) else {
            return;
        };
        let verdict = departure::check(
            occupant,
            self.registry.get(&occupant.id),
            record.zone,
            now,
            &self.config.timing,
            mode,
            &mut self.rng,
        );
        if let Some(reason) = verdict {
            self.depart_ambient(location, reason);
        }
    }

    fn depart_ambient(&mut self, location: &LocationId, reason: DepartureReason) {
        let until = self.clock.now() + secs(self.config.timing.cooldown_secs);
        let Some(record) = self.table.get_mut(location) else {
            return;
        };
        let Some(occupant) = record.occupant.take() else {
            return;
        };
        for task in record.pending.drain(..) {
            self.tasks.cancel(task);
        }
        self.state.start_cooldown(occupant.id.clone(), until);
        info!(character = %occupant.id, location = %location, ?reason, cooldown_until = %until, "Character departed");
        self.say_exit(location, &occupant.id);
        self.announce_occupants(location);
    }

    /// Overrides leave when the player walks away. Overrides caught in an
    /// encounter stay until it ends.
    fn release_overrides_elsewhere(&mut self, location: &LocationId) {
        for kind in [OverrideKind::Reaper, OverrideKind::Librarian] {
            let active = match kind {
                OverrideKind::Reaper => self.state.reaper.active_at.clone(),
                OverrideKind::Librarian => self.state.librarian.active_at.clone(),
            };
            let Some(at) = active else { continue };
            if at == *location {
                continue;
            }
            if self.table.get(&at).is_some_and(LocationOccupancy::in_encounter) {
                continue;
            }
            self.release_override(kind, &at);
        }
    }

    /// Remove an override character from `location` and clear its counters.
    /// A pending Reaper strike dies with it; the safety cap still runs.
    fn release_override(&mut self, kind: OverrideKind, location: &LocationId) {
        let id = self.override_id(kind);
        self.deactivate_override(kind, location);

        let Some(record) = self.table.get_mut(location) else {
            return;
        };
        if record.in_encounter() || !record.occupant.as_ref().is_some_and(|o| o.id == id) {
            return;
        }
        record.occupant = None;
        for task in record.pending.drain(..) {
            self.tasks.cancel(task);
        }
        info!(character = %id, location = %location, "Override character left");
        self.say_exit(location, &id);
        self.announce_occupants(location);
    }

    fn deactivate_override(&mut self, kind: OverrideKind, location: &LocationId) {
        let slot = match kind {
            OverrideKind::Reaper => &mut self.state.reaper.active_at,
            OverrideKind::Librarian => &mut self.state.librarian.active_at,
        };
        if slot.as_ref() == Some(location) {
            *slot = None;
        }
    }

    // -----------------------------------------------------------------------
    // Encounters
    // -----------------------------------------------------------------------

    /// Start an encounter. The first participant is the primary and must
    /// already be the location's occupant.
    fn start_encounter(
        &mut self,
        location: &LocationId,
        participants: Vec<(CharacterId, OccupantKind)>,
    ) -> EncounterId {
        let now = self.clock.now();
        let (ids, kinds): (Vec<CharacterId>, Vec<OccupantKind>) = participants.into_iter().unzip();

        let defs: Vec<&CharacterDefinition> =
            ids.iter().filter_map(|id| self.registry.get(id)).collect();
        let kind = encounter::classify(
            &defs,
            &self.last_snapshot,
            &self.config.triggers,
            self.config.encounters.comparable_priority_gap,
        );
        let names: Vec<String> = ids.iter().map(|id| self.registry.name_of(id)).collect();
        let config = EncounterConfig::build(kind, ids.clone(), &self.config.triggers);
        let profile = encounter::profile(kind);
        let id = EncounterId::new();
        let expires = now + config.duration;

        let spacing = secs(self.config.encounters.line_spacing_secs);
        let mut pending: Vec<TaskId> = (1u32..)
            .zip(1..profile.lines.len())
            .map(|(step, index)| {
                self.tasks.schedule(
                    now,
                    spacing.saturating_mul(step),
                    Task::EncounterLine {
                        location: location.clone(),
                        encounter: id,
                        index,
                    },
                )
            })
            .collect();
        pending.push(self.tasks.schedule_at(
            expires,
            Task::EncounterEnd {
                location: location.clone(),
                encounter: id,
            },
        ));

        if let Some(record) = self.table.get_mut(location) {
            record.pending.extend(pending);
            record.encounter = Some(ActiveEncounter {
                id,
                kind,
                participants: ids.clone(),
                participant_kinds: kinds,
                started: now,
                expires,
            });
        }
        self.history.push(EncounterRecord {
            id,
            location: location.clone(),
            kind,
            participants: ids,
            at: now,
            recorded_at: Utc::now(),
            outcome: config.effect.outcome.clone(),
        });
        info!(encounter = %id, location = %location, %kind, expires = %expires, "Encounter started");

        self.announce_occupants(location);
        self.say(location, None, encounter::render(profile.lines[0], &names));
        self.apply_encounter_effect(&config.effect);
        id
    }

    fn apply_encounter_effect(&mut self, effect: &EncounterEffect) {
        if let Some(amount) = effect.health_delta {
            self.emit(Effect::HealthDelta { amount });
        }
        for (flag, value) in &effect.flags {
            self.last_snapshot.flags.insert(flag.clone(), value.clone());
            self.emit(Effect::SetFlag {
                flag: flag.clone(),
                value: value.clone(),
            });
        }
        for unlock in &effect.unlocks {
            self.emit(Effect::UnlockAchievement { id: unlock.clone() });
        }
    }

    fn encounter_line(&mut self, location: &LocationId, encounter: EncounterId, index: usize) {
        let Some(active) = self
            .table
            .get(location)
            .and_then(|r| r.encounter.as_ref())
            .filter(|e| e.id == encounter)
        else {
            return;
        };
        let Some(template) = encounter::profile(active.kind).lines.get(index) else {
            return;
        };
        let names: Vec<String> = active
            .participants
            .iter()
            .map(|id| self.registry.name_of(id))
            .collect();
        let text = encounter::render(template, &names);
        self.say(location, None, text);
    }

    /// Expiry: closing line, marker cleared, non-primary participants leave.
    fn end_encounter(&mut self, location: &LocationId, encounter: EncounterId) {
        let until = self.clock.now() + secs(self.config.timing.cooldown_secs);
        let Some(record) = self.table.get_mut(location) else {
            return;
        };
        if record.encounter.as_ref().map(|e| e.id) != Some(encounter) {
            debug!(encounter = %encounter, location = %location, "Stale encounter expiry ignored");
            return;
        }
        let Some(active) = record.encounter.take() else {
            return;
        };
        for task in record.pending.drain(..) {
            self.tasks.cancel(task);
        }

        let names: Vec<String> = active
            .participants
            .iter()
            .map(|id| self.registry.name_of(id))
            .collect();
        self.say(
            location,
            None,
            encounter::render(encounter::profile(active.kind).closing, &names),
        );

        for (id, kind) in active
            .participants
            .iter()
            .zip(&active.participant_kinds)
            .skip(1)
        {
            match kind {
                OccupantKind::Ambient => self.state.start_cooldown(id.clone(), until),
                OccupantKind::Override(k) => self.deactivate_override(*k, location),
            }
            self.say_exit(location, id);
        }
        info!(encounter = %encounter, location = %location, kind = %active.kind, "Encounter ended");
        self.announce_occupants(location);

        let holder = self
            .table
            .get(location)
            .and_then(LocationOccupancy::override_holder)
            .map(|(_, kind)| kind);
        if let Some(kind) = holder {
            if self.player_at.as_ref() != Some(location) {
                self.release_override(kind, location);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Virtual time
    // -----------------------------------------------------------------------

    /// Advance the virtual clock by `dt`, running every task that falls due.
    pub fn advance(&mut self, dt: Duration) {
        let target = self.clock.now() + dt;
        self.advance_to(target);
    }

    /// Advance the virtual clock to `target`. Earlier targets are a no-op.
    pub fn advance_to(&mut self, target: SimTime) {
        while let Some((due, _, task)) = self.tasks.pop_due(target) {
            self.clock.set(due);
            self.run_task(task);
        }
        self.clock.set(target);
        self.flush();
    }

    /// Run a departure sweep now, outside the regular interval.
    pub fn run_departure_sweep(&mut self) {
        self.sweep();
        self.flush();
    }

    fn schedule_sweep(&mut self) {
        let every = secs(self.config.timing.sweep_interval_secs);
        if every.is_zero() {
            warn!("Sweep interval is zero; periodic departures disabled");
            return;
        }
        if self.clock.now() + every == SimTime(u64::MAX) {
            warn!(interval = ?every, "Sweep interval past the end of time; periodic departures disabled");
            return;
        }
        self.tasks.schedule(self.clock.now(), every, Task::Sweep);
    }

    fn sweep(&mut self) {
        for location in self.table.ids() {
            self.check_departure(&location, CheckMode::Sweep);
        }
    }

    fn run_task(&mut self, task: Task) {
        match task {
            Task::Sweep => {
                self.sweep();
                self.schedule_sweep();
            }
            Task::EncounterLine {
                location,
                encounter,
                index,
            } => self.encounter_line(&location, encounter, index),
            Task::EncounterEnd { location, encounter } => self.end_encounter(&location, encounter),
            Task::ReaperStrike { location, sequence } => self.reaper_strike(&location, sequence),
            Task::ReaperSafetyCap { sequence } => self.reaper_safety_cap(sequence),
            Task::ResponseTimeout { ticket } => self.response_timeout(ticket),
        }
    }

    // -----------------------------------------------------------------------
    // Utterances
    // -----------------------------------------------------------------------

    /// The player said `text` to `target`.
    ///
    /// The Reaper answers from a fixed script. Anyone else needs a generated
    /// reply: the returned ticket must be answered through
    /// [`Self::deliver_response`], and a safety-net task emits a fallback
    /// line if it is not answered in time.
    ///
    /// # Errors
    /// Returns `WanderError::CharacterNotFound` if `target` is not registered.
    pub fn handle_utterance(&mut self, target: &CharacterId, text: &str) -> Result<UtteranceOutcome> {
        let Some(name) = self.registry.get(target).map(|def| def.name.clone()) else {
            warn!(character = %target, "Utterance to unknown character");
            return Err(WanderError::CharacterNotFound(target.clone()));
        };
        let Some(location) = self.table.location_of(target).cloned() else {
            return Ok(UtteranceOutcome::NotPresent);
        };
        if self.player_at.as_ref() != Some(&location) {
            return Ok(UtteranceOutcome::NotPresent);
        }
        if self.table.get(&location).is_some_and(LocationOccupancy::in_encounter) {
            return Ok(UtteranceOutcome::Busy);
        }

        let tone = interaction::classify_tone(text, &self.config.reaper);
        debug!(character = %target, ?tone, "Utterance received");
        let outcome = if self.override_kind_of(target) == Some(OverrideKind::Reaper) {
            self.reaper_utterance(&location, target, tone);
            UtteranceOutcome::Scripted
        } else {
            if tone == Tone::Hostile {
                let flag = self.config.triggers.rudeness_flag.clone();
                self.last_snapshot.flags.insert(flag.clone(), FlagValue::Bool(true));
                self.emit(Effect::SetFlag {
                    flag,
                    value: FlagValue::Bool(true),
                });
            }
            UtteranceOutcome::Awaiting(self.open_ticket(target, name, location, text, tone))
        };
        self.flush();
        Ok(outcome)
    }

    fn open_ticket(
        &mut self,
        character: &CharacterId,
        name: String,
        location: LocationId,
        utterance: &str,
        tone: Tone,
    ) -> ResponseTicket {
        let id = TicketId(self.next_ticket);
        self.next_ticket += 1;
        let timeout = self.tasks.schedule(
            self.clock.now(),
            secs(self.config.dialogue.response_timeout_secs),
            Task::ResponseTimeout { ticket: id },
        );
        self.pending.insert(
            id,
            PendingResponse {
                character: character.clone(),
                name: name.clone(),
                location: location.clone(),
                timeout,
            },
        );
        self.emit(Effect::ResponsePending {
            character: character.clone(),
            pending: true,
        });
        ResponseTicket {
            id,
            character: character.clone(),
            name,
            location,
            utterance: utterance.to_string(),
            tone,
        }
    }

    /// Deliver a generated reply. Failures become the fallback line.
    ///
    /// Returns `false` when the ticket is unknown or the safety net already
    /// fired; the late reply is dropped.
    pub fn deliver_response<E: fmt::Display>(
        &mut self,
        ticket: TicketId,
        result: std::result::Result<String, E>,
    ) -> bool {
        let Some(pending) = self.pending.remove(&ticket) else {
            debug!(ticket = ticket.0, "Late or unknown reply ignored");
            return false;
        };
        self.tasks.cancel(pending.timeout);
        let text = match result {
            Ok(line) if !line.trim().is_empty() => line,
            Ok(_) => {
                warn!(character = %pending.character, "Empty reply; using fallback line");
                self.config.dialogue.fallback_for(&pending.name)
            }
            Err(e) => {
                warn!(character = %pending.character, error = %e, "Reply generation failed; using fallback line");
                self.config.dialogue.fallback_for(&pending.name)
            }
        };
        self.say(&pending.location, Some(&pending.character), text);
        self.emit(Effect::ResponsePending {
            character: pending.character,
            pending: false,
        });
        self.flush();
        true
    }

    fn response_timeout(&mut self, ticket: TicketId) {
        let Some(pending) = self.pending.remove(&ticket) else {
            return;
        };
        warn!(ticket = ticket.0, character = %pending.character, "Reply timed out; using fallback line");
        let text = self.config.dialogue.fallback_for(&pending.name);
        self.say(&pending.location, Some(&pending.character), text);
        self.emit(Effect::ResponsePending {
            character: pending.character,
            pending: false,
        });
    }

    fn reaper_utterance(&mut self, location: &LocationId, reaper: &CharacterId, tone: Tone) {
        if self.state.reaper.sequence.is_some() {
            debug!("Removal already under way; utterance ignored");
            return;
        }
        match interaction::reaper_reply(tone, &self.config.reaper, &mut self.rng) {
            ReaperReply::Spare => {
                info!(location = %location, "Reaper spared the player");
                self.say(location, Some(reaper), REAPER_SPARE.to_string());
                self.emit(Effect::SetFlag {
                    flag: self.config.reaper.spared_flag.clone(),
                    value: FlagValue::Bool(true),
                });
                self.release_override(OverrideKind::Reaper, location);
            }
            ReaperReply::Courteous => self.say(location, Some(reaper), REAPER_COURTEOUS.to_string()),
            ReaperReply::Ominous => self.say(location, Some(reaper), REAPER_OMINOUS.to_string()),
            ReaperReply::Removal => self.start_removal(location, reaper),
        }
    }

    fn start_removal(&mut self, location: &LocationId, reaper: &CharacterId) {
        self.next_sequence += 1;
        let sequence = self.next_sequence;
        self.state.reaper.sequence = Some(ReaperSequence {
            id: sequence,
            location: location.clone(),
        });
        info!(sequence, location = %location, "Reaper removal sequence started");
        self.say(location, Some(reaper), REAPER_STAGE_ONE.to_string());

        let now = self.clock.now();
        let strike = self.tasks.schedule(
            now,
            secs(self.config.reaper.stage_pause_secs),
            Task::ReaperStrike {
                location: location.clone(),
                sequence,
            },
        );
        if let Some(record) = self.table.get_mut(location) {
            record.pending.push(strike);
        }
        // Not tied to the location: forced transitions must not cancel it.
        self.tasks.schedule(
            now,
            secs(self.config.reaper.safety_cap_secs),
            Task::ReaperSafetyCap { sequence },
        );
    }

    fn reaper_strike(&mut self, location: &LocationId, sequence: u64) {
        if self.state.reaper.sequence.as_ref().map(|s| s.id) != Some(sequence) {
            return;
        }
        let reaper = self.override_id(OverrideKind::Reaper);
        self.say(location, Some(&reaper), REAPER_STAGE_TWO.to_string());
        self.emit(Effect::HealthDelta {
            amount: self.config.reaper.lethal_delta,
        });
        self.emit(Effect::SetFlag {
            flag: self.config.reaper.cause_flag.clone(),
            value: FlagValue::Text(reaper.to_string()),
        });
        self.emit(Effect::UnlockAchievement {
            id: self.config.reaper.achievement.clone(),
        });
        self.state.reaper.sequence = None;
        info!(sequence, location = %location, "Reaper removal sequence completed");
        self.release_override(OverrideKind::Reaper, location);
    }

    fn reaper_safety_cap(&mut self, sequence: u64) {
        if self.state.reaper.sequence.as_ref().map(|s| s.id) != Some(sequence) {
            return;
        }
        let Some(stale) = self.state.reaper.sequence.take() else {
            return;
        };
        warn!(sequence, location = %stale.location, "Reaper safety cap fired; clearing active state");
        if self.state.reaper.active_at.as_ref() == Some(&stale.location) {
            self.release_override(OverrideKind::Reaper, &stale.location);
        }
    }

    // -----------------------------------------------------------------------
    // Administrative surface
    // -----------------------------------------------------------------------

    /// Whether anyone occupies `location`.
    #[must_use]
    pub fn is_active(&self, location: &LocationId) -> bool {
        self.table
            .get(location)
            .is_some_and(|r| r.occupant.is_some())
    }

    /// Everyone present at `location`: all participants during an encounter.
    #[must_use]
    pub fn get_active(&self, location: &LocationId) -> Vec<CharacterId> {
        self.table.present_at(location)
    }

    /// Put `character` into `location`, bypassing conditions and cooldowns.
    ///
    /// Forcing a character into a location held by an ambient occupant
    /// starts an encounter with the forced character as primary. Forcing an
    /// override into a location held by the other override replaces it.
    ///
    /// # Errors
    /// `CharacterNotFound`, `LocationNotFound` (never entered),
    /// `EncounterActive`, `OverrideHeld` (non-override into an
    /// override-held location), or `AlreadyPresent`.
    pub fn force_spawn(&mut self, character: &CharacterId, location: &LocationId) -> Result<()> {
        if self.registry.get(character).is_none() {
            warn!(character = %character, "force_spawn: unknown character");
            return Err(WanderError::CharacterNotFound(character.clone()));
        }
        let Some(record) = self.table.get(location) else {
            return Err(WanderError::LocationNotFound(location.clone()));
        };
        if record.in_encounter() {
            return Err(WanderError::EncounterActive {
                location: location.clone(),
            });
        }
        // An override may replace another override; anyone else must wait.
        if let Some((holder, _)) = record
            .override_holder()
            .filter(|_| self.override_kind_of(character).is_none())
        {
            return Err(WanderError::OverrideHeld {
                location: location.clone(),
                holder: holder.clone(),
            });
        }
        if let Some(at) = self.table.location_of(character) {
            return Err(WanderError::AlreadyPresent {
                character: character.clone(),
                location: at.clone(),
            });
        }

        info!(character = %character, location = %location, "Forced spawn");
        let transition = self.state.transition();
        match self.override_kind_of(character) {
            Some(kind) => self.spawn_override(kind, location, transition),
            None => self.arrive_ambient(location, character, transition),
        }
        self.flush();
        Ok(())
    }

    /// Empty `location`. A running encounter is cancelled along with its
    /// pending lines and expiry. Returns who was removed.
    ///
    /// # Errors
    /// `LocationNotFound` if the location was never entered.
    pub fn force_despawn(&mut self, location: &LocationId) -> Result<Vec<CharacterId>> {
        let until = self.clock.now() + secs(self.config.timing.cooldown_secs);
        let Some(record) = self.table.get_mut(location) else {
            return Err(WanderError::LocationNotFound(location.clone()));
        };
        for task in record.pending.drain(..) {
            self.tasks.cancel(task);
        }
        let cancelled = record.encounter.take();
        let occupant = record.occupant.take();
        let removed: Vec<(CharacterId, OccupantKind)> = match cancelled {
            Some(active) => {
                info!(encounter = %active.id, location = %location, "Encounter cancelled");
                active
                    .participants
                    .into_iter()
                    .zip(active.participant_kinds)
                    .collect()
            }
            None => occupant.map(|o| (o.id, o.kind)).into_iter().collect(),
        };

        for (id, kind) in &removed {
            match kind {
                OccupantKind::Ambient => self.state.start_cooldown(id.clone(), until),
                OccupantKind::Override(k) => self.deactivate_override(*k, location),
            }
            self.say_exit(location, id);
        }
        info!(location = %location, removed = removed.len(), "Forced despawn");
        if !removed.is_empty() {
            self.announce_occupants(location);
        }
        self.flush();
        Ok(removed.into_iter().map(|(id, _)| id).collect())
    }

    /// Start a narrative encounter between `characters` at `location`.
    ///
    /// The current ambient occupant, if any, joins. The highest-priority
    /// participant becomes primary; ties go to the earlier-listed one.
    ///
    /// # Errors
    /// `CharacterNotFound`, `LocationNotFound`, `EncounterActive`,
    /// `OverrideHeld`, `AlreadyPresent` (participant elsewhere), or
    /// `NotEnoughParticipants`.
    pub fn trigger_encounter(
        &mut self,
        location: &LocationId,
        characters: &[CharacterId],
    ) -> Result<EncounterId> {
        let mut ids: Vec<CharacterId> = Vec::with_capacity(characters.len() + 1);
        for id in characters {
            if self.registry.get(id).is_none() {
                warn!(character = %id, "trigger_encounter: unknown character");
                return Err(WanderError::CharacterNotFound(id.clone()));
            }
            if !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        let Some(record) = self.table.get(location) else {
            return Err(WanderError::LocationNotFound(location.clone()));
        };
        if record.in_encounter() {
            return Err(WanderError::EncounterActive {
                location: location.clone(),
            });
        }
        if let Some((holder, _)) = record.override_holder() {
            return Err(WanderError::OverrideHeld {
                location: location.clone(),
                holder: holder.clone(),
            });
        }
        let current = record.occupant.clone();
        for id in &ids {
            if let Some(at) = self.table.location_of(id).filter(|at| *at != location) {
                return Err(WanderError::AlreadyPresent {
                    character: id.clone(),
                    location: at.clone(),
                });
            }
        }
        if let Some(occ) = &current {
            if !ids.contains(&occ.id) {
                ids.push(occ.id.clone());
            }
        }
        if ids.len() < 2 {
            return Err(WanderError::NotEnoughParticipants(ids.len()));
        }

        let primary_at = ids
            .iter()
            .enumerate()
            .max_by_key(|(index, id)| {
                let priority = self.registry.get(id).map_or(i32::MIN, CharacterDefinition::priority);
                (priority, std::cmp::Reverse(*index))
            })
            .map_or(0, |(index, _)| index);
        ids.swap(0, primary_at);
        ids[1..].sort_by_key(|id| characters.iter().position(|c| c == id).unwrap_or(usize::MAX));

        let now = self.clock.now();
        let transition = self.state.transition();
        let participants: Vec<(CharacterId, OccupantKind)> = ids
            .into_iter()
            .map(|id| {
                let kind = self
                    .override_kind_of(&id)
                    .map_or(OccupantKind::Ambient, OccupantKind::Override);
                (id, kind)
            })
            .collect();
        for (id, kind) in &participants {
            match kind {
                OccupantKind::Override(OverrideKind::Reaper) => {
                    self.state.reaper.active_at = Some(location.clone());
                }
                OccupantKind::Override(OverrideKind::Librarian) => {
                    self.state.librarian.active_at = Some(location.clone());
                }
                OccupantKind::Ambient => {}
            }
            debug!(character = %id, location = %location, "Encounter participant");
        }

        let (primary, primary_kind) = participants[0].clone();
        let occupant = match current {
            Some(occ) if occ.id == primary => occ,
            _ => Occupant {
                id: primary,
                kind: primary_kind,
                since_transition: transition,
                since: now,
            },
        };
        self.cancel_pending(location);
        if let Some(record) = self.table.get_mut(location) {
            record.occupant = Some(occupant);
        }
        let id = self.start_encounter(location, participants);
        self.flush();
        Ok(id)
    }

    /// Serializable snapshot of the whole session.
    #[must_use]
    pub fn list_active(&self) -> Diagnostics {
        let active = self
            .table
            .iter()
            .map(|(id, record)| (id.clone(), record.present()))
            .filter(|(_, present)| !present.is_empty())
            .collect();
        Diagnostics {
            now: self.clock.now(),
            transition: self.state.transition(),
            player_at: self.player_at.clone(),
            active,
            locations: self.table.clone(),
            state: self.state.clone(),
            history: self.history.iter().cloned().collect(),
            pending_tasks: self.tasks.len(),
            pending_responses: self.pending.len(),
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn override_id(&self, kind: OverrideKind) -> CharacterId {
        match kind {
            OverrideKind::Reaper => self.overrides[0].clone(),
            OverrideKind::Librarian => self.overrides[1].clone(),
        }
    }

    fn override_kind_of(&self, id: &CharacterId) -> Option<OverrideKind> {
        if *id == self.overrides[0] {
            Some(OverrideKind::Reaper)
        } else if *id == self.overrides[1] {
            Some(OverrideKind::Librarian)
        } else {
            None
        }
    }

    fn cancel_pending(&mut self, location: &LocationId) {
        if let Some(record) = self.table.get_mut(location) {
            for task in record.pending.drain(..) {
                self.tasks.cancel(task);
            }
        }
    }

    fn emit(&mut self, effect: Effect) {
        self.outbox.push(effect);
    }

    fn say(&mut self, location: &LocationId, speaker: Option<&CharacterId>, text: String) {
        self.emit(Effect::Narrative {
            location: location.clone(),
            speaker: speaker.cloned(),
            text,
        });
    }

    fn say_entry(&mut self, location: &LocationId, id: &CharacterId) {
        if let Some(text) = self.registry.get(id).map(|def| def.entry.clone()) {
            self.say(location, Some(id), text);
        }
    }

    fn say_exit(&mut self, location: &LocationId, id: &CharacterId) {
        if let Some(text) = self.registry.get(id).map(|def| def.exit.clone()) {
            self.say(location, Some(id), text);
        }
    }

    fn announce_occupants(&mut self, location: &LocationId) {
        let occupants = self.table.present_at(location);
        self.emit(Effect::ReplaceOccupants {
            location: location.clone(),
            occupants,
        });
    }

    fn flush(&mut self) {
        for effect in std::mem::take(&mut self.outbox) {
            self.sink.emit(effect);
        }
    }
}
