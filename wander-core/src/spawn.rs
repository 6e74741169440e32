//! General Spawn Evaluator: priority-ordered, probability-weighted
//! selection among ordinary characters.
//!
//! Selection is sequential trial-by-priority: eligible candidates are sorted
//! (priority desc, base probability desc, id asc) and each gets one
//! independent Bernoulli trial at its own probability. The first success
//! spawns. If every trial fails, nobody spawns.

use ordered_float::OrderedFloat;
use rand::Rng;
use tracing::{debug, warn};

use crate::overrides::clamp_probability;
use crate::registry::{CharacterDefinition, ConditionContext, ConflictRule, Registry, SpawnCondition};
use crate::state::{OccupancyTable, SchedulerState};
use crate::types::{CharacterId, LocationId, SimTime};

/// Why a candidate was excluded. Used for debug logging and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exclusion {
    /// Is an override character; those are handled separately.
    Override,
    /// Zone not among its preferred zones.
    ZoneNotPreferred,
    /// Still cooling down after its last departure.
    Cooldown,
    /// Already occupies some location.
    AlreadyPresent,
    /// The location is held and this candidate cannot displace the holder.
    LocationHeld,
    /// A conflict rule failed.
    Conflict(&'static str),
    /// A spawn condition failed or could not be evaluated.
    Condition(usize),
}

/// Evaluate one spawn condition. Anything unevaluable counts as false.
pub fn condition_holds<R: Rng + ?Sized>(
    condition: &SpawnCondition,
    ctx: &ConditionContext<'_>,
    registry: &Registry,
    rng: &mut R,
) -> bool {
    let player = ctx.player;
    match condition {
        SpawnCondition::FlagEquals { flag, value } => player.flags.get(flag) == Some(value),
        SpawnCondition::FlagAtLeast { flag, threshold } => player
            .flags
            .get(flag)
            .and_then(crate::types::FlagValue::as_int)
            .is_some_and(|v| v >= *threshold),
        SpawnCondition::HasItem { item } => player.inventory.contains(item),
        SpawnCondition::LacksItem { item } => !player.inventory.contains(item),
        SpawnCondition::VisitedAtLeast { count } => player.distinct_visits() >= *count,
        SpawnCondition::MemoryAtLeast { key, threshold } => {
            player.memory.get(key).is_some_and(|v| v >= threshold)
        }
        SpawnCondition::Chance { p } => {
            if (0.0..=1.0).contains(p) {
                rng.gen_bool(*p)
            } else {
                warn!(p = *p, "Chance condition outside [0, 1]; treating as failed");
                false
            }
        }
        SpawnCondition::InZone { zone } => ctx.zone == *zone,
        SpawnCondition::Hook { name } => match registry.hook(name) {
            Some(hook) => (**hook)(ctx).unwrap_or(false),
            None => {
                warn!(hook = %name, "Unknown condition hook; treating as failed");
                false
            }
        },
    }
}

/// Check every conflict rule of `def` against the table.
///
/// `CannotCoexist` binds both ways: an occupant whose own definition
/// refuses `def` blocks it just as `def`'s rule would.
pub fn conflicts_pass(
    def: &CharacterDefinition,
    location: &LocationId,
    zone: crate::zone::Zone,
    registry: &Registry,
    table: &OccupancyTable,
) -> Result<(), &'static str> {
    let present = table.present_at(location);
    let refused_by_occupant = present
        .iter()
        .filter_map(|id| registry.get(id))
        .any(|occupant| occupant.cannot_coexist_with(&def.id));
    if refused_by_occupant {
        return Err("occupant cannot coexist with candidate");
    }
    for rule in &def.conflicts {
        match rule {
            ConflictRule::CannotCoexist { other } if present.contains(other) => {
                return Err("cannot coexist with occupant");
            }
            ConflictRule::AvoidsZone { zone: avoided } if *avoided == zone => {
                return Err("avoids zone");
            }
            ConflictRule::RequiresAbsence { other } if table.location_of(other).is_some() => {
                return Err("required absence violated");
            }
            _ => {}
        }
    }
    Ok(())
}

/// Everything the general evaluator reads for one location entry.
#[derive(Debug, Clone, Copy)]
pub struct SpawnInput<'a> {
    /// Condition context for hooks and zone checks.
    pub ctx: ConditionContext<'a>,
    /// Current simulated time, for cooldowns.
    pub now: SimTime,
    /// Ids of override characters, which this evaluator never selects.
    pub overrides: &'a [CharacterId],
}

/// Decide whether `def` may spawn here.
pub fn check_candidate<R: Rng + ?Sized>(
    def: &CharacterDefinition,
    input: &SpawnInput<'_>,
    registry: &Registry,
    table: &OccupancyTable,
    state: &SchedulerState,
    rng: &mut R,
) -> Result<(), Exclusion> {
    let location = input.ctx.location;
    if input.overrides.contains(&def.id) {
        return Err(Exclusion::Override);
    }
    if !def.prefers(input.ctx.zone) {
        return Err(Exclusion::ZoneNotPreferred);
    }
    if state.on_cooldown(&def.id, input.now) {
        return Err(Exclusion::Cooldown);
    }
    if table.location_of(&def.id).is_some() {
        return Err(Exclusion::AlreadyPresent);
    }
    if let Some(holder) = table.get(location).and_then(|r| r.occupant.as_ref()) {
        if holder.is_override() || !def.displaces(&holder.id) {
            return Err(Exclusion::LocationHeld);
        }
    }
    conflicts_pass(def, location, input.ctx.zone, registry, table).map_err(Exclusion::Conflict)?;
    for (index, condition) in def.conditions.iter().enumerate() {
        if !condition_holds(condition, &input.ctx, registry, rng) {
            return Err(Exclusion::Condition(index));
        }
    }
    Ok(())
}

/// Eligible candidates in trial order.
pub fn eligible<'r, R: Rng + ?Sized>(
    registry: &'r Registry,
    input: &SpawnInput<'_>,
    table: &OccupancyTable,
    state: &SchedulerState,
    rng: &mut R,
) -> Vec<&'r CharacterDefinition> {
    let mut candidates: Vec<&CharacterDefinition> = registry
        .iter()
        .filter(|def| match check_candidate(def, input, registry, table, state, rng) {
            Ok(()) => true,
            Err(reason) => {
                debug!(character = %def.id, location = %input.ctx.location, ?reason, "Candidate excluded");
                false
            }
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.priority()
            .cmp(&a.priority())
            .then_with(|| OrderedFloat(b.probability).cmp(&OrderedFloat(a.probability)))
            .then_with(|| a.id.cmp(&b.id))
    });
    candidates
}

/// Run the sequential trials. Returns the winner, if any.
pub fn select<'r, R: Rng + ?Sized>(
    candidates: &[&'r CharacterDefinition],
    rng: &mut R,
) -> Option<&'r CharacterDefinition> {
    candidates
        .iter()
        .copied()
        .find(|def| rng.gen_bool(clamp_probability(def.probability)))
}
