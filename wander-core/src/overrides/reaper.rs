//! The Reaper: primary override character.
//!
//! Spawn probability starts at a small base rate and escalates while the
//! player's rudeness or a flagged item is observed:
//!
//! | Trigger                | Probability | Window        |
//! |------------------------|-------------|---------------|
//! | none                   | base (0.05) | -             |
//! | rudeness flag          | 0.50        | 3 transitions |
//! | flagged item carried   | 0.75        | 2 transitions |
//! | both windows open      | 1.00        | -             |
//!
//! Outside an open window the Reaper also respects a minimum gap since its
//! last spawn.

use rand::Rng;

use super::{OverrideDecision, OverrideInput, OverrideKind, clamp_probability};
use crate::config::{ReaperConfig, TriggersConfig};
use crate::state::{OccupantKind, ReaperCounters};

/// Decision plus the counters to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct ReaperEvaluation {
    /// The decision.
    pub decision: OverrideDecision,
    /// Counters after observing this transition's triggers.
    pub counters: ReaperCounters,
}

/// Probability for this transition given which windows are open.
#[must_use]
pub fn trigger_probability(config: &ReaperConfig, rudeness_open: bool, item_open: bool) -> f64 {
    let p = match (rudeness_open, item_open) {
        (true, true) => 1.0,
        (true, false) => config.rudeness_probability,
        (false, true) => config.item_probability,
        (false, false) => config.base_probability,
    };
    clamp_probability(p)
}

/// Observe this transition's triggers and compute the probability, without
/// deciding on a spawn. Counters are returned, not written.
#[must_use]
pub fn escalation(
    config: &ReaperConfig,
    triggers: &TriggersConfig,
    input: &OverrideInput<'_>,
    counters: &ReaperCounters,
) -> (ReaperCounters, bool, f64) {
    let rude = input.player.flag_is_set(&triggers.rudeness_flag);
    let carrying = input.player.carries_any(&triggers.flagged_items);

    let (rudeness, rudeness_open) =
        counters
            .rudeness
            .observe(rude, input.transition, config.rudeness_window);
    let (item, item_open) = counters
        .item
        .observe(carrying, input.transition, config.item_window);

    let trigger_open = rudeness_open || item_open;
    let next = ReaperCounters {
        rudeness,
        item,
        trigger_streak: if trigger_open {
            counters.trigger_streak.saturating_add(1)
        } else {
            0
        },
        ..counters.clone()
    };
    (
        next,
        trigger_open,
        trigger_probability(config, rudeness_open, item_open),
    )
}

/// Evaluate whether the Reaper appears at the entered location.
pub fn evaluate<R: Rng + ?Sized>(
    config: &ReaperConfig,
    triggers: &TriggersConfig,
    input: &OverrideInput<'_>,
    counters: &ReaperCounters,
    rng: &mut R,
) -> ReaperEvaluation {
    let (next, trigger_open, probability) = escalation(config, triggers, input, counters);
    let refuse = |reason| ReaperEvaluation {
        decision: OverrideDecision::refuse(reason),
        counters: next.clone(),
    };

    if config
        .safe_locations
        .iter()
        .any(|safe| safe == input.location.as_str())
    {
        return refuse("safe location");
    }
    if counters.active_at.is_some() || counters.sequence.is_some() {
        return refuse("already active");
    }
    if input
        .occupant
        .is_some_and(|occ| matches!(occ.kind, OccupantKind::Override(k) if k != OverrideKind::Reaper))
    {
        return refuse("location held by another override");
    }
    if !trigger_open {
        if let Some(last) = counters.last_spawn {
            if input.transition.saturating_sub(last) < config.min_gap_transitions {
                return refuse("minimum gap not reached");
            }
        }
    }

    let should_spawn = rng.gen_bool(probability);
    ReaperEvaluation {
        decision: OverrideDecision {
            should_spawn,
            probability,
            reason: if should_spawn { "draw succeeded" } else { "draw failed" },
        },
        counters: next,
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::state::Occupant;
    use crate::types::{LocationId, PlayerSnapshot, SimTime};
    use crate::zone::Zone;

    fn input<'a>(
        location: &'a LocationId,
        player: &'a PlayerSnapshot,
        transition: u64,
    ) -> OverrideInput<'a> {
        OverrideInput {
            location,
            zone: Zone::Common,
            player,
            transition,
            occupant: None,
        }
    }

    #[test]
    fn rudeness_escalates_for_three_transitions_then_resets() {
        let config = ReaperConfig::default();
        let triggers = TriggersConfig::default();
        let hall: LocationId = "hall".into();
        let rude = PlayerSnapshot::default().with_flag(triggers.rudeness_flag.clone(), true);
        let polite = PlayerSnapshot::default();

        let mut counters = ReaperCounters::default();
        let mut seen = Vec::new();
        for t in 1..=5 {
            let (next, _, p) = escalation(&config, &triggers, &input(&hall, &rude, t), &counters);
            counters = next;
            seen.push(p);
        }
        assert_eq!(seen, vec![0.5, 0.5, 0.5, 0.05, 0.05]);

        let (next, _, p) = escalation(&config, &triggers, &input(&hall, &polite, 6), &counters);
        assert!((p - 0.05).abs() < f64::EPSILON);
        let (_, _, p) = escalation(&config, &triggers, &input(&hall, &rude, 7), &next);
        assert!((p - 0.5).abs() < f64::EPSILON, "re-armed after the flag cleared");
    }

    #[test]
    fn flagged_item_escalates_for_two_transitions() {
        let config = ReaperConfig::default();
        let triggers = TriggersConfig::default();
        let hall: LocationId = "hall".into();
        let carrying = PlayerSnapshot::default().with_item(triggers.flagged_items[0].clone());

        let mut counters = ReaperCounters::default();
        let mut seen = Vec::new();
        for t in 1..=3 {
            let (next, _, p) =
                escalation(&config, &triggers, &input(&hall, &carrying, t), &counters);
            counters = next;
            seen.push(p);
        }
        assert_eq!(seen, vec![0.75, 0.75, 0.05]);
    }

    #[test]
    fn both_triggers_force_certain_spawn() {
        let config = ReaperConfig::default();
        let triggers = TriggersConfig::default();
        let hall: LocationId = "hall".into();
        let player = PlayerSnapshot::default()
            .with_flag(triggers.rudeness_flag.clone(), true)
            .with_item(triggers.flagged_items[0].clone());

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let eval = evaluate(
                &config,
                &triggers,
                &input(&hall, &player, 1),
                &ReaperCounters::default(),
                &mut rng,
            );
            assert!(eval.decision.should_spawn);
            assert!((eval.decision.probability - 1.0).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn safe_locations_and_active_state_refuse() {
        let config = ReaperConfig::default();
        let triggers = TriggersConfig::default();
        let mut rng = StdRng::seed_from_u64(1);
        let player = PlayerSnapshot::default();

        let start: LocationId = "start".into();
        let eval = evaluate(&config, &triggers, &input(&start, &player, 1), &ReaperCounters::default(), &mut rng);
        assert_eq!(eval.decision.reason, "safe location");

        let hall: LocationId = "hall".into();
        let active = ReaperCounters {
            active_at: Some("attic".into()),
            ..ReaperCounters::default()
        };
        let eval = evaluate(&config, &triggers, &input(&hall, &player, 1), &active, &mut rng);
        assert_eq!(eval.decision.reason, "already active");
    }

    #[test]
    fn minimum_gap_applies_without_trigger_only() {
        let config = ReaperConfig {
            base_probability: 1.0,
            ..ReaperConfig::default()
        };
        let triggers = TriggersConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        let hall: LocationId = "hall".into();
        let recent = ReaperCounters {
            last_spawn: Some(8),
            ..ReaperCounters::default()
        };

        let calm = PlayerSnapshot::default();
        let eval = evaluate(&config, &triggers, &input(&hall, &calm, 10), &recent, &mut rng);
        assert_eq!(eval.decision.reason, "minimum gap not reached");

        let eval = evaluate(&config, &triggers, &input(&hall, &calm, 13), &recent, &mut rng);
        assert!(eval.decision.should_spawn);

        let rude = PlayerSnapshot::default().with_flag(triggers.rudeness_flag.clone(), true);
        let forced = ReaperConfig {
            rudeness_probability: 1.0,
            ..config
        };
        let eval = evaluate(&forced, &triggers, &input(&hall, &rude, 10), &recent, &mut rng);
        assert!(eval.decision.should_spawn, "open trigger bypasses the gap");
    }

    #[test]
    fn librarian_holding_location_blocks_reaper() {
        let config = ReaperConfig::default();
        let triggers = TriggersConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        let stacks: LocationId = "lib_stacks".into();
        let player = PlayerSnapshot::default();
        let librarian = Occupant {
            id: "librarian".into(),
            kind: OccupantKind::Override(OverrideKind::Librarian),
            since_transition: 0,
            since: SimTime::ZERO,
        };
        let mut inp = input(&stacks, &player, 1);
        inp.occupant = Some(&librarian);
        let eval = evaluate(&config, &triggers, &inp, &ReaperCounters::default(), &mut rng);
        assert!(!eval.decision.should_spawn);
    }
}
