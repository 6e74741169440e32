//! Property-Based Tests for the WANDER scheduler.
//!
//! Random walks over a small map with random player state and random time
//! steps. After every step the occupancy table must satisfy the structural
//! invariants, whatever the RNG did.

use std::time::Duration;

use proptest::prelude::*;

use wander_core::state::{OccupancyTable, OccupantKind, SchedulerState};
use wander_core::{
    Director, LocationId, LocationMeta, NullSink, PlayerSnapshot, Registry, WanderConfig, Zone,
};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn map() -> Vec<(LocationId, LocationMeta)> {
    vec![
        ("start".into(), LocationMeta::default()),
        ("hall".into(), LocationMeta::default()),
        ("lib_stacks".into(), LocationMeta::default()),
        ("reading_room".into(), LocationMeta::tagged(Zone::Library)),
        ("garden_path".into(), LocationMeta::default()),
        ("chapel_nave".into(), LocationMeta::default()),
        ("house_kitchen".into(), LocationMeta::default()),
        ("puzzle_gallery".into(), LocationMeta::default()),
        (
            "cellar".into(),
            LocationMeta::described("Cellar", "A dark, damp room under the stairs."),
        ),
    ]
}

#[derive(Debug, Clone)]
struct Step {
    location: usize,
    wait_secs: u64,
    rude: bool,
    carrying: bool,
    escalated: bool,
    owes: bool,
}

fn arb_step(locations: usize) -> impl Strategy<Value = Step> {
    (0..locations, 0..90u64, any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(location, wait_secs, rude, carrying, escalated, owes)| Step {
            location,
            wait_secs,
            rude,
            carrying,
            escalated,
            owes,
        },
    )
}

fn snapshot(step: &Step, visited: &[LocationId]) -> PlayerSnapshot {
    let mut player = PlayerSnapshot {
        visited: visited.to_vec(),
        ..PlayerSnapshot::default()
    }
    .with_flag("was_rude", step.rude)
    .with_flag("feud_escalated", step.escalated)
    .with_flag("puzzles_solved", 2_i64);
    if step.carrying {
        player = player.with_item("stolen_hourglass");
    }
    if step.owes {
        player = player.with_item("unpaid_bill");
    }
    player
}

// ---------------------------------------------------------------------------
// Invariant checks
// ---------------------------------------------------------------------------

fn check_invariants(table: &OccupancyTable, state: &SchedulerState, registry: &Registry) -> Result<(), String> {
    let mut seen = std::collections::BTreeMap::new();
    for (location, record) in table.iter() {
        let present = record.present();
        if record.encounter.is_none() && present.len() > 1 {
            return Err(format!("{location}: {} occupants outside an encounter", present.len()));
        }
        if record.encounter.is_some() && record.occupant.is_none() {
            return Err(format!("{location}: encounter without a primary occupant"));
        }
        for id in &present {
            if let Some(other) = seen.insert(id.clone(), location.clone()) {
                return Err(format!("{id} present at both {other} and {location}"));
            }
        }
        if record.encounter.is_none() {
            for a in &present {
                for b in &present {
                    let conflict = registry.get(a).is_some_and(|def| def.cannot_coexist_with(b));
                    if conflict {
                        return Err(format!("{a} and {b} co-occupy {location}"));
                    }
                }
            }
        }
        if let Some(occ) = &record.occupant {
            if occ.kind == OccupantKind::Ambient {
                if let Some(until) = state.cooldown_until(&occ.id) {
                    if until > occ.since && record.encounter.is_none() {
                        return Err(format!("{} arrived at {} while cooling down", occ.id, occ.since));
                    }
                }
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn thousand_transitions_keep_occupancy_invariants(
        seed in any::<u64>(),
        steps in proptest::collection::vec(arb_step(9), 1000),
    ) {
        let mut config = WanderConfig::default();
        config.general.seed = Some(seed);
        let registry = Registry::builtin();
        let mut d = Director::new(registry.clone(), config, NullSink);
        let map = map();
        let mut visited: Vec<LocationId> = Vec::new();
        let mut last = 0;

        for step in &steps {
            let (location, meta) = &map[step.location];
            visited.push(location.clone());
            let transition = d.enter_location(location, meta.clone(), &snapshot(step, &visited));
            prop_assert!(transition > last, "transition counter went backwards");
            last = transition;

            if let Err(violation) = check_invariants(d.occupancy(), d.state(), &registry) {
                prop_assert!(false, "after entering {}: {}", location, violation);
            }

            d.advance(Duration::from_secs(step.wait_secs));
            if let Err(violation) = check_invariants(d.occupancy(), d.state(), &registry) {
                prop_assert!(false, "after waiting {}s: {}", step.wait_secs, violation);
            }
        }
    }

    #[test]
    fn same_seed_same_session(
        seed in any::<u64>(),
        steps in proptest::collection::vec(arb_step(9), 50),
    ) {
        let run = || {
            let mut config = WanderConfig::default();
            config.general.seed = Some(seed);
            let mut d = Director::new(Registry::builtin(), config, wander_core::RecordingSink::new());
            let map = map();
            let mut visited = Vec::new();
            for step in &steps {
                let (location, meta) = &map[step.location];
                visited.push(location.clone());
                d.enter_location(location, meta.clone(), &snapshot(step, &visited));
                d.advance(Duration::from_secs(step.wait_secs));
            }
            let lines: Vec<String> = d.sink().lines().iter().map(|s| (*s).to_string()).collect();
            lines
        };
        prop_assert_eq!(run(), run());
    }
}
