//! Integration Tests: end-to-end scheduler flows through the `Director`.
//!
//! Every scenario pins the RNG seed and, where randomness would get in the
//! way, sets probabilities to exactly 0 or 1 so outcomes are certain.

use std::collections::BTreeSet;
use std::time::Duration;

use wander_core::registry::{Archetype, CharacterDefinition, ConflictRule, DisplaceTarget, Personality};
use wander_core::{
    CharacterId, Director, Effect, EncounterKind, FlagValue, LocationId, LocationMeta,
    PlayerSnapshot, RecordingSink, Registry, SimTime, UtteranceOutcome, WanderConfig, WanderError,
    Zone,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn character(
    id: &str,
    name: &str,
    archetype: Archetype,
    priority: i32,
    probability: f64,
    zones: &[Zone],
) -> CharacterDefinition {
    CharacterDefinition {
        id: id.into(),
        name: name.to_string(),
        entry: format!("{name} arrives."),
        exit: format!("{name} leaves."),
        personality: Personality {
            traits: BTreeSet::new(),
            archetype,
            priority,
        },
        conditions: Vec::new(),
        conflicts: Vec::new(),
        preferred_zones: zones.iter().copied().collect(),
        probability,
    }
}

fn overrides() -> Vec<CharacterDefinition> {
    vec![
        character("reaper", "the Reaper", Archetype::Threat, 10, 0.05, &Zone::ALL),
        character("librarian", "Mrs. Alder", Archetype::Mediator, 8, 0.8, &[Zone::Library]),
    ]
}

fn registry_with(extra: Vec<CharacterDefinition>) -> Registry {
    let mut defs = overrides();
    defs.extend(extra);
    Registry::new(defs).expect("valid registry")
}

/// Deterministic config: no random Reaper, no random departures.
fn quiet_config(seed: u64) -> WanderConfig {
    let mut config = WanderConfig::default();
    config.general.seed = Some(seed);
    config.reaper.base_probability = 0.0;
    config.librarian.probability = 0.0;
    config.timing.departure_chance = 0.0;
    config.timing.stay_anyway_chance = 1.0;
    config
}

fn hob() -> CharacterDefinition {
    character("hob", "Old Hob", Archetype::Wanderer, 2, 1.0, &[Zone::Common, Zone::Library])
}

fn rivals(probability: f64) -> Vec<CharacterDefinition> {
    let mut sculptor = character("sculptor", "Ines", Archetype::Rival, 3, probability, &[Zone::Common]);
    sculptor.conflicts = vec![ConflictRule::Displaces {
        target: DisplaceTarget::Character("critic".into()),
    }];
    let critic = character("critic", "Mr. Pell", Archetype::Rival, 3, probability, &[Zone::Common]);
    vec![sculptor, critic]
}

fn hall() -> LocationId {
    "hall".into()
}

fn enter(d: &mut Director<RecordingSink>, location: &str) -> u64 {
    d.enter_location(&location.into(), LocationMeta::default(), &PlayerSnapshot::default())
}

fn count_lines(d: &Director<RecordingSink>, needle: &str) -> usize {
    d.sink().lines().iter().filter(|l| l.contains(needle)).count()
}

fn ids(list: &[&str]) -> Vec<CharacterId> {
    list.iter().map(|s| CharacterId::new(*s)).collect()
}

// ---------------------------------------------------------------------------
// Selection
// ---------------------------------------------------------------------------

#[test]
fn certain_candidate_spawns_and_stays_alone() {
    let mut d = Director::new(registry_with(vec![hob()]), quiet_config(1), RecordingSink::new());
    enter(&mut d, "hall");
    assert_eq!(d.get_active(&hall()), ids(&["hob"]));

    for _ in 0..5 {
        enter(&mut d, "hall");
        assert_eq!(d.get_active(&hall()), ids(&["hob"]));
    }
    assert_eq!(count_lines(&d, "Old Hob arrives."), 1);
}

#[test]
fn zero_probability_candidate_never_spawns() {
    let never = character("never", "Nobody", Archetype::Wanderer, 9, 0.0, &Zone::ALL);
    let mut d = Director::new(registry_with(vec![never]), quiet_config(2), RecordingSink::new());
    for i in 0..50 {
        let location = format!("room_{i}");
        enter(&mut d, &location);
        assert!(!d.is_active(&location.as_str().into()));
    }
}

#[test]
fn active_override_suppresses_general_evaluator() {
    let mut pushy = hob();
    pushy.conflicts = vec![ConflictRule::Displaces { target: DisplaceTarget::Always }];
    let mut config = quiet_config(3);
    config.librarian.probability = 1.0;
    let mut d = Director::new(registry_with(vec![pushy]), config, RecordingSink::new());

    for _ in 0..10 {
        enter(&mut d, "lib_stacks");
        assert_eq!(d.get_active(&"lib_stacks".into()), ids(&["librarian"]));
    }
    assert!(d.history().is_empty());
}

#[test]
fn override_leaves_when_player_moves_on() {
    let mut config = quiet_config(4);
    config.librarian.probability = 1.0;
    let mut d = Director::new(registry_with(vec![]), config, RecordingSink::new());

    enter(&mut d, "lib_stacks");
    assert!(d.is_active(&"lib_stacks".into()));
    enter(&mut d, "hall");
    assert!(!d.is_active(&"lib_stacks".into()));
    assert!(d.state().librarian.active_at.is_none());
    assert_eq!(count_lines(&d, "Mrs. Alder leaves."), 1);
}

#[test]
fn librarian_displaces_reaper_in_library() {
    let mut config = quiet_config(5);
    config.reaper.base_probability = 1.0;
    config.reaper.safe_locations.clear();
    config.librarian.probability = 1.0;
    let mut d = Director::new(registry_with(vec![]), config, RecordingSink::new());

    enter(&mut d, "lib_stacks");
    assert_eq!(d.get_active(&"lib_stacks".into()), ids(&["reaper"]), "reaper spawned first");

    enter(&mut d, "lib_stacks");
    assert_eq!(d.get_active(&"lib_stacks".into()), ids(&["librarian"]));
    assert!(d.state().reaper.active_at.is_none());
    assert!(d.history().is_empty(), "override replacement is not an encounter");
}

// ---------------------------------------------------------------------------
// Departures and cooldowns
// ---------------------------------------------------------------------------

#[test]
fn overstaying_character_departs_and_cools_down() {
    let mut config = quiet_config(6);
    config.timing.max_stay_secs = 30.0;
    let mut d = Director::new(registry_with(vec![hob()]), config, RecordingSink::new());

    enter(&mut d, "hall");
    d.advance(Duration::from_secs(60));
    assert!(!d.is_active(&hall()));
    assert_eq!(
        d.state().cooldown_until(&"hob".into()),
        Some(SimTime::from_secs(240))
    );

    enter(&mut d, "hall");
    assert!(!d.is_active(&hall()), "still cooling down");

    d.advance_to(SimTime::from_secs(240));
    enter(&mut d, "hall");
    assert_eq!(d.get_active(&hall()), ids(&["hob"]));
}

#[test]
fn forced_despawn_starts_cooldown() {
    let mut d = Director::new(registry_with(vec![hob()]), quiet_config(7), RecordingSink::new());
    enter(&mut d, "hall");
    assert_eq!(d.force_despawn(&hall()).expect("known"), ids(&["hob"]));

    d.advance(Duration::from_secs(179));
    enter(&mut d, "hall");
    assert!(!d.is_active(&hall()));

    d.advance(Duration::from_secs(1));
    enter(&mut d, "hall");
    assert!(d.is_active(&hall()));
}

#[test]
fn nan_departure_chance_is_treated_as_never() {
    let mut config = WanderConfig::from_toml("[timing]\ndeparture_chance = nan\n").expect("nan is valid toml");
    config.general.seed = Some(8);
    config.reaper.base_probability = 0.0;
    config.librarian.probability = 0.0;
    let mut d = Director::new(registry_with(vec![hob()]), config, RecordingSink::new());

    enter(&mut d, "hall");
    d.advance(Duration::from_secs(120));
    assert_eq!(d.get_active(&hall()), ids(&["hob"]));
}

#[test]
fn enormous_durations_saturate_instead_of_panicking() {
    let mut config = WanderConfig::from_toml(
        "[timing]\ncooldown_secs = 1e30\nmax_stay_secs = 30.0\nsweep_interval_secs = 1e300\n\
         [encounters]\nline_spacing_secs = 1e30\n",
    )
    .expect("large floats are valid toml");
    config.general.seed = Some(9);
    config.reaper.base_probability = 0.0;
    config.librarian.probability = 0.0;
    config.timing.departure_chance = 0.0;
    config.timing.stay_anyway_chance = 1.0;
    let mut d = Director::new(registry_with(vec![hob()]), config, RecordingSink::new());

    enter(&mut d, "hall");
    d.advance(Duration::from_secs(60));
    enter(&mut d, "hall");
    assert!(!d.is_active(&hall()), "overstayed and left");
    assert_eq!(d.state().cooldown_until(&"hob".into()), Some(SimTime(u64::MAX)));

    d.advance(Duration::from_secs(3_600));
    enter(&mut d, "hall");
    assert!(!d.is_active(&hall()), "cooldown never ends");
}

// ---------------------------------------------------------------------------
// Encounters
// ---------------------------------------------------------------------------

#[test]
fn displacing_arrival_runs_encounter_and_clears_marker_once() {
    let mut d = Director::new(registry_with(rivals(1.0)), quiet_config(8), RecordingSink::new());

    enter(&mut d, "hall");
    assert_eq!(d.get_active(&hall()), ids(&["critic"]));

    enter(&mut d, "hall");
    assert_eq!(d.get_active(&hall()), ids(&["sculptor", "critic"]));
    let record = d.history().latest().expect("history recorded at start");
    assert_eq!(record.kind, EncounterKind::Argument);
    assert_eq!(record.participants, ids(&["sculptor", "critic"]));
    assert_eq!(
        d.sink().count(|e| matches!(
            e,
            Effect::SetFlag { flag, value: FlagValue::Bool(true) } if flag == "feud_escalated"
        )),
        1
    );

    d.advance(Duration::from_millis(4_500));
    assert_eq!(count_lines(&d, "counts off grievances"), 1);

    d.advance(Duration::from_millis(4_499));
    assert!(d.occupancy().get(&hall()).is_some_and(|r| r.in_encounter()));
    assert_eq!(count_lines(&d, "storms off"), 0);

    d.advance(Duration::from_millis(1));
    assert!(!d.occupancy().get(&hall()).is_some_and(|r| r.in_encounter()));
    assert_eq!(d.get_active(&hall()), ids(&["sculptor"]));
    assert!(d.state().on_cooldown(&"critic".into(), d.now()));

    d.advance(Duration::from_secs(20));
    assert_eq!(count_lines(&d, "storms off"), 1, "closing line exactly once");
    assert_eq!(d.history().len(), 1);
}

#[test]
fn narrative_trigger_classifies_with_player_flags() {
    let mut d = Director::new(registry_with(rivals(0.0)), quiet_config(9), RecordingSink::new());
    let escalated = PlayerSnapshot::default().with_flag("feud_escalated", true);
    d.enter_location(&hall(), LocationMeta::default(), &escalated);

    let id = d
        .trigger_encounter(&hall(), &ids(&["critic", "sculptor"]))
        .expect("encounter starts");
    let record = d.history().latest().expect("recorded");
    assert_eq!(record.id, id);
    assert_eq!(record.kind, EncounterKind::Standoff);
    assert_eq!(record.participants, ids(&["critic", "sculptor"]), "tie goes to the first listed");
}

#[test]
fn forced_despawn_cancels_running_encounter() {
    let mut d = Director::new(registry_with(rivals(0.0)), quiet_config(10), RecordingSink::new());
    enter(&mut d, "hall");
    d.trigger_encounter(&hall(), &ids(&["sculptor", "critic"]))
        .expect("encounter starts");

    let removed = d.force_despawn(&hall()).expect("known");
    assert_eq!(removed, ids(&["sculptor", "critic"]));
    assert!(!d.is_active(&hall()));

    d.advance(Duration::from_secs(30));
    assert_eq!(count_lines(&d, "storms off"), 0);
    assert_eq!(count_lines(&d, "counts off grievances"), 0);
    assert!(d.state().on_cooldown(&"sculptor".into(), d.now()));
}

#[test]
fn forced_spawn_into_ambient_location_starts_encounter() {
    let mut d = Director::new(registry_with(rivals(0.0)), quiet_config(11), RecordingSink::new());
    enter(&mut d, "hall");
    d.force_spawn(&"critic".into(), &hall()).expect("empty location");
    d.force_spawn(&"sculptor".into(), &hall()).expect("ambient holder");
    assert_eq!(d.get_active(&hall()), ids(&["sculptor", "critic"]));
    assert_eq!(d.history().len(), 1);
}

// ---------------------------------------------------------------------------
// Administrative refusals
// ---------------------------------------------------------------------------

#[test]
fn admin_operations_refuse_cleanly() {
    let mut config = quiet_config(12);
    config.librarian.probability = 1.0;
    let mut d = Director::new(registry_with(rivals(0.0)), config, RecordingSink::new());

    assert!(matches!(
        d.force_spawn(&"nobody".into(), &hall()),
        Err(WanderError::CharacterNotFound(_))
    ));
    assert!(matches!(
        d.force_spawn(&"critic".into(), &"unvisited".into()),
        Err(WanderError::LocationNotFound(_))
    ));
    assert!(matches!(
        d.force_despawn(&"unvisited".into()),
        Err(WanderError::LocationNotFound(_))
    ));

    enter(&mut d, "lib_stacks");
    assert!(matches!(
        d.force_spawn(&"critic".into(), &"lib_stacks".into()),
        Err(WanderError::OverrideHeld { .. })
    ));

    enter(&mut d, "hall");
    d.trigger_encounter(&hall(), &ids(&["sculptor", "critic"]))
        .expect("encounter starts");
    assert!(matches!(
        d.force_spawn(&"hob".into(), &hall()),
        Err(WanderError::CharacterNotFound(_))
    ));
    assert!(matches!(
        d.force_spawn(&"librarian".into(), &hall()),
        Err(WanderError::EncounterActive { .. })
    ));

    enter(&mut d, "yard");
    assert!(matches!(
        d.force_spawn(&"critic".into(), &"yard".into()),
        Err(WanderError::AlreadyPresent { .. })
    ));
    assert!(matches!(
        d.trigger_encounter(&"yard".into(), &ids(&["librarian"])),
        Err(WanderError::NotEnoughParticipants(1))
    ));
}

#[test]
fn forced_override_replaces_the_other_override() {
    let mut config = quiet_config(13);
    config.librarian.probability = 1.0;
    let mut d = Director::new(registry_with(Vec::new()), config, RecordingSink::new());

    enter(&mut d, "lib_stacks");
    let stacks: LocationId = "lib_stacks".into();
    assert_eq!(d.get_active(&stacks), ids(&["librarian"]));

    d.force_spawn(&"reaper".into(), &stacks).expect("override may replace override");
    assert_eq!(d.get_active(&stacks), ids(&["reaper"]));
    assert!(d.state().librarian.active_at.is_none());
    assert_eq!(d.state().reaper.active_at.as_ref(), Some(&stacks));
    assert!(d.occupancy().get(&stacks).is_some_and(|r| !r.in_encounter()));
}

// ---------------------------------------------------------------------------
// Utterances and the safety net
// ---------------------------------------------------------------------------

fn awaiting(outcome: UtteranceOutcome) -> wander_core::ResponseTicket {
    match outcome {
        UtteranceOutcome::Awaiting(ticket) => ticket,
        other => panic!("expected a ticket, got {other:?}"),
    }
}

#[test]
fn safety_net_answers_a_reply_that_never_arrives() {
    let mut d = Director::new(registry_with(vec![hob()]), quiet_config(13), RecordingSink::new());
    enter(&mut d, "hall");

    let ticket = awaiting(d.handle_utterance(&"hob".into(), "Lovely weather.").expect("known"));
    assert_eq!(
        d.sink().count(|e| matches!(e, Effect::ResponsePending { pending: true, .. })),
        1
    );

    d.advance(Duration::from_secs(8));
    assert_eq!(count_lines(&d, "Old Hob seems to be having trouble responding."), 1);
    assert_eq!(
        d.sink().count(|e| matches!(e, Effect::ResponsePending { pending: false, .. })),
        1
    );

    assert!(!d.deliver_response::<String>(ticket.id, Ok("Too late.".into())));
    assert_eq!(count_lines(&d, "Too late."), 0);
}

#[test]
fn timely_reply_cancels_safety_net() {
    let mut d = Director::new(registry_with(vec![hob()]), quiet_config(14), RecordingSink::new());
    enter(&mut d, "hall");

    let ticket = awaiting(d.handle_utterance(&"hob".into(), "Evening.").expect("known"));
    d.advance(Duration::from_secs(3));
    assert!(d.deliver_response::<String>(ticket.id, Ok("Evening yourself.".into())));
    d.advance(Duration::from_secs(30));

    assert_eq!(count_lines(&d, "Evening yourself."), 1);
    assert_eq!(count_lines(&d, "trouble responding"), 0);
}

#[test]
fn failed_generation_becomes_fallback_line() {
    let mut d = Director::new(registry_with(vec![hob()]), quiet_config(15), RecordingSink::new());
    enter(&mut d, "hall");
    let ticket = awaiting(d.handle_utterance(&"hob".into(), "Hello?").expect("known"));
    assert!(d.deliver_response(ticket.id, Err("backend unreachable")));
    assert_eq!(count_lines(&d, "Old Hob seems to be having trouble responding."), 1);
}

#[test]
fn hostile_words_mark_the_player_rude() {
    let mut d = Director::new(registry_with(vec![hob()]), quiet_config(16), RecordingSink::new());
    enter(&mut d, "hall");
    let ticket = awaiting(d.handle_utterance(&"hob".into(), "Oh, shut up.").expect("known"));
    assert_eq!(ticket.tone, wander_core::Tone::Hostile);
    assert_eq!(
        d.sink().count(|e| matches!(e, Effect::SetFlag { flag, .. } if flag == "was_rude")),
        1
    );
}

#[test]
fn talking_to_someone_elsewhere_is_not_present() {
    let mut d = Director::new(registry_with(vec![hob()]), quiet_config(17), RecordingSink::new());
    enter(&mut d, "hall");
    enter(&mut d, "lib_stacks");
    assert_eq!(
        d.handle_utterance(&"hob".into(), "Hello?").expect("known"),
        UtteranceOutcome::NotPresent
    );
    assert!(matches!(
        d.handle_utterance(&"nobody".into(), "Hello?"),
        Err(WanderError::CharacterNotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// The Reaper
// ---------------------------------------------------------------------------

fn reaper_config(seed: u64) -> WanderConfig {
    let mut config = quiet_config(seed);
    config.reaper.base_probability = 1.0;
    config
}

#[test]
fn hostile_reply_runs_two_stage_removal() {
    let mut d = Director::new(registry_with(vec![]), reaper_config(18), RecordingSink::new());
    enter(&mut d, "hall");
    assert_eq!(d.get_active(&hall()), ids(&["reaper"]));

    let outcome = d.handle_utterance(&"reaper".into(), "Go away!").expect("known");
    assert_eq!(outcome, UtteranceOutcome::Scripted);
    assert_eq!(count_lines(&d, "candles gutter out"), 1);
    assert_eq!(d.sink().count(|e| matches!(e, Effect::HealthDelta { .. })), 0);

    d.advance(Duration::from_secs(2));
    assert_eq!(d.sink().count(|e| matches!(e, Effect::HealthDelta { amount: -100 })), 1);
    assert_eq!(
        d.sink().count(|e| matches!(e, Effect::UnlockAchievement { id } if id == "an_appointment_kept")),
        1
    );
    assert!(!d.is_active(&hall()));
    assert!(d.state().reaper.active_at.is_none());
    assert!(d.state().reaper.sequence.is_none());
}

#[test]
fn forced_transition_cancels_stage_two_and_safety_cap_clears() {
    let mut d = Director::new(registry_with(vec![]), reaper_config(19), RecordingSink::new());
    enter(&mut d, "hall");
    d.handle_utterance(&"reaper".into(), "I hate you").expect("known");

    enter(&mut d, "cellar");
    assert!(!d.is_active(&hall()));
    assert!(!d.is_active(&"cellar".into()), "no second Reaper mid-sequence");

    d.advance(Duration::from_secs(5));
    assert_eq!(d.sink().count(|e| matches!(e, Effect::HealthDelta { .. })), 0);
    assert!(d.state().reaper.sequence.is_some());

    d.advance(Duration::from_secs(5));
    assert!(d.state().reaper.sequence.is_none());
    assert!(d.state().reaper.active_at.is_none());
}

#[test]
fn courteous_reply_may_spare_the_player() {
    let mut config = reaper_config(20);
    config.reaper.spare_chance = 1.0;
    let mut d = Director::new(registry_with(vec![]), config, RecordingSink::new());
    enter(&mut d, "hall");

    d.handle_utterance(&"reaper".into(), "Please, thank you").expect("known");
    assert_eq!(
        d.sink().count(|e| matches!(e, Effect::SetFlag { flag, .. } if flag == "spared_by_reaper")),
        1
    );
    assert!(!d.is_active(&hall()));
}

#[test]
fn reaper_never_visits_safe_locations() {
    let mut d = Director::new(registry_with(vec![]), reaper_config(21), RecordingSink::new());
    for _ in 0..10 {
        enter(&mut d, "start");
        assert!(!d.is_active(&"start".into()));
        enter(&mut d, "chapel_nave");
        assert!(!d.is_active(&"chapel_nave".into()));
    }
}

// ---------------------------------------------------------------------------
// Statistical behaviour
// ---------------------------------------------------------------------------

/// Librarian at p = 0.8 over 100 independent library entries lands inside
/// the 99% interval of Binomial(100, 0.8).
#[test]
fn librarian_rate_matches_binomial_interval() {
    let mut config = WanderConfig::default();
    config.reaper.safe_locations.push("lib_stacks".into());

    let spawns = (0..100u64)
        .filter(|seed| {
            let mut config = config.clone();
            config.general.seed = Some(*seed);
            let mut d = Director::new(Registry::builtin(), config, RecordingSink::new());
            enter(&mut d, "lib_stacks");
            d.get_active(&"lib_stacks".into()) == ids(&["librarian"])
        })
        .count();
    assert!((70..=90).contains(&spawns), "librarian spawned {spawns} of 100");
}
