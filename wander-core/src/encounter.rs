//! Encounter Orchestrator data: classification, the static effect table,
//! and the history ring buffer.
//!
//! The director owns the timing (opening line now, three staged lines at a
//! fixed spacing, closing line at `duration`); this module decides *what*
//! happens.

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::TriggersConfig;
use crate::registry::{Archetype, CharacterDefinition};
use crate::types::{CharacterId, EncounterId, FlagValue, LocationId, PlayerSnapshot, SimTime, secs};

// ---------------------------------------------------------------------------
// Kinds and the static table
// ---------------------------------------------------------------------------

/// Encounter type. Closed set; every lookup is an exhaustive match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncounterKind {
    /// A mediator smooths things over.
    Calming,
    /// Escalated rivals square off.
    Standoff,
    /// A dangerous character turns on a provoking player.
    Threat,
    /// Evenly matched rivals bicker.
    Argument,
    /// Two strangers eye each other.
    Tension,
}

impl fmt::Display for EncounterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Calming => "calming",
            Self::Standoff => "standoff",
            Self::Threat => "threat",
            Self::Argument => "argument",
            Self::Tension => "tension",
        };
        f.write_str(s)
    }
}

/// Static description of one encounter type.
#[derive(Debug)]
pub struct EncounterProfile {
    /// Seconds from start to the closing line.
    pub duration_secs: f64,
    /// Applied to the player once.
    pub health_delta: Option<i64>,
    /// Flags set to `true` once.
    pub flags: &'static [&'static str],
    /// Achievements unlocked once.
    pub unlocks: &'static [&'static str],
    /// Narrative outcome recorded in history.
    pub outcome: &'static str,
    /// Opening line, then three staged lines. `{a}` is the primary, `{b}` the other.
    pub lines: [&'static str; 4],
    /// Closing line.
    pub closing: &'static str,
}

static CALMING: EncounterProfile = EncounterProfile {
    duration_secs: 8.0,
    health_delta: Some(5),
    flags: &["witnessed_calming"],
    unlocks: &[],
    outcome: "Tempers cooled.",
    lines: [
        "{a} and {b} notice each other. The air tightens, then {a} raises a calming hand.",
        "\"There is no need for any of this,\" {a} says softly.",
        "{b} hesitates, then nods.",
        "Somewhere, a kettle begins to sing.",
    ],
    closing: "The moment passes. {b} excuses themself, and the room feels warmer.",
};

static STANDOFF: EncounterProfile = EncounterProfile {
    duration_secs: 12.0,
    health_delta: None,
    flags: &["witnessed_standoff"],
    unlocks: &["caught_in_the_crossfire"],
    outcome: "A standoff that no one won.",
    lines: [
        "{a} and {b} stop dead. This has been coming for a long time.",
        "Neither of them blinks.",
        "\"Say it,\" {b} breathes. \"Go on.\"",
        "{a} takes a single step forward.",
    ],
    closing: "{b} breaks first and leaves without a word. {a} does not watch them go.",
};

static THREAT: EncounterProfile = EncounterProfile {
    duration_secs: 10.0,
    health_delta: Some(-10),
    flags: &["threatened"],
    unlocks: &["looked_it_in_the_eye"],
    outcome: "The player was made an example of.",
    lines: [
        "{a} turns, slowly, away from {b} and toward you.",
        "\"You should not have come here like that,\" {a} says.",
        "{b} takes a careful step back.",
        "Something cold brushes the back of your neck.",
    ],
    closing: "{a} lets the silence finish the sentence. {b} is already gone.",
};

static ARGUMENT: EncounterProfile = EncounterProfile {
    duration_secs: 9.0,
    health_delta: None,
    flags: &["witnessed_argument"],
    unlocks: &[],
    outcome: "An argument, unresolved.",
    lines: [
        "{a} and {b} spot each other and both start talking at once.",
        "\"That is not what I said and you know it,\" {b} snaps.",
        "{a} counts off grievances on their fingers.",
        "You could probably leave. No one would notice.",
    ],
    closing: "{b} throws up their hands and storms off. {a} looks pleased with themself.",
};

static TENSION: EncounterProfile = EncounterProfile {
    duration_secs: 7.0,
    health_delta: None,
    flags: &[],
    unlocks: &[],
    outcome: "An awkward silence.",
    lines: [
        "{a} and {b} regard each other warily.",
        "Nobody says anything.",
        "{b} clears their throat.",
        "{a} pointedly examines the ceiling.",
    ],
    closing: "{b} mumbles something and leaves. {a} relaxes a little.",
};

/// Static table lookup.
#[must_use]
pub fn profile(kind: EncounterKind) -> &'static EncounterProfile {
    match kind {
        EncounterKind::Calming => &CALMING,
        EncounterKind::Standoff => &STANDOFF,
        EncounterKind::Threat => &THREAT,
        EncounterKind::Argument => &ARGUMENT,
        EncounterKind::Tension => &TENSION,
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

fn rivals(a: &CharacterDefinition, b: &CharacterDefinition) -> bool {
    (a.archetype() == Archetype::Rival && b.archetype() == Archetype::Rival)
        || a.cannot_coexist_with(&b.id)
        || b.cannot_coexist_with(&a.id)
}

fn rival_pairs<'a>(
    participants: &'a [&'a CharacterDefinition],
) -> impl Iterator<Item = (&'a CharacterDefinition, &'a CharacterDefinition)> + 'a {
    participants.iter().enumerate().flat_map(move |(i, a)| {
        participants[i + 1..]
            .iter()
            .filter(move |b| rivals(a, b))
            .map(move |b| (*a, *b))
    })
}

/// Classify an encounter. First match wins:
/// mediator → calming; escalated rivals → standoff; provoked threat →
/// threat; evenly matched rivals → argument; otherwise tension.
#[must_use]
pub fn classify(
    participants: &[&CharacterDefinition],
    player: &PlayerSnapshot,
    triggers: &TriggersConfig,
    comparable_priority_gap: i32,
) -> EncounterKind {
    let has = |archetype| participants.iter().any(|p| p.archetype() == archetype);

    if has(Archetype::Mediator) {
        return EncounterKind::Calming;
    }
    let mut pairs = rival_pairs(participants).peekable();
    let any_rivals = pairs.peek().is_some();
    if any_rivals && player.flag_is_set(&triggers.escalation_flag) {
        return EncounterKind::Standoff;
    }
    let provoked = player.flag_is_set(&triggers.rudeness_flag)
        || player.carries_any(&triggers.flagged_items);
    if has(Archetype::Threat) && provoked {
        return EncounterKind::Threat;
    }
    if pairs.any(|(a, b)| (a.priority() - b.priority()).abs() <= comparable_priority_gap) {
        return EncounterKind::Argument;
    }
    EncounterKind::Tension
}

// ---------------------------------------------------------------------------
// Concrete encounter
// ---------------------------------------------------------------------------

/// Mutations applied once when an encounter starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterEffect {
    /// Player health change.
    pub health_delta: Option<i64>,
    /// Flags to set.
    pub flags: Vec<(String, FlagValue)>,
    /// Achievements to unlock.
    pub unlocks: Vec<String>,
    /// Narrative outcome.
    pub outcome: String,
}

/// One encounter, ready to run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterConfig {
    /// Type.
    pub kind: EncounterKind,
    /// Participants, primary first.
    pub participants: Vec<CharacterId>,
    /// Start to closing line.
    pub duration: Duration,
    /// Effects.
    pub effect: EncounterEffect,
}

impl EncounterConfig {
    /// Instantiate the static profile for `kind`.
    ///
    /// Arguments raise the escalation flag, so the next meeting of the same
    /// rivals becomes a standoff; calming clears it.
    #[must_use]
    pub fn build(
        kind: EncounterKind,
        participants: Vec<CharacterId>,
        triggers: &TriggersConfig,
    ) -> Self {
        let profile = profile(kind);
        let mut flags: Vec<(String, FlagValue)> = profile
            .flags
            .iter()
            .map(|f| ((*f).to_string(), FlagValue::Bool(true)))
            .collect();
        match kind {
            EncounterKind::Argument => {
                flags.push((triggers.escalation_flag.clone(), FlagValue::Bool(true)));
            }
            EncounterKind::Calming => {
                flags.push((triggers.escalation_flag.clone(), FlagValue::Bool(false)));
            }
            EncounterKind::Standoff | EncounterKind::Threat | EncounterKind::Tension => {}
        }

        Self {
            kind,
            participants,
            duration: secs(profile.duration_secs),
            effect: EncounterEffect {
                health_delta: profile.health_delta,
                flags,
                unlocks: profile.unlocks.iter().map(|u| (*u).to_string()).collect(),
                outcome: profile.outcome.to_string(),
            },
        }
    }
}

/// Fill `{a}` and `{b}` with the first two names.
#[must_use]
pub fn render(template: &str, names: &[String]) -> String {
    let a = names.first().map_or("someone", String::as_str);
    let b = names.get(1).map_or("someone else", String::as_str);
    template.replace("{a}", a).replace("{b}", b)
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Entry in the encounter history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EncounterRecord {
    /// Encounter run id.
    pub id: EncounterId,
    /// Where.
    pub location: LocationId,
    /// Type.
    pub kind: EncounterKind,
    /// Who.
    pub participants: Vec<CharacterId>,
    /// Simulated start time.
    pub at: SimTime,
    /// Wall-clock time, for save metadata and debugging.
    pub recorded_at: DateTime<Utc>,
    /// Outcome text.
    pub outcome: String,
}

/// Capped ring buffer; the oldest record is evicted past capacity.
#[derive(Debug, Clone, Serialize)]
pub struct EncounterHistory {
    records: VecDeque<EncounterRecord>,
    capacity: usize,
}

impl EncounterHistory {
    /// Create a buffer holding at most `capacity` records (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest record if full.
    pub fn push(&mut self, record: EncounterRecord) {
        while self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Records, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &EncounterRecord> {
        self.records.iter()
    }

    /// Most recent record.
    #[must_use]
    pub fn latest(&self) -> Option<&EncounterRecord> {
        self.records.back()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::Registry;

    fn defs<'a>(registry: &'a Registry, ids: &[&str]) -> Vec<&'a CharacterDefinition> {
        ids.iter()
            .filter_map(|id| registry.get(&(*id).into()))
            .collect()
    }

    #[test]
    fn mediator_always_calms() {
        let registry = Registry::builtin();
        let triggers = TriggersConfig::default();
        let player = PlayerSnapshot::default()
            .with_flag(triggers.escalation_flag.clone(), true)
            .with_flag(triggers.rudeness_flag.clone(), true);
        let kind = classify(&defs(&registry, &["librarian", "reaper"]), &player, &triggers, 1);
        assert_eq!(kind, EncounterKind::Calming);
    }

    #[test]
    fn escalated_rivals_stand_off_otherwise_argue() {
        let registry = Registry::builtin();
        let triggers = TriggersConfig::default();
        let pair = defs(&registry, &["sculptor", "critic"]);

        let calm = PlayerSnapshot::default();
        assert_eq!(classify(&pair, &calm, &triggers, 1), EncounterKind::Argument);

        let escalated = calm.with_flag(triggers.escalation_flag.clone(), true);
        assert_eq!(classify(&pair, &escalated, &triggers, 1), EncounterKind::Standoff);
    }

    #[test]
    fn provoked_threat_beats_argument() {
        let registry = Registry::builtin();
        let triggers = TriggersConfig::default();
        let participants = defs(&registry, &["bailiff", "cat"]);

        let calm = PlayerSnapshot::default();
        assert_eq!(classify(&participants, &calm, &triggers, 1), EncounterKind::Tension);

        let carrying = calm.with_item(triggers.flagged_items[0].clone());
        assert_eq!(classify(&participants, &carrying, &triggers, 1), EncounterKind::Threat);
    }

    #[test]
    fn cannot_coexist_pair_counts_as_rivals() {
        let registry = Registry::builtin();
        let triggers = TriggersConfig::default();
        // ghost (priority 4) and priest (priority 5) are linked by cannot_coexist,
        // but the priest is a mediator, so calming wins.
        let participants = defs(&registry, &["ghost", "priest"]);
        assert_eq!(
            classify(&participants, &PlayerSnapshot::default(), &triggers, 1),
            EncounterKind::Calming
        );
    }

    #[test]
    fn unequal_rivals_do_not_argue() {
        let registry = Registry::builtin();
        let triggers = TriggersConfig::default();
        let pair = defs(&registry, &["sculptor", "critic"]);
        // A negative gap means no pair is ever comparable.
        assert_eq!(
            classify(&pair, &PlayerSnapshot::default(), &triggers, -1),
            EncounterKind::Tension
        );
    }

    #[test]
    fn argument_raises_escalation_and_calming_clears_it() {
        let triggers = TriggersConfig::default();
        let argument = EncounterConfig::build(EncounterKind::Argument, vec![], &triggers);
        assert!(argument
            .effect
            .flags
            .contains(&(triggers.escalation_flag.clone(), FlagValue::Bool(true))));

        let calming = EncounterConfig::build(EncounterKind::Calming, vec![], &triggers);
        assert!(calming
            .effect
            .flags
            .contains(&(triggers.escalation_flag.clone(), FlagValue::Bool(false))));
        assert_eq!(calming.duration, Duration::from_secs(8));
    }

    #[test]
    fn every_profile_outlasts_its_staged_lines() {
        for kind in [
            EncounterKind::Calming,
            EncounterKind::Standoff,
            EncounterKind::Threat,
            EncounterKind::Argument,
            EncounterKind::Tension,
        ] {
            assert!(profile(kind).duration_secs > 4.5, "{kind} too short");
        }
    }

    #[test]
    fn render_fills_names() {
        let names = vec!["Ines".to_string(), "Mr. Pell".to_string()];
        assert_eq!(render("{a} glares at {b}.", &names), "Ines glares at Mr. Pell.");
        assert_eq!(render("{a} waits.", &[]), "someone waits.");
    }

    #[test]
    fn history_evicts_oldest() {
        let mut history = EncounterHistory::new(2);
        for i in 0..3u64 {
            history.push(EncounterRecord {
                id: EncounterId::new(),
                location: "hall".into(),
                kind: EncounterKind::Tension,
                participants: vec![],
                at: SimTime::from_secs(i),
                recorded_at: Utc::now(),
                outcome: String::new(),
            });
        }
        assert_eq!(history.len(), 2);
        let times: Vec<_> = history.iter().map(|r| r.at).collect();
        assert_eq!(times, vec![SimTime::from_secs(1), SimTime::from_secs(2)]);
    }
}
