//! The built-in cast of wandering characters.

use std::collections::BTreeSet;

use crate::registry::{
    Archetype, CharacterDefinition, ConflictRule, DisplaceTarget, Personality, SpawnCondition,
};
use crate::types::CharacterId;
use crate::zone::Zone;

fn traits(words: &[&str]) -> BTreeSet<String> {
    words.iter().map(|w| (*w).to_string()).collect()
}

fn zones(list: &[Zone]) -> BTreeSet<Zone> {
    list.iter().copied().collect()
}

#[allow(clippy::too_many_arguments)]
fn character(
    id: &str,
    name: &str,
    entry: &str,
    exit: &str,
    archetype: Archetype,
    priority: i32,
    trait_words: &[&str],
    preferred: &[Zone],
    probability: f64,
) -> CharacterDefinition {
    CharacterDefinition {
        id: CharacterId::new(id),
        name: name.to_string(),
        entry: entry.to_string(),
        exit: exit.to_string(),
        personality: Personality {
            traits: traits(trait_words),
            archetype,
            priority,
        },
        conditions: Vec::new(),
        conflicts: Vec::new(),
        preferred_zones: zones(preferred),
        probability,
    }
}

/// Definitions for every character that ships with the game.
#[must_use]
pub fn builtin_cast() -> Vec<CharacterDefinition> {
    let reaper = character(
        "reaper",
        "the Reaper",
        "The temperature drops. A tall figure in black stands where no one stood a moment ago.",
        "The Reaper is simply not there any more.",
        Archetype::Threat,
        10,
        &["patient", "literal", "punctual"],
        &Zone::ALL,
        0.05,
    );

    let librarian = character(
        "librarian",
        "Mrs. Alder",
        "Mrs. Alder looks up from a ledger and lowers her spectacles.",
        "Mrs. Alder drifts back between the shelves.",
        Archetype::Mediator,
        8,
        &["stern", "kind", "quiet"],
        &[Zone::Library],
        0.8,
    );

    let mut gardener = character(
        "gardener",
        "Old Hob",
        "Old Hob wanders in, trailing soil and the smell of rain.",
        "Old Hob mutters about the roses and wanders off.",
        Archetype::Wanderer,
        2,
        &["patient", "forgetful"],
        &[Zone::Outdoor, Zone::Common],
        0.35,
    );
    gardener.conflicts = vec![ConflictRule::AvoidsZone { zone: Zone::Dark }];

    let mut cat = character(
        "cat",
        "Marmalade",
        "An orange cat pads in and sits as if it owns the place.",
        "Marmalade loses interest and leaves.",
        Archetype::Trickster,
        1,
        &["aloof", "curious"],
        &[Zone::Common, Zone::Residential, Zone::Library, Zone::Outdoor],
        0.5,
    );
    cat.conflicts = vec![ConflictRule::AvoidsZone { zone: Zone::Sacred }];

    let mut ghost = character(
        "ghost",
        "the Grey Lady",
        "A grey shape gathers itself out of the draught.",
        "The Grey Lady thins into nothing.",
        Archetype::Trickster,
        4,
        &["melancholy", "curious"],
        &[Zone::Dark, Zone::Residential, Zone::Library],
        0.25,
    );
    ghost.conditions = vec![SpawnCondition::VisitedAtLeast { count: 3 }];
    ghost.conflicts = vec![ConflictRule::CannotCoexist {
        other: CharacterId::new("priest"),
    }];

    let mut priest = character(
        "priest",
        "Father Quill",
        "Father Quill steps in, murmuring a blessing at the doorframe.",
        "Father Quill excuses himself.",
        Archetype::Mediator,
        5,
        &["gentle", "devout"],
        &[Zone::Sacred, Zone::Residential, Zone::Common],
        0.3,
    );
    priest.conflicts = vec![
        ConflictRule::CannotCoexist {
            other: CharacterId::new("ghost"),
        },
        ConflictRule::RequiresAbsence {
            other: CharacterId::new("reaper"),
        },
    ];

    let mut sculptor = character(
        "sculptor",
        "Ines the sculptor",
        "Ines strides in with clay under her nails, looking for something to criticise.",
        "Ines storms out.",
        Archetype::Rival,
        3,
        &["proud", "restless"],
        &[Zone::Common, Zone::Outdoor, Zone::Puzzle],
        0.3,
    );
    sculptor.conflicts = vec![ConflictRule::Displaces {
        target: DisplaceTarget::Character(CharacterId::new("critic")),
    }];

    let mut critic = character(
        "critic",
        "Mr. Pell",
        "Mr. Pell enters, notebook first.",
        "Mr. Pell snaps his notebook shut and leaves.",
        Archetype::Rival,
        3,
        &["vain", "precise"],
        &[Zone::Common, Zone::Library, Zone::Puzzle],
        0.3,
    );
    critic.conflicts = vec![ConflictRule::Displaces {
        target: DisplaceTarget::Character(CharacterId::new("sculptor")),
    }];

    let mut riddler = character(
        "riddler",
        "the Riddler",
        "Someone has left a note on the table. It is signed with a question mark, and then the Riddler is here too.",
        "The Riddler bows and is gone.",
        Archetype::Scholar,
        3,
        &["playful", "smug"],
        &[Zone::Puzzle, Zone::Library],
        0.4,
    );
    riddler.conditions = vec![SpawnCondition::FlagAtLeast {
        flag: "puzzles_solved".to_string(),
        threshold: 1,
    }];

    let mut bailiff = character(
        "bailiff",
        "the Bailiff",
        "Heavy boots. The Bailiff has come to collect.",
        "The Bailiff pockets his ledger and goes.",
        Archetype::Threat,
        6,
        &["relentless"],
        &[Zone::Common, Zone::Residential],
        0.15,
    );
    bailiff.conditions = vec![SpawnCondition::HasItem {
        item: "unpaid_bill".to_string(),
    }];
    bailiff.conflicts = vec![ConflictRule::Displaces {
        target: DisplaceTarget::Always,
    }];

    vec![
        reaper, librarian, gardener, cat, ghost, priest, sculptor, critic, riddler, bailiff,
    ]
}
