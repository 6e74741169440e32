//! Mapping between scheduler types and generation types.
//!
//! `wander-llm` knows nothing about the scheduler; it takes a plain-text
//! [`Persona`]. This module builds one from a registered character and the
//! ticket the scheduler handed out.

use std::collections::HashMap;

use wander_core::registry::Archetype;
use wander_core::{CharacterDefinition, LocationId, LocationMeta, ResponseTicket, Tone};
use wander_llm::{LineRequest, LlmSettings, Persona, ToneHint};

/// Archetype as a prompt word.
#[must_use]
pub fn archetype_word(archetype: Archetype) -> &'static str {
    match archetype {
        Archetype::Mediator => "peacemaker",
        Archetype::Rival => "rival",
        Archetype::Threat => "menace",
        Archetype::Wanderer => "wanderer",
        Archetype::Scholar => "scholar",
        Archetype::Trickster => "trickster",
    }
}

/// Scheduler tone as a prompt hint.
#[must_use]
pub fn tone_hint(tone: Tone) -> ToneHint {
    match tone {
        Tone::Hostile => ToneHint::Hostile,
        Tone::Courteous => ToneHint::Courteous,
        Tone::Neutral => ToneHint::Neutral,
    }
}

/// Titles of locations the player has entered, for prompt text.
#[derive(Debug, Default, Clone)]
pub struct LocationTitles {
    titles: HashMap<LocationId, String>,
}

impl LocationTitles {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember the title from `meta`, if it has one.
    pub fn record(&mut self, location: &LocationId, meta: &LocationMeta) {
        if !meta.title.trim().is_empty() {
            self.titles.insert(location.clone(), meta.title.clone());
        }
    }

    /// Human-readable name: the recorded title, else the id with
    /// underscores turned into spaces.
    #[must_use]
    pub fn describe(&self, location: &LocationId) -> String {
        self.titles
            .get(location)
            .cloned()
            .unwrap_or_else(|| format!("the {}", location.as_str().replace('_', " ")))
    }
}

/// Persona for `definition` speaking at `location`.
#[must_use]
pub fn persona_for(definition: &CharacterDefinition, location: String) -> Persona {
    Persona {
        name: definition.name.clone(),
        archetype: archetype_word(definition.archetype()).to_string(),
        traits: definition.personality.traits.iter().cloned().collect(),
        location,
    }
}

/// Generation request for `ticket`.
///
/// Falls back to a bare persona built from the ticket when the character
/// is not in `definition` (a registry swapped out mid-session).
#[must_use]
pub fn request_for(
    ticket: &ResponseTicket,
    definition: Option<&CharacterDefinition>,
    titles: &LocationTitles,
    settings: &LlmSettings,
) -> LineRequest {
    let location = titles.describe(&ticket.location);
    let persona = match definition {
        Some(def) => persona_for(def, location),
        None => Persona {
            name: ticket.name.clone(),
            archetype: "wanderer".to_string(),
            traits: Vec::new(),
            location,
        },
    };
    wander_llm::prompt::reply_request(&persona, &ticket.utterance, tone_hint(ticket.tone), settings)
}
