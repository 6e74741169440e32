//! Prompt templates for character replies.
//!
//! A reply prompt is a persona (who is speaking, where, in what mood) plus
//! the player's words and how they came across.

use crate::types::{LineRequest, LlmSettings};

/// Persona prompt for an ambient character answering the player.
pub const REPLY_SYSTEM: &str = r"You are {name}, a {archetype} who wanders the rooms of an old house.
Your manner: {traits}.
You are currently in {location}.

RULES:
- Stay in character. Never break the fourth wall.
- Answer in one or two short sentences of spoken dialogue.
- Do not narrate actions or describe yourself in the third person.
- Never prefix the line with your name.";

/// The player's turn.
pub const REPLY_USER: &str = r#"The visitor says to you: "{utterance}"
{tone_hint}
Reply as {name} would."#;

const HINT_HOSTILE: &str = "They are being rude. You may be curt, wounded or cold, but stay civil.";
const HINT_COURTEOUS: &str = "They are being polite. Warm to them a little.";
const HINT_NEUTRAL: &str = "Their tone is unremarkable.";

/// How the player's words came across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToneHint {
    /// Insulting or threatening.
    Hostile,
    /// Polite.
    Courteous,
    /// Neither.
    #[default]
    Neutral,
}

impl ToneHint {
    fn sentence(self) -> &'static str {
        match self {
            Self::Hostile => HINT_HOSTILE,
            Self::Courteous => HINT_COURTEOUS,
            Self::Neutral => HINT_NEUTRAL,
        }
    }
}

/// The speaking character, in plain text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Persona {
    /// Display name.
    pub name: String,
    /// Archetype word ("mediator", "rival").
    pub archetype: String,
    /// Trait words.
    pub traits: Vec<String>,
    /// Human-readable location.
    pub location: String,
}

impl Persona {
    fn traits_description(&self) -> String {
        if self.traits.is_empty() {
            "reserved".to_string()
        } else {
            self.traits.join(", ")
        }
    }
}

/// Simple template interpolation for prompts.
///
/// Replaces `{key}` with the corresponding value.
#[must_use]
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (key, value) in vars {
        result = result.replace(&format!("{{{key}}}"), value);
    }
    result
}

/// Build the request for `persona` answering `utterance`.
#[must_use]
pub fn reply_request(
    persona: &Persona,
    utterance: &str,
    tone: ToneHint,
    settings: &LlmSettings,
) -> LineRequest {
    let traits = persona.traits_description();
    let system = render_template(
        REPLY_SYSTEM,
        &[
            ("name", persona.name.as_str()),
            ("archetype", persona.archetype.as_str()),
            ("traits", traits.as_str()),
            ("location", persona.location.as_str()),
        ],
    );
    // Quotes inside the utterance would close the template's quotes early.
    let utterance = utterance.trim().replace('"', "'");
    let user = render_template(
        REPLY_USER,
        &[
            ("utterance", utterance.as_str()),
            ("tone_hint", tone.sentence()),
            ("name", persona.name.as_str()),
        ],
    );
    LineRequest::new(system, user).with_limits(settings)
}
