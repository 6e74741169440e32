//! Reply Prompt Quality: Golden Test Set.
//!
//! Curated persona and utterance pairs with strings the rendered prompt
//! must and must not contain. Offline only: nothing here calls a backend.

use wander_llm::prompt::{self, Persona, ToneHint};
use wander_llm::LlmSettings;

struct GoldenCase {
    name: &'static str,
    persona: Persona,
    utterance: &'static str,
    tone: ToneHint,
    system_must_contain: Vec<&'static str>,
    user_must_contain: Vec<&'static str>,
    must_not_contain: Vec<&'static str>,
}

fn persona(name: &str, archetype: &str, traits: &[&str], location: &str) -> Persona {
    Persona {
        name: name.to_string(),
        archetype: archetype.to_string(),
        traits: traits.iter().map(|t| (*t).to_string()).collect(),
        location: location.to_string(),
    }
}

fn golden_cases() -> Vec<GoldenCase> {
    vec![
        GoldenCase {
            name: "mediator_courteous_greeting",
            persona: persona("Mother Agnes", "mediator", &["patient", "warm"], "the chapel nave"),
            utterance: "Good evening, Mother. Thank you for the candle.",
            tone: ToneHint::Courteous,
            system_must_contain: vec!["Mother Agnes", "mediator", "patient, warm", "chapel nave"],
            user_must_contain: vec!["Thank you for the candle", "polite"],
            must_not_contain: vec!["{name}", "{utterance}", "{tone_hint}"],
        },
        GoldenCase {
            name: "rival_hostile_jab",
            persona: persona("The Critic", "rival", &["vain", "sharp-tongued"], "the gallery"),
            utterance: "Nobody cares what you think, you fool.",
            tone: ToneHint::Hostile,
            system_must_contain: vec!["The Critic", "rival", "vain, sharp-tongued"],
            user_must_contain: vec!["you fool", "rude", "stay civil"],
            must_not_contain: vec!["{archetype}", "{traits}"],
        },
        GoldenCase {
            name: "scholar_neutral_question",
            persona: persona("Quill", "scholar", &[], "the reading room"),
            utterance: "Which shelf holds the atlases?",
            tone: ToneHint::Neutral,
            system_must_contain: vec!["Quill", "reserved", "reading room"],
            user_must_contain: vec!["atlases", "unremarkable", "Reply as Quill"],
            must_not_contain: vec!["{location}"],
        },
    ]
}

#[test]
fn golden_prompts_render_cleanly() {
    let settings = LlmSettings::default();
    for case in golden_cases() {
        let req = prompt::reply_request(&case.persona, case.utterance, case.tone, &settings);
        for needle in &case.system_must_contain {
            assert!(
                req.system.contains(needle),
                "[{}] system prompt missing {needle:?}:\n{}",
                case.name,
                req.system
            );
        }
        for needle in &case.user_must_contain {
            assert!(
                req.user.contains(needle),
                "[{}] user prompt missing {needle:?}:\n{}",
                case.name,
                req.user
            );
        }
        for needle in &case.must_not_contain {
            assert!(
                !req.system.contains(needle) && !req.user.contains(needle),
                "[{}] prompt contains forbidden {needle:?}",
                case.name
            );
        }
    }
}

#[test]
fn golden_prompts_respect_configured_limits() {
    let settings = LlmSettings {
        max_tokens: 40,
        temperature: 0.2,
        ..LlmSettings::default()
    };
    for case in golden_cases() {
        let req = prompt::reply_request(&case.persona, case.utterance, case.tone, &settings);
        assert_eq!(req.max_tokens, 40, "[{}]", case.name);
        assert!((req.temperature - 0.2).abs() < f32::EPSILON, "[{}]", case.name);
    }
}
