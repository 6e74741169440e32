//! Player utterances: tone classification, response tickets and the
//! Reaper's scripted replies.

use serde::{Deserialize, Serialize};

use rand::Rng;

use crate::config::ReaperConfig;
use crate::overrides::clamp_probability;
use crate::types::{CharacterId, LocationId};

/// Reaper line for a courteous utterance that did not spare the player.
pub const REAPER_COURTEOUS: &str = "\"Manners. How rare. It changes nothing, but it is noted.\"";
/// Reaper line for a neutral utterance.
pub const REAPER_OMINOUS: &str = "\"Every clock runs down. Yours is louder than most.\"";
/// Reaper line when it spares the player.
pub const REAPER_SPARE: &str = "The Reaper studies you for a long moment, then lowers the scythe. \"Not today.\"";
/// First stage of the removal sequence.
pub const REAPER_STAGE_ONE: &str = "The Reaper's hood turns toward you. The candles gutter out, one by one.";
/// Second stage of the removal sequence.
pub const REAPER_STAGE_TWO: &str = "The scythe falls. The Reaper is gone, and so, it seems, are you.";

/// Rough reading of a player utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Contains a courteous phrase and nothing hostile.
    Courteous,
    /// Contains a hostile phrase.
    Hostile,
    /// Neither.
    Neutral,
}

/// Classify by case-insensitive phrase match. Hostile wins over courteous.
#[must_use]
pub fn classify_tone(text: &str, config: &ReaperConfig) -> Tone {
    let lowered = text.to_lowercase();
    let mentions = |phrases: &[String]| {
        phrases
            .iter()
            .any(|p| !p.is_empty() && lowered.contains(&p.to_lowercase()))
    };
    if mentions(&config.hostile_phrases) {
        Tone::Hostile
    } else if mentions(&config.courteous_phrases) {
        Tone::Courteous
    } else {
        Tone::Neutral
    }
}

/// What the Reaper does in answer to an utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaperReply {
    /// Leaves and marks the player as spared.
    Spare,
    /// Polite, but stays.
    Courteous,
    /// Starts the two-stage removal.
    Removal,
    /// Fixed ominous line.
    Ominous,
}

/// Decide the Reaper's reply. Only a courteous utterance consumes randomness.
pub fn reaper_reply<R: Rng + ?Sized>(tone: Tone, config: &ReaperConfig, rng: &mut R) -> ReaperReply {
    match tone {
        Tone::Hostile => ReaperReply::Removal,
        Tone::Neutral => ReaperReply::Ominous,
        Tone::Courteous => {
            if rng.gen_bool(clamp_probability(config.spare_chance)) {
                ReaperReply::Spare
            } else {
                ReaperReply::Courteous
            }
        }
    }
}

/// Identifies one outstanding generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TicketId(pub u64);

/// Handed to the host when a reply must be generated.
///
/// The host answers with [`crate::Director::deliver_response`]. If it does
/// not answer within the configured bound, the safety net emits a fallback
/// line and the ticket goes stale.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseTicket {
    /// Ticket handle.
    pub id: TicketId,
    /// Character being addressed.
    pub character: CharacterId,
    /// Its display name.
    pub name: String,
    /// Where the conversation happens.
    pub location: LocationId,
    /// What the player said.
    pub utterance: String,
    /// How it was read.
    pub tone: Tone,
}

/// Result of [`crate::Director::handle_utterance`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UtteranceOutcome {
    /// A fixed reply was emitted immediately.
    Scripted,
    /// A reply must be generated; the ticket tracks it.
    Awaiting(ResponseTicket),
    /// The character is not where the player is.
    NotPresent,
    /// The character is caught up in an encounter.
    Busy,
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn hostile_beats_courteous() {
        let config = ReaperConfig::default();
        assert_eq!(classify_tone("Please, GO AWAY", &config), Tone::Hostile);
        assert_eq!(classify_tone("Thank you kindly", &config), Tone::Courteous);
        assert_eq!(classify_tone("What time is it?", &config), Tone::Neutral);
    }

    #[test]
    fn hostile_always_starts_removal() {
        let config = ReaperConfig::default();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..50 {
            assert_eq!(reaper_reply(Tone::Hostile, &config, &mut rng), ReaperReply::Removal);
        }
    }

    #[test]
    fn spare_rate_is_roughly_ten_percent() {
        let config = ReaperConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let spared = (0..2000)
            .filter(|_| reaper_reply(Tone::Courteous, &config, &mut rng) == ReaperReply::Spare)
            .count();
        assert!((120..=280).contains(&spared), "spared {spared} of 2000");
    }

    #[test]
    fn certain_spare_chance_always_spares() {
        let config = ReaperConfig {
            spare_chance: 1.0,
            ..ReaperConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(reaper_reply(Tone::Courteous, &config, &mut rng), ReaperReply::Spare);
    }
}
