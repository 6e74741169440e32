//! Inbound game events that drive a session.
//!
//! The host translates its own input into these and hands them to
//! [`crate::session::Session::handle`]. They are serde-friendly so a
//! session can be replayed from a recorded script.

use serde::{Deserialize, Serialize};
use wander_core::{CharacterId, LocationId, LocationMeta, PlayerSnapshot};

/// Something the player or the game clock did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum GameEvent {
    /// The player moved into a location.
    LocationEntry {
        /// Where the player is now.
        location: LocationId,
        /// What the host knows about it.
        #[serde(default)]
        meta: LocationMeta,
        /// Player state at the moment of entry.
        #[serde(default)]
        player: PlayerSnapshot,
    },

    /// The player spoke to a character.
    Utterance {
        /// Character addressed.
        target: CharacterId,
        /// What was said.
        text: String,
    },

    /// Game time passed without the player moving.
    Advance {
        /// Seconds of game time.
        secs: f64,
    },
}

impl GameEvent {
    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::LocationEntry { .. } => "location_entry",
            Self::Utterance { .. } => "utterance",
            Self::Advance { .. } => "advance",
        }
    }

    /// Convenience constructor for a bare location entry.
    #[must_use]
    pub fn enter(location: impl Into<LocationId>, player: PlayerSnapshot) -> Self {
        Self::LocationEntry {
            location: location.into(),
            meta: LocationMeta::default(),
            player,
        }
    }
}
