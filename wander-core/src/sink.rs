//! Event Sink: the outbound boundary to the host game.
//!
//! The scheduler never renders, persists or plays anything itself. Every
//! observable consequence is one of the [`Effect`] variants, pushed through
//! an [`EventSink`] the host injects.

use serde::{Deserialize, Serialize};

use crate::types::{CharacterId, FlagValue, LocationId};

/// A mutation request for the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Effect {
    /// Append a line to the narrative log.
    Narrative {
        /// Where the line is spoken.
        location: LocationId,
        /// Who speaks it; `None` for narration.
        speaker: Option<CharacterId>,
        /// The line.
        text: String,
    },
    /// Set a game flag.
    SetFlag {
        /// Flag name.
        flag: String,
        /// New value.
        value: FlagValue,
    },
    /// Change the player's health.
    HealthDelta {
        /// Signed amount.
        amount: i64,
    },
    /// Unlock an achievement.
    UnlockAchievement {
        /// Achievement id.
        id: String,
    },
    /// Replace the list of characters shown at a location.
    ReplaceOccupants {
        /// The location.
        location: LocationId,
        /// Everyone now present.
        occupants: Vec<CharacterId>,
    },
    /// Toggle the "character is typing" indicator and the player's input lock.
    ResponsePending {
        /// Character being waited on.
        character: CharacterId,
        /// Whether a reply is outstanding.
        pending: bool,
    },
}

impl Effect {
    /// Text of a narrative effect.
    #[must_use]
    pub fn narrative_text(&self) -> Option<&str> {
        match self {
            Self::Narrative { text, .. } => Some(text),
            _ => None,
        }
    }
}

/// Receiver of scheduler effects.
pub trait EventSink {
    /// Deliver one effect. Called in the order effects were committed.
    fn emit(&mut self, effect: Effect);
}

/// Sink that keeps every effect in memory. Used by tests and diagnostics.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Effects in emission order.
    pub effects: Vec<Effect>,
}

impl RecordingSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded effects, leaving the sink empty.
    pub fn drain(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// All narrative lines, in order.
    #[must_use]
    pub fn lines(&self) -> Vec<&str> {
        self.effects.iter().filter_map(Effect::narrative_text).collect()
    }

    /// Number of effects matching `pred`.
    pub fn count(&self, pred: impl Fn(&Effect) -> bool) -> usize {
        self.effects.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _effect: Effect) {}
}

impl<S: EventSink + ?Sized> EventSink for Box<S> {
    fn emit(&mut self, effect: Effect) {
        (**self).emit(effect);
    }
}
