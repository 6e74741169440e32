//! Error types for the WANDER core library.

use thiserror::Error;

use crate::types::{CharacterId, LocationId};

/// Top-level error type for all WANDER operations.
///
/// None of these are fatal to a host session: the scheduler logs and
/// refuses, it never panics.
#[derive(Error, Debug)]
pub enum WanderError {
    /// No character with the given id is registered.
    #[error("Character not found: {0}")]
    CharacterNotFound(CharacterId),

    /// The location has never been entered and holds no occupancy record.
    #[error("Location not found: {0}")]
    LocationNotFound(LocationId),

    /// An encounter is running at the location; forced transitions are refused.
    #[error("Encounter active at {location}")]
    EncounterActive {
        /// Location with the running encounter.
        location: LocationId,
    },

    /// An override character holds the location; it must be cleared first.
    #[error("Override character {holder} holds {location}")]
    OverrideHeld {
        /// Location being held.
        location: LocationId,
        /// The override character holding it.
        holder: CharacterId,
    },

    /// The character already occupies another location.
    #[error("Character {character} already occupies {location}")]
    AlreadyPresent {
        /// The character.
        character: CharacterId,
        /// Where it currently is.
        location: LocationId,
    },

    /// A narrative encounter needs at least two distinct participants.
    #[error("Encounter needs at least two participants, got {0}")]
    NotEnoughParticipants(usize),

    /// Malformed character definition (duplicate id, probability out of range, ...).
    #[error("Invalid character definition: {0}")]
    InvalidDefinition(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, WanderError>;
