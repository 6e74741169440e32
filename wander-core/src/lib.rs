//! # WANDER Core Library
//!
//! Wandering-character presence scheduler and encounter orchestrator for
//! interactive fiction.
//!
//! On every location change a [`Director`] decides which character, if any,
//! occupies the location:
//!
//! - **Special-case overrides**: the Reaper and the Librarian, evaluated
//!   first and able to suppress everyone else
//! - **General spawn evaluator**: priority-ordered, probability-weighted
//!   sequential trials over the [`Registry`]
//! - **Departure sweeper**: ambient occupants age out on a virtual clock
//! - **Encounters**: co-present characters play out a timed, effect-producing
//!   sequence
//!
//! Everything observable leaves through an injected [`EventSink`] as an
//! [`Effect`]. All delayed work runs on a virtual clock the host advances
//! explicitly, so sessions are deterministic under a fixed seed.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cast;
pub mod clock;
pub mod config;
pub mod departure;
pub mod director;
pub mod encounter;
pub mod error;
pub mod interaction;
pub mod overrides;
pub mod registry;
pub mod sink;
pub mod spawn;
pub mod state;
pub mod types;
pub mod zone;

pub use config::WanderConfig;
pub use director::{Diagnostics, Director};
pub use encounter::{EncounterKind, EncounterRecord};
pub use error::{Result, WanderError};
pub use interaction::{ResponseTicket, TicketId, Tone, UtteranceOutcome};
pub use overrides::OverrideKind;
pub use registry::{CharacterDefinition, Registry};
pub use sink::{Effect, EventSink, NullSink, RecordingSink};
pub use types::*;
pub use zone::Zone;
