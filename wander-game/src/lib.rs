//! # wander-game: Host Integration for WANDER
//!
//! Glue between the game-agnostic `wander-core` scheduler and a running
//! game, plus the generation backend from `wander-llm`.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │                 Host game                 │
//! │   GameEvent ──▶ ┌─────────────────────┐   │
//! │                 │      Session        │   │
//! │                 │  ┌───────────────┐  │   │
//! │   EventSink ◀── │  │  wander-core  │  │   │
//! │                 │  └───────┬───────┘  │   │
//! │                 │   ticket │ reply    │   │
//! │                 │  ┌───────▼───────┐  │   │
//! │                 │  │  wander-llm   │  │   │
//! │                 │  └───────────────┘  │   │
//! │                 └─────────────────────┘   │
//! └───────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `events`: inbound game events (location entry, utterance, time)
//! - `session`: async driver; bounds generation with a timeout
//! - `bridge`: scheduler types to prompt personas
//! - `config`: one TOML file for scheduler, `[llm]` and `[session]`

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]

pub mod bridge;
pub mod config;
pub mod events;
pub mod session;

pub use config::{HostConfig, SessionConfig};
pub use events::GameEvent;
pub use session::{EventOutcome, Session, SessionError};
