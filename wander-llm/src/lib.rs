//! # wander-llm: Dialogue-Line Generation for WANDER
//!
//! When the player speaks to an ambient character, the scheduler hands the
//! host a response ticket. This crate turns that into one line of dialogue:
//!   - **Prompt building** from a plain-text persona
//!   - **Ollama** (local) and **OpenAI-compatible** HTTP backends
//!   - **Canned** offline lines for simulation and tests
//!
//! Generation may be slow or fail outright. Callers bound every call with
//! a timeout and fall back to a scripted line on error; nothing here
//! retries beyond the configured HTTP attempts.

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod generator;
pub mod prompt;
pub mod types;

pub use client::{LlmClient, LlmProvider};
pub use error::LlmError;
pub use generator::{CannedGenerator, LineGenerator};
pub use prompt::{Persona, ToneHint};
pub use types::{LineRequest, LlmResponse, LlmSettings, ProviderKind};
