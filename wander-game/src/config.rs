//! Host-side configuration.
//!
//! One TOML file carries the scheduler sections (`[general]`, `[timing]`,
//! `[reaper]`, ...) at the top level, plus `[llm]` for the generation
//! backend and `[session]` for host wiring.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use wander_core::{Registry, WanderConfig};
use wander_llm::LlmSettings;

use crate::session::SessionError;

/// Complete host configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Scheduler settings.
    #[serde(flatten)]
    pub wander: WanderConfig,
    /// Generation backend.
    #[serde(default)]
    pub llm: LlmSettings,
    /// Host wiring.
    #[serde(default)]
    pub session: HostConfig,
}

/// `[session]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// TOML character registry. The built-in cast is used when absent.
    pub cast: Option<PathBuf>,
}

impl SessionConfig {
    /// Parse from a TOML string.
    ///
    /// # Errors
    /// Returns `SessionError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> Result<Self, SessionError> {
        toml::from_str(toml_str).map_err(|e| SessionError::Config(e.to_string()))
    }

    /// Load from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, SessionError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// The character registry this session plays with.
    ///
    /// # Errors
    /// Returns an error if the configured cast file cannot be read or holds
    /// invalid definitions.
    pub fn registry(&self) -> Result<Registry, SessionError> {
        match &self.session.cast {
            Some(path) => {
                let content = std::fs::read_to_string(path)?;
                Ok(Registry::from_toml(&content)?)
            }
            None => Ok(Registry::builtin()),
        }
    }
}
