//! Core type definitions for the WANDER scheduler.
//!
//! Identifiers are string-keyed because the host's content files name
//! characters and locations by slug (`"reaper"`, `"lib_reading_room"`).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Add;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::zone::Zone;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Identifier of a character definition in the registry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CharacterId(pub String);

impl CharacterId {
    /// Create an id from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw slug.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CharacterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for CharacterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a location in the host's world.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(pub String);

impl LocationId {
    /// Create an id from anything string-like.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw slug.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LocationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a single encounter run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncounterId(pub Uuid);

impl EncounterId {
    /// Create a new random encounter ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EncounterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EncounterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Simulated instant on the scheduler's virtual clock, in milliseconds
/// since the session started.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SimTime(pub u64);

impl SimTime {
    /// Session start.
    pub const ZERO: Self = Self(0);

    /// Build an instant from whole simulated seconds.
    #[must_use]
    pub fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1000))
    }

    /// Milliseconds since session start.
    #[must_use]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is in the future.
    #[must_use]
    pub fn saturating_since(self, earlier: Self) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        let millis = u64::try_from(rhs.as_millis()).unwrap_or(u64::MAX);
        SimTime(self.0.saturating_add(millis))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / 1000, self.0 % 1000)
    }
}

/// Convert fractional seconds from config into a `Duration`. Negatives and
/// NaN become zero; values too large to represent saturate at `Duration::MAX`.
#[must_use]
pub fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
}

// ---------------------------------------------------------------------------
// Player state
// ---------------------------------------------------------------------------

/// Value of a game flag as the host stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    /// Boolean switch.
    Bool(bool),
    /// Counter or score.
    Int(i64),
    /// Free-form marker (cause of death, chosen name, ...).
    Text(String),
}

impl FlagValue {
    /// Truthiness used by trigger checks: `true`, non-zero, or non-empty.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Text(s) => !s.is_empty(),
        }
    }

    /// Numeric view for threshold checks. Text flags have none.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Bool(b) => Some(i64::from(*b)),
            Self::Int(n) => Some(*n),
            Self::Text(_) => None,
        }
    }
}

impl From<bool> for FlagValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for FlagValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for FlagValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// Read-only view of the player handed in with every location entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    /// Item ids currently carried.
    #[serde(default)]
    pub inventory: BTreeSet<String>,
    /// Game flags.
    #[serde(default)]
    pub flags: BTreeMap<String, FlagValue>,
    /// Location history, oldest first. May contain repeats.
    #[serde(default)]
    pub visited: Vec<LocationId>,
    /// Per-key recollection scores (how often characters met, topics raised, ...).
    #[serde(default)]
    pub memory: BTreeMap<String, i64>,
}

impl PlayerSnapshot {
    /// Whether `flag` is present and truthy.
    #[must_use]
    pub fn flag_is_set(&self, flag: &str) -> bool {
        self.flags.get(flag).is_some_and(FlagValue::is_truthy)
    }

    /// Whether the player carries any of `items`.
    #[must_use]
    pub fn carries_any<'a>(&self, items: impl IntoIterator<Item = &'a String>) -> bool {
        items.into_iter().any(|item| self.inventory.contains(item))
    }

    /// Number of distinct locations visited.
    #[must_use]
    pub fn distinct_visits(&self) -> usize {
        self.visited.iter().collect::<BTreeSet<_>>().len()
    }

    /// Builder helper: set a flag.
    #[must_use]
    pub fn with_flag(mut self, flag: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.flags.insert(flag.into(), value.into());
        self
    }

    /// Builder helper: add an item.
    #[must_use]
    pub fn with_item(mut self, item: impl Into<String>) -> Self {
        self.inventory.insert(item.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Location metadata
// ---------------------------------------------------------------------------

/// What the host knows about a location when the player enters it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationMeta {
    /// Display title ("The Puzzle Gallery").
    #[serde(default)]
    pub title: String,
    /// Descriptive text shown on entry.
    #[serde(default)]
    pub description: String,
    /// Explicit zone tag; inferred from id and text when absent.
    #[serde(default)]
    pub zone: Option<Zone>,
}

impl LocationMeta {
    /// Metadata with an explicit zone and no text.
    #[must_use]
    pub fn tagged(zone: Zone) -> Self {
        Self {
            zone: Some(zone),
            ..Self::default()
        }
    }

    /// Metadata with title and description only.
    #[must_use]
    pub fn described(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            zone: None,
        }
    }
}
