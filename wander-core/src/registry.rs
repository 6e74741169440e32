//! Candidate Registry: the immutable table of character definitions.
//!
//! Built once at start-up (from the built-in cast or a TOML file) and only
//! read afterwards. Custom condition hooks are registered alongside the
//! definitions because they cannot be expressed in data.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, WanderError};
use crate::types::{CharacterId, FlagValue, LocationId, LocationMeta, PlayerSnapshot};
use crate::zone::Zone;

// ---------------------------------------------------------------------------
// Definition types
// ---------------------------------------------------------------------------

/// Broad behavioural archetype, used by the encounter classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Calms others down.
    Mediator,
    /// Has a standing feud with someone.
    Rival,
    /// Dangerous to the player.
    Threat,
    /// Drifts from place to place.
    Wanderer,
    /// Bookish, fond of puzzles.
    Scholar,
    /// Mischievous.
    Trickster,
}

/// Personality descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personality {
    /// Free-form trait words ("patient", "vain").
    #[serde(default)]
    pub traits: BTreeSet<String>,
    /// Archetype tag.
    pub archetype: Archetype,
    /// Higher wins selection ties and displacement contests.
    #[serde(default)]
    pub priority: i32,
}

/// A typed predicate that must hold for a character to be eligible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpawnCondition {
    /// Flag equals an exact value.
    FlagEquals {
        /// Flag name.
        flag: String,
        /// Required value.
        value: FlagValue,
    },
    /// Numeric flag at or above a threshold.
    FlagAtLeast {
        /// Flag name.
        flag: String,
        /// Minimum value.
        threshold: i64,
    },
    /// Player carries an item.
    HasItem {
        /// Item id.
        item: String,
    },
    /// Player does not carry an item.
    LacksItem {
        /// Item id.
        item: String,
    },
    /// Player has visited at least `count` distinct locations.
    VisitedAtLeast {
        /// Minimum distinct locations.
        count: usize,
    },
    /// Recollection score at or above a threshold.
    MemoryAtLeast {
        /// Memory key.
        key: String,
        /// Minimum score.
        threshold: i64,
    },
    /// Independent random gate.
    Chance {
        /// Probability in `[0, 1]`.
        p: f64,
    },
    /// Location zone must equal this zone.
    InZone {
        /// Required zone.
        zone: Zone,
    },
    /// Host-registered predicate looked up by name.
    Hook {
        /// Hook name.
        name: String,
    },
}

/// Who a `Displaces` rule applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaceTarget {
    /// Any ambient occupant.
    Always,
    /// One named character.
    Character(CharacterId),
}

/// Constraint on co-presence with other characters or zones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConflictRule {
    /// Never share a location with `other` outside an encounter.
    CannotCoexist {
        /// The other character.
        other: CharacterId,
    },
    /// May arrive where `target` already is, pushing it out.
    Displaces {
        /// Who can be displaced.
        target: DisplaceTarget,
    },
    /// Never appears in this zone.
    AvoidsZone {
        /// The avoided zone.
        zone: Zone,
    },
    /// Only appears while `other` occupies no location at all.
    RequiresAbsence {
        /// The other character.
        other: CharacterId,
    },
}

/// Immutable definition of one wandering character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDefinition {
    /// Registry key.
    pub id: CharacterId,
    /// Name used in narration.
    pub name: String,
    /// Line emitted when the character arrives.
    pub entry: String,
    /// Line emitted when the character leaves.
    pub exit: String,
    /// Personality descriptor.
    pub personality: Personality,
    /// All must hold for the character to be eligible.
    #[serde(default)]
    pub conditions: Vec<SpawnCondition>,
    /// All must pass for the character to be eligible.
    #[serde(default)]
    pub conflicts: Vec<ConflictRule>,
    /// Zones the character may appear in.
    #[serde(default)]
    pub preferred_zones: BTreeSet<Zone>,
    /// Base spawn probability in `[0, 1]`.
    pub probability: f64,
}

impl CharacterDefinition {
    /// Archetype shortcut.
    #[must_use]
    pub fn archetype(&self) -> Archetype {
        self.personality.archetype
    }

    /// Priority shortcut.
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.personality.priority
    }

    /// Whether this character may appear in `zone`.
    #[must_use]
    pub fn prefers(&self, zone: Zone) -> bool {
        self.preferred_zones.contains(&zone)
    }

    /// Whether a `CannotCoexist` rule names `other`.
    #[must_use]
    pub fn cannot_coexist_with(&self, other: &CharacterId) -> bool {
        self.conflicts
            .iter()
            .any(|rule| matches!(rule, ConflictRule::CannotCoexist { other: o } if o == other))
    }

    /// Whether a `Displaces` rule covers `occupant`.
    #[must_use]
    pub fn displaces(&self, occupant: &CharacterId) -> bool {
        self.conflicts.iter().any(|rule| match rule {
            ConflictRule::Displaces { target: DisplaceTarget::Always } => true,
            ConflictRule::Displaces { target: DisplaceTarget::Character(c) } => c == occupant,
            _ => false,
        })
    }
}

// ---------------------------------------------------------------------------
// Hooks
// ---------------------------------------------------------------------------

/// Everything a custom hook may look at.
#[derive(Debug, Clone, Copy)]
pub struct ConditionContext<'a> {
    /// Location being evaluated.
    pub location: &'a LocationId,
    /// Its metadata.
    pub meta: &'a LocationMeta,
    /// Its resolved zone.
    pub zone: Zone,
    /// The player.
    pub player: &'a PlayerSnapshot,
    /// Current transition counter.
    pub transition: u64,
}

/// A host predicate. `None` means "cannot evaluate", which fails the condition.
pub type ConditionHook = Arc<dyn Fn(&ConditionContext<'_>) -> Option<bool> + Send + Sync>;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default, rename = "character")]
    characters: Vec<CharacterDefinition>,
}

/// Read-only table of character definitions plus named condition hooks.
#[derive(Clone, Default)]
pub struct Registry {
    characters: BTreeMap<CharacterId, CharacterDefinition>,
    hooks: BTreeMap<String, ConditionHook>,
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("characters", &self.characters.keys().collect::<Vec<_>>())
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// Build a registry from definitions, rejecting duplicates and bad probabilities.
    ///
    /// # Errors
    /// Returns `WanderError::InvalidDefinition` on the first bad definition.
    pub fn new(definitions: impl IntoIterator<Item = CharacterDefinition>) -> Result<Self> {
        let mut characters = BTreeMap::new();
        for def in definitions {
            if !(0.0..=1.0).contains(&def.probability) {
                return Err(WanderError::InvalidDefinition(format!(
                    "{}: probability {} outside [0, 1]",
                    def.id, def.probability
                )));
            }
            if characters.contains_key(&def.id) {
                return Err(WanderError::InvalidDefinition(format!(
                    "duplicate character id {}",
                    def.id
                )));
            }
            characters.insert(def.id.clone(), def);
        }
        Ok(Self {
            characters,
            hooks: BTreeMap::new(),
        })
    }

    /// Parse `[[character]]` tables from TOML.
    ///
    /// # Errors
    /// Returns `WanderError::Config` on malformed TOML and
    /// `WanderError::InvalidDefinition` on invalid content.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let file: RegistryFile =
            toml::from_str(toml_str).map_err(|e| WanderError::Config(e.to_string()))?;
        Self::new(file.characters)
    }

    /// The cast that ships with the game.
    #[must_use]
    pub fn builtin() -> Self {
        // The built-in cast is static data and always valid.
        Self::new(crate::cast::builtin_cast()).unwrap_or_default()
    }

    /// Register a named condition hook.
    #[must_use]
    pub fn with_hook<F>(mut self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&ConditionContext<'_>) -> Option<bool> + Send + Sync + 'static,
    {
        self.hooks.insert(name.into(), Arc::new(hook));
        self
    }

    /// Look up a character by id.
    #[must_use]
    pub fn get(&self, id: &CharacterId) -> Option<&CharacterDefinition> {
        let found = self.characters.get(id);
        if found.is_none() {
            debug!(character = %id, "Character not in registry");
        }
        found
    }

    /// Look up a hook by name.
    #[must_use]
    pub fn hook(&self, name: &str) -> Option<&ConditionHook> {
        self.hooks.get(name)
    }

    /// Characters whose preferred zones include `zone`, in id order.
    pub fn eligible_for_zone(&self, zone: Zone) -> impl Iterator<Item = &CharacterDefinition> {
        self.characters.values().filter(move |def| def.prefers(zone))
    }

    /// All definitions, in id order.
    pub fn iter(&self) -> impl Iterator<Item = &CharacterDefinition> {
        self.characters.values()
    }

    /// Number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.characters.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Display name for narration, falling back to the raw id.
    #[must_use]
    pub fn name_of(&self, id: &CharacterId) -> String {
        self.characters
            .get(id)
            .map_or_else(|| id.to_string(), |def| def.name.clone())
    }
}
