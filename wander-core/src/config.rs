//! Configuration for the WANDER scheduler.
//!
//! Maps directly to `wander.toml`. Every field has a default, so an empty
//! file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level WANDER configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WanderConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Departure sweeper and cooldown timing.
    #[serde(default)]
    pub timing: TimingConfig,
    /// Flag and item names shared by the override rules and encounter classifier.
    #[serde(default)]
    pub triggers: TriggersConfig,
    /// Primary override character.
    #[serde(default)]
    pub reaper: ReaperConfig,
    /// Library override character.
    #[serde(default)]
    pub librarian: LibrarianConfig,
    /// Encounter pacing and history.
    #[serde(default)]
    pub encounters: EncountersConfig,
    /// Player-utterance handling.
    #[serde(default)]
    pub dialogue: DialogueConfig,
}

impl WanderConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `WanderError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::WanderError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// RNG seed. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            seed: None,
            log_level: "info".to_string(),
        }
    }
}

/// Departure sweeper and cooldown timing, in simulated seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// How often the sweeper runs.
    #[serde(default = "default_60_0")]
    pub sweep_interval_secs: f64,
    /// Ambient occupants leave after staying this long.
    #[serde(default = "default_600_0")]
    pub max_stay_secs: f64,
    /// Flat per-sweep chance that an ambient occupant wanders off.
    #[serde(default = "default_0_1")]
    pub departure_chance: f64,
    /// Chance an occupant stays anyway in a zone it does not prefer.
    #[serde(default = "default_0_3")]
    pub stay_anyway_chance: f64,
    /// How long a departed character is barred from reselection.
    #[serde(default = "default_180_0")]
    pub cooldown_secs: f64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60.0,
            max_stay_secs: 600.0,
            departure_chance: 0.1,
            stay_anyway_chance: 0.3,
            cooldown_secs: 180.0,
        }
    }
}

/// Names of the player flags and items that drive escalation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggersConfig {
    /// Set when the player has been rude.
    #[serde(default = "default_rudeness_flag")]
    pub rudeness_flag: String,
    /// Set when a feud between characters has escalated.
    #[serde(default = "default_escalation_flag")]
    pub escalation_flag: String,
    /// Carrying any of these counts as carrying a flagged item.
    #[serde(default = "default_flagged_items")]
    pub flagged_items: Vec<String>,
}

impl Default for TriggersConfig {
    fn default() -> Self {
        Self {
            rudeness_flag: default_rudeness_flag(),
            escalation_flag: default_escalation_flag(),
            flagged_items: default_flagged_items(),
        }
    }
}

/// Primary override character tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// Registry id of the character.
    #[serde(default = "default_reaper_id")]
    pub character: String,
    /// Locations the Reaper never visits.
    #[serde(default = "default_safe_locations")]
    pub safe_locations: Vec<String>,
    /// Probability with no trigger.
    #[serde(default = "default_0_05")]
    pub base_probability: f64,
    /// Probability while the rudeness window is open.
    #[serde(default = "default_0_5")]
    pub rudeness_probability: f64,
    /// Transitions the rudeness window stays open.
    #[serde(default = "default_3_u64")]
    pub rudeness_window: u64,
    /// Probability while the flagged-item window is open.
    #[serde(default = "default_0_75")]
    pub item_probability: f64,
    /// Transitions the flagged-item window stays open.
    #[serde(default = "default_2_u64")]
    pub item_window: u64,
    /// Minimum transitions between two spawns when no trigger is open.
    #[serde(default = "default_5_u64")]
    pub min_gap_transitions: u64,
    /// Chance a courteous phrase spares the player.
    #[serde(default = "default_0_1")]
    pub spare_chance: f64,
    /// Persistent flag set when spared.
    #[serde(default = "default_spared_flag")]
    pub spared_flag: String,
    /// Flag recording the cause of death.
    #[serde(default = "default_cause_flag")]
    pub cause_flag: String,
    /// Achievement unlocked by the removal sequence.
    #[serde(default = "default_reaper_achievement")]
    pub achievement: String,
    /// Health delta applied by the removal sequence.
    #[serde(default = "default_lethal_delta")]
    pub lethal_delta: i64,
    /// Pause between the two stages of the removal sequence.
    #[serde(default = "default_2_0")]
    pub stage_pause_secs: f64,
    /// Hard upper bound after which the Reaper's active state is force-cleared.
    #[serde(default = "default_10_0")]
    pub safety_cap_secs: f64,
    /// Phrases that count as courteous.
    #[serde(default = "default_courteous")]
    pub courteous_phrases: Vec<String>,
    /// Phrases that count as hostile.
    #[serde(default = "default_hostile")]
    pub hostile_phrases: Vec<String>,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            character: default_reaper_id(),
            safe_locations: default_safe_locations(),
            base_probability: 0.05,
            rudeness_probability: 0.5,
            rudeness_window: 3,
            item_probability: 0.75,
            item_window: 2,
            min_gap_transitions: 5,
            spare_chance: 0.1,
            spared_flag: default_spared_flag(),
            cause_flag: default_cause_flag(),
            achievement: default_reaper_achievement(),
            lethal_delta: default_lethal_delta(),
            stage_pause_secs: 2.0,
            safety_cap_secs: 10.0,
            courteous_phrases: default_courteous(),
            hostile_phrases: default_hostile(),
        }
    }
}

/// Library override character tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarianConfig {
    /// Registry id of the character.
    #[serde(default = "default_librarian_id")]
    pub character: String,
    /// Spawn probability in library-zoned locations.
    #[serde(default = "default_0_8")]
    pub probability: f64,
}

impl Default for LibrarianConfig {
    fn default() -> Self {
        Self {
            character: default_librarian_id(),
            probability: 0.8,
        }
    }
}

/// Encounter pacing and history retention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncountersConfig {
    /// Gap between the staged lines that follow the opening line.
    #[serde(default = "default_1_5")]
    pub line_spacing_secs: f64,
    /// Ring buffer capacity for encounter history.
    #[serde(default = "default_32")]
    pub history_capacity: usize,
    /// Maximum priority difference for two rivals to argue as equals.
    #[serde(default = "default_1_i32")]
    pub comparable_priority_gap: i32,
}

impl Default for EncountersConfig {
    fn default() -> Self {
        Self {
            line_spacing_secs: 1.5,
            history_capacity: 32,
            comparable_priority_gap: 1,
        }
    }
}

/// Player-utterance handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueConfig {
    /// Safety-net bound on waiting for a generated reply, in simulated seconds.
    #[serde(default = "default_8_0")]
    pub response_timeout_secs: f64,
    /// Line emitted when generation fails or times out. `{name}` is replaced.
    #[serde(default = "default_fallback_line")]
    pub fallback_line: String,
}

impl Default for DialogueConfig {
    fn default() -> Self {
        Self {
            response_timeout_secs: 8.0,
            fallback_line: default_fallback_line(),
        }
    }
}

impl DialogueConfig {
    /// Render the fallback line for a speaker.
    #[must_use]
    pub fn fallback_for(&self, name: &str) -> String {
        self.fallback_line.replace("{name}", name)
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_log_level() -> String { "info".to_string() }
fn default_rudeness_flag() -> String { "was_rude".to_string() }
fn default_escalation_flag() -> String { "feud_escalated".to_string() }
fn default_flagged_items() -> Vec<String> { vec!["stolen_hourglass".to_string()] }
fn default_reaper_id() -> String { "reaper".to_string() }
fn default_librarian_id() -> String { "librarian".to_string() }
fn default_safe_locations() -> Vec<String> {
    vec!["start".to_string(), "chapel_nave".to_string()]
}
fn default_spared_flag() -> String { "spared_by_reaper".to_string() }
fn default_cause_flag() -> String { "cause_of_death".to_string() }
fn default_reaper_achievement() -> String { "an_appointment_kept".to_string() }
fn default_lethal_delta() -> i64 { -100 }
fn default_courteous() -> Vec<String> {
    ["please", "thank you", "thanks", "sorry", "excuse me", "forgive me"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_hostile() -> Vec<String> {
    ["go away", "shut up", "get lost", "idiot", "i hate you", "leave me alone"]
        .into_iter()
        .map(String::from)
        .collect()
}
fn default_fallback_line() -> String {
    "{name} seems to be having trouble responding.".to_string()
}
fn default_0_05() -> f64 { 0.05 }
fn default_0_1() -> f64 { 0.1 }
fn default_0_3() -> f64 { 0.3 }
fn default_0_5() -> f64 { 0.5 }
fn default_0_75() -> f64 { 0.75 }
fn default_0_8() -> f64 { 0.8 }
fn default_1_5() -> f64 { 1.5 }
fn default_2_0() -> f64 { 2.0 }
fn default_8_0() -> f64 { 8.0 }
fn default_10_0() -> f64 { 10.0 }
fn default_60_0() -> f64 { 60.0 }
fn default_180_0() -> f64 { 180.0 }
fn default_600_0() -> f64 { 600.0 }
fn default_1_i32() -> i32 { 1 }
fn default_2_u64() -> u64 { 2 }
fn default_3_u64() -> u64 { 3 }
fn default_5_u64() -> u64 { 5 }
fn default_32() -> usize { 32 }
