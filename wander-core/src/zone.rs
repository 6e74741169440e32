//! Zones: coarse location categories used to filter who may appear where.
//!
//! Hosts should tag locations explicitly. When the tag is missing the zone
//! is inferred from the location id prefix, then from the title, then from
//! the description, falling back to [`Zone::Common`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{LocationId, LocationMeta};

/// Coarse category tag attached to a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
    /// Libraries, archives, reading rooms.
    Library,
    /// Puzzle-heavy rooms.
    Puzzle,
    /// Unlit or shadowed places.
    Dark,
    /// Gardens, forests, open air.
    Outdoor,
    /// Houses, bedrooms, kitchens.
    Residential,
    /// Chapels and shrines.
    Sacred,
    /// Anything else.
    Common,
}

impl Zone {
    /// All zones, in declaration order.
    pub const ALL: [Zone; 7] = [
        Zone::Library,
        Zone::Puzzle,
        Zone::Dark,
        Zone::Outdoor,
        Zone::Residential,
        Zone::Sacred,
        Zone::Common,
    ];

    /// Snake-case tag as used in config and content files.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Library => "library",
            Self::Puzzle => "puzzle",
            Self::Dark => "dark",
            Self::Outdoor => "outdoor",
            Self::Residential => "residential",
            Self::Sacred => "sacred",
            Self::Common => "common",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const PREFIXES: &[(&str, Zone)] = &[
    ("lib_", Zone::Library),
    ("library", Zone::Library),
    ("archive", Zone::Library),
    ("puzzle_", Zone::Puzzle),
    ("garden_", Zone::Outdoor),
    ("forest_", Zone::Outdoor),
    ("house_", Zone::Residential),
    ("home_", Zone::Residential),
    ("chapel_", Zone::Sacred),
    ("shrine_", Zone::Sacred),
    ("cellar_", Zone::Dark),
];

const TITLE_WORDS: &[(&str, Zone)] = &[
    ("library", Zone::Library),
    ("archive", Zone::Library),
    ("puzzle", Zone::Puzzle),
    ("riddle", Zone::Puzzle),
    ("chapel", Zone::Sacred),
    ("shrine", Zone::Sacred),
    ("garden", Zone::Outdoor),
    ("forest", Zone::Outdoor),
    ("bedroom", Zone::Residential),
    ("kitchen", Zone::Residential),
];

const DESCRIPTION_WORDS: &[(&str, Zone)] = &[
    ("dark", Zone::Dark),
    ("shadow", Zone::Dark),
    ("bookshel", Zone::Library),
    ("outside", Zone::Outdoor),
    ("open sky", Zone::Outdoor),
    ("altar", Zone::Sacred),
];

/// Resolve the zone of a location: explicit tag first, then heuristics.
#[must_use]
pub fn resolve(location: &LocationId, meta: &LocationMeta) -> Zone {
    meta.zone.unwrap_or_else(|| infer(location, meta))
}

/// Substring fallback used only when the host sent no zone tag.
#[must_use]
pub fn infer(location: &LocationId, meta: &LocationMeta) -> Zone {
    let id = location.as_str().to_ascii_lowercase();
    if let Some(&(_, zone)) = PREFIXES.iter().find(|(p, _)| id.starts_with(p)) {
        return zone;
    }

    let title = meta.title.to_ascii_lowercase();
    if let Some(&(_, zone)) = TITLE_WORDS.iter().find(|(w, _)| title.contains(w)) {
        return zone;
    }

    let description = meta.description.to_ascii_lowercase();
    if let Some(&(_, zone)) = DESCRIPTION_WORDS.iter().find(|(w, _)| description.contains(w)) {
        return zone;
    }

    Zone::Common
}
