//! Severity levels and the process-wide level registry
//!
//! Levels are plain numeric ranks so that filtering is a single integer
//! comparison. Besides the standard set, two domain levels are registered:
//!
//! | Level    | Rank |
//! |----------|------|
//! | NOTSET   | 0    |
//! | DEBUG    | 10   |
//! | INFO     | 20   |
//! | NOTIFY   | 25   |
//! | NETWORK  | 29   |
//! | WARNING  | 30   |
//! | ERROR    | 40   |
//! | CRITICAL | 50   |
//!
//! The registry is installed once with [`initialize`] (or
//! [`initialize_with`] for extra levels) and is read-only afterwards.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::errors::LevelError;

/// Severity level, ordered by rank
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Level(u32);

impl Level {
    /// Inherit the threshold from the parent logger
    pub const NOTSET: Level = Level(0);
    pub const DEBUG: Level = Level(10);
    pub const INFO: Level = Level(20);
    /// User-facing notifications
    pub const NOTIFY: Level = Level(25);
    /// Connectivity failures
    pub const NETWORK: Level = Level(29);
    pub const WARNING: Level = Level(30);
    pub const ERROR: Level = Level(40);
    pub const CRITICAL: Level = Level(50);

    pub const fn new(rank: u32) -> Self {
        Level(rank)
    }

    pub const fn rank(self) -> u32 {
        self.0
    }

    /// Registered name, or `Level <rank>` for unregistered ranks
    pub fn name(self) -> String {
        match registry().name_of(self) {
            Some(name) => name.to_string(),
            None => format!("Level {}", self.0),
        }
    }

    /// Look a level up by name (case-insensitive)
    pub fn from_name(name: &str) -> Option<Level> {
        registry().by_name(name)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for Level {
    type Err = LevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(rank) = s.trim().parse::<u32>() {
            return Ok(Level(rank));
        }
        Level::from_name(s).ok_or_else(|| LevelError::Unknown(s.to_string()))
    }
}

/// Standard levels shipped with every registry
const STANDARD_LEVELS: [(&str, Level); 6] = [
    ("NOTSET", Level::NOTSET),
    ("DEBUG", Level::DEBUG),
    ("INFO", Level::INFO),
    ("WARNING", Level::WARNING),
    ("ERROR", Level::ERROR),
    ("CRITICAL", Level::CRITICAL),
];

/// Domain levels layered on top of the standard set
const DOMAIN_LEVELS: [(&str, Level); 2] = [("NOTIFY", Level::NOTIFY), ("NETWORK", Level::NETWORK)];

/// Name <-> rank mapping with O(1) lookups in both directions
#[derive(Debug, Clone, Default)]
pub struct LevelRegistry {
    by_name: HashMap<String, Level>,
    by_rank: HashMap<Level, String>,
}

impl LevelRegistry {
    /// Empty registry, without even the standard levels
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry holding the standard and domain levels
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for (name, level) in STANDARD_LEVELS.iter().chain(DOMAIN_LEVELS.iter()) {
            // Built-in table has no duplicates
            let _ = registry.register(name, level.rank());
        }
        registry
    }

    /// Register `name` at `rank`
    ///
    /// Identical re-registration is a no-op. A name may map to exactly one
    /// rank and a rank to exactly one name; anything else is rejected.
    pub fn register(&mut self, name: &str, rank: u32) -> Result<Level, LevelError> {
        let name = normalize(name);
        if name.is_empty() {
            return Err(LevelError::EmptyName);
        }
        let level = Level(rank);

        if let Some(existing) = self.by_name.get(&name) {
            if *existing == level {
                return Ok(level);
            }
            return Err(LevelError::ConflictingRank {
                name,
                existing: existing.rank(),
                requested: rank,
            });
        }

        if let Some(existing) = self.by_rank.get(&level) {
            return Err(LevelError::RankTaken {
                rank,
                existing: existing.clone(),
                requested: name,
            });
        }

        self.by_rank.insert(level, name.clone());
        self.by_name.insert(name, level);
        Ok(level)
    }

    pub fn by_name(&self, name: &str) -> Option<Level> {
        self.by_name.get(&normalize(name)).copied()
    }

    pub fn name_of(&self, level: Level) -> Option<&str> {
        self.by_rank.get(&level).map(String::as_str)
    }

    pub fn contains(&self, name: &str, rank: u32) -> bool {
        self.by_name(name) == Some(Level(rank))
    }

    /// All registered levels in ascending rank order
    pub fn levels(&self) -> Vec<(Level, &str)> {
        let mut out: Vec<(Level, &str)> = self
            .by_rank
            .iter()
            .map(|(level, name)| (*level, name.as_str()))
            .collect();
        out.sort_by_key(|(level, _)| *level);
        out
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

fn normalize(name: &str) -> String {
    name.trim().to_ascii_uppercase()
}

static REGISTRY: OnceLock<LevelRegistry> = OnceLock::new();

/// Install the default registry (standard + NOTIFY + NETWORK)
///
/// Safe to call any number of times; the first call wins.
pub fn initialize() -> &'static LevelRegistry {
    REGISTRY.get_or_init(LevelRegistry::with_defaults)
}

/// Install the default registry plus `extra` levels
///
/// Succeeds again later only if every extra level is already present with
/// the same rank.
pub fn initialize_with(extra: &[(&str, u32)]) -> Result<&'static LevelRegistry, LevelError> {
    if let Some(installed) = REGISTRY.get() {
        return match extra.iter().find(|(name, rank)| !installed.contains(name, *rank)) {
            None => Ok(installed),
            Some((name, rank)) => Err(LevelError::AlreadyInitialized(format!("{name}={rank}"))),
        };
    }

    let mut registry = LevelRegistry::with_defaults();
    for (name, rank) in extra {
        registry.register(name, *rank)?;
    }

    // Lost a race with another initializer: accept it only if compatible.
    let installed = REGISTRY.get_or_init(|| registry);
    match extra.iter().find(|(name, rank)| !installed.contains(name, *rank)) {
        None => Ok(installed),
        Some((name, rank)) => Err(LevelError::AlreadyInitialized(format!("{name}={rank}"))),
    }
}

/// Read-only access to the process registry
pub fn registry() -> &'static LevelRegistry {
    initialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_domain_levels_ordering() {
        assert!(Level::INFO < Level::NOTIFY);
        assert!(Level::NOTIFY < Level::WARNING);
        assert!(Level::NOTIFY < Level::NETWORK);
        assert!(Level::NETWORK < Level::WARNING);
        assert!(Level::DEBUG < Level::INFO);
        assert!(Level::WARNING < Level::ERROR);
        assert!(Level::ERROR < Level::CRITICAL);
    }

    #[test]
    fn test_default_names() {
        assert_eq!(Level::INFO.name(), "INFO");
        assert_eq!(Level::NOTIFY.name(), "NOTIFY");
        assert_eq!(Level::NETWORK.name(), "NETWORK");
        assert_eq!(Level::new(33).name(), "Level 33");
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(Level::from_name("network"), Some(Level::NETWORK));
        assert_eq!(Level::from_name(" Notify "), Some(Level::NOTIFY));
        assert_eq!(Level::from_name("verbose"), None);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("warning".parse::<Level>().unwrap(), Level::WARNING);
        assert_eq!("35".parse::<Level>().unwrap(), Level::new(35));
        assert!(matches!(
            "loud".parse::<Level>(),
            Err(LevelError::Unknown(name)) if name == "loud"
        ));
    }

    #[test]
    fn test_register_is_idempotent() {
        let mut registry = LevelRegistry::with_defaults();
        let before = registry.len();
        assert_eq!(registry.register("NOTIFY", 25), Ok(Level::NOTIFY));
        assert_eq!(registry.register("notify", 25), Ok(Level::NOTIFY));
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn test_conflicting_rank_rejected() {
        let mut registry = LevelRegistry::with_defaults();
        let err = registry.register("NOTIFY", 26).unwrap_err();
        assert_eq!(
            err,
            LevelError::ConflictingRank {
                name: "NOTIFY".to_string(),
                existing: 25,
                requested: 26,
            }
        );
        // Ordering is untouched by the rejected call
        assert_eq!(registry.by_name("NOTIFY"), Some(Level::NOTIFY));
    }

    #[test]
    fn test_rank_taken_rejected() {
        let mut registry = LevelRegistry::with_defaults();
        let err = registry.register("ALERT", 30).unwrap_err();
        assert!(matches!(err, LevelError::RankTaken { rank: 30, .. }));
        assert_eq!(registry.name_of(Level::WARNING), Some("WARNING"));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = LevelRegistry::empty();
        assert_eq!(registry.register("  ", 5), Err(LevelError::EmptyName));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_levels_sorted() {
        let registry = LevelRegistry::with_defaults();
        let names: Vec<&str> = registry.levels().into_iter().map(|(_, n)| n).collect();
        assert_eq!(
            names,
            vec!["NOTSET", "DEBUG", "INFO", "NOTIFY", "NETWORK", "WARNING", "ERROR", "CRITICAL"]
        );
    }

    #[test]
    fn test_initialize_with_compatible_set() {
        initialize();
        // Already-present levels are accepted after installation
        assert!(initialize_with(&[("NOTIFY", 25), ("NETWORK", 29)]).is_ok());
        // New levels are not
        assert!(matches!(
            initialize_with(&[("TRACE", 5)]),
            Err(LevelError::AlreadyInitialized(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_ordering_matches_rank(a in 0u32..100, b in 0u32..100) {
            prop_assert_eq!(Level::new(a) < Level::new(b), a < b);
            prop_assert_eq!(Level::new(a) == Level::new(b), a == b);
        }

        #[test]
        fn prop_registered_levels_keep_order(rank in 51u32..1000) {
            let mut registry = LevelRegistry::with_defaults();
            let level = registry.register(&format!("CUSTOM{rank}"), rank).unwrap();
            prop_assert!(level > Level::CRITICAL);
            // Registering twice still yields the same level
            prop_assert_eq!(registry.register(&format!("custom{rank}"), rank).unwrap(), level);
            let ranks: Vec<u32> = registry.levels().iter().map(|(l, _)| l.rank()).collect();
            prop_assert!(ranks.windows(2).all(|w| w[0] < w[1]));
        }
    }
}
