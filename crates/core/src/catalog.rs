//! Archetype and topic lookup tables for scenario generation.
//!
//! The catalog is a JSON document embedded in the crate and optionally
//! replaced at startup. It is validated once when loaded: unknown archetype
//! or topic labels, duplicates, missing archetypes, empty pools and unknown
//! template placeholders are all rejected before any session runs.

use crate::topic::TopicKind;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");

/// Placeholders an opening template may reference.
pub const TEMPLATE_PLACEHOLDERS: [&str; 4] = ["{name}", "{age}", "{topic}", "{concern}"];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Archetype '{0}' is defined more than once")]
    DuplicateArchetype(Archetype),
    #[error("Topic '{0}' is defined more than once")]
    DuplicateTopic(TopicKind),
    #[error("Archetype '{0}' is missing from the catalog")]
    MissingArchetype(Archetype),
    #[error("Catalog entry '{entry}' has an empty '{field}' list")]
    EmptyList { entry: String, field: &'static str },
    #[error("Catalog entry '{entry}' has an invalid age range {min}-{max}")]
    InvalidAgeRange { entry: String, min: u8, max: u8 },
    #[error("Opening template for '{0}' uses an unknown placeholder: {1}")]
    UnknownPlaceholder(Archetype, String),
}

/// Personality category governing a persona's question and objection style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Archetype {
    #[serde(rename = "犹豫型")]
    Hesitant,
    #[serde(rename = "价格敏感型")]
    PriceSensitive,
    #[serde(rename = "品质优先型")]
    QualityFocused,
    #[serde(rename = "冲动型")]
    Impulsive,
    #[serde(rename = "理性型")]
    Analytical,
}

impl Archetype {
    pub const ALL: [Archetype; 5] = [
        Archetype::Hesitant,
        Archetype::PriceSensitive,
        Archetype::QualityFocused,
        Archetype::Impulsive,
        Archetype::Analytical,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Archetype::Hesitant => "犹豫型",
            Archetype::PriceSensitive => "价格敏感型",
            Archetype::QualityFocused => "品质优先型",
            Archetype::Impulsive => "冲动型",
            Archetype::Analytical => "理性型",
        }
    }

    /// Deterministic archetype for a trainee weak-area label, if one applies.
    pub fn for_weak_area(label: &str) -> Option<Self> {
        let label = label.to_lowercase();
        if ["价格", "pricing", "price"].iter().any(|kw| label.contains(kw)) {
            Some(Archetype::PriceSensitive)
        } else if ["异议", "objection"].iter().any(|kw| label.contains(kw)) {
            Some(Archetype::Hesitant)
        } else if ["促成", "closing"].iter().any(|kw| label.contains(kw)) {
            Some(Archetype::Analytical)
        } else {
            None
        }
    }
}

impl fmt::Display for Archetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Which name pool a topic draws persona names from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NameConvention {
    Female,
    Male,
    Either,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: u8,
    pub max: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamePools {
    pub female: Vec<String>,
    pub male: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchetypeProfile {
    pub archetype: Archetype,
    pub traits: Vec<String>,
    pub questions: Vec<String>,
    pub objections: Vec<String>,
    pub openings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicProfile {
    pub names: NameConvention,
    pub age: AgeRange,
    pub concerns: Vec<String>,
    pub questions: Vec<String>,
    pub objections: Vec<String>,
}

#[derive(Deserialize)]
struct TopicEntry {
    topic: TopicKind,
    #[serde(flatten)]
    profile: TopicProfile,
}

#[derive(Deserialize)]
struct RawCatalog {
    names: NamePools,
    archetypes: Vec<ArchetypeProfile>,
    topics: Vec<TopicEntry>,
    fallback: TopicProfile,
}

/// Validated lookup tables keyed by archetype and topic.
#[derive(Debug, Clone)]
pub struct Catalog {
    names: NamePools,
    archetypes: BTreeMap<Archetype, ArchetypeProfile>,
    topics: BTreeMap<TopicKind, TopicProfile>,
    fallback: TopicProfile,
}

impl Catalog {
    /// The catalog compiled into the crate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_CATALOG)
    }

    /// Loads and validates a catalog document from disk.
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;

        non_empty("names", "female", &raw.names.female)?;
        non_empty("names", "male", &raw.names.male)?;

        let mut archetypes = BTreeMap::new();
        for profile in raw.archetypes {
            validate_archetype(&profile)?;
            let key = profile.archetype;
            if archetypes.insert(key, profile).is_some() {
                return Err(CatalogError::DuplicateArchetype(key));
            }
        }
        if let Some(missing) = Archetype::ALL
            .into_iter()
            .find(|a| !archetypes.contains_key(a))
        {
            return Err(CatalogError::MissingArchetype(missing));
        }

        let mut topics = BTreeMap::new();
        for entry in raw.topics {
            validate_topic(entry.topic.label(), &entry.profile)?;
            if topics.insert(entry.topic, entry.profile).is_some() {
                return Err(CatalogError::DuplicateTopic(entry.topic));
            }
        }
        validate_topic("fallback", &raw.fallback)?;

        Ok(Self {
            names: raw.names,
            archetypes,
            topics,
            fallback: raw.fallback,
        })
    }

    pub fn names(&self) -> &NamePools {
        &self.names
    }

    pub fn archetype(&self, archetype: Archetype) -> &ArchetypeProfile {
        // Presence of every archetype is checked at load time.
        &self.archetypes[&archetype]
    }

    /// Profile for a topic label; unknown or unprofiled topics get the fallback.
    pub fn topic(&self, label: &str) -> &TopicProfile {
        TopicKind::from_label(label)
            .and_then(|kind| self.topics.get(&kind))
            .unwrap_or(&self.fallback)
    }
}

fn non_empty(entry: &str, field: &'static str, list: &[String]) -> Result<(), CatalogError> {
    if list.iter().all(|s| s.trim().is_empty()) {
        return Err(CatalogError::EmptyList {
            entry: entry.to_string(),
            field,
        });
    }
    Ok(())
}

fn validate_archetype(profile: &ArchetypeProfile) -> Result<(), CatalogError> {
    let entry = profile.archetype.label();
    non_empty(entry, "traits", &profile.traits)?;
    non_empty(entry, "questions", &profile.questions)?;
    non_empty(entry, "objections", &profile.objections)?;
    non_empty(entry, "openings", &profile.openings)?;

    for template in &profile.openings {
        let mut rest = template.as_str();
        while let Some(start) = rest.find('{') {
            let tail = &rest[start..];
            let end = tail.find('}').map(|i| i + 1).unwrap_or(tail.len());
            let placeholder = &tail[..end];
            if !TEMPLATE_PLACEHOLDERS.contains(&placeholder) {
                return Err(CatalogError::UnknownPlaceholder(
                    profile.archetype,
                    placeholder.to_string(),
                ));
            }
            rest = &tail[end..];
        }
    }
    Ok(())
}

fn validate_topic(entry: &str, profile: &TopicProfile) -> Result<(), CatalogError> {
    non_empty(entry, "concerns", &profile.concerns)?;
    non_empty(entry, "questions", &profile.questions)?;
    non_empty(entry, "objections", &profile.objections)?;
    if profile.age.min > profile.age.max {
        return Err(CatalogError::InvalidAgeRange {
            entry: entry.to_string(),
            min: profile.age.min,
            max: profile.age.max,
        });
    }
    Ok(())
}
