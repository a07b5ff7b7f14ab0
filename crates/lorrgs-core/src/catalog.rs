//! Spec and boss definitions the engine resolves names against.
//!
//! A built-in table covers the playable jobs; encounters are supplied by a
//! JSON overlay because their ids change with every tier.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{LorrgsError, LorrgsResult};
use crate::models::DEFAULT_METRIC;

/// Lowercase a display name and drop whitespace: `"Dark Knight"` -> `"darkknight"`.
pub fn slugify(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpecDef {
    pub class_name: String,
    pub spec_name: String,
    pub role: String,
    #[serde(default = "default_metric")]
    pub metric: String,
}

fn default_metric() -> String {
    DEFAULT_METRIC.to_string()
}

impl SpecDef {
    pub fn new(class_name: &str, spec_name: &str, role: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            spec_name: spec_name.to_string(),
            role: role.to_string(),
            metric: default_metric(),
        }
    }

    pub fn class_slug(&self) -> String {
        slugify(&self.class_name)
    }

    pub fn spec_slug(&self) -> String {
        slugify(&self.spec_name)
    }

    /// `"{class}-{spec}"`, the key rankings are stored under.
    pub fn full_name_slug(&self) -> String {
        format!("{}-{}", self.class_slug(), self.spec_slug())
    }

    /// Spec name as the analytics API spells it (`"DarkKnight"`).
    pub fn name_slug_cap(&self) -> String {
        self.spec_name.split_whitespace().collect()
    }

    pub fn class_name_slug_cap(&self) -> String {
        self.class_name.split_whitespace().collect()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BossDef {
    pub slug: String,
    pub name: String,
    pub encounter_id: i64,
}

// ---------------------------------------------------------------------------
// Lookup strategies
// ---------------------------------------------------------------------------

/// Ordered strategies for resolving a combatant descriptor to a spec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SpecLookup {
    /// Spec name and class name both match.
    SpecAndClass,
    /// Spec name alone matches.
    SpecOnly,
}

pub const SPEC_LOOKUP_ORDER: &[SpecLookup] = &[SpecLookup::SpecAndClass, SpecLookup::SpecOnly];

impl SpecLookup {
    fn matches(self, spec: &SpecDef, spec_name: &str, class_name: Option<&str>) -> bool {
        let spec_hit = spec.spec_slug() == slugify(spec_name);
        match self {
            SpecLookup::SpecAndClass => {
                spec_hit && class_name.is_some_and(|c| spec.class_slug() == slugify(c))
            }
            SpecLookup::SpecOnly => spec_hit,
        }
    }
}

// ---------------------------------------------------------------------------
// SpecCatalog
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpecCatalog {
    #[serde(default)]
    pub specs: Vec<SpecDef>,
    #[serde(default)]
    pub bosses: Vec<BossDef>,
}

impl SpecCatalog {
    /// Built-in job table. Every job has a single spec named after it.
    pub fn builtin() -> Self {
        const JOBS: &[(&str, &str)] = &[
            ("Paladin", "tank"),
            ("Warrior", "tank"),
            ("Dark Knight", "tank"),
            ("Gunbreaker", "tank"),
            ("White Mage", "heal"),
            ("Scholar", "heal"),
            ("Astrologian", "heal"),
            ("Sage", "heal"),
            ("Monk", "mdps"),
            ("Dragoon", "mdps"),
            ("Ninja", "mdps"),
            ("Samurai", "mdps"),
            ("Reaper", "mdps"),
            ("Viper", "mdps"),
            ("Bard", "rdps"),
            ("Machinist", "rdps"),
            ("Dancer", "rdps"),
            ("Black Mage", "cdps"),
            ("Summoner", "cdps"),
            ("Red Mage", "cdps"),
            ("Pictomancer", "cdps"),
        ];
        Self {
            specs: JOBS
                .iter()
                .map(|(name, role)| SpecDef::new(name, name, role))
                .collect(),
            bosses: vec![BossDef {
                slug: "the-omega-protocol".to_string(),
                name: "The Omega Protocol".to_string(),
                encounter_id: 1068,
            }],
        }
    }

    /// Built-in table extended (and overridden by slug) with a JSON file.
    pub fn with_overlay(path: &Path) -> LorrgsResult<Self> {
        let text = std::fs::read_to_string(path)?;
        let overlay: SpecCatalog = serde_json::from_str(&text)?;
        let mut catalog = Self::builtin();
        catalog.merge(overlay);
        Ok(catalog)
    }

    pub fn merge(&mut self, other: SpecCatalog) {
        for spec in other.specs {
            let slug = spec.full_name_slug();
            match self.specs.iter_mut().find(|s| s.full_name_slug() == slug) {
                Some(existing) => *existing = spec,
                None => self.specs.push(spec),
            }
        }
        for boss in other.bosses {
            match self.bosses.iter_mut().find(|b| b.slug == boss.slug) {
                Some(existing) => *existing = boss,
                None => self.bosses.push(boss),
            }
        }
    }

    pub fn spec_by_slug(&self, full_name_slug: &str) -> Option<&SpecDef> {
        self.specs
            .iter()
            .find(|s| s.full_name_slug() == full_name_slug)
    }

    pub fn require_spec(&self, full_name_slug: &str) -> LorrgsResult<&SpecDef> {
        self.spec_by_slug(full_name_slug)
            .ok_or_else(|| LorrgsError::UnknownSpec(full_name_slug.to_string()))
    }

    pub fn boss_by_slug(&self, slug: &str) -> Option<&BossDef> {
        self.bosses.iter().find(|b| b.slug == slug)
    }

    pub fn require_boss(&self, slug: &str) -> LorrgsResult<&BossDef> {
        self.boss_by_slug(slug)
            .ok_or_else(|| LorrgsError::UnknownBoss(slug.to_string()))
    }

    /// Resolve a descriptor by trying each [`SpecLookup`] in order.
    pub fn resolve(&self, spec_name: &str, class_name: Option<&str>) -> Option<&SpecDef> {
        SPEC_LOOKUP_ORDER.iter().find_map(|lookup| {
            self.specs
                .iter()
                .find(|spec| lookup.matches(spec, spec_name, class_name))
        })
    }

    /// All specs, sorted by full slug.
    pub fn all_specs(&self) -> Vec<&SpecDef> {
        let mut specs: Vec<&SpecDef> = self.specs.iter().collect();
        specs.sort_by_key(|s| s.full_name_slug());
        specs
    }
}
