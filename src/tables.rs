//! Terrain configuration tables
//!
//! Base weights, feature lists, resource pools and the neighbor transition
//! matrix. Tables are plain values: built once, validated, then shared
//! read-only between grids.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::terrain::TerrainKind;

pub type TransitionRow = BTreeMap<TerrainKind, f64>;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("terrain probability table is empty")]
    EmptyProbabilities,
    #[error("weight for '{terrain}' must be finite and non-negative, got {weight}")]
    InvalidWeight { terrain: TerrainKind, weight: f64 },
    #[error("terrain probability weights sum to zero")]
    ZeroTotalWeight,
    #[error("transition row '{neighbor}' names a terrain with no base probability")]
    UnknownTransitionSource { neighbor: TerrainKind },
    #[error("transition row '{neighbor}' references '{candidate}', which has no base probability")]
    UnknownTransitionTarget {
        neighbor: TerrainKind,
        candidate: TerrainKind,
    },
    #[error("transition weight {neighbor} -> {candidate} must be finite and non-negative, got {weight}")]
    InvalidTransitionWeight {
        neighbor: TerrainKind,
        candidate: TerrainKind,
        weight: f64,
    },
    #[error("unable to read tables: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse tables: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainTables {
    pub probabilities: BTreeMap<TerrainKind, f64>,
    #[serde(default)]
    pub features: BTreeMap<TerrainKind, Vec<String>>,
    #[serde(default)]
    pub terrain_resources: BTreeMap<TerrainKind, Vec<String>>,
    #[serde(default)]
    pub feature_resources: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub transitions: BTreeMap<TerrainKind, TransitionRow>,
}

impl TerrainTables {
    /// Tables with only base weights: no features, no resources, no
    /// neighbor influence.
    pub fn with_probabilities(probabilities: BTreeMap<TerrainKind, f64>) -> Self {
        Self {
            probabilities,
            features: BTreeMap::new(),
            terrain_resources: BTreeMap::new(),
            feature_resources: BTreeMap::new(),
            transitions: BTreeMap::new(),
        }
    }

    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, TableError> {
        let tables: TerrainTables = serde_yaml::from_str(text)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn validate(&self) -> Result<(), TableError> {
        if self.probabilities.is_empty() {
            return Err(TableError::EmptyProbabilities);
        }

        for (&terrain, &weight) in &self.probabilities {
            if !weight.is_finite() || weight < 0.0 {
                return Err(TableError::InvalidWeight { terrain, weight });
            }
        }

        let total: f64 = self.probabilities.values().sum();
        if total <= 0.0 {
            return Err(TableError::ZeroTotalWeight);
        }

        for (&neighbor, row) in &self.transitions {
            if !self.probabilities.contains_key(&neighbor) {
                return Err(TableError::UnknownTransitionSource { neighbor });
            }
            for (&candidate, &weight) in row {
                if !self.probabilities.contains_key(&candidate) {
                    return Err(TableError::UnknownTransitionTarget {
                        neighbor,
                        candidate,
                    });
                }
                if !weight.is_finite() || weight < 0.0 {
                    return Err(TableError::InvalidTransitionWeight {
                        neighbor,
                        candidate,
                        weight,
                    });
                }
            }
        }

        Ok(())
    }

    pub fn features_for(&self, terrain: TerrainKind) -> &[String] {
        self.features
            .get(&terrain)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn resources_for_terrain(&self, terrain: TerrainKind) -> &[String] {
        self.terrain_resources
            .get(&terrain)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn resources_for_feature(&self, feature: &str) -> &[String] {
        self.feature_resources
            .get(feature)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Terrain pool followed by the feature pool, in that order.
    pub fn resource_pool(&self, terrain: TerrainKind, feature: Option<&str>) -> Vec<&str> {
        let feature_pool = feature
            .map(|name| self.resources_for_feature(name))
            .unwrap_or_default();
        self.resources_for_terrain(terrain)
            .iter()
            .chain(feature_pool)
            .map(String::as_str)
            .collect()
    }
}

fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

impl Default for TerrainTables {
    fn default() -> Self {
        use TerrainKind::*;

        let probabilities = BTreeMap::from([
            (Grass, 0.2),
            (Plains, 0.2),
            (Desert, 0.1),
            (Snow, 0.1),
            (Tundra, 0.1),
            (Water, 0.2),
            (Mountain, 0.05),
            (Wetland, 0.05),
        ]);

        let features = BTreeMap::from([
            (Grass, names(&["savanna", "meadow", "farmland"])),
            (Plains, names(&["plateaus", "hills", "riverbank"])),
            (Desert, names(&["oasis", "hills", "dunes"])),
            (Snow, names(&["ice", "glaciers"])),
            (Tundra, names(&["permafrost", "hills"])),
            (Water, names(&["reef", "kelp", "atoll"])),
            (Mountain, names(&["peaks", "valleys"])),
            (Wetland, names(&["mangroves", "bog", "marsh", "fen", "swamp"])),
        ]);

        let terrain_resources = BTreeMap::from([
            (
                Grass,
                names(&["bananas", "deer", "ivory", "spices", "sugar", "truffles"]),
            ),
            (Plains, names(&["copper", "maize", "wheat"])),
            (Desert, names(&["gems", "gold", "oil"])),
            (Snow, names(&["furs", "oil", "silver"])),
            (Tundra, names(&["furs", "oil", "fish"])),
            (Water, names(&["fish", "pearls", "whales", "crabs"])),
            (Mountain, names(&["gold", "silver", "copper"])),
            (Wetland, names(&["fish", "reeds", "peat"])),
        ]);

        let transitions = BTreeMap::from([
            (
                Grass,
                BTreeMap::from([(Plains, 0.4), (Desert, 0.1), (Grass, 0.5)]),
            ),
            (
                Plains,
                BTreeMap::from([(Grass, 0.4), (Desert, 0.2), (Plains, 0.4)]),
            ),
            (
                Desert,
                BTreeMap::from([(Plains, 0.3), (Grass, 0.1), (Desert, 0.6)]),
            ),
            (Snow, BTreeMap::from([(Tundra, 0.4), (Snow, 0.6)])),
            (Tundra, BTreeMap::from([(Snow, 0.4), (Tundra, 0.6)])),
            (Water, BTreeMap::from([(Water, 1.0)])),
            (Mountain, BTreeMap::from([(Mountain, 1.0)])),
            (Wetland, BTreeMap::from([(Wetland, 1.0)])),
        ]);

        Self {
            probabilities,
            features,
            terrain_resources,
            feature_resources: BTreeMap::new(),
            transitions,
        }
    }
}
