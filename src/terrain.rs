//! Terrain kinds and the per-cell tile record

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Primary classification of a cell.
///
/// Declaration order is the order terrain weights are laid out when a
/// distribution is sampled, so it must stay stable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TerrainKind {
    Grass,
    Plains,
    Desert,
    Snow,
    Tundra,
    Water,
    Mountain,
    Wetland,
}

impl TerrainKind {
    pub const ALL: [TerrainKind; 8] = [
        TerrainKind::Grass,
        TerrainKind::Plains,
        TerrainKind::Desert,
        TerrainKind::Snow,
        TerrainKind::Tundra,
        TerrainKind::Water,
        TerrainKind::Mountain,
        TerrainKind::Wetland,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TerrainKind::Grass => "grass",
            TerrainKind::Plains => "plains",
            TerrainKind::Desert => "desert",
            TerrainKind::Snow => "snow",
            TerrainKind::Tundra => "tundra",
            TerrainKind::Water => "water",
            TerrainKind::Mountain => "mountain",
            TerrainKind::Wetland => "wetland",
        }
    }
}

impl fmt::Display for TerrainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown terrain type '{0}'")]
pub struct UnknownTerrain(pub String);

impl FromStr for TerrainKind {
    type Err = UnknownTerrain;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        TerrainKind::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownTerrain(wanted.to_string()))
    }
}

/// One cell of the hex grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub terrain_type: TerrainKind,
    pub terrain_feature: Option<String>,
    pub resource: Option<String>,
}

impl Tile {
    pub fn new(terrain_type: TerrainKind) -> Self {
        Self {
            terrain_type,
            terrain_feature: None,
            resource: None,
        }
    }

    pub fn with_details(
        terrain_type: TerrainKind,
        terrain_feature: Option<String>,
        resource: Option<String>,
    ) -> Self {
        Self {
            terrain_type,
            terrain_feature,
            resource,
        }
    }
}
