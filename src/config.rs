//! Application configuration loaded from YAML

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tables::{TableError, TerrainTables};
use crate::terrain::TerrainKind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("unable to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    Validation(String),
    #[error(transparent)]
    Tables(#[from] TableError),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub map: MapConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Falls back to the built-in tables when absent.
    #[serde(default)]
    pub tables: Option<TerrainTables>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapConfig {
    #[serde(default = "default_dimension")]
    pub rows: usize,
    #[serde(default = "default_dimension")]
    pub cols: usize,
    #[serde(default = "default_terrain")]
    pub default_terrain: TerrainKind,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_dimension() -> usize {
    16
}

fn default_terrain() -> TerrainKind {
    TerrainKind::Grass
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            rows: default_dimension(),
            cols: default_dimension(),
            default_terrain: default_terrain(),
            seed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
    #[serde(default = "default_hex_radius")]
    pub hex_radius: u32,
}

fn default_output_path() -> PathBuf {
    PathBuf::from("static/map.png")
}

fn default_hex_radius() -> u32 {
    18
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
            hex_radius: default_hex_radius(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_dimension")]
    pub max_dimension: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_max_dimension() -> usize {
    128
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_dimension: default_max_dimension(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl AppConfig {
    /// Load configuration from YAML file
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let yaml = serde_yaml::to_string(self)?;
        fs::write(path, yaml)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map.rows == 0 || self.map.cols == 0 {
            return Err(ConfigError::Validation(format!(
                "map dimensions must be positive, got {}x{}",
                self.map.rows, self.map.cols
            )));
        }
        if self.server.max_dimension == 0 {
            return Err(ConfigError::Validation(
                "server.max_dimension must be positive".to_string(),
            ));
        }
        if let Some(tables) = &self.tables {
            tables.validate()?;
        }
        Ok(())
    }

    /// Configured tables, or the built-in defaults.
    pub fn terrain_tables(&self) -> TerrainTables {
        self.tables.clone().unwrap_or_default()
    }
}
