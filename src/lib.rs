pub mod config;
pub mod generator;
pub mod grid;
pub mod logging;
pub mod render;
pub mod rng;
pub mod tables;
pub mod terrain;
pub mod web;

pub use config::AppConfig;
pub use generator::{GenerationRequest, MapGenerator};
pub use grid::{HexGrid, HexLayout, HexMap, TilePos};
pub use tables::TerrainTables;
pub use terrain::{TerrainKind, Tile};
