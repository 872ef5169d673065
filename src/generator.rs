use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    grid::{GridError, HexGrid, HexMap},
    render::{RenderError, Renderer},
    rng::{self, RandomSource},
    tables::TerrainTables,
    terrain::TerrainKind,
};

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error(transparent)]
    Grid(#[from] GridError),
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Parameters for one map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    pub rows: usize,
    pub cols: usize,
    pub default_terrain: TerrainKind,
    pub seed: Option<u64>,
}

impl GenerationRequest {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            default_terrain: TerrainKind::Grass,
            seed: None,
        }
    }

    pub fn with_default_terrain(mut self, terrain: TerrainKind) -> Self {
        self.default_terrain = terrain;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Builds grids from shared tables, generates them and hands the result to a
/// renderer.
#[derive(Debug, Clone)]
pub struct MapGenerator {
    tables: Arc<TerrainTables>,
}

impl Default for MapGenerator {
    fn default() -> Self {
        Self::new(Arc::new(TerrainTables::default()))
    }
}

impl MapGenerator {
    pub fn new(tables: Arc<TerrainTables>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &Arc<TerrainTables> {
        &self.tables
    }

    /// Generate with an explicit random source.
    pub fn generate_with<R: RandomSource + ?Sized>(
        &self,
        request: &GenerationRequest,
        rng: &mut R,
    ) -> Result<HexMap, GridError> {
        let grid = HexGrid::new(
            request.rows,
            request.cols,
            request.default_terrain,
            Arc::clone(&self.tables),
        )?;
        let map = grid.generate(rng)?;
        info!(
            rows = map.rows(),
            cols = map.cols(),
            features = map.feature_count(),
            resources = map.resource_count(),
            "map generated"
        );
        Ok(map)
    }

    /// Generate with a ChaCha source seeded from the request, or from entropy
    /// when the request carries no seed.
    pub fn generate(&self, request: &GenerationRequest) -> Result<HexMap, GridError> {
        match request.seed {
            Some(seed) => self.generate_with(request, &mut rng::seeded(seed)),
            None => self.generate_with(request, &mut rng::from_entropy()),
        }
    }

    pub fn generate_and_render(
        &self,
        request: &GenerationRequest,
        renderer: &dyn Renderer,
        path: &Path,
    ) -> Result<HexMap, GenerateError> {
        let map = self.generate(request)?;
        renderer.render(&map, path)?;
        info!(path = %path.display(), "map rendered");
        Ok(map)
    }
}
