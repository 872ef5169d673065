//! Hex grid model and terrain generation
//!
//! Cells live in a row-major array and emulate hexagonal adjacency with
//! offset coordinates: even rows lean right, so their diagonal neighbors in
//! the rows above and below sit at `col + 1`; odd rows lean left and use
//! `col - 1`. Renderers must use the same layout so that visual placement
//! matches logical adjacency.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::rng::RandomSource;
use crate::tables::{TableError, TerrainTables};
use crate::terrain::{TerrainKind, Tile};

/// Chance that a cell receives a terrain feature.
pub const FEATURE_CHANCE: f64 = 0.5;
/// Chance that a cell receives a resource.
pub const RESOURCE_CHANCE: f64 = 0.3;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("rows and columns must be positive integers (got {rows}x{cols})")]
    InvalidDimensions { rows: usize, cols: usize },
    #[error("cell ({row}, {col}) has a '{neighbor}' neighbor with no transition row")]
    UnknownNeighborTerrain {
        row: usize,
        col: usize,
        neighbor: TerrainKind,
    },
    /// Validated weights are finite, but their neighbor sums can still overflow.
    #[error("cell ({row}, {col}) has no usable terrain distribution")]
    DegenerateDistribution { row: usize, col: usize },
    #[error(transparent)]
    Tables(#[from] TableError),
}

/// Cell position in the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TilePos {
    pub row: usize,
    pub col: usize,
}

impl TilePos {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Grid dimensions plus the offset-coordinate neighbor rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HexLayout {
    rows: usize,
    cols: usize,
}

impl HexLayout {
    pub fn new(rows: usize, cols: usize) -> Result<Self, GridError> {
        if rows == 0 || cols == 0 {
            return Err(GridError::InvalidDimensions { rows, cols });
        }
        Ok(Self { rows, cols })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn tile_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn contains(&self, pos: TilePos) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }

    pub fn index(&self, pos: TilePos) -> Option<usize> {
        self.contains(pos).then(|| pos.row * self.cols + pos.col)
    }

    pub fn pos(&self, index: usize) -> Option<TilePos> {
        (index < self.tile_count()).then(|| TilePos::new(index / self.cols, index % self.cols))
    }

    /// In-bounds neighbors of `pos`, at most six.
    pub fn neighbors(&self, pos: TilePos) -> Neighbors {
        Neighbors {
            layout: *self,
            origin: pos,
            next: 0,
        }
    }

    /// Visual centre of a cell in units of hex width, for renderers.
    ///
    /// Even rows are shifted half a cell right, matching the diagonal rule.
    pub fn center(&self, pos: TilePos) -> (f64, f64) {
        let shift = if pos.row % 2 == 0 { 0.5 } else { 0.0 };
        let x = pos.col as f64 + shift;
        let y = pos.row as f64 * 3f64.sqrt() / 2.0;
        (x, y)
    }

    fn offsets(row: usize) -> [(isize, isize); 6] {
        let diagonal = if row % 2 == 0 { 1 } else { -1 };
        [
            (-1, 0),
            (1, 0),
            (0, -1),
            (0, 1),
            (-1, diagonal),
            (1, diagonal),
        ]
    }
}

/// Lazy iterator over a cell's in-bounds neighbors. Order is fixed:
/// vertical, horizontal, then the two diagonals.
#[derive(Debug, Clone)]
pub struct Neighbors {
    layout: HexLayout,
    origin: TilePos,
    next: usize,
}

impl Iterator for Neighbors {
    type Item = TilePos;

    fn next(&mut self) -> Option<TilePos> {
        let offsets = HexLayout::offsets(self.origin.row);
        while self.next < offsets.len() {
            let (dr, dc) = offsets[self.next];
            self.next += 1;
            let row = self.origin.row.checked_add_signed(dr);
            let col = self.origin.col.checked_add_signed(dc);
            if let (Some(row), Some(col)) = (row, col) {
                let candidate = TilePos::new(row, col);
                if self.layout.contains(candidate) {
                    return Some(candidate);
                }
            }
        }
        None
    }
}

/// Ungenerated grid: owns its tiles and a shared handle to the tables.
#[derive(Debug, Clone)]
pub struct HexGrid {
    layout: HexLayout,
    default_terrain: TerrainKind,
    tiles: Vec<Tile>,
    tables: Arc<TerrainTables>,
}

impl HexGrid {
    pub fn new(
        rows: usize,
        cols: usize,
        default_terrain: TerrainKind,
        tables: Arc<TerrainTables>,
    ) -> Result<Self, GridError> {
        let layout = HexLayout::new(rows, cols)?;
        tables.validate()?;
        Ok(Self {
            layout,
            default_terrain,
            tiles: vec![Tile::new(default_terrain); layout.tile_count()],
            tables,
        })
    }

    pub fn with_default_tables(
        rows: usize,
        cols: usize,
        default_terrain: TerrainKind,
    ) -> Result<Self, GridError> {
        Self::new(rows, cols, default_terrain, Arc::new(TerrainTables::default()))
    }

    pub fn layout(&self) -> HexLayout {
        self.layout
    }

    pub fn rows(&self) -> usize {
        self.layout.rows
    }

    pub fn cols(&self) -> usize {
        self.layout.cols
    }

    pub fn default_terrain(&self) -> TerrainKind {
        self.default_terrain
    }

    pub fn tables(&self) -> &TerrainTables {
        &self.tables
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tile(&self, row: usize, col: usize) -> Option<&Tile> {
        let index = self.layout.index(TilePos::new(row, col))?;
        self.tiles.get(index)
    }

    pub fn tile_mut(&mut self, row: usize, col: usize) -> Option<&mut Tile> {
        let index = self.layout.index(TilePos::new(row, col))?;
        self.tiles.get_mut(index)
    }

    pub fn neighbor_coords(&self, row: usize, col: usize) -> Neighbors {
        self.layout.neighbors(TilePos::new(row, col))
    }

    /// Current terrain of every neighbor, in neighbor enumeration order.
    pub fn neighbor_types(&self, row: usize, col: usize) -> Vec<TerrainKind> {
        self.neighbor_coords(row, col)
            .filter_map(|pos| self.tile(pos.row, pos.col))
            .map(|tile| tile.terrain_type)
            .collect()
    }

    /// Normalized terrain distribution for a cell given its neighbors' current
    /// terrain.
    ///
    /// Each neighbor's transition row is added onto a copy of the base
    /// weights. An empty transition table turns neighbor influence off.
    pub fn terrain_distribution(
        &self,
        row: usize,
        col: usize,
    ) -> Result<Vec<(TerrainKind, f64)>, GridError> {
        let mut weights: BTreeMap<TerrainKind, f64> = self.tables.probabilities.clone();

        if !self.tables.transitions.is_empty() {
            for neighbor in self.neighbor_types(row, col) {
                let transition = self.tables.transitions.get(&neighbor).ok_or(
                    GridError::UnknownNeighborTerrain { row, col, neighbor },
                )?;
                for (&candidate, &weight) in transition {
                    *weights.entry(candidate).or_insert(0.0) += weight;
                }
            }
        }

        let total: f64 = weights.values().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(GridError::DegenerateDistribution { row, col });
        }
        Ok(weights
            .into_iter()
            .map(|(terrain, weight)| (terrain, weight / total))
            .collect())
    }

    pub fn choose_terrain_type<R: RandomSource + ?Sized>(
        &self,
        row: usize,
        col: usize,
        rng: &mut R,
    ) -> Result<TerrainKind, GridError> {
        let distribution = self.terrain_distribution(row, col)?;
        let probabilities: Vec<f64> = distribution.iter().map(|(_, p)| *p).collect();
        rng.choose_weighted(&probabilities)
            .map(|index| distribution[index].0)
            .ok_or(GridError::DegenerateDistribution { row, col })
    }

    pub fn choose_terrain_feature<R: RandomSource + ?Sized>(
        &self,
        terrain: TerrainKind,
        rng: &mut R,
    ) -> Option<String> {
        if rng.unit() >= FEATURE_CHANCE {
            return None;
        }
        let features = self.tables.features_for(terrain);
        if features.is_empty() {
            return None;
        }
        Some(features[rng.choose_index(features.len())].clone())
    }

    pub fn choose_resource<R: RandomSource + ?Sized>(
        &self,
        terrain: TerrainKind,
        feature: Option<&str>,
        rng: &mut R,
    ) -> Option<String> {
        if rng.unit() >= RESOURCE_CHANCE {
            return None;
        }
        let pool = self.tables.resource_pool(terrain, feature);
        if pool.is_empty() {
            return None;
        }
        Some(pool[rng.choose_index(pool.len())].to_string())
    }

    /// Resolve every cell in row-major order.
    ///
    /// Each cell is written before the next is visited, so a cell sees the
    /// generated terrain of neighbors above and to the left and the default
    /// terrain everywhere else. Any failure discards the grid.
    pub fn generate<R: RandomSource + ?Sized>(mut self, rng: &mut R) -> Result<HexMap, GridError> {
        for row in 0..self.layout.rows {
            for col in 0..self.layout.cols {
                let terrain_type = self.choose_terrain_type(row, col, rng)?;
                let terrain_feature = self.choose_terrain_feature(terrain_type, rng);
                let resource = self.choose_resource(terrain_type, terrain_feature.as_deref(), rng);

                let index = row * self.layout.cols + col;
                self.tiles[index] = Tile::with_details(terrain_type, terrain_feature, resource);
            }
            debug!(row, "row generated");
        }

        Ok(HexMap {
            rows: self.layout.rows,
            cols: self.layout.cols,
            default_terrain: self.default_terrain,
            tiles: self.tiles,
        })
    }
}

/// Fully generated, read-only map.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HexMap {
    rows: usize,
    cols: usize,
    default_terrain: TerrainKind,
    tiles: Vec<Tile>,
}

impl HexMap {
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn default_terrain(&self) -> TerrainKind {
        self.default_terrain
    }

    pub fn layout(&self) -> HexLayout {
        HexLayout {
            rows: self.rows,
            cols: self.cols,
        }
    }

    pub fn tile(&self, row: usize, col: usize) -> Option<&Tile> {
        let index = self.layout().index(TilePos::new(row, col))?;
        self.tiles.get(index)
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Tiles with their positions, row-major.
    pub fn iter(&self) -> impl Iterator<Item = (TilePos, &Tile)> + '_ {
        let cols = self.cols;
        self.tiles
            .iter()
            .enumerate()
            .map(move |(index, tile)| (TilePos::new(index / cols, index % cols), tile))
    }

    pub fn terrain_counts(&self) -> BTreeMap<TerrainKind, usize> {
        let mut counts = BTreeMap::new();
        for tile in &self.tiles {
            *counts.entry(tile.terrain_type).or_insert(0) += 1;
        }
        counts
    }

    pub fn feature_count(&self) -> usize {
        self.tiles
            .iter()
            .filter(|tile| tile.terrain_feature.is_some())
            .count()
    }

    pub fn resource_count(&self) -> usize {
        self.tiles.iter().filter(|tile| tile.resource.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::{seeded, ScriptedRng};

    fn grass_and_water(transitions: bool) -> Arc<TerrainTables> {
        let mut tables = TerrainTables::with_probabilities(BTreeMap::from([
            (TerrainKind::Grass, 1.0),
            (TerrainKind::Water, 1.0),
        ]));
        if transitions {
            tables
                .transitions
                .insert(TerrainKind::Grass, BTreeMap::new());
            tables.transitions.insert(
                TerrainKind::Water,
                BTreeMap::from([(TerrainKind::Water, 2.0)]),
            );
        }
        Arc::new(tables)
    }

    #[test]
    fn test_grid_init() {
        let grid = HexGrid::with_default_tables(3, 4, TerrainKind::Grass).unwrap();

        assert_eq!(grid.rows(), 3);
        assert_eq!(grid.cols(), 4);
        assert_eq!(grid.tiles().len(), 12);
        for tile in grid.tiles() {
            assert_eq!(tile, &Tile::new(TerrainKind::Grass));
        }
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        for (rows, cols) in [(0, 3), (3, 0), (0, 0)] {
            let err = HexGrid::with_default_tables(rows, cols, TerrainKind::Grass).unwrap_err();
            assert!(matches!(err, GridError::InvalidDimensions { .. }));
        }
    }

    #[test]
    fn test_pos_index_conversion() {
        let layout = HexLayout::new(5, 10).unwrap();

        let pos = TilePos::new(2, 3);
        let id = layout.index(pos).unwrap();
        assert_eq!(id, 23);
        assert_eq!(layout.pos(id), Some(pos));
        assert_eq!(layout.index(TilePos::new(5, 0)), None);
        assert_eq!(layout.pos(50), None);
    }

    #[test]
    fn test_neighbor_offsets_depend_on_row_parity() {
        let layout = HexLayout::new(5, 5).unwrap();

        let even: Vec<_> = layout.neighbors(TilePos::new(2, 2)).collect();
        assert_eq!(
            even,
            vec![
                TilePos::new(1, 2),
                TilePos::new(3, 2),
                TilePos::new(2, 1),
                TilePos::new(2, 3),
                TilePos::new(1, 3),
                TilePos::new(3, 3),
            ]
        );

        let odd: Vec<_> = layout.neighbors(TilePos::new(1, 2)).collect();
        assert_eq!(
            odd,
            vec![
                TilePos::new(0, 2),
                TilePos::new(2, 2),
                TilePos::new(1, 1),
                TilePos::new(1, 3),
                TilePos::new(0, 1),
                TilePos::new(2, 1),
            ]
        );
    }

    #[test]
    fn test_corner_neighbors() {
        let layout = HexLayout::new(4, 4).unwrap();
        let count = |row, col| layout.neighbors(TilePos::new(row, col)).count();

        assert_eq!(count(0, 0), 3);
        assert_eq!(count(0, 3), 2);
        assert_eq!(count(3, 0), 2);
        assert_eq!(count(3, 3), 3);

        let single = HexLayout::new(1, 1).unwrap();
        assert_eq!(single.neighbors(TilePos::new(0, 0)).count(), 0);
    }

    #[test]
    fn test_neighbors_are_in_bounds_and_symmetric() {
        let layout = HexLayout::new(6, 7).unwrap();
        for index in 0..layout.tile_count() {
            let pos = layout.pos(index).unwrap();
            let neighbors: Vec<_> = layout.neighbors(pos).collect();
            assert!(neighbors.len() <= 6);
            for neighbor in neighbors {
                assert!(layout.contains(neighbor));
                assert!(
                    layout.neighbors(neighbor).any(|back| back == pos),
                    "{neighbor:?} should list {pos:?} as a neighbor"
                );
            }
        }
    }

    #[test]
    fn test_neighbor_iteration_is_restartable() {
        let layout = HexLayout::new(3, 3).unwrap();
        let first: Vec<_> = layout.neighbors(TilePos::new(1, 1)).collect();
        let second: Vec<_> = layout.neighbors(TilePos::new(1, 1)).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_single_cell_distribution_is_normalized_base() {
        let grid = HexGrid::with_default_tables(1, 1, TerrainKind::Grass).unwrap();
        let distribution = grid.terrain_distribution(0, 0).unwrap();

        let base = &grid.tables().probabilities;
        let total: f64 = base.values().sum();
        assert_eq!(distribution.len(), base.len());
        for (terrain, probability) in distribution {
            assert!((probability - base[&terrain] / total).abs() < 1e-12);
        }
    }

    #[test]
    fn test_unvisited_neighbors_contribute_default_terrain() {
        let grid = HexGrid::new(1, 2, TerrainKind::Water, grass_and_water(true)).unwrap();
        let distribution = grid.terrain_distribution(0, 0).unwrap();

        assert_eq!(
            distribution,
            vec![(TerrainKind::Grass, 0.25), (TerrainKind::Water, 0.75)]
        );
    }

    #[test]
    fn test_choose_terrain_type_uses_cumulative_draw() {
        let grid = HexGrid::new(1, 1, TerrainKind::Grass, grass_and_water(false)).unwrap();

        let low = grid
            .choose_terrain_type(0, 0, &mut ScriptedRng::constant(0.49))
            .unwrap();
        let high = grid
            .choose_terrain_type(0, 0, &mut ScriptedRng::constant(0.5))
            .unwrap();
        assert_eq!(low, TerrainKind::Grass);
        assert_eq!(high, TerrainKind::Water);
    }

    #[test]
    fn test_feature_threshold() {
        let grid = HexGrid::with_default_tables(1, 1, TerrainKind::Grass).unwrap();

        let mut below = ScriptedRng::new(vec![0.49, 0.7]);
        assert_eq!(
            grid.choose_terrain_feature(TerrainKind::Snow, &mut below),
            Some("glaciers".to_string())
        );

        let mut above = ScriptedRng::constant(0.5);
        assert_eq!(grid.choose_terrain_feature(TerrainKind::Snow, &mut above), None);
        assert_eq!(above.draws(), 1);
    }

    #[test]
    fn test_feature_empty_list_is_absent() {
        let grid = HexGrid::new(1, 1, TerrainKind::Grass, grass_and_water(false)).unwrap();
        let mut rng = ScriptedRng::constant(0.0);
        assert_eq!(grid.choose_terrain_feature(TerrainKind::Grass, &mut rng), None);
        assert_eq!(rng.draws(), 1);
    }

    #[test]
    fn test_resource_threshold_and_pool() {
        let mut tables = TerrainTables::default();
        tables
            .feature_resources
            .insert("oasis".to_string(), vec!["dates".to_string()]);
        let grid = HexGrid::new(1, 1, TerrainKind::Grass, Arc::new(tables)).unwrap();

        // pool is gems, gold, oil, dates; 0.9 lands on the last entry
        let mut rng = ScriptedRng::new(vec![0.29, 0.9]);
        assert_eq!(
            grid.choose_resource(TerrainKind::Desert, Some("oasis"), &mut rng),
            Some("dates".to_string())
        );

        let mut rng = ScriptedRng::constant(0.3);
        assert_eq!(
            grid.choose_resource(TerrainKind::Desert, Some("oasis"), &mut rng),
            None
        );

        let empty = HexGrid::new(1, 1, TerrainKind::Grass, grass_and_water(false)).unwrap();
        let mut rng = ScriptedRng::constant(0.0);
        assert_eq!(empty.choose_resource(TerrainKind::Water, None, &mut rng), None);
    }

    #[test]
    fn test_missing_transition_row_fails_generation() {
        let mut tables = TerrainTables::default();
        tables.transitions.remove(&TerrainKind::Mountain);
        let grid = HexGrid::new(2, 2, TerrainKind::Mountain, Arc::new(tables)).unwrap();

        let err = grid.generate(&mut seeded(1)).unwrap_err();
        assert!(matches!(
            err,
            GridError::UnknownNeighborTerrain {
                row: 0,
                col: 0,
                neighbor: TerrainKind::Mountain,
            }
        ));
    }

    #[test]
    fn test_overflowing_neighbor_weights_are_degenerate() {
        let mut tables = TerrainTables::with_probabilities(BTreeMap::from([
            (TerrainKind::Grass, 1.0),
            (TerrainKind::Water, 1.0),
        ]));
        for terrain in [TerrainKind::Grass, TerrainKind::Water] {
            tables
                .transitions
                .insert(terrain, BTreeMap::from([(TerrainKind::Grass, 1e308)]));
        }
        let grid = HexGrid::new(3, 3, TerrainKind::Grass, Arc::new(tables)).unwrap();

        // three grass neighbors push the grass weight past f64::MAX
        assert!(matches!(
            grid.terrain_distribution(0, 0),
            Err(GridError::DegenerateDistribution { row: 0, col: 0 })
        ));
        assert!(grid.generate(&mut seeded(3)).is_err());
    }

    #[test]
    fn test_generated_map_summaries() {
        let grid = HexGrid::with_default_tables(8, 8, TerrainKind::Grass).unwrap();
        let map = grid.generate(&mut seeded(11)).unwrap();

        let counted: usize = map.terrain_counts().values().sum();
        assert_eq!(counted, 64);
        assert!(map.feature_count() <= 64);
        assert!(map.resource_count() <= 64);
        assert_eq!(map.iter().count(), 64);
        let (last_pos, last_tile) = map.iter().last().unwrap();
        assert_eq!(last_pos, TilePos::new(7, 7));
        assert_eq!(Some(last_tile), map.tile(7, 7));
    }
}
