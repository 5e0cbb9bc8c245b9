#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Static map and wave data for Outpost Defence.
//!
//! Maps are described by an axis-aligned waypoint polyline over a fixed-size
//! grid; path terrain is derived by walking the polyline, so a blueprint can
//! never disagree with the route its enemies follow. Wave composition is a
//! deterministic function of the wave number. Nothing in this crate mutates;
//! the engine owns all live state.

use outpost_defence_core::{CellCoord, Position};
use serde::{Deserialize, Serialize};

pub mod waves;

/// Side length of a square grid cell in world units.
pub const CELL_SIZE: f32 = 2.0;

/// Classification of a single grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    /// Open ground that accepts a tower.
    Buildable,
    /// Part of the enemy route; never buildable.
    Path,
    /// Water or mountain decoration; never buildable.
    Scenery,
    /// Cell where enemies materialize.
    Spawn,
    /// Cell enemies breach to cost a life.
    Base,
}

/// Immutable description of one playable map.
#[derive(Clone, Debug)]
pub struct MapBlueprint {
    name: &'static str,
    columns: u32,
    rows: u32,
    terrain: Vec<Terrain>,
    spawn: CellCoord,
    base: CellCoord,
    waypoints: Vec<Position>,
}

impl MapBlueprint {
    /// Display name of the map.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Number of grid columns.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of grid rows.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Cell where enemies materialize.
    #[must_use]
    pub const fn spawn(&self) -> CellCoord {
        self.spawn
    }

    /// Cell enemies breach to cost a life.
    #[must_use]
    pub const fn base(&self) -> CellCoord {
        self.base
    }

    /// Ordered route waypoints in world coordinates, spawn first.
    #[must_use]
    pub fn waypoints(&self) -> &[Position] {
        &self.waypoints
    }

    /// World position where enemies materialize.
    #[must_use]
    pub fn spawn_position(&self) -> Position {
        cell_center(self.spawn)
    }

    /// Reports whether the cell lies inside the grid.
    #[must_use]
    pub fn in_bounds(&self, cell: CellCoord) -> bool {
        cell.column() < self.columns && cell.row() < self.rows
    }

    /// Terrain classification of the cell, if it lies inside the grid.
    #[must_use]
    pub fn terrain_at(&self, cell: CellCoord) -> Option<Terrain> {
        self.index(cell).map(|index| self.terrain[index])
    }

    /// Reports whether a tower may occupy the cell.
    #[must_use]
    pub fn is_buildable(&self, cell: CellCoord) -> bool {
        matches!(self.terrain_at(cell), Some(Terrain::Buildable))
    }

    /// Total number of grid cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.terrain.len()
    }

    /// Dense cell index used by per-player occupancy grids.
    #[must_use]
    pub fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.in_bounds(cell) {
            return None;
        }
        let row = usize::try_from(cell.row()).ok()?;
        let column = usize::try_from(cell.column()).ok()?;
        let width = usize::try_from(self.columns).ok()?;
        Some(row * width + column)
    }

    fn from_route(name: &'static str, columns: u32, rows: u32, route: &[(u32, u32)]) -> Self {
        let capacity = columns as usize * rows as usize;
        let mut terrain = vec![Terrain::Buildable; capacity];

        let mut mark = |cell: CellCoord, kind: Terrain| {
            if cell.column() < columns && cell.row() < rows {
                let index = cell.row() as usize * columns as usize + cell.column() as usize;
                terrain[index] = kind;
            }
        };

        for window in route.windows(2) {
            let (from, to) = (window[0], window[1]);
            for cell in segment_cells(from, to) {
                mark(cell, Terrain::Path);
            }
        }

        let spawn_pair = route.first().copied().unwrap_or((0, 0));
        let base_pair = route.last().copied().unwrap_or((0, 0));
        let spawn = CellCoord::new(spawn_pair.0, spawn_pair.1);
        let base = CellCoord::new(base_pair.0, base_pair.1);
        mark(spawn, Terrain::Spawn);
        mark(base, Terrain::Base);

        let waypoints = route
            .iter()
            .map(|&(column, row)| cell_center(CellCoord::new(column, row)))
            .collect();

        Self {
            name,
            columns,
            rows,
            terrain,
            spawn,
            base,
            waypoints,
        }
    }

    fn with_scenery(mut self, cells: &[(u32, u32)]) -> Self {
        for &(column, row) in cells {
            let cell = CellCoord::new(column, row);
            if let Some(index) = self.index(cell) {
                if self.terrain[index] == Terrain::Buildable {
                    self.terrain[index] = Terrain::Scenery;
                }
            }
        }
        self
    }
}

/// World-space center of a grid cell on the board plane.
#[must_use]
pub fn cell_center(cell: CellCoord) -> Position {
    Position::new(
        (cell.column() as f32 + 0.5) * CELL_SIZE,
        0.0,
        (cell.row() as f32 + 0.5) * CELL_SIZE,
    )
}

/// Number of maps in the catalog.
#[must_use]
pub fn map_count() -> u32 {
    2
}

/// Builds the map at the provided catalog index.
#[must_use]
pub fn blueprint(index: u32) -> Option<MapBlueprint> {
    match index {
        0 => Some(
            MapBlueprint::from_route(
                "Greenfield Pass",
                16,
                12,
                &[(0, 5), (5, 5), (5, 2), (10, 2), (10, 8), (15, 8)],
            )
            .with_scenery(&[(2, 9), (3, 9), (3, 10), (12, 1), (13, 1), (14, 5)]),
        ),
        1 => Some(
            MapBlueprint::from_route(
                "Frozen Ravine",
                16,
                12,
                &[(0, 2), (13, 2), (13, 6), (2, 6), (2, 10), (15, 10)],
            )
            .with_scenery(&[(6, 4), (7, 4), (8, 4), (0, 11), (1, 11), (15, 0)]),
        ),
        _ => None,
    }
}

fn segment_cells(from: (u32, u32), to: (u32, u32)) -> Vec<CellCoord> {
    let mut cells = Vec::new();
    if from.0 == to.0 {
        let column = from.0;
        let (start, end) = (from.1.min(to.1), from.1.max(to.1));
        for row in start..=end {
            cells.push(CellCoord::new(column, row));
        }
    } else if from.1 == to.1 {
        let row = from.1;
        let (start, end) = (from.0.min(to.0), from.0.max(to.0));
        for column in start..=end {
            cells.push(CellCoord::new(column, row));
        }
    }
    cells
}
