//! Uniform-grid broad-phase index.
//!
//! Each entity is written into every cell its bounding box overlaps, so a
//! body near a cell border appears in several cells. Callers that walk more
//! than one cell deduplicate with [`SeenIds`]. The cell map is only ever
//! probed by key in a fixed order, never iterated, which keeps results
//! independent of hash seeds.

use ahash::{AHashMap, AHashSet};
use glam::Vec2;

use arena_common::{circles_collide, Area, ConfigError, EntityId, Team, UnitClass};

/// Discretized `(cellX, cellY)` grid coordinate.
pub type CellKey = (i32, i32);

/// One indexed body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialEntry {
    /// Entity id
    pub id: EntityId,
    /// Ground position at insertion time
    pub position: Vec2,
    /// Body radius
    pub radius: f32,
    /// Owning team
    pub team: Team,
    /// Body class
    pub class: UnitClass,
}

impl SpatialEntry {
    /// Creates an entry.
    #[must_use]
    pub const fn new(id: EntityId, position: Vec2, radius: f32, team: Team, class: UnitClass) -> Self {
        Self {
            id,
            position,
            radius,
            team,
            class,
        }
    }
}

/// All entries overlapping one grid cell.
#[derive(Debug, Clone, Default)]
pub struct Cell {
    entries: Vec<SpatialEntry>,
}

impl Cell {
    /// Entries in insertion order.
    #[must_use]
    pub fn entries(&self) -> &[SpatialEntry] {
        &self.entries
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cell is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Tracks ids already visited while walking several cells.
#[derive(Debug, Default)]
pub struct SeenIds(AHashSet<EntityId>);

impl SeenIds {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` the first time `id` is offered.
    pub fn first_visit(&mut self, id: EntityId) -> bool {
        self.0.insert(id)
    }
}

/// Uniform grid keyed by [`CellKey`].
#[derive(Debug, Clone)]
pub struct SpatialHash {
    /// World position of cell (0, 0)'s lower corner
    origin: Vec2,
    /// Edge length of a cell
    cell_size: f32,
    /// Non-empty cells
    cells: AHashMap<CellKey, Cell>,
}

impl SpatialHash {
    /// Creates an empty grid.
    ///
    /// Fails if `cell_size` is not a positive finite number.
    pub fn new(origin: Vec2, cell_size: f32) -> Result<Self, ConfigError> {
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(ConfigError::InvalidCellSize(cell_size));
        }
        Ok(Self {
            origin,
            cell_size,
            cells: AHashMap::new(),
        })
    }

    /// Edge length of a cell.
    #[must_use]
    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Grid origin.
    #[must_use]
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Number of non-empty cells.
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Cell containing `point`.
    #[must_use]
    pub fn key_of(&self, point: Vec2) -> CellKey {
        let local = (point - self.origin) / self.cell_size;
        (local.x.floor() as i32, local.y.floor() as i32)
    }

    /// Centre of a cell in world space.
    #[must_use]
    pub fn cell_center(&self, key: CellKey) -> Vec2 {
        self.origin + (Vec2::new(key.0 as f32, key.1 as f32) + 0.5) * self.cell_size
    }

    /// Inclusive `(min, max)` cell range covered by a circle's bounding box.
    #[must_use]
    pub fn cell_range(&self, center: Vec2, radius: f32) -> (CellKey, CellKey) {
        (
            self.key_of(center - Vec2::splat(radius)),
            self.key_of(center + Vec2::splat(radius)),
        )
    }

    /// Looks up a single cell.
    #[must_use]
    pub fn cell(&self, key: CellKey) -> Option<&Cell> {
        self.cells.get(&key)
    }

    /// Writes `entry` into every cell its circle's bounding box overlaps.
    pub fn insert(&mut self, entry: SpatialEntry) {
        let ((x0, y0), (x1, y1)) = self.cell_range(entry.position, entry.radius);
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                self.cells.entry((cx, cy)).or_default().entries.push(entry);
            }
        }
    }

    /// Deletes `id` from the cells covered by `(position, radius)` and prunes
    /// cells left empty. Returns how many cell entries were removed.
    pub fn remove(&mut self, id: EntityId, position: Vec2, radius: f32) -> usize {
        let ((x0, y0), (x1, y1)) = self.cell_range(position, radius);
        let mut removed = 0;
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                let Some(cell) = self.cells.get_mut(&(cx, cy)) else {
                    continue;
                };
                let before = cell.entries.len();
                cell.entries.retain(|e| e.id != id);
                removed += before - cell.entries.len();
                if cell.entries.is_empty() {
                    self.cells.remove(&(cx, cy));
                }
            }
        }
        removed
    }

    /// Ids of bodies whose circles overlap the query circle.
    #[must_use]
    pub fn query_circle(&self, center: Vec2, radius: f32) -> Vec<EntityId> {
        self.query_entries(center, radius)
            .into_iter()
            .map(|e| e.id)
            .collect()
    }

    /// Entries whose circles overlap the query circle, one per entity.
    #[must_use]
    pub fn query_entries(&self, center: Vec2, radius: f32) -> Vec<SpatialEntry> {
        let (lo, hi) = self.cell_range(center, radius);
        self.collect_unique(lo, hi, |e| circles_collide(center, radius, e.position, e.radius))
    }

    /// Entries whose circles overlap a convex area, one per entity.
    #[must_use]
    pub fn query_area(&self, area: &dyn Area) -> Vec<SpatialEntry> {
        let (min, max) = area.bounds();
        self.collect_unique(self.key_of(min), self.key_of(max), |e| {
            area.intersects_circle(e.position, e.radius)
        })
    }

    fn collect_unique(
        &self,
        (x0, y0): CellKey,
        (x1, y1): CellKey,
        mut keep: impl FnMut(&SpatialEntry) -> bool,
    ) -> Vec<SpatialEntry> {
        let mut seen = SeenIds::new();
        let mut out = Vec::new();
        for cx in x0..=x1 {
            for cy in y0..=y1 {
                let Some(cell) = self.cells.get(&(cx, cy)) else {
                    continue;
                };
                for entry in &cell.entries {
                    if keep(entry) && seen.first_visit(entry.id) {
                        out.push(*entry);
                    }
                }
            }
        }
        out
    }
}
