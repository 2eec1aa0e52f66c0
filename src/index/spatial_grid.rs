//! Uniform grid spatial index over feature bounding boxes
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Grid (grid_size x grid_size over WGS84)    │ ← O(1) cell lookup
//! │                     ↓                       │
//! │  Cell buckets: (bbox, feature id) entries   │ ← bbox intersection filter
//! │                     ↓                       │
//! │  Locations: feature id → (bbox, cells)      │ ← O(cells) removal
//! └─────────────────────────────────────────────┘
//! ```
//!
//! The index only narrows candidates. Callers refine hits with the exact
//! predicates in [`crate::predicate`]. Boxes reaching past `world_bounds`
//! are clamped into the edge cells, so the extent tunes cell size but never
//! decides what can be indexed.

use crate::types::{BoundingBox, FeatureId};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};

const DEFAULT_GRID_SIZE: usize = 64;
const MIN_GRID_SIZE: usize = 4;
const MAX_GRID_SIZE: usize = 1024;

/// Configuration for the grid index
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridConfig {
    /// Cells per axis
    pub grid_size: usize,

    /// Indexed extent (min_x = west, min_y = south, ...)
    pub world_bounds: BoundingBox,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            grid_size: DEFAULT_GRID_SIZE,
            world_bounds: BoundingBox::new(-180.0, -90.0, 180.0, 90.0),
        }
    }
}

impl GridConfig {
    pub fn new(world_bounds: BoundingBox) -> Self {
        Self {
            world_bounds,
            ..Default::default()
        }
    }

    pub fn with_grid_size(mut self, size: usize) -> Self {
        self.grid_size = size.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE);
        self
    }
}

/// Grid cell ID (row in the high half, column in the low half)
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
struct GridCellId(u32);

impl GridCellId {
    #[inline]
    fn new(row: u16, col: u16) -> Self {
        Self(((row as u32) << 16) | (col as u32))
    }

    #[inline]
    fn row(&self) -> u16 {
        (self.0 >> 16) as u16
    }

    #[inline]
    fn col(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }
}

#[derive(Debug, Clone)]
struct CellEntry {
    bbox: BoundingBox,
    id: FeatureId,
}

/// Entries whose bbox overlaps one grid cell
#[derive(Debug, Clone, Default)]
struct CellBucket {
    entries: Vec<CellEntry>,
}

impl CellBucket {
    fn insert(&mut self, bbox: BoundingBox, id: FeatureId) {
        self.entries.push(CellEntry { bbox, id });
    }

    fn remove(&mut self, id: &FeatureId) -> bool {
        if let Some(pos) = self.entries.iter().position(|e| e.id == *id) {
            self.entries.swap_remove(pos);
            true
        } else {
            false
        }
    }

    fn range_query(&self, query: &BoundingBox, results: &mut Vec<FeatureId>) {
        for entry in &self.entries {
            if entry.bbox.intersects(query) {
                results.push(entry.id);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Index statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridStats {
    pub entries: usize,
    pub active_cells: usize,
    pub cell_slots: usize,
}

/// Grid index keyed by feature id
#[derive(Debug, Clone)]
pub struct GridIndex {
    config: GridConfig,
    cell_width: f64,
    cell_height: f64,
    cells: AHashMap<GridCellId, CellBucket>,
    locations: AHashMap<FeatureId, (BoundingBox, Vec<GridCellId>)>,
}

impl GridIndex {
    pub fn new(config: GridConfig) -> Self {
        let config = GridConfig {
            grid_size: config.grid_size.clamp(MIN_GRID_SIZE, MAX_GRID_SIZE),
            ..config
        };
        let wb = config.world_bounds;
        let cell_width = (wb.max_x - wb.min_x) / config.grid_size as f64;
        let cell_height = (wb.max_y - wb.min_y) / config.grid_size as f64;

        Self {
            config,
            cell_width,
            cell_height,
            cells: AHashMap::new(),
            locations: AHashMap::new(),
        }
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    pub fn contains(&self, id: &FeatureId) -> bool {
        self.locations.contains_key(id)
    }

    /// Insert (or re-insert) a feature's bounding box
    pub fn insert(&mut self, id: FeatureId, bbox: BoundingBox) {
        self.remove(&id);

        let cells = self.cells_in_bbox(&bbox);
        for cell in &cells {
            self.cells.entry(*cell).or_default().insert(bbox, id);
        }
        self.locations.insert(id, (bbox, cells));
    }

    pub fn remove(&mut self, id: &FeatureId) -> bool {
        let Some((_, cells)) = self.locations.remove(id) else {
            return false;
        };
        for cell in cells {
            if let Some(bucket) = self.cells.get_mut(&cell) {
                bucket.remove(id);
                if bucket.is_empty() {
                    self.cells.remove(&cell);
                }
            }
        }
        true
    }

    /// Ids whose bbox intersects `query`, sorted and deduplicated
    pub fn range_query(&self, query: &BoundingBox) -> Vec<FeatureId> {
        let cells = self.cells_in_bbox(query);
        let mut results = Vec::with_capacity(cells.len() * 4);
        for cell in cells {
            if let Some(bucket) = self.cells.get(&cell) {
                bucket.range_query(query, &mut results);
            }
        }
        results.sort_unstable();
        results.dedup();
        results
    }

    /// Union of [`range_query`](Self::range_query) over several boxes
    pub fn range_query_many(&self, queries: &[BoundingBox]) -> Vec<FeatureId> {
        let mut results: Vec<FeatureId> = queries.iter().flat_map(|q| self.range_query(q)).collect();
        results.sort_unstable();
        results.dedup();
        results
    }

    pub fn stats(&self) -> GridStats {
        GridStats {
            entries: self.len(),
            active_cells: self.cells.len(),
            cell_slots: self.cells.values().map(|b| b.entries.len()).sum(),
        }
    }

    pub fn clear(&mut self) {
        self.cells.clear();
        self.locations.clear();
    }

    fn axis_cell(&self, v: f64, origin: f64, width: f64) -> u16 {
        let last = (self.config.grid_size - 1) as f64;
        ((v - origin) / width).floor().clamp(0.0, last) as u16
    }

    /// Cells covering `bbox`; parts outside the extent land in the edge cells
    fn cells_in_bbox(&self, bbox: &BoundingBox) -> Vec<GridCellId> {
        let wb = &self.config.world_bounds;
        let min_col = self.axis_cell(bbox.min_x, wb.min_x, self.cell_width);
        let max_col = self.axis_cell(bbox.max_x, wb.min_x, self.cell_width);
        let min_row = self.axis_cell(bbox.min_y, wb.min_y, self.cell_height);
        let max_row = self.axis_cell(bbox.max_y, wb.min_y, self.cell_height);

        let mut cells =
            Vec::with_capacity((max_row - min_row + 1) as usize * (max_col - min_col + 1) as usize);
        for row in min_row..=max_row {
            for col in min_col..=max_col {
                cells.push(GridCellId::new(row, col));
            }
        }
        cells
    }
}

impl Default for GridIndex {
    fn default() -> Self {
        Self::new(GridConfig::default())
    }
}
