// Voxel navigation grid for enemy pathfinding.
//
// Layer 1: VoxelGrid: one cost-tagged cell per (x, y, z) slot, sampled from
// the world with downward probes. Stairs get their own pass so staircases
// connect levels.
// Layer 2: PathFinder (pathfinder.rs): A* over this grid.
// Layer 3: SteeringBlender (steering.rs): local avoidance on top of a path.

use glam::{IVec3, UVec3, Vec3};
use log::{debug, info};

use super::config::GridConfig;
use super::error::{NavError, Result};
use super::world::{SurfaceMask, WorldProbe};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Cost of a flat, level cell.
pub const FLAT_COST: f32 = 1.0;
/// Cost of a cell sitting on a 45° slope.
pub const MAX_SLOPE_COST: f32 = 5.0;
/// Steepest walkable slope, in degrees.
pub const MAX_WALKABLE_SLOPE_DEG: f32 = 45.0;
/// Cost of a stair / level-transition cell.
pub const STAIR_COST: f32 = 3.0;

// ============================================================================
// CELL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    /// Sampled from a ground surface.
    Ground,
    /// Level-transition cell, found by the stair pass or propagated below one.
    Stair,
    /// Empty voxel back-filled so every column has full vertical coverage.
    Fill,
    /// Slot the build never reached. Never walkable.
    Void,
}

/// One navigation cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cell {
    pub coord: UVec3,
    /// World-space anchor: the probe hit point for sampled cells, the voxel
    /// center otherwise.
    pub world_position: Vec3,
    pub walkable: bool,
    /// Base traversal cost. `f32::INFINITY` for void cells.
    pub movement_cost: f32,
    pub kind: CellKind,
}

impl Cell {
    #[inline]
    pub fn is_stair(&self) -> bool {
        self.kind == CellKind::Stair
    }

    /// The search may enter this cell.
    #[inline]
    pub fn is_traversable(&self) -> bool {
        self.walkable || self.is_stair()
    }

    #[inline]
    pub fn level(&self) -> u32 {
        self.coord.y
    }
}

/// Cost of a surface tilted `slope_deg` from level: 1.0 flat, 5.0 at 45°.
pub fn slope_cost(slope_deg: f32) -> f32 {
    let t = (slope_deg / MAX_WALKABLE_SLOPE_DEG).clamp(0.0, 1.0);
    FLAT_COST + (MAX_SLOPE_COST - FLAT_COST) * t
}

// ============================================================================
// VOXEL GRID
// ============================================================================

/// 3D grid of cells covering a bounding volume.
///
/// Every slot holds exactly one cell once construction returns. The AI layer
/// may overwrite walkability and cost; cell identity never changes.
#[derive(Debug, Clone)]
pub struct VoxelGrid {
    cells: Vec<Cell>,
    size: UVec3,
    cell_diameter: f32,
    /// World position of the (0, 0, 0) slot's minimum corner.
    origin: Vec3,
}

impl VoxelGrid {
    /// Sample the world and build the grid.
    ///
    /// 1. ground pass: first ground hit per column, cost from slope
    /// 2. stair pass: finer vertical re-scan for stair surfaces
    /// 3. back-fill empty slots with walkable fill cells
    /// 4. propagate stairs one level down (below and x±1)
    /// 5. anything still empty becomes an unwalkable void cell
    pub fn build(probe: &dyn WorldProbe, config: &GridConfig) -> Result<Self> {
        let d = config.cell_diameter;
        if !(d > 0.0) {
            return Err(NavError::InvalidGrid(format!("cell diameter {d} must be positive")));
        }
        let dims = (config.size / d).round();
        if dims.min_element() < 1.0 {
            return Err(NavError::InvalidGrid(format!(
                "volume {} holds no {d}-wide cells",
                config.size
            )));
        }
        let size = dims.as_uvec3();
        let origin = config.center - config.size * 0.5;
        let slot_count = slot_count(size)?;

        let mut builder = GridBuilder {
            slots: vec![None; slot_count],
            size,
            cell_diameter: d,
            origin,
        };

        let top = origin.y + config.size.y;
        let ground_mask = SurfaceMask::GROUND;

        // Pass 1: ground.
        for x in 0..size.x {
            for z in 0..size.z {
                let column = builder.column_center(x, z);
                let from = Vec3::new(column.x, top + config.probe_height, column.z);
                let Some(hit) = probe.raycast(from, Vec3::NEG_Y, config.probe_distance, ground_mask)
                else {
                    continue;
                };
                let slope = hit.normal.angle_between(Vec3::Y).to_degrees();
                let coord = UVec3::new(x, builder.level_of(hit.point.y), z);
                builder.put(Cell {
                    coord,
                    world_position: hit.point,
                    walkable: slope <= MAX_WALKABLE_SLOPE_DEG,
                    movement_cost: slope_cost(slope),
                    kind: CellKind::Ground,
                });
            }
        }

        // Pass 2: stairs.
        let step = (d * config.stair_scan_step).max(1e-3);
        let mut stair_cells = Vec::new();
        for x in 0..size.x {
            for z in 0..size.z {
                let column = builder.column_center(x, z);
                let mut elevations: Vec<f32> = Vec::new();
                let mut y = top;
                while y > origin.y {
                    let from = Vec3::new(column.x, y, column.z);
                    if let Some(hit) = probe.raycast(from, Vec3::NEG_Y, step, SurfaceMask::STAIR) {
                        let elevation = hit.point.y;
                        if elevations.iter().all(|e| (e - elevation).abs() >= d * 0.5) {
                            elevations.push(elevation);
                        }
                    }
                    y -= step;
                }
                for elevation in elevations {
                    let coord = UVec3::new(x, builder.level_of(elevation), z);
                    builder.put(Cell {
                        coord,
                        world_position: Vec3::new(column.x, elevation, column.z),
                        walkable: true,
                        movement_cost: STAIR_COST,
                        kind: CellKind::Stair,
                    });
                    stair_cells.push(coord);
                }
            }
        }

        // Pass 3: back-fill.
        for idx in 0..slot_count {
            if builder.slots[idx].is_none() {
                let coord = builder.coord_of(idx);
                builder.slots[idx] = Some(Cell {
                    coord,
                    world_position: builder.voxel_center(coord),
                    walkable: true,
                    movement_cost: FLAT_COST,
                    kind: CellKind::Fill,
                });
            }
        }

        // Pass 4: stair propagation, from the stairs the scan found only.
        for coord in &stair_cells {
            if coord.y == 0 {
                continue;
            }
            let below = coord.y - 1;
            for dx in [-1i32, 0, 1] {
                let x = coord.x as i32 + dx;
                if x < 0 || x >= size.x as i32 {
                    continue;
                }
                let target = UVec3::new(x as u32, below, coord.z);
                let idx = builder.index(target);
                let position = builder.slots[idx]
                    .map(|c| c.world_position)
                    .unwrap_or_else(|| builder.voxel_center(target));
                builder.slots[idx] = Some(Cell {
                    coord: target,
                    world_position: position,
                    walkable: true,
                    movement_cost: STAIR_COST,
                    kind: CellKind::Stair,
                });
            }
        }

        let grid = builder.finish();
        info!(
            "voxel grid built: {}x{}x{} cells, {} stair, {} unwalkable",
            size.x,
            size.y,
            size.z,
            grid.cells.iter().filter(|c| c.is_stair()).count(),
            grid.cells.iter().filter(|c| !c.walkable).count(),
        );
        Ok(grid)
    }

    /// Fully walkable grid of ground cells anchored at their voxel centers.
    /// Used where a level is described cell by cell rather than sampled.
    pub fn flat(size: UVec3, cell_diameter: f32, origin: Vec3) -> Result<Self> {
        if size.min_element() == 0 || !(cell_diameter > 0.0) {
            return Err(NavError::InvalidGrid(format!(
                "{size} cells of diameter {cell_diameter}"
            )));
        }
        let mut builder = GridBuilder {
            slots: vec![None; slot_count(size)?],
            size,
            cell_diameter,
            origin,
        };
        for idx in 0..builder.slots.len() {
            let coord = builder.coord_of(idx);
            builder.slots[idx] = Some(Cell {
                coord,
                world_position: builder.voxel_center(coord),
                walkable: true,
                movement_cost: FLAT_COST,
                kind: CellKind::Ground,
            });
        }
        Ok(builder.finish())
    }

    // ------------------------------------------------------------------------
    // Geometry
    // ------------------------------------------------------------------------

    pub fn size(&self) -> UVec3 {
        self.size
    }

    pub fn cell_diameter(&self) -> f32 {
        self.cell_diameter
    }

    pub fn origin(&self) -> Vec3 {
        self.origin
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// True if `pos` lies inside the bounding volume.
    pub fn contains(&self, pos: Vec3) -> bool {
        let local = (pos - self.origin) / self.cell_diameter;
        local.min_element() >= 0.0
            && local.x < self.size.x as f32
            && local.y < self.size.y as f32
            && local.z < self.size.z as f32
    }

    /// Grid slot containing `pos`, clamped to the grid bounds.
    pub fn world_to_coord(&self, pos: Vec3) -> UVec3 {
        let local = ((pos - self.origin) / self.cell_diameter).floor().as_ivec3();
        local
            .clamp(IVec3::ZERO, self.size.as_ivec3() - IVec3::ONE)
            .as_uvec3()
    }

    /// The cell containing `pos`, clamped to the grid bounds.
    pub fn world_to_cell(&self, pos: Vec3) -> &Cell {
        &self.cells[self.index(self.world_to_coord(pos))]
    }

    /// World-space center of the voxel at `coord`.
    pub fn voxel_center(&self, coord: UVec3) -> Vec3 {
        self.origin + (coord.as_vec3() + Vec3::splat(0.5)) * self.cell_diameter
    }

    #[inline]
    pub fn in_bounds(&self, coord: IVec3) -> bool {
        coord.min_element() >= 0
            && coord.x < self.size.x as i32
            && coord.y < self.size.y as i32
            && coord.z < self.size.z as i32
    }

    #[inline]
    pub(crate) fn index(&self, coord: UVec3) -> usize {
        ((coord.y * self.size.z + coord.z) * self.size.x + coord.x) as usize
    }

    pub fn cell(&self, coord: UVec3) -> Option<&Cell> {
        self.in_bounds(coord.as_ivec3())
            .then(|| &self.cells[self.index(coord)])
    }

    pub(crate) fn cell_at_index(&self, idx: usize) -> &Cell {
        &self.cells[idx]
    }

    fn cell_mut(&mut self, coord: UVec3) -> Result<&mut Cell> {
        if !self.in_bounds(coord.as_ivec3()) {
            return Err(NavError::CellOutOfBounds {
                coord,
                size: self.size,
            });
        }
        let idx = self.index(coord);
        Ok(&mut self.cells[idx])
    }

    // ------------------------------------------------------------------------
    // AI-layer writes
    // ------------------------------------------------------------------------

    pub fn set_walkable(&mut self, coord: UVec3, walkable: bool) -> Result<()> {
        self.cell_mut(coord)?.walkable = walkable;
        Ok(())
    }

    pub fn set_base_cost(&mut self, coord: UVec3, cost: f32) -> Result<()> {
        self.cell_mut(coord)?.movement_cost = cost;
        Ok(())
    }

    pub fn mark_stair(&mut self, coord: UVec3) -> Result<()> {
        let cell = self.cell_mut(coord)?;
        cell.kind = CellKind::Stair;
        cell.walkable = true;
        cell.movement_cost = STAIR_COST;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Up to 26 adjacent cells. A neighbour on another level is only
    /// included when it is walkable and either side is a stair.
    pub fn neighbors(&self, coord: UVec3) -> impl Iterator<Item = &Cell> + '_ {
        let src = self.cell(coord).copied();
        let base = coord.as_ivec3();
        NEIGHBOR_OFFSETS.iter().filter_map(move |offset| {
            let src = src?;
            let pos = base + *offset;
            if !self.in_bounds(pos) {
                return None;
            }
            let nb = &self.cells[self.index(pos.as_uvec3())];
            if offset.y != 0 && !(nb.walkable && (src.is_stair() || nb.is_stair())) {
                return None;
            }
            Some(nb)
        })
    }

    /// Straight-line walkability between two world points, sampled every half
    /// cell. A same-level segment may not cross a stair cell unless the
    /// tracked target stands on one.
    pub fn is_walkable_path(&self, start: Vec3, end: Vec3, target_on_stair: bool) -> bool {
        let same_level = self.world_to_coord(start).y == self.world_to_coord(end).y;
        let step = self.cell_diameter * 0.5;
        let dir = (end - start).normalize_or_zero();
        let steps = (start.distance(end) / step).ceil() as usize;

        for i in 0..=steps {
            let point = start + dir * (step * i as f32).min(start.distance(end));
            if !self.contains(point) {
                return false;
            }
            let cell = self.world_to_cell(point);
            if !cell.walkable {
                return false;
            }
            if same_level && !target_on_stair && cell.is_stair() {
                return false;
            }
        }
        true
    }

    /// Nearest stair cell on the same level as `pos`, by horizontal distance.
    pub fn nearest_stair_on_level(&self, pos: Vec3) -> Option<&Cell> {
        let level = self.world_to_coord(pos).y;
        let flat = |v: Vec3| Vec3::new(v.x, 0.0, v.z);
        self.cells
            .iter()
            .filter(|c| c.coord.y == level && c.is_stair())
            .min_by(|a, b| {
                let da = flat(a.world_position).distance_squared(flat(pos));
                let db = flat(b.world_position).distance_squared(flat(pos));
                da.total_cmp(&db)
            })
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Total cell count of a `size` grid. Indices are computed in `u32`, so the
/// count must fit there as well as in memory.
fn slot_count(size: UVec3) -> Result<usize> {
    let count = (size.x as usize)
        .checked_mul(size.y as usize)
        .and_then(|n| n.checked_mul(size.z as usize))
        .filter(|&n| n <= u32::MAX as usize);
    count.ok_or_else(|| NavError::InvalidGrid(format!("{size} cells is too many")))
}

/// Slot storage while the passes run. `None` = not yet filled.
struct GridBuilder {
    slots: Vec<Option<Cell>>,
    size: UVec3,
    cell_diameter: f32,
    origin: Vec3,
}

impl GridBuilder {
    #[inline]
    fn index(&self, coord: UVec3) -> usize {
        ((coord.y * self.size.z + coord.z) * self.size.x + coord.x) as usize
    }

    fn coord_of(&self, idx: usize) -> UVec3 {
        let idx = idx as u32;
        let layer = self.size.x * self.size.z;
        UVec3::new(idx % self.size.x, idx / layer, (idx % layer) / self.size.x)
    }

    fn column_center(&self, x: u32, z: u32) -> Vec3 {
        self.voxel_center(UVec3::new(x, 0, z))
    }

    fn voxel_center(&self, coord: UVec3) -> Vec3 {
        self.origin + (coord.as_vec3() + Vec3::splat(0.5)) * self.cell_diameter
    }

    fn level_of(&self, y: f32) -> u32 {
        let level = ((y - self.origin.y) / self.cell_diameter).floor() as i64;
        level.clamp(0, self.size.y as i64 - 1) as u32
    }

    fn put(&mut self, cell: Cell) {
        let idx = self.index(cell.coord);
        self.slots[idx] = Some(cell);
    }

    fn finish(self) -> VoxelGrid {
        let mut voids = 0usize;
        let cells = self
            .slots
            .iter()
            .copied()
            .enumerate()
            .map(|(idx, slot)| match slot {
                Some(cell) => cell,
                None => {
                    voids += 1;
                    let coord = self.coord_of(idx);
                    Cell {
                        coord,
                        world_position: self.voxel_center(coord),
                        walkable: false,
                        movement_cost: f32::INFINITY,
                        kind: CellKind::Void,
                    }
                }
            })
            .collect();
        if voids > 0 {
            debug!("{voids} grid slots left unfilled; marked void");
        }
        VoxelGrid {
            cells,
            size: self.size,
            cell_diameter: self.cell_diameter,
            origin: self.origin,
        }
    }
}

// ============================================================================
// NEIGHBOR OFFSETS
// ============================================================================

/// 3×3×3 block minus the center, in a fixed order so searches are
/// deterministic.
const NEIGHBOR_OFFSETS: [IVec3; 26] = {
    let mut out = [IVec3::ZERO; 26];
    let mut i = 0;
    let mut y = -1;
    while y <= 1 {
        let mut z = -1;
        while z <= 1 {
            let mut x = -1;
            while x <= 1 {
                if !(x == 0 && y == 0 && z == 0) {
                    out[i] = IVec3::new(x, y, z);
                    i += 1;
                }
                x += 1;
            }
            z += 1;
        }
        y += 1;
    }
    out
};
