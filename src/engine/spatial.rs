// Uniform XZ hash for neighbour lookup between agents.
//
// Rebuilt every tick from an agent snapshot before steering runs. Stores
// indices into the caller's snapshot slice, so lookups never touch the ECS.

use glam::{Vec2, Vec3};

// ============================================================================
// SPATIAL GRID
// ============================================================================

pub struct SpatialGrid {
    cells: Vec<Vec<usize>>,
    cell_size: f32,
    width: u32,
    depth: u32,
    /// Lower corner of the covered area in world XZ.
    world_min: Vec2,
}

impl SpatialGrid {
    /// Cover the XZ rectangle spanned by `world_min` and `world_max` (x, z).
    pub fn new(world_min: Vec2, world_max: Vec2, cell_size: f32) -> Self {
        let cell_size = cell_size.max(f32::EPSILON);
        let span = (world_max - world_min).max(Vec2::ZERO);
        let width = (span.x / cell_size).ceil() as u32 + 2;
        let depth = (span.y / cell_size).ceil() as u32 + 2;
        Self {
            cells: vec![Vec::new(); (width * depth) as usize],
            cell_size,
            width,
            depth,
            world_min,
        }
    }

    /// Size the grid to fit `positions`, with one cell of margin.
    pub fn covering(positions: &[Vec3], cell_size: f32) -> Self {
        let (min, max) = positions.iter().fold(
            (Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)),
            |(lo, hi), p| (lo.min(flat(*p)), hi.max(flat(*p))),
        );
        if positions.is_empty() {
            return Self::new(Vec2::ZERO, Vec2::ZERO, cell_size);
        }
        let mut grid = Self::new(min - Vec2::splat(cell_size), max, cell_size);
        for (idx, pos) in positions.iter().enumerate() {
            grid.insert(*pos, idx);
        }
        grid
    }

    pub fn clear(&mut self) {
        for c in &mut self.cells {
            c.clear();
        }
    }

    fn cell_xz(&self, pos: Vec2) -> Option<(u32, u32)> {
        let local = ((pos - self.world_min) / self.cell_size).floor();
        let (cx, cz) = (local.x as i64, local.y as i64);
        (cx >= 0 && cz >= 0 && cx < self.width as i64 && cz < self.depth as i64)
            .then_some((cx as u32, cz as u32))
    }

    /// Insert snapshot index `idx` at world position `pos` (y ignored).
    pub fn insert(&mut self, pos: Vec3, idx: usize) {
        if let Some((cx, cz)) = self.cell_xz(flat(pos)) {
            self.cells[(cz * self.width + cx) as usize].push(idx);
        }
    }

    /// Append every index stored in cells overlapping `radius` around `pos`.
    ///
    /// Returns a superset; callers distance-filter. `out` is not cleared.
    pub fn query_radius(&self, pos: Vec3, radius: f32, out: &mut Vec<usize>) {
        let reach = (radius / self.cell_size).ceil() as i64 + 1;
        let Some((cx0, cz0)) = self.cell_xz(flat(pos)) else {
            return;
        };
        for dz in -reach..=reach {
            for dx in -reach..=reach {
                let cx = cx0 as i64 + dx;
                let cz = cz0 as i64 + dz;
                if cx < 0 || cz < 0 || cx >= self.width as i64 || cz >= self.depth as i64 {
                    continue;
                }
                out.extend_from_slice(&self.cells[(cz as u32 * self.width + cx as u32) as usize]);
            }
        }
    }

    /// Indices within `radius` (horizontal) of `pos` in `positions`,
    /// excluding `skip`.
    pub fn neighbors_within(
        &self,
        positions: &[Vec3],
        pos: Vec3,
        radius: f32,
        skip: usize,
    ) -> Vec<usize> {
        let mut candidates = Vec::new();
        self.query_radius(pos, radius, &mut candidates);
        candidates.retain(|&i| {
            i != skip
                && positions
                    .get(i)
                    .is_some_and(|p| flat(*p).distance(flat(pos)) <= radius)
        });
        candidates
    }
}

#[inline]
fn flat(v: Vec3) -> Vec2 {
    Vec2::new(v.x, v.z)
}
