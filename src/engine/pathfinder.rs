// A* over the voxel grid.
//
// Costs are cell-weighted: stepping into a cell costs that cell's movement
// cost, so slopes and stairs are priced against flat ground. The distance
// estimate heavily penalizes level changes away from stairs, which steers
// the search onto staircases. With the default weights the estimate is not
// admissible; the search trades optimality for fewer expansions.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use glam::{IVec3, Vec3};
use log::{debug, trace};

use super::config::{HeuristicWeights, PathfindingConfig};
use super::error::{NavError, Result};
use super::navigation::{Cell, VoxelGrid};

const NO_PARENT: usize = usize::MAX;

// ============================================================================
// COST WEIGHTING
// ============================================================================

/// Per-search view of cell costs layered over the grid's base costs.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CostWeighting {
    #[default]
    Base,
    /// Stair cells cost `stair_cost` instead of their base cost. Used while
    /// the tracked target stands on a stair.
    StairBias { stair_cost: f32 },
}

impl CostWeighting {
    /// Bias toward stairs when `target` resolves to a stair cell.
    pub fn for_target(grid: &VoxelGrid, target: Vec3, config: &PathfindingConfig) -> Self {
        if grid.world_to_cell(target).is_stair() {
            CostWeighting::StairBias {
                stair_cost: config.stair_bias_cost,
            }
        } else {
            CostWeighting::Base
        }
    }

    #[inline]
    pub fn cost(&self, cell: &Cell) -> f32 {
        match *self {
            CostWeighting::StairBias { stair_cost } if cell.is_stair() => stair_cost,
            _ => cell.movement_cost,
        }
    }

    pub fn target_on_stair(&self) -> bool {
        matches!(self, CostWeighting::StairBias { .. })
    }
}

// ============================================================================
// PATH
// ============================================================================

/// Cells from start to goal, both included.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    cells: Vec<Cell>,
    cost: f32,
}

impl Path {
    pub fn new(cells: Vec<Cell>, cost: f32) -> Self {
        Self { cells, cost }
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    pub fn first(&self) -> Option<&Cell> {
        self.cells.first()
    }

    pub fn last(&self) -> Option<&Cell> {
        self.cells.last()
    }

    /// Accumulated search cost at the goal.
    pub fn cost(&self) -> f32 {
        self.cost
    }

    pub fn world_positions(&self) -> impl Iterator<Item = Vec3> + '_ {
        self.cells.iter().map(|c| c.world_position)
    }

    /// Append `next`, which must start where this path ends.
    pub fn join(mut self, next: Path) -> Path {
        let skip = match (self.cells.last(), next.cells.first()) {
            (Some(a), Some(b)) if a.coord == b.coord => 1,
            _ => 0,
        };
        self.cells.extend(next.cells.into_iter().skip(skip));
        self.cost += next.cost;
        self
    }
}

// ============================================================================
// OPEN SET
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct OpenNode {
    f: f32,
    h: f32,
    idx: usize,
}

impl Eq for OpenNode {}

impl PartialEq for OpenNode {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Ord for OpenNode {
    // Reversed for a min-heap: lowest f, then lowest h, then lowest index.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .f
            .total_cmp(&self.f)
            .then_with(|| other.h.total_cmp(&self.h))
            .then_with(|| other.idx.cmp(&self.idx))
    }
}

impl PartialOrd for OpenNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// ============================================================================
// PATHFINDER
// ============================================================================

pub struct PathFinder<'a> {
    grid: &'a VoxelGrid,
    config: &'a PathfindingConfig,
    weighting: CostWeighting,
}

impl<'a> PathFinder<'a> {
    pub fn new(grid: &'a VoxelGrid, config: &'a PathfindingConfig) -> Self {
        Self {
            grid,
            config,
            weighting: CostWeighting::Base,
        }
    }

    pub fn with_weighting(mut self, weighting: CostWeighting) -> Self {
        self.weighting = weighting;
        self
    }

    /// Estimated cost from `from` to `to`.
    pub fn heuristic(&self, from: &Cell, to: &Cell) -> f32 {
        estimate(&self.config.heuristic, from, to)
    }

    /// Find a path between two world points.
    ///
    /// `Ok(None)` when no path exists (unwalkable endpoint or the open set
    /// ran dry). `Err` only when the grid is malformed.
    pub fn find_path(&self, start: Vec3, goal: Vec3) -> Result<Option<Path>> {
        let start_cell = *self.grid.world_to_cell(start);
        let goal_cell = *self.grid.world_to_cell(goal);

        if !start_cell.is_traversable() || !goal_cell.is_traversable() {
            debug!(
                "no path: start {} traversable={} goal {} traversable={}",
                start_cell.coord,
                start_cell.is_traversable(),
                goal_cell.coord,
                goal_cell.is_traversable(),
            );
            return Ok(None);
        }

        let Some((indices, cost)) = self.search(&start_cell, &goal_cell)? else {
            return Ok(None);
        };
        let cells: Vec<Cell> = indices
            .into_iter()
            .map(|i| *self.grid.cell_at_index(i))
            .collect();

        let cells = if start_cell.level() != goal_cell.level() {
            self.post_process(cells)
        } else {
            cells
        };
        Ok(Some(Path::new(cells, cost)))
    }

    /// Like `find_path`, but when the goal is on another level and the start
    /// is not a stair, first walk to the nearest stair on the start level.
    pub fn find_route(&self, start: Vec3, goal: Vec3) -> Result<Option<Path>> {
        let start_cell = self.grid.world_to_cell(start);
        let goal_cell = self.grid.world_to_cell(goal);

        if start_cell.level() != goal_cell.level() && !start_cell.is_stair() {
            if let Some(stair) = self.grid.nearest_stair_on_level(start) {
                let via = stair.world_position;
                if let Some(first) = self.find_path(start, via)? {
                    if let Some(second) = self.find_path(via, goal)? {
                        return Ok(Some(first.join(second)));
                    }
                }
                debug!("route via stair {} failed; searching directly", stair.coord);
            }
        }
        self.find_path(start, goal)
    }

    fn search(&self, start: &Cell, goal: &Cell) -> Result<Option<(Vec<usize>, f32)>> {
        let grid = self.grid;
        let n = grid.len();
        let start_idx = grid.index(start.coord);
        let goal_idx = grid.index(goal.coord);

        let mut g = vec![f32::INFINITY; n];
        let mut parent = vec![NO_PARENT; n];
        let mut closed = vec![false; n];
        let mut open = BinaryHeap::new();

        g[start_idx] = 0.0;
        let h0 = self.heuristic(start, goal);
        open.push(OpenNode {
            f: h0,
            h: h0,
            idx: start_idx,
        });

        let mut expanded = 0usize;
        while let Some(node) = open.pop() {
            if closed[node.idx] {
                continue;
            }
            closed[node.idx] = true;
            expanded += 1;

            if node.idx == goal_idx {
                let limit = self.config.max_reconstruction_steps.unwrap_or(n);
                let chain = retrace(&parent, start_idx, goal_idx, limit)?;
                trace!("path found after {expanded} expansions, {} cells", chain.len());
                return Ok(Some((chain, g[goal_idx])));
            }

            let current = grid.cell_at_index(node.idx);
            for nb in grid.neighbors(current.coord) {
                let ni = grid.index(nb.coord);
                if !nb.walkable || closed[ni] {
                    continue;
                }
                let tentative = g[node.idx] + self.weighting.cost(nb);
                if tentative < g[ni] {
                    g[ni] = tentative;
                    parent[ni] = node.idx;
                    let h = self.heuristic(nb, goal);
                    open.push(OpenNode {
                        f: tentative + h,
                        h,
                        idx: ni,
                    });
                }
            }
        }

        debug!(
            "no path from {} to {} after {expanded} expansions",
            start.coord, goal.coord
        );
        Ok(None)
    }

    // ------------------------------------------------------------------------
    // Post-processing for paths that change level
    // ------------------------------------------------------------------------

    fn post_process(&self, cells: Vec<Cell>) -> Vec<Cell> {
        let cells = self.simplify_collinear(cells);
        let cells = self.splice_stairs(cells);
        let cells = self.drop_redundant(cells);
        self.repair_level_jumps(cells)
    }

    /// Drop interior points of straight same-level runs. Never across stairs,
    /// vertical steps, or segments the grid rejects.
    fn simplify_collinear(&self, cells: Vec<Cell>) -> Vec<Cell> {
        if cells.len() < 3 {
            return cells;
        }
        let target_on_stair = self.weighting.target_on_stair();
        let mut out = vec![cells[0]];
        for window in cells.windows(2).skip(1) {
            let (cur, next) = (window[0], window[1]);
            let prev = out[out.len() - 1];
            let removable = prev.level() == cur.level()
                && cur.level() == next.level()
                && !(prev.is_stair() || cur.is_stair() || next.is_stair())
                && heading(&prev, &cur) == heading(&cur, &next)
                && self.grid.is_walkable_path(
                    prev.world_position,
                    next.world_position,
                    target_on_stair,
                );
            if !removable {
                out.push(cur);
            }
        }
        out.push(cells[cells.len() - 1]);
        out
    }

    /// Where consecutive points change level, splice in a stair next to the
    /// earlier point that sits at the later point's height.
    fn splice_stairs(&self, cells: Vec<Cell>) -> Vec<Cell> {
        let tolerance = self.config.stair_level_tolerance * self.grid.cell_diameter();
        let mut out: Vec<Cell> = Vec::with_capacity(cells.len() + 2);
        for (i, cell) in cells.iter().enumerate() {
            out.push(*cell);
            let Some(next) = cells.get(i + 1) else { break };
            if cell.level() == next.level() {
                continue;
            }
            let stair = self.grid.neighbors(cell.coord).find(|nb| {
                nb.is_stair()
                    && (nb.level() == next.level()
                        || (nb.world_position.y - next.world_position.y).abs() <= tolerance)
                    && !cells.iter().chain(out.iter()).any(|c| c.coord == nb.coord)
            });
            if let Some(stair) = stair {
                out.push(*stair);
            }
        }
        out
    }

    /// Drop interior points whose neighbours share a level and are already
    /// close together. Stairs stay.
    fn drop_redundant(&self, cells: Vec<Cell>) -> Vec<Cell> {
        if cells.len() < 3 {
            return cells;
        }
        let radius = self.config.redundancy_radius * self.grid.cell_diameter();
        let mut out = vec![cells[0]];
        for window in cells.windows(2).skip(1) {
            let (cur, next) = (window[0], window[1]);
            let prev = out[out.len() - 1];
            let redundant = !cur.is_stair()
                && prev.level() == next.level()
                && horizontal_distance(prev.world_position, next.world_position) <= radius;
            if !redundant {
                out.push(cur);
            }
        }
        out.push(cells[cells.len() - 1]);
        out
    }

    /// Consecutive non-stair cells more than one level apart get a stair
    /// within one level of the later cell spliced between them.
    fn repair_level_jumps(&self, cells: Vec<Cell>) -> Vec<Cell> {
        let mut out: Vec<Cell> = Vec::with_capacity(cells.len());
        for (i, cell) in cells.iter().enumerate() {
            out.push(*cell);
            let Some(next) = cells.get(i + 1) else { break };
            if cell.level().abs_diff(next.level()) <= 1 || cell.is_stair() || next.is_stair() {
                continue;
            }
            if let Some(stair) = self
                .grid
                .neighbors(cell.coord)
                .find(|nb| nb.is_stair() && nb.level().abs_diff(next.level()) <= 1)
            {
                out.push(*stair);
            }
        }
        out
    }
}

/// Find a path with default pathfinding settings and base costs.
pub fn find_path(grid: &VoxelGrid, start: Vec3, goal: Vec3) -> Result<Option<Path>> {
    let config = PathfindingConfig::default();
    PathFinder::new(grid, &config).find_path(start, goal)
}

/// Weighted Manhattan estimate; level changes are cheap only next to stairs.
fn estimate(weights: &HeuristicWeights, from: &Cell, to: &Cell) -> f32 {
    let delta = (from.coord.as_ivec3() - to.coord.as_ivec3()).abs();
    let vertical = if from.is_stair() || to.is_stair() {
        weights.vertical_stair
    } else {
        weights.vertical
    };
    (delta.x + delta.z) as f32 * weights.horizontal + delta.y as f32 * vertical
}

/// Walk parents from goal back to start. More than `limit` steps means the
/// chain loops or never reaches the start.
fn retrace(parent: &[usize], start: usize, goal: usize, limit: usize) -> Result<Vec<usize>> {
    let mut chain = vec![goal];
    let mut current = goal;
    while current != start {
        let prev = parent.get(current).copied().unwrap_or(NO_PARENT);
        if prev == NO_PARENT || chain.len() > limit {
            return Err(NavError::CorruptParentChain { limit });
        }
        chain.push(prev);
        current = prev;
    }
    chain.reverse();
    Ok(chain)
}

#[inline]
fn heading(from: &Cell, to: &Cell) -> IVec3 {
    (to.coord.as_ivec3() - from.coord.as_ivec3()).signum()
}

#[inline]
fn horizontal_distance(a: Vec3, b: Vec3) -> f32 {
    Vec3::new(a.x - b.x, 0.0, a.z - b.z).length()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::navigation::STAIR_COST;
    use approx::assert_relative_eq;
    use glam::UVec3;

    fn flat(x: u32, y: u32, z: u32) -> VoxelGrid {
        VoxelGrid::flat(UVec3::new(x, y, z), 1.0, Vec3::ZERO).unwrap()
    }

    fn at(grid: &VoxelGrid, x: u32, y: u32, z: u32) -> Vec3 {
        grid.voxel_center(UVec3::new(x, y, z))
    }

    fn coords(path: &Path) -> Vec<UVec3> {
        path.cells().iter().map(|c| c.coord).collect()
    }

    fn admissible_config() -> PathfindingConfig {
        PathfindingConfig {
            heuristic: HeuristicWeights::admissible(1.0),
            ..PathfindingConfig::default()
        }
    }

    /// Exact cheapest cost from `source` to every cell (Bellman-Ford).
    fn brute_force_costs(grid: &VoxelGrid, source: UVec3) -> Vec<f32> {
        let mut dist = vec![f32::INFINITY; grid.len()];
        dist[grid.index(source)] = 0.0;
        loop {
            let mut changed = false;
            for cell in grid.cells() {
                let d = dist[grid.index(cell.coord)];
                if !d.is_finite() {
                    continue;
                }
                for nb in grid.neighbors(cell.coord).filter(|nb| nb.walkable) {
                    let ni = grid.index(nb.coord);
                    let candidate = d + nb.movement_cost;
                    if candidate < dist[ni] {
                        dist[ni] = candidate;
                        changed = true;
                    }
                }
            }
            if !changed {
                return dist;
            }
        }
    }

    #[test]
    fn flat_diagonal_takes_ten_cells() {
        let grid = flat(10, 1, 10);
        let path = find_path(&grid, at(&grid, 0, 0, 0), at(&grid, 9, 0, 9))
            .unwrap()
            .unwrap();
        assert_eq!(path.len(), 10);
        assert_eq!(path.first().unwrap().coord, UVec3::ZERO);
        assert_eq!(path.last().unwrap().coord, UVec3::new(9, 0, 9));
        assert_relative_eq!(path.cost(), 9.0);

        let mut accumulated = 0.0;
        for pair in path.cells().windows(2) {
            let step = (pair[1].coord.as_ivec3() - pair[0].coord.as_ivec3()).abs();
            assert_eq!(step.max_element(), 1, "cells must be adjacent");
            let next = accumulated + pair[1].movement_cost;
            assert!(next >= accumulated);
            accumulated = next;
        }
    }

    #[test]
    fn endpoints_resolve_from_query_points() {
        let mut grid = flat(8, 1, 8);
        for z in 0..6 {
            grid.set_walkable(UVec3::new(4, 0, z), false).unwrap();
        }
        let pairs = [((0, 0), (7, 0)), ((1, 5), (6, 2)), ((7, 7), (0, 1))];
        for ((sx, sz), (gx, gz)) in pairs {
            let start = at(&grid, sx, 0, sz);
            let goal = at(&grid, gx, 0, gz);
            let path = find_path(&grid, start, goal).unwrap().unwrap();
            assert!(!path.is_empty());
            assert_eq!(path.first().unwrap().coord, grid.world_to_coord(start));
            assert_eq!(path.last().unwrap().coord, grid.world_to_coord(goal));
            assert!(path.cells().iter().all(|c| c.walkable));
        }
    }

    #[test]
    fn start_equal_to_goal_is_a_single_cell() {
        let grid = flat(3, 1, 3);
        let p = at(&grid, 1, 0, 1);
        let path = find_path(&grid, p, p).unwrap().unwrap();
        assert_eq!(coords(&path), vec![UVec3::new(1, 0, 1)]);
        assert_relative_eq!(path.cost(), 0.0);
    }

    #[test]
    fn walled_in_goal_has_no_path() {
        let mut grid = flat(7, 1, 7);
        for x in 2..=4 {
            for z in 2..=4 {
                if (x, z) != (3, 3) {
                    grid.set_walkable(UVec3::new(x, 0, z), false).unwrap();
                }
            }
        }
        let result = find_path(&grid, at(&grid, 0, 0, 0), at(&grid, 3, 0, 3));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn unwalkable_endpoint_has_no_path() {
        let mut grid = flat(4, 1, 4);
        grid.set_walkable(UVec3::new(3, 0, 3), false).unwrap();
        let result = find_path(&grid, at(&grid, 0, 0, 0), at(&grid, 3, 0, 3));
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn repeated_searches_agree() {
        let mut grid = flat(9, 1, 9);
        for z in 1..9 {
            grid.set_walkable(UVec3::new(5, 0, z), false).unwrap();
        }
        let (a, b) = (at(&grid, 1, 0, 7), at(&grid, 8, 0, 6));
        let first = find_path(&grid, a, b).unwrap().unwrap();
        let second = find_path(&grid, a, b).unwrap().unwrap();
        assert_eq!(coords(&first), coords(&second));
        assert_eq!(first.cost(), second.cost());
    }

    #[test]
    fn raising_a_cell_cost_never_cheapens_the_path() {
        let config = admissible_config();
        let mut grid = flat(7, 1, 5);
        let (a, b) = (at(&grid, 0, 0, 2), at(&grid, 6, 0, 2));
        let before = PathFinder::new(&grid, &config).find_path(a, b).unwrap().unwrap();

        let interior = before.cells()[before.len() / 2].coord;
        grid.set_base_cost(interior, 10.0).unwrap();
        let after = PathFinder::new(&grid, &config).find_path(a, b).unwrap().unwrap();

        assert!(after.cost() >= before.cost());
        assert!(!coords(&after).contains(&interior));
    }

    #[test]
    fn admissible_weights_never_overestimate() {
        let mut grid = flat(4, 2, 3);
        grid.mark_stair(UVec3::new(1, 0, 1)).unwrap();
        grid.mark_stair(UVec3::new(3, 1, 2)).unwrap();
        grid.set_walkable(UVec3::new(2, 0, 1), false).unwrap();
        grid.set_base_cost(UVec3::new(0, 1, 0), 4.0).unwrap();

        let config = admissible_config();
        let finder = PathFinder::new(&grid, &config);
        let cells: Vec<Cell> = grid.cells().copied().collect();
        for from in &cells {
            let exact = brute_force_costs(&grid, from.coord);
            for to in &cells {
                let true_cost = exact[grid.index(to.coord)];
                if true_cost.is_finite() {
                    let h = finder.heuristic(from, to);
                    assert!(
                        h <= true_cost + 1e-4,
                        "h({}, {}) = {h} > {true_cost}",
                        from.coord,
                        to.coord
                    );
                }
            }
        }
    }

    #[test]
    fn default_weights_overestimate() {
        // The default estimate trades admissibility for a narrow search.
        let grid = flat(5, 1, 1);
        let config = PathfindingConfig::default();
        let finder = PathFinder::new(&grid, &config);
        let from = grid.cell(UVec3::new(0, 0, 0)).unwrap();
        let to = grid.cell(UVec3::new(4, 0, 0)).unwrap();
        let exact = brute_force_costs(&grid, from.coord)[grid.index(to.coord)];
        assert_relative_eq!(exact, 4.0);
        assert_relative_eq!(finder.heuristic(from, to), 40.0);
    }

    #[test]
    fn vertical_estimate_is_cheap_only_at_stairs() {
        let mut grid = flat(2, 3, 1);
        let config = PathfindingConfig::default();
        let low = *grid.cell(UVec3::new(0, 0, 0)).unwrap();
        let high = *grid.cell(UVec3::new(0, 2, 0)).unwrap();
        assert_relative_eq!(PathFinder::new(&grid, &config).heuristic(&low, &high), 2000.0);
        grid.mark_stair(UVec3::new(0, 0, 0)).unwrap();
        let stair = *grid.cell(UVec3::new(0, 0, 0)).unwrap();
        assert_relative_eq!(PathFinder::new(&grid, &config).heuristic(&stair, &high), 10.0);
    }

    #[test]
    fn level_change_goes_through_the_stair() {
        let mut grid = flat(8, 2, 3);
        let (a, b) = (at(&grid, 0, 0, 1), at(&grid, 7, 1, 1));
        // Without a stair the upper level cannot be reached at all.
        assert!(matches!(find_path(&grid, a, b), Ok(None)));

        grid.mark_stair(UVec3::new(4, 0, 1)).unwrap();
        let path = find_path(&grid, a, b).unwrap().unwrap();
        assert!(path.cells().iter().any(Cell::is_stair));
        assert_eq!(
            coords(&path),
            vec![
                UVec3::new(0, 0, 1),
                UVec3::new(3, 0, 1),
                UVec3::new(4, 0, 1),
                UVec3::new(5, 1, 1),
                UVec3::new(7, 1, 1),
            ]
        );
        assert_relative_eq!(path.cost(), 6.0 + STAIR_COST);
    }

    #[test]
    fn expensive_approach_pushes_the_climb_to_the_other_stair() {
        // Stairs on both sides of the start row; pricing one approach row
        // sends the climb through the opposite stair.
        let cases = [(3, UVec3::new(2, 0, 0)), (1, UVec3::new(2, 0, 4))];
        for (heavy_row, expected_stair) in cases {
            let mut grid = flat(9, 2, 5);
            grid.mark_stair(UVec3::new(2, 0, 0)).unwrap();
            grid.mark_stair(UVec3::new(2, 0, 4)).unwrap();
            for x in 1..=3 {
                grid.set_base_cost(UVec3::new(x, 0, heavy_row), 5.0).unwrap();
            }
            let path = find_path(&grid, at(&grid, 0, 0, 2), at(&grid, 8, 1, 2))
                .unwrap()
                .unwrap();
            assert!(coords(&path).contains(&expected_stair), "heavy row z={heavy_row}");
        }
    }

    #[test]
    fn stair_bias_follows_the_target() {
        let mut grid = flat(4, 1, 1);
        grid.mark_stair(UVec3::new(3, 0, 0)).unwrap();
        let config = PathfindingConfig::default();
        let on_stair = CostWeighting::for_target(&grid, at(&grid, 3, 0, 0), &config);
        assert!(on_stair.target_on_stair());
        let stair = grid.cell(UVec3::new(3, 0, 0)).unwrap();
        assert_relative_eq!(on_stair.cost(stair), 1.0);
        assert_relative_eq!(CostWeighting::Base.cost(stair), STAIR_COST);

        let off_stair = CostWeighting::for_target(&grid, at(&grid, 0, 0, 0), &config);
        assert_eq!(off_stair, CostWeighting::Base);
    }

    #[test]
    fn route_walks_to_the_nearest_stair_first() {
        let mut grid = flat(8, 2, 3);
        grid.mark_stair(UVec3::new(4, 0, 1)).unwrap();
        let config = PathfindingConfig::default();
        let finder = PathFinder::new(&grid, &config);
        let path = finder
            .find_route(at(&grid, 0, 0, 1), at(&grid, 7, 1, 1))
            .unwrap()
            .unwrap();
        let cs = coords(&path);
        assert_eq!(cs.first(), Some(&UVec3::new(0, 0, 1)));
        assert_eq!(cs.last(), Some(&UVec3::new(7, 1, 1)));
        assert_eq!(cs.iter().filter(|c| **c == UVec3::new(4, 0, 1)).count(), 1);
    }

    #[test]
    fn corrupt_parent_chain_is_a_fault() {
        // 2 -> 1 -> 2 never reaches 0.
        let parent = vec![NO_PARENT, 2, 1];
        let err = retrace(&parent, 0, 2, 8).unwrap_err();
        assert!(matches!(err, NavError::CorruptParentChain { limit: 8 }));

        let dangling = vec![NO_PARENT, NO_PARENT, 1];
        assert!(retrace(&dangling, 0, 2, 8).is_err());

        let good = vec![NO_PARENT, 0, 1];
        assert_eq!(retrace(&good, 0, 2, 8).unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn join_drops_the_shared_cell() {
        let grid = flat(3, 1, 1);
        let c = |x| *grid.cell(UVec3::new(x, 0, 0)).unwrap();
        let joined = Path::new(vec![c(0), c(1)], 1.0).join(Path::new(vec![c(1), c(2)], 1.0));
        assert_eq!(joined.len(), 3);
        assert_relative_eq!(joined.cost(), 2.0);
    }
}
