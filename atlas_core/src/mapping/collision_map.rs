// atlas_core/src/mapping/collision_map.rs

use super::raycast::BresenhamLine;
use super::{CellState, Frontier, GridBounds};
use crate::config::MapConfig;
use crate::error::{SlamError, SlamResult};
use crate::messages::Sweep;
use crate::types::{CellCoord, Pose2D};
use nalgebra::Vector2;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Evidence a single sweep contributes to one cell. Stronger variants win
/// when several rays touch the same cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Evidence {
    Miss,
    Hit,
    Visit,
}

/// Summary of one `integrate` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntegrationReport {
    /// Readings that were traced into the grid.
    pub rays: usize,
    /// Readings that carried no information (invalid, negative, NaN).
    pub skipped_readings: usize,
    /// Distinct cells whose accumulator changed.
    pub cells_updated: usize,
    /// Cells that left `Unknown` during this call.
    pub newly_known: usize,
    /// Whether the grid had to be enlarged.
    pub grew: bool,
}

/// A dynamically growing occupancy grid.
///
/// Every cell carries a log-odds accumulator. A cell's state only changes when
/// the accumulator crosses the occupied or free threshold, and once known a
/// cell never returns to `Unknown`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionMap {
    config: MapConfig,
    bounds: GridBounds,
    // === Row-major cell data, row 0 = bounds.min.y ===
    states: Vec<CellState>,
    log_odds: Vec<f32>,
}

impl CollisionMap {
    /// Creates an all-unknown grid spanning `[-initial_half_extent, initial_half_extent]`
    /// cells on both axes.
    pub fn new(config: MapConfig) -> SlamResult<Self> {
        config.validate()?;
        let h = config.initial_half_extent;
        let bounds = GridBounds::new(CellCoord::new(-h, -h), CellCoord::new(h, h));
        Ok(Self::with_bounds(config, bounds))
    }

    pub(crate) fn with_bounds(config: MapConfig, bounds: GridBounds) -> Self {
        let size = bounds.cell_count();
        Self {
            config,
            bounds,
            states: vec![CellState::Unknown; size],
            log_odds: vec![0.0; size],
        }
    }

    // --- Geometry ---

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn resolution(&self) -> f64 {
        self.config.resolution
    }

    pub fn bounds(&self) -> GridBounds {
        self.bounds
    }

    pub fn cell_count(&self) -> usize {
        self.states.len()
    }

    /// The cell containing `point`. Cells are centred on multiples of the resolution.
    pub fn world_to_cell(&self, point: &Vector2<f64>) -> CellCoord {
        CellCoord::new(
            (point.x / self.config.resolution).round() as i32,
            (point.y / self.config.resolution).round() as i32,
        )
    }

    pub fn cell_center(&self, cell: CellCoord) -> Vector2<f64> {
        Vector2::new(
            cell.x as f64 * self.config.resolution,
            cell.y as f64 * self.config.resolution,
        )
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if !self.bounds.contains(cell) {
            return None;
        }
        let col = (cell.x - self.bounds.min.x) as usize;
        let row = (cell.y - self.bounds.min.y) as usize;
        Some(row * self.bounds.width() + col)
    }

    // --- Queries ---

    /// State of `cell`; everything outside the grid is `Unknown`.
    pub fn cell_state(&self, cell: CellCoord) -> CellState {
        self.index(cell).map_or(CellState::Unknown, |i| self.states[i])
    }

    pub fn log_odds(&self, cell: CellCoord) -> Option<f32> {
        self.index(cell).map(|i| self.log_odds[i])
    }

    pub fn count(&self, state: CellState) -> usize {
        self.states.iter().filter(|s| **s == state).count()
    }

    /// Iterates over every cell of the grid in row-major order, bottom row first.
    pub fn cells(&self) -> impl Iterator<Item = (CellCoord, CellState)> + '_ {
        self.bounds.iter().zip(self.states.iter().copied())
    }

    // --- Evidence integration ---

    /// Traces every informative reading of `sweep` from `pose` into the grid.
    ///
    /// All growth the sweep requires is applied before any accumulator
    /// changes; if it would exceed `max_cells` the map is left untouched.
    pub fn integrate(&mut self, pose: &Pose2D, sweep: &Sweep) -> SlamResult<IntegrationReport> {
        let mut report = IntegrationReport::default();
        if !(pose.x.is_finite() && pose.y.is_finite() && pose.theta.is_finite()) {
            warn!(?pose, "skipping sweep integration for non-finite pose");
            report.skipped_readings = sweep.len();
            return Ok(report);
        }

        // 1. Resolve ray end cells. Every traced cell lies inside the box
        //    spanned by the sensor cell and the end cells.
        let sensor = self.world_to_cell(&pose.position());
        let mut rays: Vec<(CellCoord, bool)> = Vec::with_capacity(sweep.len());
        let mut touched = GridBounds::new(sensor, sensor);
        for i in 0..sweep.len() {
            if !sweep.is_informative(i) {
                report.skipped_readings += 1;
                continue;
            }
            let distance = sweep.readings[i].distance.min(sweep.max_range);
            if !distance.is_finite() {
                report.skipped_readings += 1;
                continue;
            }
            let end = self.world_to_cell(&pose.project(distance, sweep.bearing(i)));
            touched.include(end);
            rays.push((end, sweep.is_return(i)));
        }
        report.rays = rays.len();

        // 2. Reserve all growth before tracing anything.
        report.grew = self.grow_to_include(touched)?;

        // 3. Collect the strongest evidence per cell.
        let mut evidence: HashMap<CellCoord, Evidence> = HashMap::new();
        evidence.insert(sensor, Evidence::Visit);
        for (end, is_hit) in rays {
            for cell in BresenhamLine::new(sensor, end) {
                let observed = if cell == end {
                    if !is_hit {
                        continue;
                    }
                    Evidence::Hit
                } else {
                    Evidence::Miss
                };
                let entry = evidence.entry(cell).or_insert(observed);
                *entry = (*entry).max(observed);
            }
        }

        // 4. Apply.
        for (cell, observed) in evidence {
            let Some(index) = self.index(cell) else {
                continue;
            };
            let delta = match observed {
                Evidence::Miss => self.config.log_odds_miss,
                Evidence::Hit => self.config.log_odds_hit,
                Evidence::Visit => self.config.log_odds_visit,
            };
            let clamp = self.config.log_odds_clamp;
            let before = self.log_odds[index];
            let after = (before + delta).clamp(-clamp, clamp);
            if after != before {
                report.cells_updated += 1;
            }
            self.log_odds[index] = after;

            let previous = self.states[index];
            let next = if after >= self.config.occupied_threshold {
                CellState::Occupied
            } else if after <= self.config.free_threshold {
                CellState::Free
            } else {
                previous
            };
            if previous == CellState::Unknown && next != CellState::Unknown {
                report.newly_known += 1;
            }
            self.states[index] = next;
        }

        debug!(
            rays = report.rays,
            skipped = report.skipped_readings,
            updated = report.cells_updated,
            "integrated sweep"
        );
        Ok(report)
    }

    /// Enlarges the grid so that `required` fits, adding `growth_margin` cells
    /// on every side that has to move. Returns whether the grid changed.
    fn grow_to_include(&mut self, required: GridBounds) -> SlamResult<bool> {
        if self.bounds.contains_bounds(&required) {
            return Ok(false);
        }
        let margin = self.config.growth_margin;
        let grow = |tight: bool| {
            let m = if tight { 0 } else { margin };
            let mut b = self.bounds;
            if required.min.x < b.min.x {
                b.min.x = required.min.x - m;
            }
            if required.min.y < b.min.y {
                b.min.y = required.min.y - m;
            }
            if required.max.x > b.max.x {
                b.max.x = required.max.x + m;
            }
            if required.max.y > b.max.y {
                b.max.y = required.max.y + m;
            }
            b
        };

        // Fall back to a tight fit before giving up.
        let padded = grow(false);
        let new_bounds = if padded.cell_count() <= self.config.max_cells {
            padded
        } else {
            let tight = grow(true);
            if tight.cell_count() > self.config.max_cells {
                return Err(SlamError::GridLimitExceeded {
                    requested: tight.cell_count(),
                    max_cells: self.config.max_cells,
                });
            }
            tight
        };

        let mut states = vec![CellState::Unknown; new_bounds.cell_count()];
        let mut log_odds = vec![0.0_f32; new_bounds.cell_count()];
        let old_width = self.bounds.width();
        let new_width = new_bounds.width();
        let col_offset = (self.bounds.min.x - new_bounds.min.x) as usize;
        let row_offset = (self.bounds.min.y - new_bounds.min.y) as usize;

        // Copy old data row by row.
        for row in 0..self.bounds.height() {
            let old_start = row * old_width;
            let new_start = (row + row_offset) * new_width + col_offset;
            states[new_start..new_start + old_width].copy_from_slice(&self.states[old_start..old_start + old_width]);
            log_odds[new_start..new_start + old_width]
                .copy_from_slice(&self.log_odds[old_start..old_start + old_width]);
        }

        info!(
            from = ?(self.bounds.width(), self.bounds.height()),
            to = ?(new_bounds.width(), new_bounds.height()),
            "grew collision map"
        );
        self.bounds = new_bounds;
        self.states = states;
        self.log_odds = log_odds;
        Ok(true)
    }

    /// Overwrites a cell's state and accumulator. Used when rebuilding a map from a snapshot.
    pub(crate) fn set_cell(&mut self, cell: CellCoord, state: CellState) {
        let Some(index) = self.index(cell) else {
            return;
        };
        self.states[index] = state;
        self.log_odds[index] = match state {
            CellState::Unknown => 0.0,
            CellState::Free => self.config.free_threshold,
            CellState::Occupied => self.config.occupied_threshold,
        };
    }

    // --- Frontier search ---

    /// Breadth-first search over 4-connected free cells from `from` for the
    /// nearest cell bordering unknown space.
    ///
    /// The start cell is always expanded since the robot stands on it. Among
    /// frontier cells at the smallest depth the lowest `(x, y)` wins. Cells
    /// outside the grid count as unknown.
    pub fn nearest_unknown(&self, from: CellCoord) -> Option<Frontier> {
        let mut parents: HashMap<CellCoord, CellCoord> = HashMap::new();
        let mut visited: HashSet<CellCoord> = HashSet::from([from]);
        let mut layer = vec![from];

        while !layer.is_empty() {
            // 1. Any frontier in this layer ends the search.
            let best = layer
                .iter()
                .filter_map(|&cell| {
                    cell.neighbors4()
                        .into_iter()
                        .find(|n| self.cell_state(*n) == CellState::Unknown)
                        .map(|unknown| (cell, unknown))
                })
                .min_by_key(|(cell, _)| *cell);
            if let Some((cell, unknown_neighbor)) = best {
                return Some(Frontier {
                    cell,
                    unknown_neighbor,
                    path: reconstruct_path(&parents, from, cell),
                });
            }

            // 2. Expand into free neighbours.
            let mut next = Vec::new();
            for &cell in &layer {
                for neighbor in cell.neighbors4() {
                    if self.cell_state(neighbor) == CellState::Free && visited.insert(neighbor) {
                        parents.insert(neighbor, cell);
                        next.push(neighbor);
                    }
                }
            }
            layer = next;
        }
        None
    }
}

fn reconstruct_path(parents: &HashMap<CellCoord, CellCoord>, start: CellCoord, goal: CellCoord) -> Vec<CellCoord> {
    let mut path = vec![goal];
    let mut current = goal;
    while current != start {
        match parents.get(&current) {
            Some(&parent) => {
                path.push(parent);
                current = parent;
            }
            None => break,
        }
    }
    path.reverse();
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::RangeReading;
    use approx::assert_abs_diff_eq;

    fn map_with(resolution: f64, half_extent: i32) -> CollisionMap {
        CollisionMap::new(MapConfig {
            resolution,
            initial_half_extent: half_extent,
            growth_margin: 4,
            ..MapConfig::default()
        })
        .expect("valid config")
    }

    fn obstacle_ahead_sweep() -> Sweep {
        let mut distances = vec![5.0; 181];
        distances[90..=92].fill(1.0);
        Sweep::from_distances(-90f64.to_radians(), 1f64.to_radians(), 5.0, &distances)
    }

    /// Paints a map by hand from rows given top row first.
    fn painted(rows: &[&str]) -> CollisionMap {
        let height = rows.len() as i32;
        let width = rows[0].len() as i32;
        let config = MapConfig {
            resolution: 1.0,
            initial_half_extent: 0,
            max_cells: 10_000,
            ..MapConfig::default()
        };
        let mut map = CollisionMap::with_bounds(
            config,
            GridBounds::new(CellCoord::new(0, 0), CellCoord::new(width - 1, height - 1)),
        );
        for (r, row) in rows.iter().enumerate() {
            let y = height - 1 - r as i32;
            for (x, ch) in row.chars().enumerate() {
                let state = CellState::from_char(ch).expect("symbol");
                map.set_cell(CellCoord::new(x as i32, y), state);
            }
        }
        map
    }

    #[test]
    fn test_cells_are_centred_on_origin() {
        let map = map_with(0.5, 4);
        assert_eq!(map.world_to_cell(&Vector2::new(0.24, -0.24)), CellCoord::new(0, 0));
        assert_eq!(map.world_to_cell(&Vector2::new(0.26, -0.76)), CellCoord::new(1, -2));
        assert_abs_diff_eq!(map.cell_center(CellCoord::new(-3, 2)), Vector2::new(-1.5, 1.0));
    }

    #[test]
    fn test_obstacle_ahead_marks_hit_and_free_fan() {
        let mut map = map_with(0.1, 64);
        let report = map.integrate(&Pose2D::default(), &obstacle_ahead_sweep()).expect("integrate");

        assert_eq!(report.rays, 181);
        assert_eq!(map.cell_state(CellCoord::new(10, 0)), CellState::Occupied);
        for x in 1..10 {
            assert_eq!(map.cell_state(CellCoord::new(x, 0)), CellState::Free, "cell ({x}, 0)");
        }
        assert_eq!(map.cell_state(CellCoord::new(0, 0)), CellState::Free);
        // Off to the side the fan is open up to max range.
        assert_eq!(map.cell_state(CellCoord::new(0, 30)), CellState::Free);
        // Max-range readings mark no hit.
        assert_eq!(map.cell_state(CellCoord::new(0, 50)), CellState::Unknown);
        assert_eq!(map.count(CellState::Occupied), 1);
    }

    #[test]
    fn test_repeated_integration_is_monotone_and_never_unknown() {
        let mut map = map_with(0.1, 64);
        let pose = Pose2D::default();
        let sweep = obstacle_ahead_sweep();
        map.integrate(&pose, &sweep).expect("first");
        let first: Vec<(CellCoord, CellState, f32)> = map
            .cells()
            .map(|(c, s)| (c, s, map.log_odds(c).unwrap_or(0.0)))
            .collect();

        map.integrate(&pose, &sweep).expect("second");

        for (cell, state, lo) in first {
            let now = map.log_odds(cell).expect("cell still in grid");
            if state != CellState::Unknown {
                assert_ne!(map.cell_state(cell), CellState::Unknown);
            }
            if lo > 0.0 {
                assert!(now >= lo);
            } else if lo < 0.0 {
                assert!(now <= lo);
            }
        }
    }

    #[test]
    fn test_invalid_readings_contribute_nothing() {
        let mut map = map_with(0.1, 16);
        let sweep = Sweep::new(
            0.0,
            0.1,
            5.0,
            vec![RangeReading::invalid(), RangeReading::new(-1.0), RangeReading::new(f64::NAN)],
        );
        let report = map.integrate(&Pose2D::default(), &sweep).expect("integrate");
        assert_eq!(report.rays, 0);
        assert_eq!(report.skipped_readings, 3);
        // Only the visit to the robot cell.
        assert_eq!(map.count(CellState::Free), 1);
        assert_eq!(map.count(CellState::Occupied), 0);
    }

    #[test]
    fn test_growth_preserves_cells() {
        let mut map = map_with(0.1, 4);
        let before = map.cell_count();
        let report = map.integrate(&Pose2D::default(), &obstacle_ahead_sweep()).expect("integrate");

        assert!(report.grew);
        assert!(map.cell_count() > before);
        assert!(map.bounds().contains(CellCoord::new(10, 0)));
        assert_eq!(map.cell_state(CellCoord::new(10, 0)), CellState::Occupied);

        let pose = Pose2D::new(0.0, 0.0, std::f64::consts::PI);
        map.integrate(&pose, &obstacle_ahead_sweep()).expect("integrate behind");
        assert_eq!(map.cell_state(CellCoord::new(10, 0)), CellState::Occupied);
        assert_eq!(map.cell_state(CellCoord::new(-10, 0)), CellState::Occupied);
    }

    #[test]
    fn test_growth_beyond_limit_leaves_map_untouched() {
        let mut map = CollisionMap::new(MapConfig {
            resolution: 0.1,
            initial_half_extent: 4,
            max_cells: 200,
            ..MapConfig::default()
        })
        .expect("valid");
        let before = map.clone();

        let result = map.integrate(&Pose2D::default(), &obstacle_ahead_sweep());

        assert!(matches!(result, Err(SlamError::GridLimitExceeded { max_cells: 200, .. })));
        assert_eq!(map, before);
    }

    #[test]
    fn test_huge_reading_fails_before_tracing() {
        let mut map = CollisionMap::new(MapConfig {
            resolution: 0.1,
            initial_half_extent: 4,
            max_cells: 10_000,
            ..MapConfig::default()
        })
        .expect("valid");
        let before = map.clone();
        let sweep = Sweep::from_distances(0.0, 0.01, f64::INFINITY, &[2.0e6]);

        let started = std::time::Instant::now();
        let result = map.integrate(&Pose2D::default(), &sweep);

        assert!(matches!(result, Err(SlamError::GridLimitExceeded { max_cells: 10_000, .. })));
        assert!(started.elapsed() < std::time::Duration::from_secs(1));
        assert_eq!(map, before);
    }

    #[test]
    fn test_nearest_unknown_prefers_shallow_then_lowest() {
        let map = painted(&[
            "?????", //
            "?...?", //
            "#...#", //
            "#####",
        ]);
        let frontier = map.nearest_unknown(CellCoord::new(2, 1)).expect("frontier");
        // Layer 1 is {(3,1), (1,1), (2,2)}; only (2,2) borders unknown.
        assert_eq!(frontier.cell, CellCoord::new(2, 2));
        assert_eq!(frontier.unknown_neighbor, CellCoord::new(2, 3));
        assert_eq!(frontier.path, vec![CellCoord::new(2, 1), CellCoord::new(2, 2)]);
        assert_eq!(frontier.depth(), 1);
    }

    #[test]
    fn test_nearest_unknown_breaks_ties_lexicographically() {
        let map = painted(&[
            "?.?", //
            "...", //
            "?.?",
        ]);
        let frontier = map.nearest_unknown(CellCoord::new(1, 1)).expect("frontier");
        assert_eq!(frontier.cell, CellCoord::new(0, 1));
        assert_eq!(frontier.unknown_neighbor, CellCoord::new(-1, 1));
    }

    #[test]
    fn test_enclosed_free_space_has_no_frontier() {
        let map = painted(&[
            "#####", //
            "#...#", //
            "#.#.#", //
            "#...#", //
            "#####",
        ]);
        assert!(map.nearest_unknown(CellCoord::new(1, 1)).is_none());
    }

    #[test]
    fn test_bfs_does_not_cross_occupied_or_squeeze_corners() {
        let map = painted(&[
            "?#??", //
            "#.#?", //
            "?#.#", //
            "??#.",
        ]);
        // (2,1) is walled in on all four sides; its diagonal neighbours are not reachable.
        let frontier = map.nearest_unknown(CellCoord::new(2, 1));
        assert!(frontier.is_none());
    }
}
