// atlas_core/src/mapping/snapshot.rs

use super::{CellState, CollisionMap, GridBounds};
use crate::config::MapConfig;
use crate::error::{SlamError, SlamResult};
use crate::types::CellCoord;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persistent, human-readable form of a collision map.
///
/// `rows` holds one string per grid row, top row (highest `y`) first, using
/// `?` for unknown, `.` for free and `#` for occupied cells. Accumulator
/// values are not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridSnapshot {
    pub version: u32,
    pub resolution: f64,
    pub width: usize,
    pub height: usize,
    pub rows: Vec<String>,
    /// Coordinate of the bottom-left cell.
    pub origin: CellCoord,
}

impl GridSnapshot {
    pub fn to_toml_string(&self) -> SlamResult<String> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_toml_str(text: &str) -> SlamResult<Self> {
        let snapshot: GridSnapshot = toml::from_str(text)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> SlamResult<()> {
        std::fs::write(path, self.to_toml_string()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> SlamResult<Self> {
        Self::from_toml_str(&std::fs::read_to_string(path)?)
    }

    /// Checks version, dimensions and cell symbols.
    pub fn validate(&self) -> SlamResult<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SlamError::Snapshot(format!(
                "unsupported version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        if !(self.resolution > 0.0 && self.resolution.is_finite()) {
            return Err(SlamError::Snapshot(format!("invalid resolution {}", self.resolution)));
        }
        if self.width == 0 || self.height == 0 {
            return Err(SlamError::Snapshot("empty grid".to_string()));
        }
        if self.rows.len() != self.height {
            return Err(SlamError::Snapshot(format!(
                "expected {} rows, found {}",
                self.height,
                self.rows.len()
            )));
        }
        for (r, row) in self.rows.iter().enumerate() {
            let len = row.chars().count();
            if len != self.width {
                return Err(SlamError::Snapshot(format!(
                    "row {r} has {len} cells, expected {}",
                    self.width
                )));
            }
            if let Some(bad) = row.chars().find(|c| CellState::from_char(*c).is_none()) {
                return Err(SlamError::Snapshot(format!("row {r} contains unknown symbol {bad:?}")));
            }
        }
        Ok(())
    }

    fn bounds(&self) -> SlamResult<GridBounds> {
        let max_x = i32::try_from(self.width - 1)
            .ok()
            .and_then(|w| self.origin.x.checked_add(w));
        let max_y = i32::try_from(self.height - 1)
            .ok()
            .and_then(|h| self.origin.y.checked_add(h));
        match (max_x, max_y) {
            (Some(x), Some(y)) => Ok(GridBounds::new(self.origin, CellCoord::new(x, y))),
            _ => Err(SlamError::Snapshot("grid extent overflows cell coordinates".to_string())),
        }
    }
}

impl CollisionMap {
    pub fn snapshot(&self) -> GridSnapshot {
        let bounds = self.bounds();
        let rows = (bounds.min.y..=bounds.max.y)
            .rev()
            .map(|y| {
                (bounds.min.x..=bounds.max.x)
                    .map(|x| self.cell_state(CellCoord::new(x, y)).as_char())
                    .collect()
            })
            .collect();
        GridSnapshot {
            version: SNAPSHOT_VERSION,
            resolution: self.resolution(),
            origin: bounds.min,
            width: bounds.width(),
            height: bounds.height(),
            rows,
        }
    }

    /// Rebuilds a map from a snapshot. The snapshot's resolution replaces the
    /// configured one; accumulators are seeded at the threshold of each
    /// cell's state.
    pub fn from_snapshot(snapshot: &GridSnapshot, config: MapConfig) -> SlamResult<Self> {
        snapshot.validate()?;
        let config = MapConfig {
            resolution: snapshot.resolution,
            ..config
        };
        let bounds = snapshot.bounds()?;
        if bounds.cell_count() > config.max_cells {
            return Err(SlamError::GridLimitExceeded {
                requested: bounds.cell_count(),
                max_cells: config.max_cells,
            });
        }

        let mut map = CollisionMap::with_bounds(config, bounds);
        for (r, row) in snapshot.rows.iter().enumerate() {
            let y = bounds.max.y - r as i32;
            for (c, symbol) in row.chars().enumerate() {
                let state = CellState::from_char(symbol)
                    .ok_or_else(|| SlamError::Snapshot(format!("unknown symbol {symbol:?}")))?;
                map.set_cell(CellCoord::new(bounds.min.x + c as i32, y), state);
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::Sweep;
    use crate::types::Pose2D;

    fn explored_map() -> CollisionMap {
        let mut map = CollisionMap::new(MapConfig {
            resolution: 0.2,
            initial_half_extent: 8,
            ..MapConfig::default()
        })
        .expect("valid");
        let mut distances = vec![3.0; 90];
        distances[40..50].fill(1.2);
        let sweep = Sweep::from_distances(-45f64.to_radians(), 1f64.to_radians(), 2.5, &distances);
        map.integrate(&Pose2D::new(0.3, -0.1, 0.4), &sweep).expect("integrate");
        map
    }

    #[test]
    fn test_round_trip_is_identical_cell_for_cell() {
        let map = explored_map();
        let text = map.snapshot().to_toml_string().expect("serialize");
        let snapshot = GridSnapshot::from_toml_str(&text).expect("parse");
        let restored = CollisionMap::from_snapshot(&snapshot, MapConfig::default()).expect("rebuild");

        assert_eq!(restored.bounds(), map.bounds());
        assert_eq!(restored.resolution(), map.resolution());
        for (cell, state) in map.cells() {
            assert_eq!(restored.cell_state(cell), state, "cell {cell:?}");
        }
        assert_eq!(restored.snapshot(), map.snapshot());
    }

    #[test]
    fn test_rows_are_top_first() {
        let map = explored_map();
        let snapshot = map.snapshot();
        let top = map.bounds().max.y;
        let first: String = (map.bounds().min.x..=map.bounds().max.x)
            .map(|x| map.cell_state(CellCoord::new(x, top)).as_char())
            .collect();
        assert_eq!(snapshot.rows[0], first);
    }

    #[test]
    fn test_malformed_snapshots_are_rejected() {
        let good = GridSnapshot {
            version: SNAPSHOT_VERSION,
            resolution: 0.5,
            origin: CellCoord::new(-1, -1),
            width: 3,
            height: 2,
            rows: vec!["?.#".to_string(), "...".to_string()],
        };
        assert!(good.validate().is_ok());

        let short_row = GridSnapshot {
            rows: vec!["?.".to_string(), "...".to_string()],
            ..good.clone()
        };
        assert!(matches!(short_row.validate(), Err(SlamError::Snapshot(_))));

        let bad_symbol = GridSnapshot {
            rows: vec!["?x#".to_string(), "...".to_string()],
            ..good.clone()
        };
        assert!(matches!(
            CollisionMap::from_snapshot(&bad_symbol, MapConfig::default()),
            Err(SlamError::Snapshot(_))
        ));

        let wrong_version = GridSnapshot { version: 99, ..good };
        assert!(wrong_version.validate().is_err());

        assert!(matches!(
            GridSnapshot::from_toml_str("version = \"one\""),
            Err(SlamError::SnapshotParse(_))
        ));
    }

    #[test]
    fn test_save_and_load_file() {
        let map = explored_map();
        let path = std::env::temp_dir().join(format!("atlas_snapshot_{}.toml", std::process::id()));
        map.snapshot().save(&path).expect("save");
        let loaded = GridSnapshot::load(&path).expect("load");
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded, map.snapshot());
    }
}
