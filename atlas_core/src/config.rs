// atlas_core/src/config.rs

//! Tunable parameters for every SLAM component.
//!
//! All structs deserialize with `#[serde(default)]`, so a configuration file
//! only needs to name the values it overrides. Defaults were chosen
//! empirically against the unit-test scenarios and the headless simulator.

use crate::error::SlamError;
use serde::{Deserialize, Serialize};

/// Configuration of the whole SLAM stack.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SlamConfig {
    pub ekf: EkfConfig,
    pub extraction: ExtractionConfig,
    pub map: MapConfig,
    pub exploration: ExplorerConfig,
}

impl SlamConfig {
    pub fn validate(&self) -> Result<(), SlamError> {
        self.ekf.validate()?;
        self.extraction.validate()?;
        self.map.validate()?;
        self.exploration.validate()
    }
}

fn require(condition: bool, message: impl Into<String>) -> Result<(), SlamError> {
    if condition {
        Ok(())
    } else {
        Err(SlamError::InvalidConfig(message.into()))
    }
}

// =========================================================================
// == Estimator ==
// =========================================================================

/// Noise model and association parameters of the EKF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EkfConfig {
    /// Initial variance of x, y (map units²) and theta (rad²).
    pub initial_pose_variance: f64,
    /// Variance added per unit of distance driven.
    pub distance_noise: f64,
    /// Variance added per radian turned.
    pub turn_noise: f64,
    /// Range variance per unit of measured range.
    pub range_noise: f64,
    /// Floor for the range variance so close landmarks are not over-trusted.
    pub min_range_variance: f64,
    /// Bearing variance (rad²).
    pub bearing_noise: f64,
    /// Squared Mahalanobis distance below which an observation is associated
    /// with an existing landmark.
    pub association_gate: f64,
    /// How many times a landmark must have been seen before a re-observation
    /// corrects the state.
    pub min_observations_before_update: u32,
    /// Maximum difference between descriptor widths that still allows association.
    pub descriptor_width_tolerance: f64,
    /// Innovation covariances with a determinant below this are treated as singular.
    pub singular_tolerance: f64,
}

impl Default for EkfConfig {
    fn default() -> Self {
        Self {
            initial_pose_variance: 1e-4,
            distance_noise: 0.01,
            turn_noise: 0.005,
            range_noise: 0.005,
            min_range_variance: 1e-4,
            bearing_noise: 1.0_f64.to_radians().powi(2),
            // Chi-square, 2 degrees of freedom, 99%.
            association_gate: 9.21,
            min_observations_before_update: 1,
            descriptor_width_tolerance: 0.5,
            singular_tolerance: 1e-12,
        }
    }
}

impl EkfConfig {
    pub fn validate(&self) -> Result<(), SlamError> {
        require(self.initial_pose_variance >= 0.0, "ekf.initial_pose_variance must be >= 0")?;
        require(self.distance_noise >= 0.0, "ekf.distance_noise must be >= 0")?;
        require(self.turn_noise >= 0.0, "ekf.turn_noise must be >= 0")?;
        require(self.range_noise >= 0.0, "ekf.range_noise must be >= 0")?;
        require(self.min_range_variance > 0.0, "ekf.min_range_variance must be > 0")?;
        require(self.bearing_noise > 0.0, "ekf.bearing_noise must be > 0")?;
        require(self.association_gate > 0.0, "ekf.association_gate must be > 0")?;
        require(self.descriptor_width_tolerance >= 0.0, "ekf.descriptor_width_tolerance must be >= 0")?;
        require(self.singular_tolerance >= 0.0, "ekf.singular_tolerance must be >= 0")
    }
}

// =========================================================================
// == Landmark Extraction ==
// =========================================================================

/// Which reading of a segment stands in for the whole segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentAnchor {
    /// The angular centre of the segment.
    #[default]
    Midpoint,
    /// The closest reading of the segment.
    Nearest,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub enabled: bool,
    /// A range step larger than this between adjacent readings is an object boundary.
    pub discontinuity_threshold: f64,
    /// Segments narrower than this (radians) are discarded as noise.
    pub min_segment_width: f64,
    pub anchor: SegmentAnchor,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            discontinuity_threshold: 0.3,
            min_segment_width: 2.0_f64.to_radians(),
            anchor: SegmentAnchor::Midpoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpikeConfig {
    pub enabled: bool,
    /// Minimum of `(left - centre) + (right - centre)` for a spike.
    pub spike_threshold: f64,
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            spike_threshold: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineConfig {
    pub enabled: bool,
    pub max_trials: usize,
    /// Points drawn per trial, the base point included.
    pub samples: usize,
    /// Half-width (radians) of the bearing window samples are drawn from.
    pub sample_window: f64,
    /// Maximum point-to-line distance of a supporter.
    pub max_error: f64,
    /// Supporters needed to accept a line.
    pub consensus: usize,
    pub seed: u64,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_trials: 100,
            samples: 5,
            sample_window: 20.0_f64.to_radians(),
            max_error: 0.05,
            consensus: 30,
            seed: 0x5eed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub segments: SegmentConfig,
    pub spikes: SpikeConfig,
    pub lines: LineConfig,
}

impl ExtractionConfig {
    pub fn validate(&self) -> Result<(), SlamError> {
        require(
            self.segments.discontinuity_threshold > 0.0,
            "extraction.segments.discontinuity_threshold must be > 0",
        )?;
        require(
            self.segments.min_segment_width >= 0.0,
            "extraction.segments.min_segment_width must be >= 0",
        )?;
        require(self.spikes.spike_threshold > 0.0, "extraction.spikes.spike_threshold must be > 0")?;
        require(self.lines.samples >= 2, "extraction.lines.samples must be >= 2")?;
        require(
            self.lines.consensus >= self.lines.samples,
            "extraction.lines.consensus must be >= extraction.lines.samples",
        )?;
        require(
            self.lines.sample_window > 0.0 && self.lines.sample_window <= std::f64::consts::PI,
            "extraction.lines.sample_window must be in (0, pi]",
        )?;
        require(self.lines.max_error > 0.0, "extraction.lines.max_error must be > 0")
    }
}

// =========================================================================
// == Collision Map ==
// =========================================================================

/// Grid geometry, evidence weights and the memory ceiling of the collision map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Edge length of a cell in map units.
    pub resolution: f64,
    /// The grid initially spans `[-initial_half_extent, initial_half_extent]` cells on both axes.
    pub initial_half_extent: i32,
    /// Extra cells added on each side that has to grow.
    pub growth_margin: i32,
    /// Hard ceiling on the number of cells; exceeding it aborts the mission.
    pub max_cells: usize,
    /// Log-odds added to the terminal cell of a return.
    pub log_odds_hit: f32,
    /// Log-odds added to cells a beam passed through (negative).
    pub log_odds_miss: f32,
    /// Log-odds added to the cell the robot stands in (negative, strong).
    pub log_odds_visit: f32,
    /// Accumulator value at or above which a cell becomes occupied.
    pub occupied_threshold: f32,
    /// Accumulator value at or below which a cell becomes free.
    pub free_threshold: f32,
    /// Accumulators are clamped to `[-log_odds_clamp, log_odds_clamp]`.
    pub log_odds_clamp: f32,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            resolution: 0.1,
            initial_half_extent: 32,
            growth_margin: 16,
            max_cells: 4_000_000,
            log_odds_hit: 0.85,
            log_odds_miss: -0.4,
            log_odds_visit: -2.0,
            occupied_threshold: 0.7,
            free_threshold: -0.35,
            log_odds_clamp: 5.0,
        }
    }
}

impl MapConfig {
    pub fn validate(&self) -> Result<(), SlamError> {
        require(self.resolution > 0.0 && self.resolution.is_finite(), "map.resolution must be > 0")?;
        require(self.initial_half_extent >= 0, "map.initial_half_extent must be >= 0")?;
        require(self.growth_margin >= 0, "map.growth_margin must be >= 0")?;
        let initial_side = 2 * self.initial_half_extent as usize + 1;
        require(
            self.max_cells >= initial_side * initial_side,
            "map.max_cells is smaller than the initial grid",
        )?;
        require(self.log_odds_hit > 0.0, "map.log_odds_hit must be > 0")?;
        require(self.log_odds_miss < 0.0, "map.log_odds_miss must be < 0")?;
        require(self.log_odds_visit < 0.0, "map.log_odds_visit must be < 0")?;
        require(self.occupied_threshold > 0.0, "map.occupied_threshold must be > 0")?;
        require(self.free_threshold < 0.0, "map.free_threshold must be < 0")?;
        require(
            self.log_odds_clamp >= self.occupied_threshold && self.log_odds_clamp >= -self.free_threshold,
            "map.log_odds_clamp must reach both thresholds",
        )
    }
}

// =========================================================================
// == Exploration ==
// =========================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// When set, each command only advances this many cells along the BFS path
    /// instead of heading straight for the frontier cell.
    pub max_step_cells: Option<usize>,
}

impl ExplorerConfig {
    pub fn validate(&self) -> Result<(), SlamError> {
        require(
            self.max_step_cells != Some(0),
            "exploration.max_step_cells must be at least 1 when set",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        SlamConfig::default().validate().expect("defaults must validate");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SlamConfig = toml::from_str(
            r#"
            [ekf]
            association_gate = 4.0

            [map]
            resolution = 0.25
            "#,
        )
        .expect("parse");
        assert_eq!(config.ekf.association_gate, 4.0);
        assert_eq!(config.map.resolution, 0.25);
        assert_eq!(config.extraction, ExtractionConfig::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = SlamConfig::default();
        config.map.resolution = 0.0;
        assert!(matches!(config.validate(), Err(SlamError::InvalidConfig(_))));

        let mut config = SlamConfig::default();
        config.exploration.max_step_cells = Some(0);
        assert!(matches!(config.validate(), Err(SlamError::InvalidConfig(_))));

        let mut config = SlamConfig::default();
        config.map.max_cells = 10;
        assert!(config.validate().is_err());
    }
}
