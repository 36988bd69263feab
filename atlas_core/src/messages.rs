// atlas_core/src/messages.rs

use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

// =========================================================================
// == Sensor Data Structures ==
// =========================================================================

/// One sample of a range sweep as delivered by the sensing layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeReading {
    /// Measured distance in map units.
    pub distance: f64,
    /// Whether the sensor itself reported the sample as usable.
    pub valid: bool,
}

impl RangeReading {
    pub fn new(distance: f64) -> Self {
        Self {
            distance,
            valid: true,
        }
    }

    pub fn invalid() -> Self {
        Self {
            distance: f64::NAN,
            valid: false,
        }
    }
}

/// An ordered range sweep with evenly spaced bearings.
///
/// Reading `i` was taken at bearing `start_angle + i * angle_increment`,
/// relative to the robot heading (0 = straight ahead, counter-clockwise positive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sweep {
    pub start_angle: f64,
    pub angle_increment: f64,
    /// Maximum reliable range of the sensor. Readings at or beyond it carry no hit.
    pub max_range: f64,
    pub readings: Vec<RangeReading>,
}

impl Sweep {
    pub fn new(start_angle: f64, angle_increment: f64, max_range: f64, readings: Vec<RangeReading>) -> Self {
        Self {
            start_angle,
            angle_increment,
            max_range,
            readings,
        }
    }

    /// Builds a sweep from raw distances, all flagged as valid.
    pub fn from_distances(start_angle: f64, angle_increment: f64, max_range: f64, distances: &[f64]) -> Self {
        Self::new(
            start_angle,
            angle_increment,
            max_range,
            distances.iter().copied().map(RangeReading::new).collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn bearing(&self, index: usize) -> f64 {
        self.start_angle + index as f64 * self.angle_increment
    }

    /// A reading is a return (a real surface hit) when it is valid, finite,
    /// positive and strictly below the maximum range.
    pub fn is_return(&self, index: usize) -> bool {
        self.readings
            .get(index)
            .map_or(false, |r| r.valid && r.distance.is_finite() && r.distance > 0.0 && r.distance < self.max_range)
    }

    /// A reading carries free-space information when it is a return or a
    /// clean "nothing within max range" sample.
    pub fn is_informative(&self, index: usize) -> bool {
        self.readings
            .get(index)
            .map_or(false, |r| r.valid && !r.distance.is_nan() && r.distance > 0.0)
    }

    /// True when the readings cover a full revolution, so the last reading is
    /// angularly adjacent to the first one.
    pub fn wraps_around(&self) -> bool {
        if self.readings.len() < 3 || self.angle_increment == 0.0 {
            return false;
        }
        let span = (self.readings.len() as f64 * self.angle_increment).abs();
        (span - TAU).abs() <= self.angle_increment.abs() * 0.5
    }
}

// =========================================================================
// == Landmark Observations ==
// =========================================================================

/// The family of feature detector that produced an observation. Landmarks are
/// only ever associated with observations of the same kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LandmarkKind {
    /// Midpoint/nearest point of a segment bounded by range discontinuities.
    Segment,
    /// A single reading clearly closer than both neighbours.
    Spike,
    /// Foot of the perpendicular onto a wall line.
    Line,
}

/// Signature attached to an observation to aid data association.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LandmarkDescriptor {
    pub kind: LandmarkKind,
    /// Estimated physical extent of the feature, when the detector can tell.
    pub width: Option<f64>,
}

impl LandmarkDescriptor {
    pub fn new(kind: LandmarkKind, width: Option<f64>) -> Self {
        Self { kind, width }
    }

    /// Whether two descriptors may refer to the same physical feature.
    pub fn is_compatible(&self, other: &LandmarkDescriptor, width_tolerance: f64) -> bool {
        if self.kind != other.kind {
            return false;
        }
        match (self.width, other.width) {
            (Some(a), Some(b)) => (a - b).abs() <= width_tolerance,
            _ => true,
        }
    }
}

/// A landmark observation relative to the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub range: f64,
    pub bearing: f64,
    pub descriptor: Option<LandmarkDescriptor>,
}

impl Observation {
    pub fn new(range: f64, bearing: f64) -> Self {
        Self {
            range,
            bearing,
            descriptor: None,
        }
    }

    pub fn with_descriptor(range: f64, bearing: f64, descriptor: LandmarkDescriptor) -> Self {
        Self {
            range,
            bearing,
            descriptor: Some(descriptor),
        }
    }
}
