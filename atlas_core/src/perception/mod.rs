// atlas_core/src/perception/mod.rs

//! Landmark extraction: turns one range sweep into point observations
//! relative to the sensor.

use crate::config::ExtractionConfig;
use crate::messages::{Observation, Sweep};
use std::fmt::Debug;

pub mod ransac;
pub mod segments;
pub mod spike;

pub use ransac::LineDetector;
pub use segments::SegmentDetector;
pub use spike::SpikeDetector;

// --- FEATURE DETECTOR TRAIT ---
pub trait FeatureDetector: Debug + Send + Sync {
    /// Extracts observations from `sweep`. Malformed readings are skipped, never reported.
    fn detect(&self, sweep: &Sweep) -> Vec<Observation>;
}

/// The closed set of detectors the extractor can run.
#[derive(Debug, Clone)]
pub enum Detector {
    Segment(SegmentDetector),
    Spike(SpikeDetector),
    Line(LineDetector),
}

impl FeatureDetector for Detector {
    fn detect(&self, sweep: &Sweep) -> Vec<Observation> {
        match self {
            Detector::Segment(d) => d.detect(sweep),
            Detector::Spike(d) => d.detect(sweep),
            Detector::Line(d) => d.detect(sweep),
        }
    }
}

/// Runs every enabled detector and merges their output in bearing order,
/// so that downstream association is deterministic.
#[derive(Debug, Clone)]
pub struct LandmarkExtractor {
    detectors: Vec<Detector>,
}

impl LandmarkExtractor {
    pub fn new(config: &ExtractionConfig) -> Self {
        let mut detectors = Vec::new();
        if config.segments.enabled {
            detectors.push(Detector::Segment(SegmentDetector::new(config.segments.clone())));
        }
        if config.spikes.enabled {
            detectors.push(Detector::Spike(SpikeDetector::new(config.spikes.clone())));
        }
        if config.lines.enabled {
            detectors.push(Detector::Line(LineDetector::new(config.lines.clone())));
        }
        Self { detectors }
    }

    pub fn detectors(&self) -> &[Detector] {
        &self.detectors
    }

    pub fn extract(&self, sweep: &Sweep) -> Vec<Observation> {
        let mut observations: Vec<Observation> = self.detectors.iter().flat_map(|d| d.detect(sweep)).collect();
        observations.sort_by(|a, b| {
            a.bearing
                .total_cmp(&b.bearing)
                .then_with(|| a.descriptor.map(|d| d.kind).cmp(&b.descriptor.map(|d| d.kind)))
        });
        observations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LineConfig, SpikeConfig};
    use crate::messages::LandmarkKind;

    #[test]
    fn test_default_extractor_runs_segments_only() {
        let extractor = LandmarkExtractor::new(&ExtractionConfig::default());
        assert_eq!(extractor.detectors().len(), 1);
        assert!(matches!(extractor.detectors()[0], Detector::Segment(_)));
    }

    #[test]
    fn test_output_is_sorted_by_bearing() {
        let config = ExtractionConfig {
            spikes: SpikeConfig {
                enabled: true,
                spike_threshold: 0.5,
            },
            lines: LineConfig {
                enabled: false,
                ..LineConfig::default()
            },
            ..ExtractionConfig::default()
        };
        let mut distances = vec![5.0; 181];
        distances[120..=124].fill(1.0);
        distances[30..=32].fill(2.0);
        distances[60] = 2.0;
        distances[59] = 3.0;
        distances[61] = 3.0;
        let sweep = Sweep::from_distances(-90f64.to_radians(), 1f64.to_radians(), 5.0, &distances);

        let observations = LandmarkExtractor::new(&config).extract(&sweep);

        assert!(observations.windows(2).all(|w| w[0].bearing <= w[1].bearing));
        let kinds: Vec<_> = observations.iter().filter_map(|o| o.descriptor.map(|d| d.kind)).collect();
        assert!(kinds.contains(&LandmarkKind::Spike));
        assert_eq!(kinds.iter().filter(|k| **k == LandmarkKind::Segment).count(), 2);
    }
}
