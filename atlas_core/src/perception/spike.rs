// atlas_core/src/perception/spike.rs

use super::FeatureDetector;
use crate::config::SpikeConfig;
use crate::messages::{LandmarkDescriptor, LandmarkKind, Observation, Sweep};
use crate::types::normalize_angle;

/// Flags single readings that are markedly closer than both neighbours,
/// such as table legs or door frames.
#[derive(Debug, Clone)]
pub struct SpikeDetector {
    config: SpikeConfig,
}

impl SpikeDetector {
    pub fn new(config: SpikeConfig) -> Self {
        Self { config }
    }
}

impl FeatureDetector for SpikeDetector {
    fn detect(&self, sweep: &Sweep) -> Vec<Observation> {
        let n = sweep.len();
        if n < 3 {
            return Vec::new();
        }
        let wraps = sweep.wraps_around();

        (0..n)
            .filter(|&i| wraps || (i != 0 && i != n - 1))
            .filter_map(|i| {
                let left = (i + n - 1) % n;
                let right = (i + 1) % n;
                if !(sweep.is_return(left) && sweep.is_return(i) && sweep.is_return(right)) {
                    return None;
                }
                let a = sweep.readings[left].distance;
                let b = sweep.readings[i].distance;
                let c = sweep.readings[right].distance;
                ((a - b) + (c - b) >= self.config.spike_threshold).then(|| {
                    Observation::with_descriptor(
                        b,
                        normalize_angle(sweep.bearing(i)),
                        LandmarkDescriptor::new(LandmarkKind::Spike, None),
                    )
                })
            })
            .collect()
    }
}
