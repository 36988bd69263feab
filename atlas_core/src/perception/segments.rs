// atlas_core/src/perception/segments.rs

use super::FeatureDetector;
use crate::config::{SegmentAnchor, SegmentConfig};
use crate::messages::{LandmarkDescriptor, LandmarkKind, Observation, Sweep};
use crate::types::normalize_angle;

/// Finds objects as runs of readings bounded on both sides by a range
/// discontinuity or a dropout.
#[derive(Debug, Clone)]
pub struct SegmentDetector {
    config: SegmentConfig,
}

impl SegmentDetector {
    pub fn new(config: SegmentConfig) -> Self {
        Self { config }
    }

    fn is_jump(&self, sweep: &Sweep, a: usize, b: usize) -> bool {
        (sweep.readings[a].distance - sweep.readings[b].distance).abs() > self.config.discontinuity_threshold
    }

    /// Index runs whose both ends are real boundaries, in sweep order.
    fn closed_runs(&self, sweep: &Sweep) -> Vec<Vec<usize>> {
        let n = sweep.len();
        let mut runs = Vec::new();
        let mut current: Vec<usize> = Vec::new();

        if sweep.wraps_around() {
            // Start the walk just after a boundary so no run straddles the seam.
            let boundary = (0..n).find(|&i| {
                let j = (i + 1) % n;
                !sweep.is_return(i) || !sweep.is_return(j) || self.is_jump(sweep, i, j)
            });
            let Some(boundary) = boundary else {
                return runs;
            };
            for step in 1..=n {
                let i = (boundary + step) % n;
                self.extend_run(sweep, i, &mut current, &mut runs);
            }
            if !current.is_empty() {
                runs.push(current);
            }
        } else {
            for i in 0..n {
                self.extend_run(sweep, i, &mut current, &mut runs);
            }
            // A trailing run is cut by the end of the sweep, not by a boundary.
        }

        // A run starting at the first reading of a partial sweep has an open left end.
        if !sweep.wraps_around() {
            runs.retain(|run| run.first() != Some(&0));
        }
        runs
    }

    fn extend_run(&self, sweep: &Sweep, i: usize, current: &mut Vec<usize>, runs: &mut Vec<Vec<usize>>) {
        if !sweep.is_return(i) {
            if !current.is_empty() {
                runs.push(std::mem::take(current));
            }
            return;
        }
        if let Some(&last) = current.last() {
            if self.is_jump(sweep, last, i) {
                runs.push(std::mem::take(current));
            }
        }
        current.push(i);
    }

    fn to_observation(&self, sweep: &Sweep, run: &[usize]) -> Observation {
        let distance = |i: usize| sweep.readings[i].distance;
        let first = run[0];
        let len = run.len();

        let (range, bearing) = match self.config.anchor {
            SegmentAnchor::Midpoint => {
                let range = if len % 2 == 1 {
                    distance(run[len / 2])
                } else {
                    0.5 * (distance(run[len / 2 - 1]) + distance(run[len / 2]))
                };
                let bearing = sweep.bearing(first) + (len - 1) as f64 * 0.5 * sweep.angle_increment;
                (range, bearing)
            }
            SegmentAnchor::Nearest => {
                let nearest = run
                    .iter()
                    .copied()
                    .min_by(|&a, &b| distance(a).total_cmp(&distance(b)))
                    .unwrap_or(first);
                (distance(nearest), sweep.bearing(nearest))
            }
        };

        // Chord between the two end points.
        let last = run[len - 1];
        let (a, b) = (sweep.bearing(first), sweep.bearing(last));
        let (ra, rb) = (distance(first), distance(last));
        let width = (ra * a.cos() - rb * b.cos()).hypot(ra * a.sin() - rb * b.sin());

        Observation::with_descriptor(
            range,
            normalize_angle(bearing),
            LandmarkDescriptor::new(LandmarkKind::Segment, Some(width)),
        )
    }
}

impl FeatureDetector for SegmentDetector {
    fn detect(&self, sweep: &Sweep) -> Vec<Observation> {
        let increment = sweep.angle_increment.abs();
        self.closed_runs(sweep)
            .into_iter()
            .filter(|run| run.len() as f64 * increment >= self.config.min_segment_width)
            .map(|run| self.to_observation(sweep, &run))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::RangeReading;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::TAU;

    fn detector() -> SegmentDetector {
        SegmentDetector::new(SegmentConfig::default())
    }

    fn half_sweep(distances: &[f64]) -> Sweep {
        Sweep::from_distances(-90f64.to_radians(), 1f64.to_radians(), 5.0, distances)
    }

    #[test]
    fn test_near_obstacle_dead_ahead() {
        let mut distances = vec![5.0; 181];
        distances[90..=92].fill(1.0);

        let observations = detector().detect(&half_sweep(&distances));

        assert_eq!(observations.len(), 1);
        let obs = observations[0];
        assert_abs_diff_eq!(obs.range, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(obs.bearing, 1f64.to_radians(), epsilon = 1e-12);
        let descriptor = obs.descriptor.expect("descriptor");
        assert_eq!(descriptor.kind, LandmarkKind::Segment);
        assert_abs_diff_eq!(descriptor.width.expect("width"), 2.0 * 1f64.to_radians().sin(), epsilon = 1e-3);
    }

    #[test]
    fn test_no_discontinuities_means_no_landmarks() {
        assert!(detector().detect(&half_sweep(&[2.0; 181])).is_empty());
        let full = Sweep::from_distances(0.0, TAU / 360.0, 5.0, &[2.0; 360]);
        assert!(detector().detect(&full).is_empty());
    }

    #[test]
    fn test_segment_touching_sweep_edge_is_rejected() {
        let mut distances = vec![5.0; 181];
        distances[0..5].fill(1.0);
        assert!(detector().detect(&half_sweep(&distances)).is_empty());
    }

    #[test]
    fn test_narrow_segment_is_noise() {
        let mut distances = vec![5.0; 181];
        distances[50] = 1.0;
        assert!(detector().detect(&half_sweep(&distances)).is_empty());
    }

    #[test]
    fn test_segment_across_the_seam_of_a_full_sweep() {
        let mut distances = vec![5.0; 360];
        distances[358] = 1.0;
        distances[359] = 1.0;
        distances[0] = 1.0;
        distances[1] = 1.0;
        distances[2] = 1.0;
        let sweep = Sweep::from_distances(0.0, TAU / 360.0, 5.0, &distances);

        let observations = detector().detect(&sweep);

        assert_eq!(observations.len(), 1);
        assert_abs_diff_eq!(observations[0].bearing, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(observations[0].range, 1.0);
    }

    #[test]
    fn test_nearest_anchor_picks_closest_reading() {
        let config = SegmentConfig {
            anchor: SegmentAnchor::Nearest,
            ..SegmentConfig::default()
        };
        let mut distances = vec![5.0; 181];
        distances[40..=44].copy_from_slice(&[1.2, 1.1, 1.0, 1.05, 1.15]);
        let observations = SegmentDetector::new(config).detect(&half_sweep(&distances));

        assert_eq!(observations.len(), 1);
        assert_abs_diff_eq!(observations[0].range, 1.0);
        assert_abs_diff_eq!(observations[0].bearing, (-48f64).to_radians(), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_sweeps_never_panic() {
        let d = detector();
        assert!(d.detect(&half_sweep(&[])).is_empty());
        assert!(d.detect(&half_sweep(&[1.0])).is_empty());
        let dropouts = Sweep::new(0.0, 0.1, 5.0, vec![RangeReading::invalid(); 20]);
        assert!(d.detect(&dropouts).is_empty());
    }
}
