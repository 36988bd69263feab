// atlas_sim/src/lib.rs

//! Headless simulator driving the `atlas_core` SLAM mission: a rectangular
//! arena, a noisy range-finder robot and the configuration/CLI plumbing
//! around them.

pub mod cli;
pub mod config;
pub mod logging;
pub mod robot;
pub mod world;

use atlas_core::prelude::*;
use config::MissionConfig;
use robot::SimRobot;
use world::World;

/// Builds the SLAM stack and the simulated robot described by `config`.
pub fn build_mission(config: &MissionConfig) -> anyhow::Result<Mission<SimRobot>> {
    let robot = SimRobot::new(World::new(config.world.clone()), config.robot.clone(), config.seed)?;
    let slam = Slam::new(config.slam.clone())?;
    Ok(Mission::new(slam, robot))
}

/// Mean position error of the final estimate against ground truth.
pub fn position_error(mission: &Mission<SimRobot>) -> f64 {
    let estimate = mission.slam().pose().pose;
    let truth = mission.robot().pose();
    (estimate.x - truth.x).hypot(estimate.y - truth.y)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_default_mission_runs() {
        let config = MissionConfig {
            steps: 10,
            ..MissionConfig::default()
        };
        let mut mission = build_mission(&config).expect("mission");
        let summary = mission.run(config.steps).expect("run");

        assert!(summary.steps <= 10);
        assert!(summary.occupied_cells > 0);
        assert!(position_error(&mission) < 0.5);
    }

    #[test]
    fn test_same_seed_same_outcome() {
        let config = MissionConfig {
            steps: 5,
            ..MissionConfig::default()
        };
        let mut a = build_mission(&config).expect("mission");
        let mut b = build_mission(&config).expect("mission");
        assert_eq!(a.run(5).expect("run"), b.run(5).expect("run"));
        assert_eq!(a.slam().snapshot(), b.slam().snapshot());
    }
}
