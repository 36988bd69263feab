// atlas_sim/src/config.rs

//! Loads the mission configuration: built-in defaults, overlaid by an
//! optional TOML file, overlaid by command-line flags.

use crate::robot::RobotConfig;
use crate::world::WorldConfig;
use atlas_core::config::SlamConfig;
use figment::{
    providers::{Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionConfig {
    /// Upper bound on explore / act / sense / fuse cycles.
    pub steps: usize,
    /// Seed of the simulation's noise generator.
    pub seed: u64,
    /// Where to write the final collision map, if anywhere.
    pub snapshot: Option<PathBuf>,
    pub slam: SlamConfig,
    pub world: WorldConfig,
    pub robot: RobotConfig,
}

impl Default for MissionConfig {
    fn default() -> Self {
        Self {
            steps: 200,
            seed: 42,
            snapshot: None,
            slam: SlamConfig::default(),
            world: WorldConfig::default(),
            robot: RobotConfig::default(),
        }
    }
}

impl MissionConfig {
    fn figment(path: Option<&Path>) -> Figment {
        let figment = Figment::from(Serialized::defaults(MissionConfig::default()));
        match path {
            Some(path) => figment.merge(Toml::file(path)),
            None => figment,
        }
    }

    /// Defaults merged with the file at `path`, which must exist when given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = path {
            anyhow::ensure!(path.is_file(), "configuration file {} not found", path.display());
        }
        let config: MissionConfig = Self::figment(path).extract()?;
        config.slam.validate()?;
        Ok(config)
    }

    /// Defaults merged with an in-memory TOML document.
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let config: MissionConfig = Self::figment(None).merge(Toml::string(text)).extract()?;
        config.slam.validate()?;
        Ok(config)
    }
}
