// atlas_sim/src/cli.rs

use crate::config::MissionConfig;
use crate::logging::LogLevel;
use clap::Parser;
use std::path::PathBuf;

/// Atlas: headless 2-D EKF-SLAM exploration in a simulated arena.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Mission configuration TOML. Built-in defaults are used when omitted.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Maximum number of exploration steps (overrides the configuration).
    #[arg(short, long)]
    pub steps: Option<usize>,

    /// Seed for the simulated sensor and actuation noise (overrides the configuration).
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write the final collision map snapshot to this file.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,

    /// Print the final collision map to stdout.
    #[arg(long, default_value_t = false)]
    pub print_map: bool,

    /// Log verbosity, unless RUST_LOG is set.
    #[arg(long, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,
}

impl Cli {
    /// Applies the command-line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut MissionConfig) {
        if let Some(steps) = self.steps {
            config.steps = steps;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(path) = &self.snapshot {
            config.snapshot = Some(path.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_configuration() {
        let cli = Cli::parse_from(["atlas", "--steps", "7", "--seed", "3", "--snapshot", "out.toml"]);
        let mut config = MissionConfig::default();
        cli.apply(&mut config);
        assert_eq!(config.steps, 7);
        assert_eq!(config.seed, 3);
        assert_eq!(config.snapshot, Some(PathBuf::from("out.toml")));
    }

    #[test]
    fn test_no_flags_keep_configuration() {
        let cli = Cli::parse_from(["atlas", "--log-level", "debug"]);
        let mut config = MissionConfig::default();
        cli.apply(&mut config);
        assert_eq!(config, MissionConfig::default());
        assert_eq!(cli.log_level, LogLevel::Debug);
    }
}
