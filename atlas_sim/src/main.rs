// atlas_sim/src/main.rs

use anyhow::Context;
use atlas_sim::{build_mission, cli::Cli, config::MissionConfig, logging, position_error};
use clap::Parser;
use tracing::info;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init_logging(cli.log_level);

    // --- Configuration ---
    let mut config = MissionConfig::load(cli.config.as_deref()).context("failed to load mission configuration")?;
    cli.apply(&mut config);
    if let Some(path) = &cli.config {
        info!("Loaded mission configuration from {}", path.display());
    }

    // --- Mission ---
    let mut mission = build_mission(&config)?;
    let summary = mission.run(config.steps)?;

    let pose = summary.final_pose.pose;
    println!(
        "steps: {}  completed: {}  landmarks: {}",
        summary.steps, summary.completed, summary.landmarks
    );
    println!(
        "cells: {} free, {} occupied, {} unknown",
        summary.free_cells, summary.occupied_cells, summary.unknown_cells
    );
    println!(
        "final pose: ({:.3}, {:.3}, {:.1} deg), error {:.3}",
        pose.x,
        pose.y,
        pose.theta.to_degrees(),
        position_error(&mission)
    );

    // --- Output ---
    let snapshot = mission.slam().snapshot();
    if cli.print_map {
        for row in &snapshot.rows {
            println!("{row}");
        }
    }
    if let Some(path) = &config.snapshot {
        snapshot
            .save(path)
            .with_context(|| format!("failed to write snapshot to {}", path.display()))?;
        info!("Wrote collision map snapshot to {}", path.display());
    }
    Ok(())
}
