// atlas_core/src/error.rs

use thiserror::Error;

/// Failures reported by the actuation/sensing collaborator behind `RobotInterface`.
#[derive(Debug, Error)]
pub enum RobotError {
    /// The motion command could not be carried out.
    #[error("actuation failed: {0}")]
    Actuation(String),

    /// No range sweep could be acquired.
    #[error("sensing failed: {0}")]
    Sensing(String),
}

/// Errors surfaced by the SLAM core.
///
/// Noisy or malformed sensor data and numerically degenerate updates are
/// absorbed by the component that sees them and never reach the caller.
#[derive(Debug, Error)]
pub enum SlamError {
    /// A configuration value is out of its valid domain.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Growing the collision map would exceed the configured memory ceiling.
    #[error("collision map growth to {requested} cells exceeds the limit of {max_cells} cells")]
    GridLimitExceeded { requested: usize, max_cells: usize },

    /// A snapshot is structurally inconsistent (wrong dimensions, unknown cell symbol, ...).
    #[error("malformed collision map snapshot: {0}")]
    Snapshot(String),

    #[error("failed to parse collision map snapshot: {0}")]
    SnapshotParse(#[from] toml::de::Error),

    #[error("failed to serialize collision map snapshot: {0}")]
    SnapshotSerialize(#[from] toml::ser::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The robot collaborator failed; the mission cannot continue.
    #[error("robot interface error: {0}")]
    Robot(#[from] RobotError),
}

pub type SlamResult<T> = Result<T, SlamError>;
