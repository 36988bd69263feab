// atlas_core/src/lib.rs

//! Pure, framework-agnostic 2-D SLAM core: EKF over pose + landmarks,
//! landmark extraction from range sweeps, an occupancy collision map and a
//! frontier explorer, composed behind the `Slam` orchestrator.

pub mod config;
pub mod error;
pub mod estimation;
pub mod exploration;
pub mod mapping;
pub mod messages;
pub mod models;
pub mod perception;
pub mod prelude;
pub mod slam;
pub mod types;
