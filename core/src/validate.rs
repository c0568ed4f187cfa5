//! Precondition checks for inputs crossing into the models from the filter loop.
//!
//! The models themselves never validate; they are total over finite inputs and run on the hot
//! path. Callers that receive poses from outside (sensor drivers, log playback) can run these
//! checks first, or use the `try_*` entry points on the models, to fail fast instead of letting
//! a NaN spread through the population.
use crate::Pose;

use anyhow::{Result, bail};

/// The population must be non-empty and every particle pose finite.
pub fn check_population(poses: &[Pose]) -> Result<()> {
    if poses.is_empty() {
        bail!("particle population is empty");
    }
    if let Some((index, pose)) = poses.iter().enumerate().find(|(_, p)| !p.is_finite()) {
        bail!("particle {index} has a non-finite pose: {pose}");
    }
    Ok(())
}
pub fn check_pose(name: &str, pose: &Pose) -> Result<()> {
    if !pose.is_finite() {
        bail!("{name} has a non-finite component: {pose}");
    }
    Ok(())
}
pub fn check_timestep(dt: f64) -> Result<()> {
    if !dt.is_finite() || dt <= 0.0 {
        bail!("time step must be positive and finite, got {dt}");
    }
    Ok(())
}
pub fn check_propagation_inputs(
    poses: &[Pose],
    odom: &Pose,
    odom_prev: &Pose,
    dt: f64,
) -> Result<()> {
    check_population(poses)?;
    check_pose("odometry pose", odom)?;
    check_pose("previous odometry pose", odom_prev)?;
    check_timestep(dt)
}
pub fn check_scoring_inputs(poses: &[Pose], beacon_observed: &Pose, beacon_map: &Pose) -> Result<()> {
    check_population(poses)?;
    // Only the positions of the beacon poses are consumed
    if !beacon_observed.x.is_finite() || !beacon_observed.y.is_finite() {
        bail!("observed beacon position is non-finite: {beacon_observed}");
    }
    if !beacon_map.x.is_finite() || !beacon_map.y.is_finite() {
        bail!("beacon map position is non-finite: {beacon_map}");
    }
    Ok(())
}
