//! Range-bearing beacon likelihood model
//!
//! A beacon detection is a position in the robot's sensor frame. It is reduced once per call to a
//! range $r$ and bearing $\phi$. For each particle the expected range $\hat{r}_m$ and bearing
//! $\hat{\phi}_m$ to the beacon's known map position are predicted from the particle's pose, and the
//! weight is the product of two independent zero-mean normal densities of the residuals:
//!
//! $$
//! w_m = \mathcal{N}(r - \hat{r}_m; 0, \sigma_r) \cdot \mathcal{N}(\phi - \hat{\phi}_m; 0, \sigma_\phi)
//! $$
//!
//! where the bearing residual is taken with wraparound. Weights are left unnormalized.
use crate::angles::{angle_difference, gauss};
use crate::validate;
use crate::Pose;

use log::{debug, trace, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Default standard deviation of the range measurement (m)
pub const DEFAULT_RANGE_STD: f64 = 0.1;
/// Default standard deviation of the bearing measurement (rad)
pub const DEFAULT_BEARING_STD: f64 = 0.075;

/// Range (m) and bearing (rad) of a beacon relative to the robot.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RangeBearing {
    pub range: f64,
    pub bearing: f64,
}
impl Display for RangeBearing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RangeBearing {{ range: {:.4} m, bearing: {:.4} rad }}",
            self.range, self.bearing
        )
    }
}
impl RangeBearing {
    /// Reduce a sensor-frame beacon detection to range and bearing. The detection's own heading
    /// is ignored.
    pub fn from_observation(beacon_observed: &Pose) -> RangeBearing {
        RangeBearing {
            range: beacon_observed.position().norm(),
            bearing: bearing_of(beacon_observed.x, beacon_observed.y),
        }
    }
    /// Range and bearing at which a robot at `pose` should see a beacon located at `beacon_map`.
    ///
    /// The bearing is relative to the robot heading and wrapped to $(-\pi, \pi]$. A particle sitting
    /// exactly on the beacon sees it at range zero and bearing `-theta` (wrapped).
    pub fn expected(pose: &Pose, beacon_map: &Pose) -> RangeBearing {
        let offset = beacon_map.position() - pose.position();
        RangeBearing {
            range: offset.norm(),
            bearing: angle_difference(pose.theta, bearing_of(offset.x, offset.y)),
        }
    }
}
fn bearing_of(x: f64, y: f64) -> f64 {
    if x == 0.0 && y == 0.0 { 0.0 } else { y.atan2(x) }
}

/// Measurement noise of the beacon sensor
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SensorNoise {
    /// Standard deviation of range residuals (m)
    pub range_std: f64,
    /// Standard deviation of bearing residuals (rad)
    pub bearing_std: f64,
}
impl Default for SensorNoise {
    fn default() -> Self {
        SensorNoise {
            range_std: DEFAULT_RANGE_STD,
            bearing_std: DEFAULT_BEARING_STD,
        }
    }
}

/// Sensor scorer: per-particle likelihood of one beacon observation
#[derive(Clone, Copy, Debug, Default)]
pub struct SensorModel {
    pub noise: SensorNoise,
}
impl SensorModel {
    pub fn new(noise: SensorNoise) -> Self {
        SensorModel { noise }
    }
    /// Largest weight any particle can receive, reached when both residuals are zero.
    pub fn peak_weight(&self) -> f64 {
        gauss(0.0, 0.0, self.noise.range_std) * gauss(0.0, 0.0, self.noise.bearing_std)
    }
    /// Likelihood of `observed` for a single particle.
    pub fn weight(&self, pose: &Pose, observed: &RangeBearing, beacon_map: &Pose) -> f64 {
        let expected = RangeBearing::expected(pose, beacon_map);
        let range_residual = observed.range - expected.range;
        let bearing_residual = angle_difference(expected.bearing, observed.bearing);
        gauss(range_residual, 0.0, self.noise.range_std)
            * gauss(bearing_residual, 0.0, self.noise.bearing_std)
    }
    /// Weight every particle against one beacon observation.
    ///
    /// # Arguments
    /// * `poses` - Particle population in the map frame.
    /// * `beacon_observed` - Beacon detection in the robot's sensor frame (only x and y are used).
    /// * `beacon_map` - Known map position of the same beacon (only x and y are used).
    /// # Returns
    /// * One non-negative, unnormalized weight per particle, index-aligned with `poses`.
    pub fn score(&self, poses: &[Pose], beacon_observed: &Pose, beacon_map: &Pose) -> Vec<f64> {
        let observed = RangeBearing::from_observation(beacon_observed);
        trace!("Scoring {} particles against {}", poses.len(), observed);
        let weights: Vec<f64> = poses
            .iter()
            .map(|pose| self.weight(pose, &observed, beacon_map))
            .collect();
        log_summary(&weights);
        weights
    }
    /// Data-parallel [`SensorModel::score`]; produces identical weights.
    pub fn score_par(&self, poses: &[Pose], beacon_observed: &Pose, beacon_map: &Pose) -> Vec<f64> {
        let observed = RangeBearing::from_observation(beacon_observed);
        trace!("Scoring {} particles in parallel against {}", poses.len(), observed);
        let weights: Vec<f64> = poses
            .par_iter()
            .map(|pose| self.weight(pose, &observed, beacon_map))
            .collect();
        log_summary(&weights);
        weights
    }
    /// [`SensorModel::score`] with the inputs checked first.
    pub fn try_score(
        &self,
        poses: &[Pose],
        beacon_observed: &Pose,
        beacon_map: &Pose,
    ) -> anyhow::Result<Vec<f64>> {
        if let Err(err) = validate::check_scoring_inputs(poses, beacon_observed, beacon_map) {
            warn!("Rejecting scoring step: {err}");
            return Err(err);
        }
        Ok(self.score(poses, beacon_observed, beacon_map))
    }
}
fn log_summary(weights: &[f64]) {
    if log::log_enabled!(log::Level::Debug) {
        let max_weight = weights.iter().cloned().fold(0.0, f64::max);
        let underflowed = weights.iter().filter(|w| **w == 0.0).count();
        debug!(
            "Scored {} particles: max weight {:.4e}, {} underflowed to zero",
            weights.len(),
            max_weight,
            underflowed
        );
    }
}
