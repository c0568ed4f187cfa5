//! Monte Carlo localization models for a wheeled robot with odometry and a beacon sensor
//!
//! This crate provides the two probabilistic building blocks of a particle-filter localizer for a planar
//! mobile robot: a motion model that advances a population of pose hypotheses using incremental wheel
//! odometry, and a sensor model that scores each hypothesis against a single range-bearing observation
//! of a beacon whose map position is known. Everything else in a full localization stack (initializing
//! the population, resampling, deciding which map beacon an observation belongs to, fusing several
//! beacons seen in the same step, driving the robot) is left to the caller. The caller owns the particle
//! population across time steps and calls [`motion::MotionModel::propagate`] once per step and
//! [`sensor::SensorModel::score`] once per visible beacon.
//!
//! This crate is primarily built off of the following dependencies:
//! - [`nalgebra`](https://crates.io/crates/nalgebra): Vector and matrix views of poses and populations.
//! - [`rand`](https://crates.io/crates/rand) and [`rand_distr`](https://crates.io/crates/rand_distr): Random
//!   number generation for the process noise injected on every propagation step.
//! - [`rayon`](https://crates.io/crates/rayon): Data-parallel variants of both models.
//!
//! ## Crate overview
//!
//! - [angles]: Angle wrapping, signed angle differences, and the scalar Gaussian density.
//! - [motion]: Odometry-delta motion model (rotate, translate, rotate) with process noise.
//! - [sensor]: Range-bearing beacon likelihood model.
//! - [validate]: Optional precondition checks for inputs arriving from outside the filter loop.
//! - [config]: Serializable noise parameters and RNG seed.
//!
//! ## Coordinate and state definitions
//!
//! A pose is the triple
//!
//! $$
//! x = [p_x, p_y, \theta]
//! $$
//!
//! where $p_x$ and $p_y$ are metres in a planar Cartesian frame and $\theta$ is the heading in radians,
//! measured counter-clockwise from the frame's x axis. Particles live in the map frame. Odometry poses live
//! in the odometry frame, and only the relative transform between two consecutive odometry readings is
//! used. Beacon observations are expressed in the robot's own sensor frame (x forward, y left).
//!
//! Headings are not renormalized by the motion model. Anywhere two headings are compared the comparison
//! goes through [`angles::angle_difference`], so unbounded headings are harmless.
//!
//! ## Randomness
//!
//! No routine in this crate touches a global random source. Every stochastic call takes the generator as
//! an argument, so a seeded [`rand::rngs::StdRng`] (see [`config::ModelConfig::rng`]) makes a whole run
//! reproducible.

pub mod angles;
pub mod config;
pub mod motion;
pub mod sensor;
pub mod validate;

use nalgebra::{DMatrix, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

pub use angles::{angle_difference, gauss, wrap_to_pi};
pub use config::{ConfigFormat, ModelConfig};
pub use motion::{MotionModel, NoiseShape, OdometryDelta, ProcessNoise};
pub use sensor::{RangeBearing, SensorModel, SensorNoise};

/// Planar pose: position in metres and heading in radians.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}
impl Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pose {{ x: {:.4}, y: {:.4}, theta: {:.4} }}",
            self.x, self.y, self.theta
        )
    }
}
impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Pose {
        Pose { x, y, theta }
    }
    /// Position component as a vector, dropping the heading.
    pub fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x, self.y)
    }
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
    pub fn to_vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.theta)
    }
}
impl From<Vector3<f64>> for Pose {
    fn from(vector: Vector3<f64>) -> Self {
        Pose::new(vector[0], vector[1], vector[2])
    }
}
impl From<(f64, f64, f64)> for Pose {
    fn from(tuple: (f64, f64, f64)) -> Self {
        let (x, y, theta) = tuple;
        Pose::new(x, y, theta)
    }
}

/// Commanded forward speed (m/s) and turn rate (rad/s).
///
/// Accepted by the motion model for interface compatibility with the control loop; displacement
/// is derived from odometry alone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedCommand {
    pub v: f64,
    pub omega: f64,
}
impl Display for SpeedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SpeedCommand {{ v: {:.3} m/s, omega: {:.3} rad/s }}",
            self.v, self.omega
        )
    }
}
impl SpeedCommand {
    pub fn new(v: f64, omega: f64) -> SpeedCommand {
        SpeedCommand { v, omega }
    }
}

/// Stack a population into a 3 x M matrix, one particle per column (`[x, y, theta]`).
pub fn population_to_matrix(poses: &[Pose]) -> DMatrix<f64> {
    let mut data = Vec::with_capacity(poses.len() * 3);
    for pose in poses {
        data.push(pose.x);
        data.push(pose.y);
        data.push(pose.theta);
    }
    DMatrix::from_vec(3, poses.len(), data)
}
