//! Odometry-delta motion model for propagating a particle population
//!
//! The relative motion between two consecutive odometry readings is decomposed once per call into
//! an initial rotation, a straight-line translation, and a final rotation:
//!
//! $$
//! \begin{aligned}
//! \delta_{rot1} &= \operatorname{atan2}(\Delta y, \Delta x) - \theta_{prev} \\\\
//! \delta_{trans} &= \sqrt{\Delta x^2 + \Delta y^2} \\\\
//! \delta_{rot2} &= (\theta - \theta_{prev}) - \delta_{rot1}
//! \end{aligned}
//! $$
//!
//! Every particle then receives the same relative motion, composed onto its own map-frame heading:
//!
//! $$
//! \begin{aligned}
//! x' &= x + \delta_{trans} \cos(\theta_m + \delta_{rot1}) \\\\
//! y' &= y + \delta_{trans} \sin(\theta_m + \delta_{rot1}) \\\\
//! \theta' &= \theta_m + \delta_{rot1} + \delta_{rot2}
//! \end{aligned}
//! $$
//!
//! followed by independent process noise on all three components. Headings are not wrapped here.
use crate::validate;
use crate::{Pose, SpeedCommand};

use log::{trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Default process noise scale on each translation axis (m)
pub const DEFAULT_TRANSLATION_NOISE_STD: f64 = 0.1 * 0.4;
/// Default process noise scale on heading (rad)
pub const DEFAULT_HEADING_NOISE_STD: f64 = 0.1 * 0.05;

/// How per-axis process noise is drawn.
///
/// - `SignedMagnitude` → a fair random sign is drawn first, then a magnitude $|z|$ with
///   $z \sim N(0, 1)$; the sample is `sign * |z| * std`.
/// - `Gaussian` → a single draw `z * std`.
/// - `Disabled` → no noise; propagation is purely deterministic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum NoiseShape {
    #[default]
    SignedMagnitude,
    Gaussian,
    Disabled,
}

/// Per-axis process noise injected on every particle on every propagation step
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProcessNoise {
    #[serde(default)]
    pub shape: NoiseShape,
    /// Scale of the x-axis noise (m)
    pub x_std: f64,
    /// Scale of the y-axis noise (m)
    pub y_std: f64,
    /// Scale of the heading noise (rad)
    pub theta_std: f64,
}
impl Default for ProcessNoise {
    fn default() -> Self {
        ProcessNoise {
            shape: NoiseShape::SignedMagnitude,
            x_std: DEFAULT_TRANSLATION_NOISE_STD,
            y_std: DEFAULT_TRANSLATION_NOISE_STD,
            theta_std: DEFAULT_HEADING_NOISE_STD,
        }
    }
}
impl ProcessNoise {
    pub fn disabled() -> Self {
        ProcessNoise {
            shape: NoiseShape::Disabled,
            ..Default::default()
        }
    }
    /// Draw one noise offset `[dx, dy, dtheta]` for a single particle.
    ///
    /// Axes are drawn in x, y, theta order; under `SignedMagnitude` each axis draws its own sign.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Pose {
        match self.shape {
            NoiseShape::Disabled => Pose::default(),
            NoiseShape::SignedMagnitude => Pose::new(
                signed_magnitude(rng, self.x_std),
                signed_magnitude(rng, self.y_std),
                signed_magnitude(rng, self.theta_std),
            ),
            NoiseShape::Gaussian => Pose::new(
                gaussian(rng, self.x_std),
                gaussian(rng, self.y_std),
                gaussian(rng, self.theta_std),
            ),
        }
    }
}
fn signed_magnitude<R: Rng + ?Sized>(rng: &mut R, std: f64) -> f64 {
    let sign = if rng.random_bool(0.5) { 1.0 } else { -1.0 };
    let magnitude: f64 = StandardNormal.sample(rng);
    sign * magnitude.abs() * std
}
fn gaussian<R: Rng + ?Sized>(rng: &mut R, std: f64) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    z * std
}

/// Relative motion between two odometry readings, as rotate-translate-rotate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OdometryDelta {
    /// Rotation aligning the previous heading with the direction of travel (rad)
    pub rotation1: f64,
    /// Straight-line distance between the two odometry positions (m)
    pub translation: f64,
    /// Remaining heading change after `rotation1` (rad)
    pub rotation2: f64,
}
impl OdometryDelta {
    /// Decompose the transform from `odom_prev` to `odom`.
    ///
    /// When both positions coincide the direction of travel is taken as zero, so `rotation1`
    /// becomes `-odom_prev.theta` and `rotation2` absorbs it back.
    pub fn from_odometry(odom: &Pose, odom_prev: &Pose) -> OdometryDelta {
        let dx = odom.x - odom_prev.x;
        let dy = odom.y - odom_prev.y;
        let direction = if dx == 0.0 && dy == 0.0 {
            0.0
        } else {
            dy.atan2(dx)
        };
        let rotation1 = direction - odom_prev.theta;
        let translation = (dx * dx + dy * dy).sqrt();
        let rotation2 = (odom.theta - odom_prev.theta) - rotation1;
        OdometryDelta {
            rotation1,
            translation,
            rotation2,
        }
    }
    /// Net heading change applied to every particle
    pub fn heading_change(&self) -> f64 {
        self.rotation1 + self.rotation2
    }
}

/// Motion propagator: odometry-delta composition plus process noise
#[derive(Clone, Copy, Debug, Default)]
pub struct MotionModel {
    pub noise: ProcessNoise,
}
impl MotionModel {
    pub fn new(noise: ProcessNoise) -> Self {
        MotionModel { noise }
    }
    /// Deterministic part of the motion: compose `delta` onto a single particle's pose.
    pub fn apply(pose: &Pose, delta: &OdometryDelta) -> Pose {
        let travel_heading = pose.theta + delta.rotation1;
        Pose::new(
            pose.x + delta.translation * travel_heading.cos(),
            pose.y + delta.translation * travel_heading.sin(),
            pose.theta + delta.heading_change(),
        )
    }
    /// Advance every particle by the odometry motion and inject process noise.
    ///
    /// Returns a new population of the same length and order as `poses`. `command` and `dt` do not
    /// enter the displacement, which comes from the odometry delta alone.
    ///
    /// # Arguments
    /// * `poses` - Current particle population in the map frame.
    /// * `command` - Commanded speed at this step.
    /// * `odom` - Current odometry reading.
    /// * `odom_prev` - Previous odometry reading from the same source.
    /// * `dt` - Time step (s).
    /// * `rng` - Random source for the process noise.
    pub fn propagate<R: Rng + ?Sized>(
        &self,
        poses: &[Pose],
        command: SpeedCommand,
        odom: &Pose,
        odom_prev: &Pose,
        dt: f64,
        rng: &mut R,
    ) -> Vec<Pose> {
        let delta = decompose(command, odom, odom_prev, dt);
        poses
            .iter()
            .map(|pose| self.perturb(Self::apply(pose, &delta), rng))
            .collect()
    }
    /// Same as [`MotionModel::propagate`] but overwrites the population. Draws the same noise
    /// sequence as `propagate` for the same generator state.
    pub fn propagate_in_place<R: Rng + ?Sized>(
        &self,
        poses: &mut [Pose],
        command: SpeedCommand,
        odom: &Pose,
        odom_prev: &Pose,
        dt: f64,
        rng: &mut R,
    ) {
        let delta = decompose(command, odom, odom_prev, dt);
        for pose in poses.iter_mut() {
            let current = *pose;
            *pose = self.perturb(Self::apply(&current, &delta), rng);
        }
    }
    /// Data-parallel propagation.
    ///
    /// One base seed is drawn from `rng` and each particle gets its own `StdRng` seeded from the
    /// base seed and its index, so the output depends only on the generator state, never on
    /// thread scheduling. The noise stream differs from [`MotionModel::propagate`].
    pub fn propagate_par<R: Rng + ?Sized>(
        &self,
        poses: &[Pose],
        command: SpeedCommand,
        odom: &Pose,
        odom_prev: &Pose,
        dt: f64,
        rng: &mut R,
    ) -> Vec<Pose> {
        let delta = decompose(command, odom, odom_prev, dt);
        let base_seed: u64 = rng.random();
        poses
            .par_iter()
            .enumerate()
            .map(|(index, pose)| {
                let mut particle_rng = StdRng::seed_from_u64(base_seed.wrapping_add(index as u64));
                self.perturb(Self::apply(pose, &delta), &mut particle_rng)
            })
            .collect()
    }
    /// [`MotionModel::propagate`] with the inputs checked first.
    ///
    /// Fails on an empty population, any non-finite pose, or a non-positive time step.
    pub fn try_propagate<R: Rng + ?Sized>(
        &self,
        poses: &[Pose],
        command: SpeedCommand,
        odom: &Pose,
        odom_prev: &Pose,
        dt: f64,
        rng: &mut R,
    ) -> anyhow::Result<Vec<Pose>> {
        if let Err(err) = validate::check_propagation_inputs(poses, odom, odom_prev, dt) {
            warn!("Rejecting propagation step: {err}");
            return Err(err);
        }
        Ok(self.propagate(poses, command, odom, odom_prev, dt, rng))
    }
    fn perturb<R: Rng + ?Sized>(&self, pose: Pose, rng: &mut R) -> Pose {
        let noise = self.noise.sample(rng);
        Pose::new(pose.x + noise.x, pose.y + noise.y, pose.theta + noise.theta)
    }
}
fn decompose(command: SpeedCommand, odom: &Pose, odom_prev: &Pose, dt: f64) -> OdometryDelta {
    let delta = OdometryDelta::from_odometry(odom, odom_prev);
    trace!("Odometry delta {:?} ({}, dt = {:.3} s)", delta, command, dt);
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn noiseless() -> MotionModel {
        MotionModel::new(ProcessNoise::disabled())
    }

    #[test]
    fn decompose_straight_line() {
        let delta = OdometryDelta::from_odometry(&Pose::new(1.0, 0.0, 0.0), &Pose::default());
        assert_eq!(delta.rotation1, 0.0);
        assert_eq!(delta.translation, 1.0);
        assert_eq!(delta.rotation2, 0.0);
    }
    #[test]
    fn decompose_sideways_move_with_turn() {
        // Facing +x, slide to +y and end up facing +y
        let prev = Pose::new(0.0, 0.0, 0.0);
        let odom = Pose::new(0.0, 2.0, FRAC_PI_2);
        let delta = OdometryDelta::from_odometry(&odom, &prev);
        assert_approx_eq!(delta.rotation1, FRAC_PI_2, 1e-12);
        assert_approx_eq!(delta.translation, 2.0, 1e-12);
        assert_approx_eq!(delta.rotation2, 0.0, 1e-12);
        assert_approx_eq!(delta.heading_change(), FRAC_PI_2, 1e-12);
    }
    #[test]
    fn decompose_is_relative_to_previous_heading() {
        let prev = Pose::new(5.0, 5.0, FRAC_PI_2);
        let odom = Pose::new(5.0, 6.0, FRAC_PI_2);
        let delta = OdometryDelta::from_odometry(&odom, &prev);
        assert_approx_eq!(delta.rotation1, 0.0, 1e-12);
        assert_approx_eq!(delta.translation, 1.0, 1e-12);
        assert_approx_eq!(delta.rotation2, 0.0, 1e-12);
    }
    #[test]
    fn decompose_zero_displacement() {
        let prev = Pose::new(3.0, -1.0, 0.7);
        let delta = OdometryDelta::from_odometry(&prev, &prev);
        assert_eq!(delta.translation, 0.0);
        assert_eq!(delta.rotation1, -0.7);
        assert_eq!(delta.rotation2, 0.7);
        assert_eq!(delta.heading_change(), 0.0);
    }
    #[test]
    fn decompose_rotation_in_place() {
        let prev = Pose::new(1.0, 1.0, 0.0);
        let odom = Pose::new(1.0, 1.0, 0.3);
        let delta = OdometryDelta::from_odometry(&odom, &prev);
        assert_eq!(delta.translation, 0.0);
        assert_approx_eq!(delta.heading_change(), 0.3, 1e-15);
    }
    #[test]
    fn apply_moves_along_particle_heading() {
        let delta = OdometryDelta {
            rotation1: 0.0,
            translation: 1.0,
            rotation2: 0.0,
        };
        let moved = MotionModel::apply(&Pose::new(0.0, 0.0, FRAC_PI_2), &delta);
        assert_approx_eq!(moved.x, 0.0, 1e-12);
        assert_approx_eq!(moved.y, 1.0, 1e-12);
        assert_approx_eq!(moved.theta, FRAC_PI_2, 1e-12);
    }
    #[test]
    fn headings_are_not_wrapped() {
        let prev = Pose::new(0.0, 0.0, 0.0);
        let odom = Pose::new(0.0, 0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        let out = noiseless().propagate(
            &[Pose::new(0.0, 0.0, PI)],
            SpeedCommand::default(),
            &odom,
            &prev,
            0.1,
            &mut rng,
        );
        assert_approx_eq!(out[0].theta, PI + 1.0, 1e-12);
    }
    #[test]
    fn disabled_noise_is_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(ProcessNoise::disabled().sample(&mut rng), Pose::default());
    }
    #[test]
    fn signed_magnitude_noise_statistics() {
        let noise = ProcessNoise::default();
        let mut rng = StdRng::seed_from_u64(42);
        let n = 20_000;
        let samples: Vec<Pose> = (0..n).map(|_| noise.sample(&mut rng)).collect();
        let mean_x = samples.iter().map(|s| s.x).sum::<f64>() / n as f64;
        let mean_theta = samples.iter().map(|s| s.theta).sum::<f64>() / n as f64;
        let std_x = (samples.iter().map(|s| s.x * s.x).sum::<f64>() / n as f64).sqrt();
        let std_theta = (samples.iter().map(|s| s.theta * s.theta).sum::<f64>() / n as f64).sqrt();
        let positive = samples.iter().filter(|s| s.y > 0.0).count() as f64 / n as f64;
        assert_approx_eq!(mean_x, 0.0, 2e-3);
        assert_approx_eq!(mean_theta, 0.0, 2e-4);
        assert_approx_eq!(std_x, DEFAULT_TRANSLATION_NOISE_STD, 2e-3);
        assert_approx_eq!(std_theta, DEFAULT_HEADING_NOISE_STD, 3e-4);
        assert_approx_eq!(positive, 0.5, 0.02);
        assert!(samples.iter().all(|s| s.x.abs() < 10.0 * DEFAULT_TRANSLATION_NOISE_STD));
    }
    #[test]
    fn gaussian_noise_statistics() {
        let noise = ProcessNoise {
            shape: NoiseShape::Gaussian,
            x_std: 0.5,
            y_std: 0.5,
            theta_std: 0.1,
        };
        let mut rng = StdRng::seed_from_u64(3);
        let n = 20_000;
        let samples: Vec<Pose> = (0..n).map(|_| noise.sample(&mut rng)).collect();
        let std_y = (samples.iter().map(|s| s.y * s.y).sum::<f64>() / n as f64).sqrt();
        assert_approx_eq!(std_y, 0.5, 0.02);
    }
    #[test]
    fn noise_keeps_stationary_particles_diverse() {
        let model = MotionModel::default();
        let odom = Pose::new(2.0, 2.0, 0.0);
        let poses = vec![Pose::default(); 16];
        let mut rng = StdRng::seed_from_u64(11);
        let out = model.propagate(&poses, SpeedCommand::default(), &odom, &odom, 0.1, &mut rng);
        assert_eq!(out.len(), poses.len());
        assert!(out.iter().all(|p| *p != Pose::default()));
        assert!(out.windows(2).any(|pair| pair[0] != pair[1]));
    }
    #[test]
    fn in_place_matches_fresh_output() {
        let model = MotionModel::default();
        let prev = Pose::new(0.0, 0.0, 0.2);
        let odom = Pose::new(0.3, 0.1, 0.25);
        let poses: Vec<Pose> = (0..8).map(|i| Pose::new(i as f64, -(i as f64), 0.1 * i as f64)).collect();
        let fresh = model.propagate(
            &poses,
            SpeedCommand::new(0.3, 0.05),
            &odom,
            &prev,
            1.0,
            &mut StdRng::seed_from_u64(5),
        );
        let mut in_place = poses.clone();
        model.propagate_in_place(
            &mut in_place,
            SpeedCommand::new(0.3, 0.05),
            &odom,
            &prev,
            1.0,
            &mut StdRng::seed_from_u64(5),
        );
        assert_eq!(fresh, in_place);
    }
    #[test]
    fn parallel_is_reproducible_and_noiseless_parallel_matches_sequential() {
        let prev = Pose::new(1.0, 1.0, 0.0);
        let odom = Pose::new(1.5, 1.2, 0.1);
        let poses: Vec<Pose> = (0..100).map(|i| Pose::new(0.0, 0.0, 0.05 * i as f64)).collect();
        let model = MotionModel::default();
        let a = model.propagate_par(&poses, SpeedCommand::default(), &odom, &prev, 0.1, &mut StdRng::seed_from_u64(9));
        let b = model.propagate_par(&poses, SpeedCommand::default(), &odom, &prev, 0.1, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);

        let exact = noiseless();
        let mut rng = StdRng::seed_from_u64(0);
        let sequential = exact.propagate(&poses, SpeedCommand::default(), &odom, &prev, 0.1, &mut rng);
        let parallel = exact.propagate_par(&poses, SpeedCommand::default(), &odom, &prev, 0.1, &mut rng);
        assert_eq!(sequential, parallel);
    }
    #[test]
    fn try_propagate_rejects_bad_inputs() {
        let model = MotionModel::default();
        let mut rng = StdRng::seed_from_u64(0);
        let odom = Pose::default();
        assert!(model.try_propagate(&[], SpeedCommand::default(), &odom, &odom, 0.1, &mut rng).is_err());
        assert!(model.try_propagate(&[odom], SpeedCommand::default(), &odom, &odom, 0.0, &mut rng).is_err());
        let bad = Pose::new(f64::NAN, 0.0, 0.0);
        assert!(model.try_propagate(&[odom], SpeedCommand::default(), &bad, &odom, 0.1, &mut rng).is_err());
        let out = model.try_propagate(&[odom, odom], SpeedCommand::default(), &odom, &odom, 0.1, &mut rng);
        assert_eq!(out.unwrap().len(), 2);
    }
}
