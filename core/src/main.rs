//! BEACONLOC CLI: exercise the localization motion and sensor models from the command line.
//!
//! - `create-config` writes a default model configuration (TOML/JSON/YAML by extension).
//! - `step` builds a synthetic particle cloud, runs one propagation and one beacon scoring
//!   pass exactly as a filter loop would, and logs a summary of the result.

mod common;

use clap::{Args, Parser, Subcommand};
use common::{ensure_parent_dir, init_logger, validate_config_path};
use log::{debug, info};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use std::error::Error;
use std::path::PathBuf;

use beaconloc::{ModelConfig, NoiseShape, Pose, SpeedCommand, population_to_matrix};

const LONG_ABOUT: &str = "BEACONLOC CLI: a tool for exercising the odometry motion model and the beacon \
sensor model used in Monte Carlo localization.

The `step` command mimics one iteration of a particle filter: it draws a particle cloud around a
starting pose, propagates it with an odometry reading pair, and weights it against a single beacon
observation. Weight normalization and the effective sample size are reported for inspection only;
no resampling is performed.

Noise parameters and the RNG seed can be loaded from a configuration file (TOML/JSON/YAML), which
`create-config` will generate with default values.";

/// Command line arguments
#[derive(Parser)]
#[command(author, version, about = "Odometry motion and beacon sensor models for Monte Carlo localization.", long_about = LONG_ABOUT)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Log file path (if not specified, logs to stderr)
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand, Clone)]
enum Command {
    #[command(
        name = "create-config",
        about = "Write a default model configuration file"
    )]
    CreateConfig(CreateConfigArgs),
    #[command(
        name = "step",
        about = "Run one propagation and scoring pass on a synthetic particle cloud"
    )]
    Step(StepArgs),
}

/// Arguments for create-config command
#[derive(Args, Clone, Debug)]
struct CreateConfigArgs {
    /// Output file path for the config file
    /// File extension determines format: .json, .yaml/.yml, or .toml (recommended)
    #[arg(short, long, value_parser)]
    output: PathBuf,
}

#[derive(Args, Clone, Debug)]
struct StepArgs {
    /// Model configuration file (TOML/JSON/YAML); defaults are used if omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// RNG seed, overrides the seed in the configuration
    #[arg(long)]
    seed: Option<u64>,

    /// Number of particles
    #[arg(short = 'm', long, default_value_t = 500)]
    particles: usize,

    /// Use the data-parallel model variants
    #[arg(long)]
    parallel: bool,

    /// Process noise shape, overrides the shape in the configuration
    #[arg(long, value_enum)]
    noise_shape: Option<NoiseShape>,

    #[command(flatten)]
    cloud: CloudArgs,

    #[command(flatten)]
    motion: MotionArgs,

    #[command(flatten)]
    beacon: BeaconArgs,
}

#[derive(Args, Clone, Debug)]
struct CloudArgs {
    /// Centre of the initial particle cloud in the map frame
    #[arg(long, num_args = 3, value_names = ["X", "Y", "THETA"], allow_negative_numbers = true, default_values_t = [0.0, 0.0, 0.0])]
    start: Vec<f64>,

    /// Standard deviation of the initial cloud position (m)
    #[arg(long, default_value_t = 0.25)]
    spread: f64,

    /// Standard deviation of the initial cloud heading (rad)
    #[arg(long, default_value_t = 0.1)]
    heading_spread: f64,
}

#[derive(Args, Clone, Debug)]
struct MotionArgs {
    /// Previous odometry reading
    #[arg(long, num_args = 3, value_names = ["X", "Y", "THETA"], allow_negative_numbers = true, default_values_t = [0.0, 0.0, 0.0])]
    odom_prev: Vec<f64>,

    /// Current odometry reading
    #[arg(long, num_args = 3, value_names = ["X", "Y", "THETA"], allow_negative_numbers = true, default_values_t = [0.1, 0.0, 0.0])]
    odom: Vec<f64>,

    /// Commanded forward speed (m/s)
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    speed: f64,

    /// Commanded turn rate (rad/s)
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    turn_rate: f64,

    /// Time step (s)
    #[arg(long, default_value_t = 0.1)]
    dt: f64,
}

#[derive(Args, Clone, Debug)]
struct BeaconArgs {
    /// Beacon position as detected in the robot's sensor frame
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true, default_values_t = [2.0, 0.0])]
    beacon_observed: Vec<f64>,

    /// Known beacon position in the map frame
    #[arg(long, num_args = 2, value_names = ["X", "Y"], allow_negative_numbers = true, default_values_t = [2.1, 0.0])]
    beacon_map: Vec<f64>,
}

fn pose_from_args(values: &[f64]) -> Pose {
    Pose::new(
        values.first().copied().unwrap_or_default(),
        values.get(1).copied().unwrap_or_default(),
        values.get(2).copied().unwrap_or_default(),
    )
}

fn sample_cloud(
    cloud: &CloudArgs,
    count: usize,
    rng: &mut StdRng,
) -> Result<Vec<Pose>, Box<dyn Error>> {
    let centre = pose_from_args(&cloud.start);
    let position_noise = Normal::new(0.0, cloud.spread)?;
    let heading_noise = Normal::new(0.0, cloud.heading_spread)?;
    Ok((0..count)
        .map(|_| {
            Pose::new(
                centre.x + position_noise.sample(rng),
                centre.y + position_noise.sample(rng),
                centre.theta + heading_noise.sample(rng),
            )
        })
        .collect())
}

/// Normalized weights, falling back to uniform when every weight underflowed.
fn normalize(weights: &[f64]) -> DVector<f64> {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 && sum.is_finite() {
        DVector::from_iterator(weights.len(), weights.iter().map(|w| w / sum))
    } else {
        DVector::from_element(weights.len(), 1.0 / weights.len() as f64)
    }
}

fn weighted_mean(poses: &[Pose], weights: &DVector<f64>) -> Pose {
    let states = population_to_matrix(poses);
    let position = states.rows(0, 2) * weights;
    let sin: f64 = poses.iter().zip(weights.iter()).map(|(p, w)| w * p.theta.sin()).sum();
    let cos: f64 = poses.iter().zip(weights.iter()).map(|(p, w)| w * p.theta.cos()).sum();
    Pose::new(position[0], position[1], sin.atan2(cos))
}

fn run_step(args: &StepArgs) -> Result<(), Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            validate_config_path(path)?;
            info!("Loading configuration from {}", path.display());
            ModelConfig::from_file(path)?
        }
        None => ModelConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(shape) = args.noise_shape {
        config.motion.shape = shape;
    }
    debug!("Configuration: {:?}", config);

    let motion = config.motion_model();
    let sensor = config.sensor_model();
    let mut rng = config.rng();

    let particles = sample_cloud(&args.cloud, args.particles, &mut rng)?;
    let odom_prev = pose_from_args(&args.motion.odom_prev);
    let odom = pose_from_args(&args.motion.odom);
    let command = SpeedCommand::new(args.motion.speed, args.motion.turn_rate);
    let beacon_observed = pose_from_args(&args.beacon.beacon_observed);
    let beacon_map = pose_from_args(&args.beacon.beacon_map);

    info!(
        "Stepping {} particles (seed {}, parallel: {})",
        particles.len(),
        config.seed,
        args.parallel
    );
    let (propagated, weights) = if args.parallel {
        beaconloc::validate::check_propagation_inputs(&particles, &odom, &odom_prev, args.motion.dt)?;
        beaconloc::validate::check_scoring_inputs(&particles, &beacon_observed, &beacon_map)?;
        let propagated = motion.propagate_par(
            &particles,
            command,
            &odom,
            &odom_prev,
            args.motion.dt,
            &mut rng,
        );
        let weights = sensor.score_par(&propagated, &beacon_observed, &beacon_map);
        (propagated, weights)
    } else {
        let propagated = motion.try_propagate(
            &particles,
            command,
            &odom,
            &odom_prev,
            args.motion.dt,
            &mut rng,
        )?;
        let weights = sensor.try_score(&propagated, &beacon_observed, &beacon_map)?;
        (propagated, weights)
    };

    let prior_mean = weighted_mean(&particles, &normalize(&vec![1.0; particles.len()]));
    let normalized = normalize(&weights);
    let posterior_mean = weighted_mean(&propagated, &normalized);
    let effective_particles = 1.0 / normalized.iter().map(|w| w * w).sum::<f64>();
    let max_weight = weights.iter().cloned().fold(0.0, f64::max);

    info!("Prior mean: {}", prior_mean);
    info!("Weighted mean after step: {}", posterior_mean);
    info!(
        "Max weight {:.4e} (peak possible {:.4e})",
        max_weight,
        sensor.peak_weight()
    );
    info!(
        "Effective sample size: {:.1} of {}",
        effective_particles,
        propagated.len()
    );
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logger(&cli.log_level, cli.log_file.as_ref())?;

    match cli.command {
        Command::CreateConfig(args) => {
            ensure_parent_dir(&args.output)?;
            ModelConfig::default().to_file(&args.output)?;
            info!("Configuration written to {}", args.output.display());
        }
        Command::Step(args) => run_step(&args)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn step_args_parse_negative_poses() {
        let cli = Cli::try_parse_from([
            "beaconloc-cli",
            "step",
            "--start",
            "-1.0",
            "2.0",
            "-0.5",
            "--beacon-map",
            "-3",
            "4",
            "--seed",
            "9",
        ])
        .unwrap();
        let Command::Step(args) = cli.command else {
            panic!("expected step command");
        };
        assert_eq!(pose_from_args(&args.cloud.start), Pose::new(-1.0, 2.0, -0.5));
        assert_eq!(pose_from_args(&args.beacon.beacon_map), Pose::new(-3.0, 4.0, 0.0));
        assert_eq!(args.seed, Some(9));
        assert_eq!(args.particles, 500);
        assert_eq!(args.noise_shape, None);
    }

    #[test]
    fn step_args_select_noise_shape() {
        for (name, shape) in [
            ("signed-magnitude", NoiseShape::SignedMagnitude),
            ("gaussian", NoiseShape::Gaussian),
            ("disabled", NoiseShape::Disabled),
        ] {
            let cli = Cli::try_parse_from(["beaconloc-cli", "step", "--noise-shape", name]).unwrap();
            let Command::Step(args) = cli.command else {
                panic!("expected step command");
            };
            assert_eq!(args.noise_shape, Some(shape));
        }
        assert!(Cli::try_parse_from(["beaconloc-cli", "step", "--noise-shape", "uniform"]).is_err());
    }

    #[test]
    fn step_runs_with_noise_disabled() {
        let cli = Cli::try_parse_from(["beaconloc-cli", "step", "-m", "20", "--noise-shape", "disabled"])
            .unwrap();
        let Command::Step(args) = cli.command else {
            panic!("expected step command");
        };
        assert!(run_step(&args).is_ok());
    }

    #[test]
    fn normalize_falls_back_to_uniform() {
        let weights = normalize(&[0.0, 0.0, 0.0, 0.0]);
        assert!(weights.iter().all(|w| *w == 0.25));
        let weights = normalize(&[1.0, 3.0]);
        assert_approx_eq!(weights[0], 0.25, 1e-15);
        assert_approx_eq!(weights[1], 0.75, 1e-15);
    }

    #[test]
    fn weighted_mean_wraps_headings() {
        let poses = [Pose::new(0.0, 0.0, 3.1), Pose::new(2.0, 4.0, -3.1)];
        let mean = weighted_mean(&poses, &normalize(&[1.0, 1.0]));
        assert_approx_eq!(mean.x, 1.0, 1e-12);
        assert_approx_eq!(mean.y, 2.0, 1e-12);
        assert_approx_eq!(mean.theta.abs(), std::f64::consts::PI, 1e-9);
    }
}
