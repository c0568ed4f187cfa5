//! Common utility functions for the command-line tool.
//!
//! - Logger initialization
//! - Path validation for config files

use beaconloc::ConfigFormat;
use std::error::Error;
use std::path::{Path, PathBuf};

/// Install the process-wide logger.
///
/// `log_level` sets the baseline filter (off, error, warn, info, debug, trace); directives in
/// `RUST_LOG` are applied on top of it, so `RUST_LOG=beaconloc::sensor=trace` narrows tracing to the
/// scorer. Records go to stderr unless `log_file` is given, in which case they are appended there.
///
/// # Errors
/// Returns an error for an unknown level, an unopenable log file, or a second initialization.
pub fn init_logger(log_level: &str, log_file: Option<&PathBuf>) -> Result<(), Box<dyn Error>> {
    use std::io::Write;

    let level: log::LevelFilter = log_level
        .parse()
        .map_err(|_| format!("Unknown log level '{log_level}'"))?;

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}: {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                record.level(),
                record.target(),
                record.args()
            )
        });

    if let Some(log_path) = log_file {
        ensure_parent_dir(log_path)?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

/// Validate that a config file exists and has a supported extension.
///
/// # Errors
/// Returns an error if the path does not exist, is not a file, or is not `.json`, `.yaml`,
/// `.yml`, or `.toml`.
pub fn validate_config_path(path: &Path) -> Result<(), Box<dyn Error>> {
    if !path.is_file() {
        return Err(format!("Config file '{}' does not exist.", path.display()).into());
    }
    if !has_config_extension(path) {
        return Err(format!(
            "Config file '{}' must be .json, .yaml, .yml, or .toml.",
            path.display()
        )
        .into());
    }
    Ok(())
}

/// Create the parent directory of `path` if it is missing.
pub fn ensure_parent_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn has_config_extension(path: &Path) -> bool {
    ConfigFormat::from_path(path).is_ok()
}
