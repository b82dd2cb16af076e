//! Logging initialization and utilities

use std::fs::File;
use std::path::PathBuf;

/// Logging options used by the command-line front-end
#[derive(Clone, Debug)]
pub struct LogSettings {
    /// Default filter when `RUST_LOG` is unset (e.g. "info", "debug")
    pub level: String,
    /// Write log output to this file instead of stderr
    pub log_file: Option<PathBuf>,
    /// Prefix records with millisecond timestamps
    pub timestamps: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
            timestamps: true,
        }
    }
}

impl LogSettings {
    /// Settings derived from the usual verbose/quiet flag pair
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        let level = if verbose {
            "debug"
        } else if quiet {
            "warn"
        } else {
            "info"
        };
        Self {
            level: level.to_string(),
            ..Default::default()
        }
    }
}

/// Initialize the logging system
///
/// Uses env_logger with default filter level of `info`.
/// Override with RUST_LOG environment variable.
///
/// # Example
/// ```
/// plylod::core::logging::init();
/// log::info!("Pipeline started");
/// ```
pub fn init() {
    // A logger may already be installed (tests, embedding applications)
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    ).try_init();
}

/// Initialize logging from explicit settings
///
/// Returns an error only if the log file cannot be created. Calling this
/// after a logger is already installed is a no-op.
pub fn init_with(settings: &LogSettings) -> std::io::Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.level.as_str()),
    );

    if settings.timestamps {
        builder.format_timestamp_millis();
    } else {
        builder.format_timestamp(None);
    }

    if let Some(path) = &settings.log_file {
        let file = File::create(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    let _ = builder.try_init();
    Ok(())
}
