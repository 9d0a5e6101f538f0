//! Settings loaded with Figment.
//!
//! Sources, later ones winning:
//! 1. built-in defaults (every field has one, so an empty file is valid)
//! 2. an optional TOML file
//! 3. environment variables prefixed with `MAGNETIC_DAQ_`, nested keys split on `__`
//!
//! # Example Configuration (`.toml`)
//!
//! ```toml
//! [pipeline]
//! window_size = 512
//! recording = true
//!
//! [pipeline.filter]
//! kind = "LowPass"
//! low_hz = 10.0
//!
//! [workers]
//! cleanup_interval = "100ms"
//! backpressure_interval = "200ms"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```
//!
//! `MAGNETIC_DAQ_PIPELINE__WINDOW_SIZE=1024` overrides the window size above.

use crate::error::{AppResult, DaqError};
use crate::pipeline::control::PipelineConfig;
use crate::tracing_setup::{parse_log_level, OutputFormat};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "MAGNETIC_DAQ_";

/// Packets produced by one spectrum cycle (one per axis).
const PACKETS_PER_CYCLE: usize = 3;

/// Everything loaded at start-up.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Initial pipeline configuration.
    pub pipeline: PipelineConfig,
    pub workers: WorkerSettings,
    pub logging: LoggingSettings,
}

/// Polling cadence of the background workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    /// Sleep between eviction passes.
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
    /// Sleep while not running, or after a cycle that emitted nothing.
    #[serde(with = "humantime_serde")]
    pub idle_interval: Duration,
    /// Sleep while the output queue has no room for a full cycle.
    #[serde(with = "humantime_serde")]
    pub backpressure_interval: Duration,
    /// Upper bound on pending packets. Must fit at least one cycle.
    pub output_queue_limit: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_millis(100),
            idle_interval: Duration::from_millis(100),
            backpressure_interval: Duration::from_millis(200),
            output_queue_limit: PACKETS_PER_CYCLE,
        }
    }
}

impl WorkerSettings {
    pub fn validate(&self) -> AppResult<()> {
        for (name, value) in [
            ("cleanup_interval", self.cleanup_interval),
            ("idle_interval", self.idle_interval),
            ("backpressure_interval", self.backpressure_interval),
        ] {
            if value.is_zero() {
                return Err(DaqError::Configuration(format!(
                    "workers.{name} must be greater than zero"
                )));
            }
        }
        if self.output_queue_limit < PACKETS_PER_CYCLE {
            return Err(DaqError::Configuration(format!(
                "workers.output_queue_limit {} cannot hold one cycle ({PACKETS_PER_CYCLE} packets)",
                self.output_queue_limit
            )));
        }
        Ok(())
    }
}

/// Log level and output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// trace, debug, info, warn or error. `RUST_LOG` takes precedence.
    pub level: String,
    pub format: OutputFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: OutputFormat::Pretty,
        }
    }
}

impl Settings {
    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    /// Defaults plus environment overrides.
    pub fn load() -> AppResult<Self> {
        let settings: Settings = Self::figment()
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Defaults, then `path`, then environment overrides.
    ///
    /// A missing file is an error here; use [`load`](Self::load) to run
    /// without one.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(DaqError::Configuration(format!(
                "config file not found: {}",
                path.display()
            )));
        }

        let settings: Settings = Self::figment()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Parses settings from TOML text without consulting the environment.
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        let settings: Settings = Self::figment().merge(Toml::string(toml)).extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> AppResult<()> {
        self.pipeline.validate()?;
        self.workers.validate()?;
        parse_log_level(&self.logging.level)?;
        Ok(())
    }
}
