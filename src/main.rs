//! CLI entry point for magnetic-daq.
//!
//! Drives the pipeline from a simulated 100 Hz three-axis sensor and logs the
//! dominant frequency of every spectrum packet it receives.
//!
//! # Usage
//!
//! ```bash
//! magnetic-daq run --duration 10s --window-size 512 --filter low-pass --low 12
//! magnetic-daq run --config config/magnetic-daq.toml --record
//! magnetic-daq check-config config/magnetic-daq.toml
//! ```

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use humantime_serde::re::humantime::parse_duration;
use magnetic_daq::{
    tracing_setup, Filter, FilterDesign, FilterSettings, Pipeline, SampleIngress, Settings,
    Vector3, WindowFunction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::f64::consts::PI;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "magnetic-daq")]
#[command(about = "Magnetometer buffering and live spectrum pipeline", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline against a simulated sensor
    Run {
        /// Optional settings file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// How long to run, e.g. "10s" or "2m"
        #[arg(long, default_value = "10s", value_parser = parse_duration)]
        duration: Duration,

        /// Samples per spectrum window
        #[arg(long)]
        window_size: Option<usize>,

        #[arg(long, value_enum)]
        filter: Option<FilterArg>,

        /// Low cutoff (Hz); the only cutoff for low/high-pass
        #[arg(long, default_value_t = 0.0)]
        low: f64,

        /// High cutoff (Hz) for band filters
        #[arg(long, default_value_t = 0.0)]
        high: f64,

        /// Use biquad IIR sections instead of the spectral filter
        #[arg(long)]
        biquad: bool,

        /// Apply a Hann window before the FFT
        #[arg(long)]
        hann: bool,

        /// Keep evicted samples in the recorded history
        #[arg(long)]
        record: bool,
    },

    /// Load and validate a settings file, then print the result
    CheckConfig {
        /// Settings file (TOML)
        path: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FilterArg {
    None,
    LowPass,
    HighPass,
    BandPass,
    BandStop,
}

impl From<FilterArg> for Filter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::None => Filter::None,
            FilterArg::LowPass => Filter::LowPass,
            FilterArg::HighPass => Filter::HighPass,
            FilterArg::BandPass => Filter::BandPass,
            FilterArg::BandStop => Filter::BandStop,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            duration,
            window_size,
            filter,
            low,
            high,
            biquad,
            hann,
            record,
        } => {
            let mut settings = match config {
                Some(path) => Settings::load_from(&path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => Settings::load()?,
            };
            tracing_setup::init_from_settings(&settings)?;

            let pipeline = &mut settings.pipeline;
            if let Some(size) = window_size {
                pipeline.window_size = size;
            }
            if let Some(kind) = filter {
                pipeline.filter = FilterSettings {
                    kind: kind.into(),
                    low_hz: low,
                    high_hz: high,
                };
            }
            if biquad {
                pipeline.filter_design = FilterDesign::Biquad;
            }
            if hann {
                pipeline.window_function = WindowFunction::Hann;
            }
            pipeline.recording |= record;
            pipeline.running = true;

            run(settings, duration).await
        }
        Commands::CheckConfig { path } => {
            let settings = Settings::load_from(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            println!("{settings:#?}");
            Ok(())
        }
    }
}

async fn run(settings: Settings, duration: Duration) -> Result<()> {
    let mut pipeline = Pipeline::from_settings(&settings)?;
    pipeline.start()?;
    info!(?duration, config = ?pipeline.control().snapshot(), "Running");

    let (stop_tx, stop_rx) = watch::channel(false);
    let sensor = tokio::spawn(simulate_sensor(pipeline.ingress(), stop_rx));

    let egress = pipeline.egress();
    let mut poll = tokio::time::interval(Duration::from_millis(250));
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            _ = tokio::signal::ctrl_c() => {
                warn!("Interrupted");
                break;
            }
            _ = poll.tick() => {
                while let Some(packet) = egress.try_take_packet() {
                    if let Some(peak) = packet.peak() {
                        info!(
                            axis = %packet.axis,
                            peak_hz = peak.frequency,
                            power_db = peak.power,
                            "Spectrum"
                        );
                    }
                }
                if let Some(latest) = pipeline.latest_sample() {
                    tracing::debug!(
                        x = latest.vector.x,
                        y = latest.vector.y,
                        z = latest.vector.z,
                        "Latest reading"
                    );
                }
            }
        }
    }

    let _ = stop_tx.send(true);
    sensor.await?;

    let stats = pipeline.stats();
    let recorded = pipeline.drain_recorded();
    pipeline.shutdown().await?;

    info!(
        live = stats.live_samples,
        retained = stats.retained_samples,
        total = stats.total_samples(),
        packets = stats.packets_emitted,
        cycles = stats.cycles,
        numeric_failures = stats.numeric_failures,
        recorded = recorded.len(),
        "Finished"
    );
    Ok(())
}

/// 100 Hz readings: a few fixed tones per axis plus a little noise.
async fn simulate_sensor(ingress: SampleIngress, mut stop: watch::Receiver<bool>) {
    let mut rng = StdRng::from_entropy();
    let mut tick = tokio::time::interval(Duration::from_millis(10));
    let mut n: u64 = 0;

    loop {
        tokio::select! {
            _ = stop.changed() => break,
            _ = tick.tick() => {
                let t = n as f64 / 100.0;
                let vector = Vector3::new(
                    20.0 + 2.0 * (2.0 * PI * 5.0 * t).sin() + rng.gen_range(-0.2..0.2),
                    -4.0 + 1.5 * (2.0 * PI * 12.5 * t).sin() + rng.gen_range(-0.2..0.2),
                    45.0 + 0.8 * (2.0 * PI * 30.0 * t).sin() + rng.gen_range(-0.2..0.2),
                );
                ingress.submit_sample(vector, Utc::now());
                n += 1;
            }
        }
    }
}
