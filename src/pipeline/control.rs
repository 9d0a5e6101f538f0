//! Shared, mutex-guarded pipeline configuration.
//!
//! Both background workers read the configuration at each decision point and
//! the control surface writes it. Every access takes the lock for a single
//! copy in or out, so the critical section is O(1) and never spans a sleep.
//! Workers that need several fields for one decision take a
//! [`snapshot`](PipelineControl::snapshot) instead of reading fields one by one.

use crate::data::fft::WindowFunction;
use crate::data::filter::{FilterDesign, FilterSettings};
use crate::error::{AppResult, DaqError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Window sizes offered to users; the pipeline itself accepts any size >= 1.
pub const SUPPORTED_WINDOW_SIZES: [usize; 5] = [128, 256, 512, 1024, 2048];

/// Default number of samples per spectrum window and live-buffer threshold.
pub const DEFAULT_WINDOW_SIZE: usize = 256;

/// Runtime configuration shared by the control surface and both workers.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Samples per spectrum window, and the live-buffer eviction threshold.
    pub window_size: usize,
    /// Active filter, applied atomically as one value.
    pub filter: FilterSettings,
    pub filter_design: FilterDesign,
    pub window_function: WindowFunction,
    /// Whether the spectrum worker computes packets.
    pub running: bool,
    /// Whether evicted samples go to the recorded history.
    pub recording: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            filter: FilterSettings::none(),
            filter_design: FilterDesign::default(),
            window_function: WindowFunction::default(),
            running: false,
            recording: false,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> AppResult<()> {
        validate_window_size(self.window_size)?;
        self.filter.validate()
    }
}

fn validate_window_size(window_size: usize) -> AppResult<()> {
    if window_size == 0 {
        return Err(DaqError::InvalidWindowSize(window_size));
    }
    Ok(())
}

/// Mutex-guarded [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineControl {
    config: Mutex<PipelineConfig>,
}

impl PipelineControl {
    /// Validates `initial` and wraps it.
    pub fn new(initial: PipelineConfig) -> AppResult<Self> {
        initial.validate()?;
        Ok(Self {
            config: Mutex::new(initial),
        })
    }

    /// A consistent copy of every field.
    pub fn snapshot(&self) -> PipelineConfig {
        *self.config.lock()
    }

    pub fn window_size(&self) -> usize {
        self.config.lock().window_size
    }

    pub fn filter(&self) -> FilterSettings {
        self.config.lock().filter
    }

    pub fn filter_design(&self) -> FilterDesign {
        self.config.lock().filter_design
    }

    pub fn window_function(&self) -> WindowFunction {
        self.config.lock().window_function
    }

    pub fn running(&self) -> bool {
        self.config.lock().running
    }

    pub fn recording(&self) -> bool {
        self.config.lock().recording
    }

    /// Sets the window size. Zero is rejected and leaves the config untouched.
    pub fn set_window_size(&self, window_size: usize) -> AppResult<()> {
        validate_window_size(window_size)?;
        self.config.lock().window_size = window_size;
        debug!(window_size, "Window size updated");
        Ok(())
    }

    /// Replaces the filter kind and both cutoffs in one step.
    pub fn set_filter(&self, filter: FilterSettings) -> AppResult<()> {
        filter.validate()?;
        self.config.lock().filter = filter;
        debug!(
            kind = ?filter.kind,
            low_hz = filter.low_hz,
            high_hz = filter.high_hz,
            "Filter updated"
        );
        Ok(())
    }

    pub fn set_filter_design(&self, design: FilterDesign) {
        self.config.lock().filter_design = design;
        debug!(?design, "Filter design updated");
    }

    pub fn set_window_function(&self, window: WindowFunction) {
        self.config.lock().window_function = window;
        debug!(?window, "Window function updated");
    }

    pub fn set_running(&self, running: bool) {
        self.config.lock().running = running;
        debug!(running, "Spectrum computation toggled");
    }

    pub fn set_recording(&self, recording: bool) {
        self.config.lock().recording = recording;
        debug!(recording, "Recording toggled");
    }
}

impl Default for PipelineControl {
    fn default() -> Self {
        Self {
            config: Mutex::new(PipelineConfig::default()),
        }
    }
}
