//! # Magnetic DAQ Core Library
//!
//! Buffers a 100 Hz stream of 3-axis magnetometer readings and turns the most
//! recent window into per-axis power spectra, with optional filtering and an
//! optional recorded history of evicted samples.
//!
//! ## Crate Structure
//!
//! - **`core`**: the data model: `Vector3`, `Sample`, `Axis`, `SpectrumPacket`.
//! - **`data`**: containers (live stream, recorded history, output queue) and
//!   the numeric building blocks (FFT power spectrum, spectral and biquad filters).
//! - **`pipeline`**: the shared configuration, the cleanup and spectrum workers,
//!   and the `Pipeline` object that owns them.
//! - **`config`**: `Settings` loaded from TOML and environment variables.
//! - **`error`**: the `DaqError` enum used across the crate.
//! - **`tracing_setup`**: subscriber initialisation for binaries and tests.
//!
//! Producers call [`Pipeline::submit_sample`]; consumers poll
//! [`Pipeline::try_take_packet`]. Neither side ever blocks on the workers.

pub mod config;
pub mod core;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod tracing_setup;

pub use crate::config::{Settings, WorkerSettings};
pub use crate::core::{Axis, PipelineStats, Sample, SpectrumBin, SpectrumPacket, Vector3};
pub use crate::data::fft::WindowFunction;
pub use crate::data::filter::{Filter, FilterDesign, FilterSettings};
pub use crate::error::{AppResult, DaqError};
pub use crate::pipeline::control::{PipelineConfig, PipelineControl, SUPPORTED_WINDOW_SIZES};
pub use crate::pipeline::{PacketEgress, Pipeline, SampleIngress};
