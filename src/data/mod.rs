//! Sample containers and signal processing building blocks.
pub mod fft;
pub mod filter;
pub mod iir_filter;
pub mod output_queue;
pub mod retention;
pub mod sample_stream;

/// Sample rate assumed for all filter and frequency-bin math, in Hz.
pub const SAMPLE_RATE_HZ: f64 = 100.0;

/// Highest representable frequency at [`SAMPLE_RATE_HZ`].
pub const NYQUIST_HZ: f64 = SAMPLE_RATE_HZ / 2.0;
