//! Power spectrum of a windowed signal using `rustfft`.
//!
//! The spectrum is one-sided: a window of `N` samples yields `N / 2 + 1` bins
//! covering DC to Nyquist. Magnitudes are scaled so a unit-amplitude sinusoid
//! centred on a bin reads 0 dB:
//!
//! - bin 0: `|X[0]| / N`
//! - bin k > 0: `2 |X[k]| / N`
//!
//! Power is `20 log10(magnitude)`, raised to [`POWER_FLOOR_DB`] where it would
//! fall below it. Empty bins (`log10(0)`) therefore read exactly the floor.
//!
//! # Example
//!
//! ```
//! use magnetic_daq::data::fft::{SpectrumAnalyzer, WindowFunction};
//!
//! let mut analyzer = SpectrumAnalyzer::new(100.0);
//! let signal: Vec<f64> = (0..256)
//!     .map(|i| (2.0 * std::f64::consts::PI * 12.5 * i as f64 / 100.0).sin())
//!     .collect();
//! let spectrum = analyzer.power_spectrum(&signal, WindowFunction::Rectangular);
//! assert_eq!(spectrum.len(), 129);
//! ```

use num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

/// Lowest power reported for any bin, in dB.
pub const POWER_FLOOR_DB: f64 = -380.0;

/// Taper applied to the window before transforming.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowFunction {
    /// No taper.
    #[default]
    Rectangular,
    /// Hann taper, trades resolution for lower leakage.
    Hann,
}

/// Power values and their bin frequencies, aligned index for index.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PowerSpectrum {
    pub power: Vec<f64>,
    pub frequency: Vec<f64>,
}

impl PowerSpectrum {
    pub fn len(&self) -> usize {
        self.power.len()
    }

    pub fn is_empty(&self) -> bool {
        self.power.is_empty()
    }
}

/// Computes power spectra, reusing FFT plans across calls.
pub struct SpectrumAnalyzer {
    planner: FftPlanner<f64>,
    sample_rate_hz: f64,
    hann_window: Vec<f64>,
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate_hz: f64) -> Self {
        Self {
            planner: FftPlanner::new(),
            sample_rate_hz,
            hann_window: Vec::new(),
        }
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// The shared planner, so filters can reuse cached plans.
    pub fn planner_mut(&mut self) -> &mut FftPlanner<f64> {
        &mut self.planner
    }

    /// One-sided power spectrum of `signal` in dB.
    ///
    /// Non-finite input propagates into the output as NaN; callers are
    /// expected to reject it.
    pub fn power_spectrum(&mut self, signal: &[f64], window: WindowFunction) -> PowerSpectrum {
        let n = signal.len();
        if n == 0 {
            return PowerSpectrum::default();
        }

        let mut buffer: Vec<Complex<f64>> = match window {
            WindowFunction::Rectangular => {
                signal.iter().map(|&v| Complex::new(v, 0.0)).collect()
            }
            WindowFunction::Hann => {
                let taper = self.hann(n);
                signal
                    .iter()
                    .zip(taper.iter())
                    .map(|(&v, &w)| Complex::new(v * w, 0.0))
                    .collect()
            }
        };

        self.planner.plan_fft_forward(n).process(&mut buffer);

        let num_bins = n / 2 + 1;
        let power = buffer[..num_bins]
            .iter()
            .enumerate()
            .map(|(k, value)| {
                let scale = if k == 0 { 1.0 } else { 2.0 };
                let magnitude = value.norm() * scale / n as f64;
                clamp_power(20.0 * magnitude.log10())
            })
            .collect();

        PowerSpectrum {
            power,
            frequency: bin_frequencies(n, self.sample_rate_hz),
        }
    }

    fn hann(&mut self, n: usize) -> &[f64] {
        if self.hann_window.len() != n {
            self.hann_window = if n > 1 {
                (0..n)
                    .map(|i| {
                        0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos())
                    })
                    .collect()
            } else {
                vec![1.0; n]
            };
        }
        &self.hann_window
    }
}

/// Centre frequencies of the `n / 2 + 1` one-sided bins of an `n`-point FFT.
pub fn bin_frequencies(n: usize, sample_rate_hz: f64) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    let resolution = sample_rate_hz / n as f64;
    (0..n / 2 + 1).map(|k| k as f64 * resolution).collect()
}

/// Raises `power_db` to [`POWER_FLOOR_DB`]. NaN is returned unchanged.
pub fn clamp_power(power_db: f64) -> f64 {
    if power_db < POWER_FLOOR_DB {
        POWER_FLOOR_DB
    } else {
        power_db
    }
}
