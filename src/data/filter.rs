//! Signal filters applied to a window before its spectrum is computed.
//!
//! A filter is described by one [`FilterSettings`] value so that the kind and
//! both cutoffs always change together. Two designs are available:
//!
//! - [`FilterDesign::Spectral`]: transform the window, zero every bin outside
//!   the pass region and transform back. Attenuation in the stop region is
//!   total, which is what the frequency view expects by default.
//! - [`FilterDesign::Biquad`]: second-order Butterworth sections run over the
//!   window in the time domain (see [`super::iir_filter`]).
//!
//! # Example Configuration (`.toml`)
//!
//! ```toml
//! [pipeline.filter]
//! kind = "BandPass"
//! low_hz = 5.0
//! high_hz = 20.0
//! ```

use super::iir_filter::IirFilter;
use super::{NYQUIST_HZ, SAMPLE_RATE_HZ};
use crate::error::{AppResult, DaqError};
use num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

/// The kind of filter to apply.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    /// Pass the signal through unchanged.
    #[default]
    None,
    /// Keep content at or below `low_hz`.
    LowPass,
    /// Keep content at or above `low_hz`.
    HighPass,
    /// Keep only `[low_hz, high_hz]`.
    BandPass,
    /// Remove `[low_hz, high_hz]`.
    BandStop,
}

impl Filter {
    /// True when the filter uses both cutoffs.
    pub fn is_band(self) -> bool {
        matches!(self, Filter::BandPass | Filter::BandStop)
    }
}

/// How a filter is realised.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterDesign {
    /// Brick-wall masking in the frequency domain.
    #[default]
    Spectral,
    /// Butterworth biquad sections in the time domain.
    Biquad,
}

/// Complete description of the active filter.
///
/// `high_hz` is only read for band filters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    pub kind: Filter,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FilterSettings {
    pub const fn none() -> Self {
        Self {
            kind: Filter::None,
            low_hz: 0.0,
            high_hz: 0.0,
        }
    }

    pub const fn low_pass(cutoff_hz: f64) -> Self {
        Self {
            kind: Filter::LowPass,
            low_hz: cutoff_hz,
            high_hz: 0.0,
        }
    }

    pub const fn high_pass(cutoff_hz: f64) -> Self {
        Self {
            kind: Filter::HighPass,
            low_hz: cutoff_hz,
            high_hz: 0.0,
        }
    }

    pub const fn band_pass(low_hz: f64, high_hz: f64) -> Self {
        Self {
            kind: Filter::BandPass,
            low_hz,
            high_hz,
        }
    }

    pub const fn band_stop(low_hz: f64, high_hz: f64) -> Self {
        Self {
            kind: Filter::BandStop,
            low_hz,
            high_hz,
        }
    }

    /// Checks the cutoffs against the fixed sample rate.
    ///
    /// Cutoffs must be finite and within `0..=Nyquist`; band filters also need
    /// `high_hz >= low_hz`.
    pub fn validate(&self) -> AppResult<()> {
        if self.kind == Filter::None {
            return Ok(());
        }

        check_cutoff(self.low_hz)?;
        if self.kind.is_band() {
            check_cutoff(self.high_hz)?;
            if self.high_hz < self.low_hz {
                return Err(DaqError::InvalidFilterBand {
                    low_hz: self.low_hz,
                    high_hz: self.high_hz,
                });
            }
        }
        Ok(())
    }

    /// Whether content at `frequency_hz` survives this filter.
    pub fn passes(&self, frequency_hz: f64) -> bool {
        match self.kind {
            Filter::None => true,
            Filter::LowPass => frequency_hz <= self.low_hz,
            Filter::HighPass => frequency_hz >= self.low_hz,
            Filter::BandPass => frequency_hz >= self.low_hz && frequency_hz <= self.high_hz,
            Filter::BandStop => frequency_hz < self.low_hz || frequency_hz > self.high_hz,
        }
    }
}

fn check_cutoff(cutoff_hz: f64) -> AppResult<()> {
    if cutoff_hz.is_finite() && (0.0..=NYQUIST_HZ).contains(&cutoff_hz) {
        Ok(())
    } else {
        Err(DaqError::InvalidCutoff {
            cutoff_hz,
            nyquist_hz: NYQUIST_HZ,
        })
    }
}

/// Applies `settings` to `signal` using the requested design.
///
/// The output has the same length as the input. `Filter::None` returns a copy.
pub fn apply_filter(
    planner: &mut FftPlanner<f64>,
    signal: &[f64],
    settings: &FilterSettings,
    design: FilterDesign,
) -> AppResult<Vec<f64>> {
    if settings.kind == Filter::None {
        return Ok(signal.to_vec());
    }

    match design {
        FilterDesign::Spectral => Ok(spectral_filter(planner, signal, settings, SAMPLE_RATE_HZ)),
        FilterDesign::Biquad => {
            let mut filter = IirFilter::new(settings, SAMPLE_RATE_HZ)?;
            Ok(filter.process(signal))
        }
    }
}

/// Zeroes every FFT bin whose frequency the filter rejects, then inverts.
///
/// Both halves of the two-sided spectrum are masked by absolute frequency so
/// the result stays real.
fn spectral_filter(
    planner: &mut FftPlanner<f64>,
    signal: &[f64],
    settings: &FilterSettings,
    sample_rate_hz: f64,
) -> Vec<f64> {
    let n = signal.len();
    if n == 0 {
        return Vec::new();
    }

    let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
    planner.plan_fft_forward(n).process(&mut buffer);

    let resolution = sample_rate_hz / n as f64;
    for (k, bin) in buffer.iter_mut().enumerate() {
        let frequency = k.min(n - k) as f64 * resolution;
        if !settings.passes(frequency) {
            *bin = Complex::new(0.0, 0.0);
        }
    }

    planner.plan_fft_inverse(n).process(&mut buffer);

    // rustfft does not normalise the inverse transform.
    let scale = 1.0 / n as f64;
    buffer.iter().map(|c| c.re * scale).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    const N: usize = 256;

    /// Frequency of FFT bin `k` for a window of `N` samples.
    fn bin_hz(k: usize) -> f64 {
        k as f64 * SAMPLE_RATE_HZ / N as f64
    }

    fn two_tone(k1: usize, k2: usize) -> Vec<f64> {
        (0..N)
            .map(|i| {
                let t = i as f64 / SAMPLE_RATE_HZ;
                (2.0 * PI * bin_hz(k1) * t).sin() + (2.0 * PI * bin_hz(k2) * t).sin()
            })
            .collect()
    }

    /// Amplitude of bin `k` in `signal`.
    fn amplitude(signal: &[f64], k: usize) -> f64 {
        let mut planner = FftPlanner::new();
        let mut buffer: Vec<Complex<f64>> = signal.iter().map(|&v| Complex::new(v, 0.0)).collect();
        planner.plan_fft_forward(signal.len()).process(&mut buffer);
        buffer[k].norm() * 2.0 / signal.len() as f64
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        assert!(FilterSettings::none().validate().is_ok());
        assert!(FilterSettings::low_pass(10.0).validate().is_ok());
        assert!(FilterSettings::band_pass(5.0, 5.0).validate().is_ok());

        assert!(matches!(
            FilterSettings::band_stop(20.0, 10.0).validate(),
            Err(DaqError::InvalidFilterBand { .. })
        ));
        assert!(matches!(
            FilterSettings::high_pass(-1.0).validate(),
            Err(DaqError::InvalidCutoff { .. })
        ));
        assert!(matches!(
            FilterSettings::low_pass(f64::NAN).validate(),
            Err(DaqError::InvalidCutoff { .. })
        ));
        assert!(matches!(
            FilterSettings::band_pass(5.0, 75.0).validate(),
            Err(DaqError::InvalidCutoff { .. })
        ));
    }

    #[test]
    fn test_none_is_identity() {
        let mut planner = FftPlanner::new();
        let signal = two_tone(10, 40);
        let out = apply_filter(
            &mut planner,
            &signal,
            &FilterSettings::none(),
            FilterDesign::Spectral,
        )
        .unwrap();
        assert_eq!(out, signal);
    }

    #[test]
    fn test_spectral_low_pass_removes_upper_tone() {
        let mut planner = FftPlanner::new();
        let signal = two_tone(10, 40);
        let out = apply_filter(
            &mut planner,
            &signal,
            &FilterSettings::low_pass(8.0),
            FilterDesign::Spectral,
        )
        .unwrap();

        assert_eq!(out.len(), N);
        assert!((amplitude(&out, 10) - 1.0).abs() < 1e-9);
        assert!(amplitude(&out, 40) < 1e-9);
    }

    #[test]
    fn test_spectral_high_pass_removes_lower_tone() {
        let mut planner = FftPlanner::new();
        let signal = two_tone(10, 40);
        let out = apply_filter(
            &mut planner,
            &signal,
            &FilterSettings::high_pass(8.0),
            FilterDesign::Spectral,
        )
        .unwrap();

        assert!(amplitude(&out, 10) < 1e-9);
        assert!((amplitude(&out, 40) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_spectral_band_pass_and_band_stop_are_complementary() {
        let mut planner = FftPlanner::new();
        let signal = two_tone(10, 40);

        let pass = apply_filter(
            &mut planner,
            &signal,
            &FilterSettings::band_pass(12.0, 20.0),
            FilterDesign::Spectral,
        )
        .unwrap();
        let stop = apply_filter(
            &mut planner,
            &signal,
            &FilterSettings::band_stop(12.0, 20.0),
            FilterDesign::Spectral,
        )
        .unwrap();

        // bin 40 is 15.625 Hz, inside the band; bin 10 is 3.9 Hz, outside.
        assert!(amplitude(&pass, 10) < 1e-9);
        assert!((amplitude(&pass, 40) - 1.0).abs() < 1e-9);
        assert!((amplitude(&stop, 10) - 1.0).abs() < 1e-9);
        assert!(amplitude(&stop, 40) < 1e-9);

        for ((p, s), input) in pass.iter().zip(&stop).zip(&signal) {
            assert!((p + s - input).abs() < 1e-9);
        }
    }

    #[test]
    fn test_biquad_design_attenuates_stop_band() {
        let mut planner = FftPlanner::new();
        let signal = two_tone(10, 80);
        let out = apply_filter(
            &mut planner,
            &signal,
            &FilterSettings::low_pass(5.0),
            FilterDesign::Biquad,
        )
        .unwrap();

        assert_eq!(out.len(), N);
        // 31 Hz is roughly three octaves above the cutoff.
        assert!(amplitude(&out, 80) < 0.1);
        assert!(amplitude(&out, 10) > 0.5);
    }

    #[test]
    fn test_passes_edges() {
        let band = FilterSettings::band_pass(5.0, 10.0);
        assert!(band.passes(5.0));
        assert!(band.passes(10.0));
        assert!(!band.passes(10.5));

        let stop = FilterSettings::band_stop(5.0, 10.0);
        assert!(!stop.passes(5.0));
        assert!(stop.passes(4.9));
    }
}
