//! Time-domain IIR filters built from `biquad` sections.
use super::filter::{Filter, FilterSettings};
use crate::error::{AppResult, DaqError};
use biquad::{Biquad, Coefficients, DirectForm1, ToHertz, Q_BUTTERWORTH_F64};

/// A cascade of second-order sections realising one [`FilterSettings`].
///
/// - Low-pass and high-pass use a single Butterworth section at `low_hz`.
/// - Band-pass cascades a high-pass at `low_hz` with a low-pass at `high_hz`.
/// - Band-stop is a notch centred on the band with `Q = centre / width`. A
///   zero-width band has nothing to remove and yields an empty cascade.
///
/// Filter state starts at rest for every window, so each spectrum cycle is
/// independent of the previous one.
pub struct IirFilter {
    stages: Vec<DirectForm1<f64>>,
}

impl IirFilter {
    pub fn new(settings: &FilterSettings, sample_rate_hz: f64) -> AppResult<Self> {
        let fs = sample_rate_hz;
        let stages = match settings.kind {
            Filter::None => Vec::new(),
            Filter::LowPass => {
                vec![design_stage(Section::LowPass, fs, settings.low_hz, Q_BUTTERWORTH_F64)?]
            }
            Filter::HighPass => {
                vec![design_stage(Section::HighPass, fs, settings.low_hz, Q_BUTTERWORTH_F64)?]
            }
            Filter::BandPass => vec![
                design_stage(Section::HighPass, fs, settings.low_hz, Q_BUTTERWORTH_F64)?,
                design_stage(Section::LowPass, fs, settings.high_hz, Q_BUTTERWORTH_F64)?,
            ],
            Filter::BandStop => {
                let width = settings.high_hz - settings.low_hz;
                if width > 0.0 {
                    let centre = (settings.low_hz + settings.high_hz) / 2.0;
                    vec![design_stage(Section::Notch, fs, centre, centre / width)?]
                } else {
                    Vec::new()
                }
            }
        };
        Ok(Self { stages })
    }

    /// Number of second-order sections in the cascade.
    pub fn order(&self) -> usize {
        self.stages.len() * 2
    }

    /// Runs every sample of `signal` through the cascade.
    pub fn process(&mut self, signal: &[f64]) -> Vec<f64> {
        signal
            .iter()
            .map(|&value| {
                self.stages
                    .iter_mut()
                    .fold(value, |acc, stage| stage.run(acc))
            })
            .collect()
    }
}

#[derive(Clone, Copy, Debug)]
enum Section {
    LowPass,
    HighPass,
    Notch,
}

fn design_stage(
    section: Section,
    sample_rate_hz: f64,
    f0: f64,
    q: f64,
) -> AppResult<DirectForm1<f64>> {
    let fs = sample_rate_hz.hz();
    let f0_hz = f0.hz();
    let coeffs = match section {
        Section::LowPass => Coefficients::<f64>::from_params(biquad::Type::LowPass, fs, f0_hz, q),
        Section::HighPass => {
            Coefficients::<f64>::from_params(biquad::Type::HighPass, fs, f0_hz, q)
        }
        Section::Notch => Coefficients::<f64>::from_params(biquad::Type::Notch, fs, f0_hz, q),
    };
    coeffs
        .map(DirectForm1::<f64>::new)
        .map_err(|e| {
            DaqError::Processing(format!(
                "Failed to create IIR filter coefficients at {f0} Hz: {e:?}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 100.0;

    #[test]
    fn test_lowpass_filter_creation() {
        let filter = IirFilter::new(&FilterSettings::low_pass(10.0), FS).unwrap();
        assert_eq!(filter.order(), 2);
    }

    #[test]
    fn test_bandpass_is_cascade() {
        let filter = IirFilter::new(&FilterSettings::band_pass(5.0, 20.0), FS).unwrap();
        assert_eq!(filter.order(), 4);
    }

    #[test]
    fn test_zero_width_bandstop_is_passthrough() {
        let mut filter = IirFilter::new(&FilterSettings::band_stop(10.0, 10.0), FS).unwrap();
        assert_eq!(filter.order(), 0);
        assert_eq!(filter.process(&[1.0, 2.0, 3.0]), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_invalid_filter_params() {
        // f0 above Nyquist
        assert!(IirFilter::new(&FilterSettings::low_pass(60.0), FS).is_err());
    }

    #[test]
    fn test_lowpass_settles_to_dc() {
        let mut filter = IirFilter::new(&FilterSettings::low_pass(5.0), FS).unwrap();
        let out = filter.process(&[1.0; 400]);
        assert!((out[399] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_highpass_blocks_dc() {
        let mut filter = IirFilter::new(&FilterSettings::high_pass(5.0), FS).unwrap();
        let out = filter.process(&[1.0; 400]);
        assert!(out[399].abs() < 1e-6);
    }
}
