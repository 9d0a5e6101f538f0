//! Custom error types for the pipeline.
//!
//! `DaqError` is the single error type of the crate. Most variants belong to the
//! configuration boundary: invalid window sizes or filter bands are rejected when
//! they are set, so they never reach the background workers. The remaining
//! variants cover numeric failures inside a spectrum cycle (logged and skipped by
//! the worker, never propagated out of its loop) and start-up concerns such as
//! loading settings or installing the tracing subscriber.
//!
//! Two conditions are deliberately *not* errors:
//!
//! - Insufficient data (fewer live samples than the window size) is reported as
//!   `Ok(None)` by the spectrum computation.
//! - A queue pop that finds nothing after a length check is a benign race and is
//!   resolved by re-checking.

use crate::core::Axis;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Errors raised by the pipeline and its start-up code.
#[derive(Error, Debug)]
pub enum DaqError {
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("Invalid window size {0}: must be at least 1")]
    InvalidWindowSize(usize),

    #[error("Invalid filter cutoff {cutoff_hz} Hz: must be finite and within 0..={nyquist_hz} Hz")]
    InvalidCutoff { cutoff_hz: f64, nyquist_hz: f64 },

    #[error("Invalid filter band: high cutoff {high_hz} Hz is below low cutoff {low_hz} Hz")]
    InvalidFilterBand { low_hz: f64, high_hz: f64 },

    #[error("Numeric failure on axis {axis}: {reason}")]
    NumericFailure { axis: Axis, reason: String },

    #[error("Data processing error: {0}")]
    Processing(String),

    #[error("Tokio runtime error: {0}")]
    Runtime(String),

    #[error("Worker task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),

    #[error("Failed to initialize tracing: {0}")]
    Logging(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaqError {
    /// True for errors raised by the configuration boundary.
    pub fn is_config_violation(&self) -> bool {
        matches!(
            self,
            DaqError::Config(_)
                | DaqError::Configuration(_)
                | DaqError::InvalidWindowSize(_)
                | DaqError::InvalidCutoff { .. }
                | DaqError::InvalidFilterBand { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DaqError::InvalidFilterBand {
            low_hz: 20.0,
            high_hz: 10.0,
        };
        assert_eq!(
            err.to_string(),
            "Invalid filter band: high cutoff 10 Hz is below low cutoff 20 Hz"
        );

        let err = DaqError::NumericFailure {
            axis: Axis::Z,
            reason: "NaN in signal".into(),
        };
        assert_eq!(err.to_string(), "Numeric failure on axis Z: NaN in signal");
    }

    #[test]
    fn test_config_violation_classification() {
        assert!(DaqError::InvalidWindowSize(0).is_config_violation());
        assert!(!DaqError::Processing("bad".into()).is_config_violation());
    }
}
