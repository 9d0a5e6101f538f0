//! Periodic per-axis spectrum computation.
//!
//! Each cycle processes X, Y and Z in turn: take the newest `window_size`
//! samples, project them onto the axis, filter, compute the power spectrum and
//! publish a [`SpectrumPacket`]. Per-axis problems never end the loop: missing
//! data skips the axis silently, numeric or filter failures skip it with a
//! warning.
//!
//! Scheduling between cycles:
//!
//! - not running: sleep the idle interval;
//! - output queue too full to take a whole cycle: sleep the backpressure
//!   interval and re-check;
//! - a cycle that emitted nothing: sleep the idle interval;
//! - otherwise start the next cycle straight away.
//!
//! A cycle only starts when `len + 3 <= output_queue_limit`, so the queue
//! never holds more than `output_queue_limit` packets.

use super::control::{PipelineConfig, PipelineControl};
use super::PipelineCounters;
use crate::config::WorkerSettings;
use crate::core::{Axis, SpectrumPacket};
use crate::data::fft::SpectrumAnalyzer;
use crate::data::filter::apply_filter;
use crate::data::output_queue::OutputQueue;
use crate::data::sample_stream::SampleStream;
use crate::data::SAMPLE_RATE_HZ;
use crate::error::{AppResult, DaqError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{info, trace, warn};

/// Turns the newest window of samples into one packet per axis.
pub struct SpectrumWorker {
    stream: Arc<SampleStream>,
    output: Arc<OutputQueue>,
    control: Arc<PipelineControl>,
    counters: Arc<PipelineCounters>,
    timing: WorkerSettings,
    analyzer: SpectrumAnalyzer,
}

impl SpectrumWorker {
    pub fn new(
        stream: Arc<SampleStream>,
        output: Arc<OutputQueue>,
        control: Arc<PipelineControl>,
        counters: Arc<PipelineCounters>,
        timing: WorkerSettings,
    ) -> Self {
        Self {
            stream,
            output,
            control,
            counters,
            timing,
            analyzer: SpectrumAnalyzer::new(SAMPLE_RATE_HZ),
        }
    }

    /// Computes the packet for one axis.
    ///
    /// Returns `Ok(None)` when fewer than `window_size` samples are live.
    pub fn compute_axis(
        &mut self,
        axis: Axis,
        config: &PipelineConfig,
    ) -> AppResult<Option<SpectrumPacket>> {
        let signal: Vec<f64> = self
            .stream
            .snapshot_recent(config.window_size)
            .iter()
            .map(|sample| sample.vector.component(axis))
            .collect();

        if signal.len() < config.window_size {
            return Ok(None);
        }

        if let Some(offset) = signal.iter().position(|v| !v.is_finite()) {
            return Err(DaqError::NumericFailure {
                axis,
                reason: format!("non-finite sample {offset} readings back"),
            });
        }

        let filtered = apply_filter(
            self.analyzer.planner_mut(),
            &signal,
            &config.filter,
            config.filter_design,
        )?;
        if filtered.len() != signal.len() {
            return Err(DaqError::NumericFailure {
                axis,
                reason: format!(
                    "filter returned {} values for a {}-sample window",
                    filtered.len(),
                    signal.len()
                ),
            });
        }
        if filtered.iter().any(|v| !v.is_finite()) {
            return Err(DaqError::NumericFailure {
                axis,
                reason: "filter produced non-finite output".into(),
            });
        }

        let spectrum = self
            .analyzer
            .power_spectrum(&filtered, config.window_function);
        if spectrum
            .power
            .iter()
            .any(|p| p.is_nan() || *p == f64::INFINITY)
        {
            return Err(DaqError::NumericFailure {
                axis,
                reason: "power spectrum contains non-finite values".into(),
            });
        }

        let packet = SpectrumPacket::from_parts(axis, &spectrum.power, &spectrum.frequency);
        Ok((!packet.is_empty()).then_some(packet))
    }

    /// Runs X, Y and Z once and publishes every packet produced.
    ///
    /// Returns the number of packets published.
    pub fn run_cycle(&mut self) -> usize {
        let config = self.control.snapshot();
        let mut emitted = 0;

        for axis in Axis::ALL {
            match self.compute_axis(axis, &config) {
                Ok(Some(packet)) => {
                    self.output.push(packet);
                    emitted += 1;
                }
                Ok(None) => {
                    self.counters
                        .insufficient_data
                        .fetch_add(1, Ordering::Relaxed);
                    trace!(
                        %axis,
                        window_size = config.window_size,
                        live = self.stream.len(),
                        "Not enough samples for a spectrum"
                    );
                }
                Err(e) => {
                    self.counters
                        .numeric_failures
                        .fetch_add(1, Ordering::Relaxed);
                    warn!(%axis, error = %e, "Skipping axis for this cycle");
                }
            }
        }

        self.counters
            .packets_emitted
            .fetch_add(emitted as u64, Ordering::Relaxed);
        self.counters.cycles.fetch_add(1, Ordering::Relaxed);
        emitted
    }

    /// True when the consumer has not made room for a whole cycle yet.
    fn is_backpressured(&self) -> bool {
        self.output.len() + Axis::ALL.len() > self.timing.output_queue_limit
    }

    /// How long to wait before the next decision, or `None` to continue now.
    fn step(&mut self) -> Option<Duration> {
        if !self.control.running() {
            return Some(self.timing.idle_interval);
        }
        if self.is_backpressured() {
            trace!(pending = self.output.len(), "Output queue full, backing off");
            return Some(self.timing.backpressure_interval);
        }
        if self.run_cycle() == 0 {
            return Some(self.timing.idle_interval);
        }
        None
    }

    /// Runs until a shutdown signal arrives or the sender is dropped.
    pub async fn run(mut self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            output_queue_limit = self.timing.output_queue_limit,
            "Spectrum worker started"
        );

        loop {
            match self.step() {
                Some(delay) => {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => {
                    if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
            }
        }

        info!("Spectrum worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Sample, Vector3};
    use crate::data::fft::POWER_FLOOR_DB;
    use crate::data::filter::{FilterDesign, FilterSettings};
    use std::f64::consts::PI;
    use tracing_test::traced_test;

    fn worker_with(
        config: PipelineConfig,
    ) -> (Arc<SampleStream>, Arc<OutputQueue>, SpectrumWorker) {
        let stream = Arc::new(SampleStream::new());
        let output = Arc::new(OutputQueue::new());
        let control = Arc::new(PipelineControl::new(config).unwrap());
        let worker = SpectrumWorker::new(
            Arc::clone(&stream),
            Arc::clone(&output),
            control,
            Arc::new(PipelineCounters::default()),
            WorkerSettings::default(),
        );
        (stream, output, worker)
    }

    /// X carries `fx` Hz, Y carries `fy` Hz, Z is flat.
    fn push_tones(stream: &SampleStream, n: usize, fx: f64, fy: f64) {
        for i in 0..n {
            let t = i as f64 / SAMPLE_RATE_HZ;
            stream.push(Sample::now(Vector3::new(
                (2.0 * PI * fx * t).sin(),
                (2.0 * PI * fy * t).sin(),
                1.0,
            )));
        }
    }

    fn power_at(packet: &SpectrumPacket, hz: f64) -> f64 {
        packet
            .bins
            .iter()
            .min_by(|a, b| (a.frequency - hz).abs().total_cmp(&(b.frequency - hz).abs()))
            .map(|b| b.power)
            .unwrap()
    }

    #[test]
    fn test_insufficient_data_emits_nothing() {
        let (stream, output, mut worker) = worker_with(PipelineConfig::default());
        push_tones(&stream, 100, 5.0, 10.0);

        assert_eq!(worker.run_cycle(), 0);
        assert!(output.is_empty());
    }

    #[test]
    fn test_cycle_emits_one_packet_per_axis() {
        let (stream, output, mut worker) = worker_with(PipelineConfig::default());
        push_tones(&stream, 256, 12.5, 25.0);

        assert_eq!(worker.run_cycle(), 3);
        let packets: Vec<SpectrumPacket> = std::iter::from_fn(|| output.try_pop()).collect();
        assert_eq!(
            packets.iter().map(|p| p.axis).collect::<Vec<_>>(),
            Axis::ALL.to_vec()
        );

        for packet in &packets {
            assert_eq!(packet.bins.len(), 129);
            assert!(packet.bins.windows(2).all(|w| w[0].frequency <= w[1].frequency));
            assert!(packet.bins.iter().all(|b| b.power >= POWER_FLOOR_DB));
        }
        assert!((packets[0].peak().unwrap().frequency - 12.5).abs() < 1e-9);
        assert!((packets[1].peak().unwrap().frequency - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_pass_pushes_rejected_tone_to_floor() {
        let config = PipelineConfig {
            filter: FilterSettings::low_pass(10.0),
            ..PipelineConfig::default()
        };
        let (stream, _output, mut worker) = worker_with(config);
        // 3.90625 Hz and 15.625 Hz both sit on bin centres of a 256 window.
        for i in 0..256 {
            let t = i as f64 / SAMPLE_RATE_HZ;
            let v = (2.0 * PI * 3.90625 * t).sin() + (2.0 * PI * 15.625 * t).sin();
            stream.push(Sample::now(Vector3::new(v, 0.0, 0.0)));
        }

        let config = worker.control.snapshot();
        let packet = worker.compute_axis(Axis::X, &config).unwrap().unwrap();
        assert!(power_at(&packet, 3.90625) > -1.0);
        assert!(power_at(&packet, 15.625) < -200.0);
    }

    #[test]
    fn test_biquad_band_stop_attenuates_band() {
        let config = PipelineConfig {
            window_size: 1024,
            filter: FilterSettings::band_stop(10.0, 20.0),
            filter_design: FilterDesign::Biquad,
            ..PipelineConfig::default()
        };
        let (stream, _output, mut worker) = worker_with(config);
        push_tones(&stream, 1024, 15.0, 15.0);
        let config = worker.control.snapshot();
        let filtered = worker.compute_axis(Axis::X, &config).unwrap().unwrap();

        let unfiltered_config = PipelineConfig {
            filter: FilterSettings::none(),
            ..config
        };
        let raw = worker.compute_axis(Axis::X, &unfiltered_config).unwrap().unwrap();

        assert!(power_at(&filtered, 15.0) < power_at(&raw, 15.0) - 20.0);
    }

    #[test]
    fn test_same_input_same_packet() {
        let (stream, _output, mut worker) = worker_with(PipelineConfig::default());
        push_tones(&stream, 300, 7.0, 3.0);
        let config = worker.control.snapshot();

        let a = worker.compute_axis(Axis::Y, &config).unwrap();
        let b = worker.compute_axis(Axis::Y, &config).unwrap();
        assert_eq!(a, b);
    }

    #[traced_test]
    #[test]
    fn test_numeric_failure_skips_axis_and_logs() {
        let (stream, output, mut worker) = worker_with(PipelineConfig {
            window_size: 128,
            ..PipelineConfig::default()
        });
        for i in 0..128 {
            let x = if i == 100 { f64::NAN } else { 0.5 };
            stream.push(Sample::now(Vector3::new(x, 1.0, 2.0)));
        }

        // X fails, Y and Z still publish.
        assert_eq!(worker.run_cycle(), 2);
        assert_eq!(output.try_pop().map(|p| p.axis), Some(Axis::Y));
        assert_eq!(worker.counters.numeric_failures.load(Ordering::Relaxed), 1);
        assert!(logs_contain("Skipping axis for this cycle"));
    }

    #[test]
    fn test_backpressure_blocks_cycle() {
        let (stream, output, mut worker) = worker_with(PipelineConfig {
            window_size: 128,
            running: true,
            ..PipelineConfig::default()
        });
        push_tones(&stream, 128, 5.0, 5.0);

        assert_eq!(worker.step(), None);
        assert_eq!(output.len(), 3);
        assert_eq!(
            worker.step(),
            Some(WorkerSettings::default().backpressure_interval)
        );
        assert_eq!(output.len(), 3);

        output.try_pop();
        output.try_pop();
        output.try_pop();
        assert_eq!(worker.step(), None);
        assert_eq!(output.len(), 3);
    }

    #[test]
    fn test_not_running_idles() {
        let (stream, output, mut worker) = worker_with(PipelineConfig::default());
        push_tones(&stream, 256, 5.0, 5.0);
        assert_eq!(worker.step(), Some(WorkerSettings::default().idle_interval));
        assert!(output.is_empty());
    }
}
