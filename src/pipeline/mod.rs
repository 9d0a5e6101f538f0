//! The sample-buffering and windowed-FFT pipeline.
//!
//! A [`Pipeline`] owns every queue and the shared configuration, and hands
//! clones of the relevant `Arc`s to its two background workers:
//!
//! ```text
//! sensor ─submit_sample─▶ SampleStream ─┬─▶ CleanupWorker ─▶ RetentionBuffer
//!                                       └─▶ SpectrumWorker ─▶ OutputQueue
//!                                                                 │
//!                                           UI ◀─try_take_packet──┘
//! ```
//!
//! Workers run as Tokio tasks and coordinate only by polling shared state at
//! fixed intervals. Shutdown is abrupt: both loops exit at their next
//! suspension point and samples still in flight are left where they are.
//!
//! # Example
//!
//! ```
//! use magnetic_daq::config::WorkerSettings;
//! use magnetic_daq::core::Vector3;
//! use magnetic_daq::pipeline::{control::PipelineConfig, Pipeline};
//!
//! # tokio_test::block_on(async {
//! let mut pipeline = Pipeline::new(PipelineConfig::default(), WorkerSettings::default())?;
//! pipeline.start()?;
//!
//! pipeline.submit_sample(Vector3::new(12.0, -3.5, 40.1), chrono::Utc::now());
//! pipeline.set_running(true);
//! assert!(pipeline.try_take_packet().is_none());
//!
//! pipeline.shutdown().await?;
//! # Ok::<(), magnetic_daq::error::DaqError>(())
//! # }).unwrap();
//! ```

pub mod cleanup;
pub mod control;
pub mod spectrum;

use crate::config::{Settings, WorkerSettings};
use crate::core::{PipelineStats, Sample, SpectrumPacket, Vector3};
use crate::data::filter::FilterSettings;
use crate::data::output_queue::OutputQueue;
use crate::data::retention::RetentionBuffer;
use crate::data::sample_stream::SampleStream;
use crate::error::{AppResult, DaqError};
use chrono::{DateTime, Utc};
use cleanup::CleanupWorker;
use control::{PipelineConfig, PipelineControl, SUPPORTED_WINDOW_SIZES};
use spectrum::SpectrumWorker;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Activity counters updated by the workers and the ingress path.
#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub samples_submitted: AtomicU64,
    pub samples_evicted: AtomicU64,
    pub samples_discarded: AtomicU64,
    pub packets_emitted: AtomicU64,
    pub cycles: AtomicU64,
    pub insufficient_data: AtomicU64,
    pub numeric_failures: AtomicU64,
}

/// Cloneable producer-side handle for a sensor thread.
#[derive(Clone, Debug)]
pub struct SampleIngress {
    stream: Arc<SampleStream>,
    counters: Arc<PipelineCounters>,
}

impl SampleIngress {
    /// Wraps a reading into a [`Sample`] and appends it to the live buffer.
    pub fn submit_sample(&self, vector: Vector3, timestamp: DateTime<Utc>) {
        self.submit(Sample::new(timestamp, vector));
    }

    pub fn submit(&self, sample: Sample) {
        self.stream.push(sample);
        self.counters
            .samples_submitted
            .fetch_add(1, Ordering::Relaxed);
    }
}

/// Cloneable consumer-side handle for the presentation layer.
#[derive(Clone, Debug)]
pub struct PacketEgress {
    output: Arc<OutputQueue>,
}

impl PacketEgress {
    /// Takes the oldest pending packet without blocking.
    pub fn try_take_packet(&self) -> Option<SpectrumPacket> {
        self.output.try_pop()
    }

    pub fn pending(&self) -> usize {
        self.output.len()
    }
}

/// Owns the queues, the shared configuration and the worker tasks.
pub struct Pipeline {
    stream: Arc<SampleStream>,
    retention: Arc<RetentionBuffer>,
    output: Arc<OutputQueue>,
    control: Arc<PipelineControl>,
    counters: Arc<PipelineCounters>,
    workers: WorkerSettings,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl Pipeline {
    /// Builds an idle pipeline. Call [`start`](Self::start) to spawn the workers.
    pub fn new(config: PipelineConfig, workers: WorkerSettings) -> AppResult<Self> {
        workers.validate()?;
        let control = PipelineControl::new(config)?;
        let (shutdown_tx, _) = broadcast::channel(1);

        // Preallocate for the largest offered window at most; bigger windows
        // grow the buffer on demand.
        let largest_offered = SUPPORTED_WINDOW_SIZES[SUPPORTED_WINDOW_SIZES.len() - 1];
        let capacity = config.window_size.min(largest_offered).saturating_mul(2);

        Ok(Self {
            stream: Arc::new(SampleStream::with_capacity(capacity)),
            retention: Arc::new(RetentionBuffer::new()),
            output: Arc::new(OutputQueue::new()),
            control: Arc::new(control),
            counters: Arc::new(PipelineCounters::default()),
            workers,
            shutdown_tx,
            tasks: Vec::new(),
        })
    }

    pub fn from_settings(settings: &Settings) -> AppResult<Self> {
        Self::new(settings.pipeline, settings.workers)
    }

    /// Spawns the cleanup and spectrum workers on the current Tokio runtime.
    ///
    /// Calling `start` on a running pipeline is a no-op.
    pub fn start(&mut self) -> AppResult<()> {
        if self.is_started() {
            return Ok(());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| DaqError::Runtime(e.to_string()))?;

        let cleanup = CleanupWorker::new(
            Arc::clone(&self.stream),
            Arc::clone(&self.retention),
            Arc::clone(&self.control),
            Arc::clone(&self.counters),
            self.workers.cleanup_interval,
        );
        let spectrum = SpectrumWorker::new(
            Arc::clone(&self.stream),
            Arc::clone(&self.output),
            Arc::clone(&self.control),
            Arc::clone(&self.counters),
            self.workers,
        );

        self.tasks
            .push(runtime.spawn(cleanup.run(self.shutdown_tx.subscribe())));
        self.tasks
            .push(runtime.spawn(spectrum.run(self.shutdown_tx.subscribe())));

        info!(
            window_size = self.control.window_size(),
            "Pipeline started"
        );
        Ok(())
    }

    pub fn is_started(&self) -> bool {
        !self.tasks.is_empty()
    }

    /// Signals both workers to stop and waits for them to exit.
    ///
    /// Samples and packets still queued are left in place.
    pub async fn shutdown(mut self) -> AppResult<()> {
        let _ = self.shutdown_tx.send(());

        let mut result = Ok(());
        for task in std::mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                warn!(error = %e, "Worker task ended abnormally");
                result = Err(DaqError::Worker(e));
            }
        }
        info!("Pipeline stopped");
        result
    }

    // --- Ingress / egress ---

    pub fn submit_sample(&self, vector: Vector3, timestamp: DateTime<Utc>) {
        self.ingress().submit_sample(vector, timestamp);
    }

    pub fn try_take_packet(&self) -> Option<SpectrumPacket> {
        self.output.try_pop()
    }

    pub fn ingress(&self) -> SampleIngress {
        SampleIngress {
            stream: Arc::clone(&self.stream),
            counters: Arc::clone(&self.counters),
        }
    }

    pub fn egress(&self) -> PacketEgress {
        PacketEgress {
            output: Arc::clone(&self.output),
        }
    }

    // --- Control surface ---

    pub fn control(&self) -> &Arc<PipelineControl> {
        &self.control
    }

    pub fn set_window_size(&self, window_size: usize) -> AppResult<()> {
        self.control.set_window_size(window_size)
    }

    pub fn set_filter(&self, filter: FilterSettings) -> AppResult<()> {
        self.control.set_filter(filter)
    }

    pub fn set_running(&self, running: bool) {
        self.control.set_running(running);
    }

    pub fn set_recording(&self, recording: bool) {
        self.control.set_recording(recording);
    }

    // --- Inspection ---

    pub fn live_len(&self) -> usize {
        self.stream.len()
    }

    pub fn retained_len(&self) -> usize {
        self.retention.len()
    }

    pub fn total_len(&self) -> usize {
        self.live_len() + self.retained_len()
    }

    pub fn pending_packets(&self) -> usize {
        self.output.len()
    }

    /// The newest live reading, for raw-value display.
    pub fn latest_sample(&self) -> Option<Sample> {
        self.stream.latest()
    }

    /// Moves the recorded history out for export, oldest first.
    pub fn drain_recorded(&self) -> Vec<Sample> {
        self.retention.drain()
    }

    pub fn stats(&self) -> PipelineStats {
        let c = &self.counters;
        PipelineStats {
            live_samples: self.stream.len(),
            retained_samples: self.retention.len(),
            pending_packets: self.output.len(),
            samples_submitted: c.samples_submitted.load(Ordering::Relaxed),
            samples_evicted: c.samples_evicted.load(Ordering::Relaxed),
            samples_discarded: c.samples_discarded.load(Ordering::Relaxed),
            packets_emitted: c.packets_emitted.load(Ordering::Relaxed),
            cycles: c.cycles.load(Ordering::Relaxed),
            insufficient_data: c.insufficient_data.load(Ordering::Relaxed),
            numeric_failures: c.numeric_failures.load(Ordering::Relaxed),
        }
    }

    pub fn stream(&self) -> &Arc<SampleStream> {
        &self.stream
    }

    pub fn retention(&self) -> &Arc<RetentionBuffer> {
        &self.retention
    }

    pub fn output(&self) -> &Arc<OutputQueue> {
        &self.output
    }

    pub fn counters(&self) -> &Arc<PipelineCounters> {
        &self.counters
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        // Workers also exit when the sender disappears; sending first makes
        // the intent explicit for tasks mid-sleep.
        let _ = self.shutdown_tx.send(());
    }
}
