//! Background eviction of the live buffer.
//!
//! The worker alternates between two states:
//!
//! - **Draining**: the live buffer holds more than `window_size` samples. The
//!   oldest sample is popped and, if recording is on at that moment, moved into
//!   the recorded history; otherwise it is dropped.
//! - **Idle**: the buffer is at or below the threshold. The worker sleeps for
//!   the cleanup interval and checks again.
//!
//! `window_size` and `recording` are re-read for every sample, so a smaller
//! window or a recording toggle takes effect mid-drain.

use super::control::PipelineControl;
use super::PipelineCounters;
use crate::data::retention::RetentionBuffer;
use crate::data::sample_stream::SampleStream;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Keeps the live buffer at or below the window size.
pub struct CleanupWorker {
    stream: Arc<SampleStream>,
    retention: Arc<RetentionBuffer>,
    control: Arc<PipelineControl>,
    counters: Arc<PipelineCounters>,
    interval: Duration,
}

/// Outcome of one draining pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Samples moved into the recorded history.
    pub retained: usize,
    /// Samples dropped because recording was off.
    pub discarded: usize,
}

impl DrainReport {
    /// Samples removed from the live buffer in this pass.
    pub fn evicted(&self) -> usize {
        self.retained + self.discarded
    }
}

impl CleanupWorker {
    pub fn new(
        stream: Arc<SampleStream>,
        retention: Arc<RetentionBuffer>,
        control: Arc<PipelineControl>,
        counters: Arc<PipelineCounters>,
        interval: Duration,
    ) -> Self {
        Self {
            stream,
            retention,
            control,
            counters,
            interval,
        }
    }

    /// Evicts samples until the live buffer is at or below the window size.
    pub fn drain_overflow(&self) -> DrainReport {
        let mut report = DrainReport::default();

        while self.stream.len() > self.control.window_size() {
            // Another consumer may have emptied the stream since the length
            // check; just look again.
            let Some(sample) = self.stream.pop_front() else {
                continue;
            };

            if self.control.recording() {
                self.retention.push(sample);
                report.retained += 1;
            } else {
                report.discarded += 1;
            }
        }

        self.counters
            .samples_evicted
            .fetch_add(report.evicted() as u64, Ordering::Relaxed);
        self.counters
            .samples_discarded
            .fetch_add(report.discarded as u64, Ordering::Relaxed);
        report
    }

    /// Runs until a shutdown signal arrives or the sender is dropped.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(interval = ?self.interval, "Cleanup worker started");

        loop {
            let report = self.drain_overflow();
            if report.evicted() > 0 {
                debug!(
                    retained = report.retained,
                    discarded = report.discarded,
                    live = self.stream.len(),
                    "Evicted samples from live buffer"
                );
            }

            tokio::select! {
                _ = shutdown_rx.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("Cleanup worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Sample, Vector3};
    use crate::pipeline::control::PipelineConfig;

    struct Fixture {
        stream: Arc<SampleStream>,
        retention: Arc<RetentionBuffer>,
        control: Arc<PipelineControl>,
        worker: CleanupWorker,
    }

    fn fixture(window_size: usize, recording: bool) -> Fixture {
        let stream = Arc::new(SampleStream::new());
        let retention = Arc::new(RetentionBuffer::new());
        let control = Arc::new(
            PipelineControl::new(PipelineConfig {
                window_size,
                recording,
                ..PipelineConfig::default()
            })
            .unwrap(),
        );
        let worker = CleanupWorker::new(
            Arc::clone(&stream),
            Arc::clone(&retention),
            Arc::clone(&control),
            Arc::new(PipelineCounters::default()),
            Duration::from_millis(5),
        );
        Fixture {
            stream,
            retention,
            control,
            worker,
        }
    }

    fn push_sequence(stream: &SampleStream, range: std::ops::Range<usize>) {
        for i in range {
            stream.push(Sample::now(Vector3::new(i as f64, 0.0, 0.0)));
        }
    }

    #[test]
    fn test_drain_discards_when_not_recording() {
        let f = fixture(256, false);
        push_sequence(&f.stream, 0..300);

        let report = f.worker.drain_overflow();
        assert_eq!(
            report,
            DrainReport {
                retained: 0,
                discarded: 44
            }
        );
        assert_eq!(f.stream.len(), 256);
        assert_eq!(f.retention.len(), 0);
        // The oldest samples are the ones evicted.
        assert_eq!(
            f.stream.snapshot_recent(256).last().map(|s| s.vector.x),
            Some(44.0)
        );
    }

    #[test]
    fn test_drain_retains_in_order_when_recording() {
        let f = fixture(256, true);
        push_sequence(&f.stream, 0..300);

        let report = f.worker.drain_overflow();
        assert_eq!(report.retained, 44);
        assert_eq!(f.stream.len(), 256);

        let kept: Vec<f64> = f.retention.drain().iter().map(|s| s.vector.x).collect();
        assert_eq!(kept, (0..44).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[test]
    fn test_under_threshold_is_noop() {
        let f = fixture(256, true);
        push_sequence(&f.stream, 0..256);
        assert_eq!(f.worker.drain_overflow().evicted(), 0);
        assert_eq!(f.stream.len(), 256);
    }

    #[test]
    fn test_shrinking_window_converges() {
        let f = fixture(256, false);
        push_sequence(&f.stream, 0..256);
        f.worker.drain_overflow();

        f.control.set_window_size(128).unwrap();
        f.worker.drain_overflow();
        assert_eq!(f.stream.len(), 128);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let f = fixture(16, false);
        push_sequence(&f.stream, 0..64);

        let (tx, rx) = broadcast::channel(1);
        let handle = tokio::spawn(f.worker.run(rx));

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(f.stream.len(), 16);

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("worker did not stop")
            .unwrap();
    }
}
