//! Core data types for the magnetometer pipeline.
//!
//! Samples flow in from the sensor collaborator, spectrum packets flow out to
//! the presentation layer. Everything here is plain data: immutable once built,
//! cheap to move between the pipeline's queues.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 3-axis magnetic field reading.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vector3 {
    /// Creates a new vector from its three components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Returns the scalar component for `axis`.
    pub fn component(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
        }
    }
}

/// A single timestamped reading captured from the sensor.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// The field reading.
    pub vector: Vector3,
}

impl Sample {
    /// Pairs a reading with the time it was taken.
    pub fn new(timestamp: DateTime<Utc>, vector: Vector3) -> Self {
        Self { timestamp, vector }
    }

    /// Stamps `vector` with the current wall-clock time.
    pub fn now(vector: Vector3) -> Self {
        Self::new(Utc::now(), vector)
    }
}

/// Measurement axis of the magnetometer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in processing order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Axis::X => "X",
            Axis::Y => "Y",
            Axis::Z => "Z",
        };
        f.write_str(name)
    }
}

/// One frequency bin of a power spectrum.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrumBin {
    /// Power in dB, never below the display floor.
    pub power: f64,
    /// Bin centre frequency in Hz.
    pub frequency: f64,
}

/// The spectrum of one axis for one pipeline cycle.
///
/// `bins[i]` is frequency bin `i` of the transform; the order is never changed
/// after construction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpectrumPacket {
    pub axis: Axis,
    pub bins: Vec<SpectrumBin>,
}

impl SpectrumPacket {
    /// Zips aligned power and frequency arrays into a packet.
    ///
    /// Extra trailing entries in the longer array are dropped.
    pub fn from_parts(axis: Axis, power: &[f64], frequency: &[f64]) -> Self {
        let bins = power
            .iter()
            .zip(frequency.iter())
            .map(|(&power, &frequency)| SpectrumBin { power, frequency })
            .collect();
        Self { axis, bins }
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// The bin with the highest power, ignoring the DC bin.
    pub fn peak(&self) -> Option<SpectrumBin> {
        self.bins
            .iter()
            .skip(1)
            .copied()
            .max_by(|a, b| a.power.total_cmp(&b.power))
    }
}

/// Point-in-time counters describing pipeline activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Samples currently held in the live buffer.
    pub live_samples: usize,
    /// Samples currently held in the recorded history.
    pub retained_samples: usize,
    /// Packets waiting for the consumer.
    pub pending_packets: usize,
    /// Samples accepted through ingress since start.
    pub samples_submitted: u64,
    /// Samples evicted from the live buffer, retained or not.
    pub samples_evicted: u64,
    /// Evicted samples that were dropped because recording was off.
    pub samples_discarded: u64,
    /// Spectrum packets published to the output queue.
    pub packets_emitted: u64,
    /// Completed spectrum cycles while running.
    pub cycles: u64,
    /// Axis computations skipped for lack of samples.
    pub insufficient_data: u64,
    /// Axis computations skipped after a numeric or filter failure.
    pub numeric_failures: u64,
}

impl PipelineStats {
    /// Live plus recorded samples.
    pub fn total_samples(&self) -> usize {
        self.live_samples + self.retained_samples
    }
}
