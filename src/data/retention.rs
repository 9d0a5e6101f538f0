//! Recorded history of samples evicted while recording was enabled.

use crate::core::Sample;
use crossbeam_queue::SegQueue;

/// Append-only, lock-free store of recorded samples.
///
/// Samples arrive in eviction order, which is their original insertion order.
/// Exporting the history is left to the caller through [`drain`](Self::drain).
#[derive(Debug, Default)]
pub struct RetentionBuffer {
    samples: SegQueue<Sample>,
}

impl RetentionBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, sample: Sample) {
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Moves every recorded sample out, oldest first.
    ///
    /// Samples pushed concurrently may or may not be included; none is lost.
    pub fn drain(&self) -> Vec<Sample> {
        let mut out = Vec::with_capacity(self.samples.len());
        while let Some(sample) = self.samples.pop() {
            out.push(sample);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Vector3;

    #[test]
    fn test_drain_preserves_order() {
        let buffer = RetentionBuffer::new();
        for i in 0..5 {
            buffer.push(Sample::now(Vector3::new(0.0, i as f64, 0.0)));
        }
        assert_eq!(buffer.len(), 5);

        let drained: Vec<f64> = buffer.drain().iter().map(|s| s.vector.y).collect();
        assert_eq!(drained, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert!(buffer.is_empty());
    }
}
