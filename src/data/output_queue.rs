//! Hand-off queue between the spectrum worker and the presentation layer.

use crate::core::SpectrumPacket;
use crossbeam_queue::SegQueue;

/// Lock-free FIFO of computed spectrum packets.
///
/// The queue does not bound itself; the spectrum worker throttles before it
/// publishes a cycle so the consumer never falls far behind.
#[derive(Debug, Default)]
pub struct OutputQueue {
    packets: SegQueue<SpectrumPacket>,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, packet: SpectrumPacket) {
        self.packets.push(packet);
    }

    /// Non-blocking take of the oldest packet.
    pub fn try_pop(&self) -> Option<SpectrumPacket> {
        self.packets.pop()
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Axis;

    #[test]
    fn test_packets_come_out_in_publish_order() {
        let queue = OutputQueue::new();
        for axis in Axis::ALL {
            queue.push(SpectrumPacket::from_parts(axis, &[0.0], &[0.0]));
        }
        assert_eq!(queue.len(), 3);

        let axes: Vec<Axis> = std::iter::from_fn(|| queue.try_pop()).map(|p| p.axis).collect();
        assert_eq!(axes, Axis::ALL.to_vec());
        assert!(queue.is_empty());
    }
}
