use heapless::spsc::Queue;

use crate::protocol::DataMessage;
use crate::types::{MacAddress, SensorReading, SourceId};
use crate::{Error, Result};

/// A data frame accepted by a gateway, ready for the application.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDelivery {
    /// Neighbor the frame was heard from.
    pub link_source: MacAddress,
    pub originator: MacAddress,
    pub source_id: SourceId,
    pub reading: SensorReading,
    pub sequence: u32,
    /// Budget left on arrival.
    pub hop_budget: u8,
    pub received_at: u64,
}

impl MeshDelivery {
    pub fn from_message(link_source: MacAddress, message: &DataMessage, received_at: u64) -> Self {
        Self {
            link_source,
            originator: message.originator,
            source_id: message.source_id.clone(),
            reading: SensorReading {
                temperature: message.temperature,
                humidity: message.humidity,
                co2: message.co2,
            },
            sequence: message.sequence,
            hop_budget: message.hop_budget,
            received_at,
        }
    }
}

/// Lock-free ring between the receive path and the main loop. One slot always stays empty, so
/// `N` slots hold `N - 1` items.
pub struct HandoffBuffer<T, const N: usize> {
    queue: Queue<T, N>,
}

impl<T, const N: usize> HandoffBuffer<T, N> {
    pub const fn new() -> Self {
        Self {
            queue: Queue::new(),
        }
    }

    /// Enqueue without blocking. A full ring drops `item`.
    pub fn push(&mut self, item: T) -> Result<()> {
        self.queue.enqueue(item).map_err(|_| Error::HandoffFull)
    }

    pub fn pop(&mut self) -> Option<T> {
        self.queue.dequeue()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.queue.is_full()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl<T, const N: usize> Default for HandoffBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_slot_stays_empty() {
        let mut buffer = HandoffBuffer::<u32, 10>::new();
        assert_eq!(buffer.capacity(), 9);

        for i in 0..9 {
            assert!(buffer.push(i).is_ok());
        }
        assert!(buffer.is_full());
        assert_eq!(buffer.push(9), Err(Error::HandoffFull));
        assert_eq!(buffer.len(), 9);

        // Oldest items survive, the newest was dropped
        for i in 0..9 {
            assert_eq!(buffer.pop(), Some(i));
        }
        assert!(buffer.pop().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_drained_ring_accepts_again() {
        let mut buffer = HandoffBuffer::<u32, 4>::new();
        for round in 0..3 {
            for i in 0..3 {
                buffer.push(round * 10 + i).unwrap();
            }
            assert!(buffer.push(99).is_err());
            while buffer.pop().is_some() {}
        }
        assert!(buffer.is_empty());
    }
}
