use crate::protocol::DataMessage;
use crate::types::{MacAddress, Topology};

use super::dedup::DuplicateCache;

#[derive(Debug, Clone, PartialEq)]
pub enum RelayDecision {
    /// Already seen inside the suppression window.
    Duplicate,
    /// First sighting. `forward` holds the copy to re-broadcast, if any.
    Accept { forward: Option<DataMessage> },
}

/// Hop-budget flooding gated by the duplicate cache.
#[derive(Debug)]
pub struct FloodRelay<const N: usize> {
    seen: DuplicateCache<N>,
    topology: Topology,
    initial_hop_budget: u8,
}

impl<const N: usize> FloodRelay<N> {
    pub fn new(topology: Topology, initial_hop_budget: u8, window_ms: u64) -> Self {
        Self {
            seen: DuplicateCache::new(window_ms),
            topology,
            // An originated frame with budget zero would look like a spent relay copy
            initial_hop_budget: initial_hop_budget.max(1),
        }
    }

    /// Record a locally originated frame so echoes from neighbors are suppressed. Returns the
    /// hop budget the frame must carry.
    pub fn originate(&mut self, originator: &MacAddress, sequence: u32, now: u64) -> u8 {
        self.seen.insert(*originator, sequence, now);
        self.initial_hop_budget
    }

    pub fn process(&mut self, message: &DataMessage, now: u64) -> RelayDecision {
        if !self
            .seen
            .check_and_insert(&message.originator, message.sequence, now)
        {
            return RelayDecision::Duplicate;
        }

        RelayDecision::Accept {
            forward: self.next_hop(message),
        }
    }

    /// The copy a relay re-broadcasts: same originator and sequence, one hop less.
    pub fn next_hop(&self, message: &DataMessage) -> Option<DataMessage> {
        if self.topology != Topology::Flood || message.hop_budget <= 1 {
            return None;
        }

        let mut forward = message.clone();
        forward.hop_budget = message.hop_budget - 1;
        Some(forward)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::source_id_from_str;

    const A: MacAddress = [0x02, 0, 0, 0, 0, 0x0A];

    fn data(hop_budget: u8, sequence: u32) -> DataMessage {
        DataMessage {
            hop_budget,
            originator: A,
            source_id: source_id_from_str("sensor-a"),
            temperature: 21.0,
            humidity: -1.0,
            co2: -1.0,
            sequence,
        }
    }

    #[test]
    fn test_forward_decrements_hop_budget() {
        let mut relay = FloodRelay::<30>::new(Topology::Flood, 4, 60_000);

        match relay.process(&data(4, 5), 0) {
            RelayDecision::Accept { forward: Some(copy) } => {
                assert_eq!(copy.hop_budget, 3);
                assert_eq!(copy.originator, A);
                assert_eq!(copy.sequence, 5);
                assert_eq!(copy.source_id.as_str(), "sensor-a");
            }
            other => panic!("unexpected decision {:?}", other),
        }

        assert_eq!(relay.process(&data(3, 5), 10), RelayDecision::Duplicate);
    }

    #[test]
    fn test_last_hop_is_not_forwarded() {
        let mut relay = FloodRelay::<30>::new(Topology::Flood, 4, 60_000);
        assert_eq!(
            relay.process(&data(1, 1), 0),
            RelayDecision::Accept { forward: None }
        );
        assert_eq!(
            relay.process(&data(0, 2), 0),
            RelayDecision::Accept { forward: None }
        );
    }

    #[test]
    fn test_star_never_forwards() {
        let mut relay = FloodRelay::<30>::new(Topology::Star, 4, 60_000);
        assert_eq!(
            relay.process(&data(4, 1), 0),
            RelayDecision::Accept { forward: None }
        );
    }

    #[test]
    fn test_originate_suppresses_echo() {
        let mut relay = FloodRelay::<30>::new(Topology::Flood, 0, 60_000);
        let budget = relay.originate(&A, 9, 1000);

        assert_eq!(budget, 1);
        assert_eq!(relay.process(&data(3, 9), 1500), RelayDecision::Duplicate);
    }

    #[test]
    fn test_accepted_again_after_window() {
        let mut relay = FloodRelay::<30>::new(Topology::Flood, 4, 60_000);
        assert!(matches!(relay.process(&data(2, 1), 0), RelayDecision::Accept { .. }));
        assert!(matches!(relay.process(&data(2, 1), 60_000), RelayDecision::Accept { .. }));
    }
}
