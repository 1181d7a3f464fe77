use crate::protocol::DiscoveryMessage;
use crate::types::MacAddress;

/// Signal strength advertised when a node has no better estimate.
pub const NEUTRAL_SIGNAL_STRENGTH: i8 = -50;

/// Rate limiter for periodic beacons.
#[derive(Debug, Clone)]
pub struct BeaconScheduler {
    interval_ms: u64,
    last_sent: Option<u64>,
}

impl BeaconScheduler {
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            last_sent: None,
        }
    }

    pub fn is_due(&self, now: u64) -> bool {
        match self.last_sent {
            Some(last) => now.saturating_sub(last) >= self.interval_ms,
            None => true,
        }
    }

    pub fn mark_sent(&mut self, now: u64) {
        self.last_sent = Some(now);
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

/// The neighbor a sensor is currently pairing with or paired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GatewayCandidate {
    pub address: MacAddress,
    pub signal_strength: i8,
    pub channel: u8,
}

impl GatewayCandidate {
    pub fn from_beacon(address: MacAddress, beacon: &DiscoveryMessage) -> Self {
        Self {
            address,
            signal_strength: beacon.signal_strength,
            channel: beacon.channel,
        }
    }
}

/// Decides whether an offered signal strength should replace the current selection.
///
/// With nothing selected anything wins. While a selection is tentative a strictly stronger
/// offer wins. Once committed the offer must beat the current one by more than the margin.
#[derive(Debug, Clone, Copy)]
pub struct GatewaySelector {
    hysteresis_db: i16,
}

impl GatewaySelector {
    pub fn new(hysteresis_db: u8) -> Self {
        Self {
            hysteresis_db: hysteresis_db as i16,
        }
    }

    pub fn prefers(&self, current: Option<i8>, committed: bool, offered: i8) -> bool {
        let Some(current) = current else {
            return true;
        };
        let (current, offered) = (current as i16, offered as i16);

        if committed {
            offered > current + self.hysteresis_db
        } else {
            offered > current
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_rate_limits() {
        let mut scheduler = BeaconScheduler::new(2000);
        assert!(scheduler.is_due(0));

        scheduler.mark_sent(0);
        assert!(!scheduler.is_due(1999));
        assert!(scheduler.is_due(2000));

        scheduler.mark_sent(2500);
        assert!(!scheduler.is_due(4000));
        assert!(scheduler.is_due(4500));

        scheduler.reset();
        assert!(scheduler.is_due(4501));
    }

    #[test]
    fn test_selector_without_selection() {
        let selector = GatewaySelector::new(10);
        assert!(selector.prefers(None, false, -120));
        assert!(selector.prefers(None, true, -120));
    }

    #[test]
    fn test_selector_tentative_needs_strictly_better() {
        let selector = GatewaySelector::new(10);
        assert!(!selector.prefers(Some(-60), false, -60));
        assert!(!selector.prefers(Some(-60), false, -70));
        assert!(selector.prefers(Some(-60), false, -59));
    }

    #[test]
    fn test_selector_hysteresis_when_committed() {
        let selector = GatewaySelector::new(10);
        assert!(!selector.prefers(Some(-70), true, -65));
        assert!(!selector.prefers(Some(-70), true, -60));
        assert!(selector.prefers(Some(-70), true, -59));

        // No overflow at the edges of the i8 range
        assert!(!selector.prefers(Some(120), true, 127));
        assert!(selector.prefers(Some(-128), true, 127));
    }
}
