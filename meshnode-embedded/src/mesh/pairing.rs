use serde::Serialize;

use crate::protocol::DiscoveryMessage;
use crate::types::{MacAddress, MacDisplay};

use super::beacon::{GatewayCandidate, GatewaySelector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingState {
    #[default]
    NotPaired,
    Pairing,
    Paired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryStatus {
    /// No discovery window open.
    #[default]
    Idle,
    Searching,
    Found,
    TimedOut,
}

/// Bounded discovery wait, resolved by polling instead of sleeping.
#[derive(Debug, Clone, Copy, Default)]
struct DiscoveryWindow {
    deadline: Option<u64>,
    status: DiscoveryStatus,
}

/// Sensor-side pairing: which gateway to trust and how far the handshake got.
#[derive(Debug)]
pub struct PairingMachine {
    state: PairingState,
    candidate: Option<GatewayCandidate>,
    selector: GatewaySelector,
    /// Minimum spacing between requests to the same candidate.
    request_interval_ms: u64,
    last_request_at: Option<u64>,
    discovery: DiscoveryWindow,
    last_discovery_attempt: u64,
    regressions: u32,
}

impl PairingMachine {
    pub fn new(selector: GatewaySelector, request_interval_ms: u64) -> Self {
        Self {
            state: PairingState::NotPaired,
            candidate: None,
            selector,
            request_interval_ms,
            last_request_at: None,
            discovery: DiscoveryWindow::default(),
            last_discovery_attempt: 0,
            regressions: 0,
        }
    }

    pub fn state(&self) -> PairingState {
        self.state
    }

    pub fn is_paired(&self) -> bool {
        self.state == PairingState::Paired
    }

    pub fn candidate(&self) -> Option<&GatewayCandidate> {
        self.candidate.as_ref()
    }

    /// The gateway unicasts should go to, only once the handshake completed.
    pub fn gateway(&self) -> Option<&GatewayCandidate> {
        match self.state {
            PairingState::Paired => self.candidate.as_ref(),
            _ => None,
        }
    }

    pub fn regressions(&self) -> u32 {
        self.regressions
    }

    /// Feed a received beacon. Returns the adopted candidate when a pairing request should go
    /// out; the machine is then in `Pairing`.
    ///
    /// While `Pairing`, a beacon from the pending candidate repeats the request, at most once per
    /// request interval.
    pub fn on_beacon(&mut self, from: MacAddress, beacon: &DiscoveryMessage, now: u64) -> Option<GatewayCandidate> {
        if self.state == PairingState::Pairing && self.candidate.is_some_and(|c| c.address == from) {
            let recent = self
                .last_request_at
                .is_some_and(|at| now.saturating_sub(at) < self.request_interval_ms);
            if recent {
                return None;
            }

            let candidate = GatewayCandidate::from_beacon(from, beacon);
            log::debug!("Repeating pairing request to {}", MacDisplay(&from));
            self.candidate = Some(candidate);
            self.last_request_at = Some(now);
            return Some(candidate);
        }

        let current = match self.state {
            PairingState::NotPaired => None,
            _ => self.candidate.map(|c| c.signal_strength),
        };
        let committed = self.state == PairingState::Paired;

        if !self.selector.prefers(current, committed, beacon.signal_strength) {
            log::trace!(
                "Beacon from {} ignored ({} dBm, current {:?})",
                MacDisplay(&from),
                beacon.signal_strength,
                current
            );
            return None;
        }

        let candidate = GatewayCandidate::from_beacon(from, beacon);
        log::info!(
            "Selected gateway {} ({} dBm, was {:?})",
            MacDisplay(&from),
            beacon.signal_strength,
            current
        );

        self.candidate = Some(candidate);
        self.state = PairingState::Pairing;
        self.last_request_at = Some(now);
        Some(candidate)
    }

    /// Accept an acknowledgement only from the node the request was meant for. Returns the
    /// candidate to register as neighbor; call [`confirm_paired`](Self::confirm_paired) once
    /// registration succeeded.
    pub fn on_ack(&self, from: &MacAddress) -> Option<GatewayCandidate> {
        if self.state != PairingState::Pairing {
            return None;
        }
        self.candidate.filter(|candidate| candidate.address == *from)
    }

    pub fn confirm_paired(&mut self) {
        if self.state == PairingState::Pairing {
            self.state = PairingState::Paired;
            if self.discovery.status == DiscoveryStatus::Searching {
                self.discovery.status = DiscoveryStatus::Found;
                self.discovery.deadline = None;
            }
        }
    }

    /// The gateway no longer knows us (typically it rebooted): start over.
    pub fn on_peer_unknown(&mut self) {
        if self.state != PairingState::NotPaired {
            log::warn!("Gateway not found, marking as unpaired");
            self.regressions += 1;
        }
        self.forget();
    }

    pub fn forget(&mut self) {
        self.state = PairingState::NotPaired;
        self.candidate = None;
        self.last_request_at = None;
    }

    /// Open a discovery window ending `timeout_ms` from `now`.
    pub fn start_discovery(&mut self, now: u64, timeout_ms: u64) {
        self.last_discovery_attempt = now;
        if self.is_paired() {
            self.discovery = DiscoveryWindow {
                deadline: None,
                status: DiscoveryStatus::Found,
            };
            return;
        }
        self.discovery = DiscoveryWindow {
            deadline: Some(now.saturating_add(timeout_ms)),
            status: DiscoveryStatus::Searching,
        };
    }

    /// Resolve the open discovery window against the clock.
    pub fn poll_discovery(&mut self, now: u64) -> DiscoveryStatus {
        if self.discovery.status == DiscoveryStatus::Searching {
            if self.is_paired() {
                self.discovery.status = DiscoveryStatus::Found;
                self.discovery.deadline = None;
            } else if self.discovery.deadline.is_some_and(|deadline| now >= deadline) {
                log::info!("Discovery timeout");
                self.discovery.status = DiscoveryStatus::TimedOut;
                self.discovery.deadline = None;
            }
        }
        self.discovery.status
    }

    pub fn discovery_status(&self) -> DiscoveryStatus {
        self.discovery.status
    }

    /// While unpaired, start a fresh discovery every `interval_ms`. Returns whether a retry began.
    pub fn retry_if_needed(&mut self, now: u64, interval_ms: u64, timeout_ms: u64) -> bool {
        if self.is_paired() {
            return false;
        }
        if now.saturating_sub(self.last_discovery_attempt) <= interval_ms {
            return false;
        }

        log::info!("Retrying discovery...");
        // A request that never got acknowledged is not worth waiting on
        self.forget();
        self.start_discovery(now, timeout_ms);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beacon(signal_strength: i8) -> DiscoveryMessage {
        DiscoveryMessage {
            device_id: 1,
            sender_address: [0; 6],
            channel: 1,
            signal_strength,
            timestamp: 0,
        }
    }

    fn gw(i: u8) -> MacAddress {
        [0x24, 0x6F, 0x28, 0, 0, i]
    }

    fn machine() -> PairingMachine {
        PairingMachine::new(GatewaySelector::new(10), 2000)
    }

    fn pair_with(machine: &mut PairingMachine, address: MacAddress, signal: i8) {
        machine.on_beacon(address, &beacon(signal), 0).unwrap();
        assert!(machine.on_ack(&address).is_some());
        machine.confirm_paired();
        assert!(machine.is_paired());
    }

    #[test]
    fn test_first_beacon_starts_pairing() {
        let mut m = machine();
        let candidate = m.on_beacon(gw(1), &beacon(-80), 0).unwrap();

        assert_eq!(candidate.address, gw(1));
        assert_eq!(m.state(), PairingState::Pairing);
        assert!(m.gateway().is_none());
    }

    #[test]
    fn test_ack_only_from_candidate() {
        let mut m = machine();
        m.on_beacon(gw(1), &beacon(-60), 0).unwrap();

        assert!(m.on_ack(&gw(2)).is_none());
        assert_eq!(m.state(), PairingState::Pairing);

        let accepted = m.on_ack(&gw(1)).unwrap();
        assert_eq!(accepted.address, gw(1));
        m.confirm_paired();
        assert_eq!(m.state(), PairingState::Paired);
        assert_eq!(m.gateway().unwrap().address, gw(1));
    }

    #[test]
    fn test_ack_ignored_when_not_pairing() {
        let mut m = machine();
        assert!(m.on_ack(&gw(1)).is_none());
        m.confirm_paired();
        assert_eq!(m.state(), PairingState::NotPaired);
    }

    #[test]
    fn test_convergence_tracks_strongest_beacon() {
        let mut m = machine();
        pair_with(&mut m, gw(0), -90);

        let mut signal = -90i8;
        for i in 1..6u8 {
            signal += 11;
            let candidate = m.on_beacon(gw(i), &beacon(signal), 0).unwrap();
            assert_eq!(candidate.address, gw(i));
            assert!(m.on_ack(&gw(i)).is_some());
            m.confirm_paired();
            assert_eq!(m.gateway().unwrap().address, gw(i));
            assert_eq!(m.gateway().unwrap().signal_strength, signal);
        }
    }

    #[test]
    fn test_hysteresis_keeps_current_gateway() {
        let mut m = machine();
        pair_with(&mut m, gw(1), -70);

        assert!(m.on_beacon(gw(2), &beacon(-65), 0).is_none());
        assert!(m.on_beacon(gw(2), &beacon(-60), 0).is_none());
        assert!(m.on_beacon(gw(2), &beacon(-75), 0).is_none());
        assert_eq!(m.state(), PairingState::Paired);
        assert_eq!(m.gateway().unwrap().address, gw(1));
    }

    #[test]
    fn test_pairing_prefers_strictly_stronger() {
        let mut m = machine();
        m.on_beacon(gw(1), &beacon(-70), 0).unwrap();

        assert!(m.on_beacon(gw(2), &beacon(-70), 0).is_none());
        assert!(m.on_beacon(gw(2), &beacon(-80), 0).is_none());
        assert_eq!(m.candidate().unwrap().address, gw(1));

        m.on_beacon(gw(2), &beacon(-69), 0).unwrap();
        assert_eq!(m.candidate().unwrap().address, gw(2));
        // The old candidate's late ack no longer counts
        assert!(m.on_ack(&gw(1)).is_none());
    }

    #[test]
    fn test_candidate_beacon_repeats_request() {
        let mut m = machine();
        m.on_beacon(gw(1), &beacon(-70), 1000).unwrap();

        // Same candidate, too soon
        assert!(m.on_beacon(gw(1), &beacon(-70), 2999).is_none());

        let again = m.on_beacon(gw(1), &beacon(-72), 3000).unwrap();
        assert_eq!(again.address, gw(1));
        assert_eq!(again.signal_strength, -72);
        assert_eq!(m.state(), PairingState::Pairing);

        assert!(m.on_beacon(gw(1), &beacon(-72), 4000).is_none());
        assert!(m.on_beacon(gw(1), &beacon(-72), 5000).is_some());

        // Another gateway still has to be strictly stronger
        assert!(m.on_beacon(gw(2), &beacon(-72), 9000).is_none());
        assert_eq!(m.candidate().unwrap().address, gw(1));
    }

    #[test]
    fn test_paired_gateway_beacon_sends_nothing() {
        let mut m = machine();
        pair_with(&mut m, gw(1), -60);
        assert!(m.on_beacon(gw(1), &beacon(-60), 10_000).is_none());
        assert!(m.is_paired());
    }

    #[test]
    fn test_peer_unknown_regresses() {
        let mut m = machine();
        pair_with(&mut m, gw(1), -50);

        m.on_peer_unknown();
        assert_eq!(m.state(), PairingState::NotPaired);
        assert!(m.candidate().is_none());
        assert_eq!(m.regressions(), 1);

        // Any beacon is acceptable again, even a weaker one
        assert!(m.on_beacon(gw(2), &beacon(-95), 0).is_some());
    }

    #[test]
    fn test_discovery_window_times_out() {
        let mut m = machine();
        assert_eq!(m.discovery_status(), DiscoveryStatus::Idle);

        m.start_discovery(1000, 15_000);
        assert_eq!(m.poll_discovery(15_999), DiscoveryStatus::Searching);
        assert_eq!(m.poll_discovery(16_000), DiscoveryStatus::TimedOut);
        assert_eq!(m.poll_discovery(20_000), DiscoveryStatus::TimedOut);
    }

    #[test]
    fn test_discovery_window_found() {
        let mut m = machine();
        m.start_discovery(0, 15_000);
        pair_with(&mut m, gw(1), -60);
        assert_eq!(m.poll_discovery(100_000), DiscoveryStatus::Found);
    }

    #[test]
    fn test_retry_only_while_unpaired() {
        let mut m = machine();
        m.start_discovery(0, 15_000);

        assert!(!m.retry_if_needed(30_000, 30_000, 15_000));
        m.on_beacon(gw(1), &beacon(-60), 0).unwrap();
        assert!(m.retry_if_needed(30_001, 30_000, 15_000));
        assert_eq!(m.state(), PairingState::NotPaired);
        assert_eq!(m.discovery_status(), DiscoveryStatus::Searching);

        pair_with(&mut m, gw(1), -60);
        assert!(!m.retry_if_needed(120_000, 30_000, 15_000));
        assert!(m.is_paired());
    }
}
