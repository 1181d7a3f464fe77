use alloc::boxed::Box;
use alloc::format;

use embedded_hal::delay::DelayNs;
use rand_core::RngCore;

use crate::config::{MeshSettings, NodeConfig};
use crate::protocol::{DataMessage, DiscoveryMessage, MeshMessage, MessageValidator};
use crate::status::{MeshStats, MeshStatus};
use crate::time::TimeProvider;
use crate::transport::{Radio, RadioError, SendStatus};
use crate::types::{
    BROADCAST_ADDRESS, MacAddress, MacDisplay, Role, Topology, is_valid_channel, source_id_from_str,
};
use crate::{Error, Result};

use super::beacon::{BeaconScheduler, GatewayCandidate, GatewaySelector, NEUTRAL_SIGNAL_STRENGTH};
use super::handoff::{HandoffBuffer, MeshDelivery};
use super::pairing::{DiscoveryStatus, PairingMachine, PairingState};
use super::peers::{PeerTable, PeerUpdate};
use super::relay::{FloodRelay, RelayDecision};
use super::{HANDOFF_SLOTS, MAX_PEERS, SEEN_PACKET_CAPACITY};

pub type DataCallback = Box<dyn FnMut(&MeshDelivery)>;

/// Owns the whole mesh protocol state of one node.
///
/// Radio glue feeds [`on_receive`](Self::on_receive) and
/// [`on_send_complete`](Self::on_send_complete); the main loop calls [`update`](Self::update)
/// periodically, which is the only place the data callback runs.
pub struct MeshManager<R, T, G, D> {
    radio: R,
    clock: T,
    rng: G,
    delay: D,
    settings: MeshSettings,
    configured: bool,
    force_role: Option<Role>,
    enabled: bool,
    role: Option<Role>,
    channel: u8,
    local_address: MacAddress,
    device_id: u8,
    sequence: u32,
    peers: PeerTable<MAX_PEERS>,
    relay: FloodRelay<SEEN_PACKET_CAPACITY>,
    pairing: PairingMachine,
    beacons: BeaconScheduler,
    last_peer_sweep: u64,
    handoff: HandoffBuffer<MeshDelivery, HANDOFF_SLOTS>,
    callback: Option<DataCallback>,
    stats: MeshStats,
}

impl<R, T, G, D> MeshManager<R, T, G, D>
where
    R: Radio,
    T: TimeProvider,
    G: RngCore,
    D: DelayNs,
{
    pub fn new(radio: R, clock: T, rng: G, delay: D, config: &NodeConfig) -> Self {
        let settings = config.mesh;
        Self {
            radio,
            clock,
            rng,
            delay,
            settings,
            configured: config.enabled,
            force_role: config.force_role,
            enabled: false,
            role: None,
            channel: config.channel,
            local_address: [0; 6],
            device_id: 0,
            sequence: 0,
            peers: PeerTable::new(),
            relay: FloodRelay::new(
                settings.topology,
                settings.initial_hop_budget,
                settings.duplicate_window_ms,
            ),
            pairing: PairingMachine::new(
                GatewaySelector::new(settings.hysteresis_db),
                settings.beacon_interval_ms,
            ),
            beacons: BeaconScheduler::new(settings.beacon_interval_ms),
            last_peer_sweep: 0,
            handoff: HandoffBuffer::new(),
            callback: None,
            stats: MeshStats::default(),
        }
    }

    /// Bring the mesh up in `role` on `channel`. An invalid channel leaves the mesh disabled.
    pub fn init(&mut self, role: Role, channel: u8) -> Result<()> {
        if !is_valid_channel(channel) {
            log::error!("Invalid mesh channel {}, mesh disabled", channel);
            self.enabled = false;
            return Err(Error::InvalidChannel(channel));
        }

        if !self.configured {
            log::info!("Mesh disabled by configuration");
            self.enabled = false;
            return Ok(());
        }

        // Without an uplink nothing else tunes the radio
        if role == Role::Sensor {
            self.radio.set_channel(channel)?;
        }

        if !self.radio.has_neighbor(&BROADCAST_ADDRESS) {
            self.radio.add_neighbor(&BROADCAST_ADDRESS, channel)?;
        }

        let now = self.clock.uptime_ms();
        self.local_address = self.radio.local_address();
        self.device_id = self.local_address[5];
        self.role = Some(role);
        self.channel = channel;
        self.pairing = PairingMachine::new(
            GatewaySelector::new(self.settings.hysteresis_db),
            self.settings.beacon_interval_ms,
        );
        self.beacons.reset();
        self.last_peer_sweep = now;
        self.enabled = true;

        log::info!(
            "Mesh initialized as {} on channel {} ({}, {:?} topology)",
            role,
            channel,
            MacDisplay(&self.local_address),
            self.settings.topology
        );

        if role == Role::Sensor {
            self.pairing.start_discovery(now, self.settings.discovery_timeout_ms);
            log::info!("Starting gateway discovery...");
        }

        Ok(())
    }

    /// Periodic work: beacons, peer sweep, discovery deadlines and draining the hand-off ring.
    pub fn update(&mut self) {
        if !self.enabled {
            return;
        }
        let now = self.clock.uptime_ms();

        if self.should_beacon() && self.beacons.is_due(now) {
            self.send_beacon(now);
        }

        if now.saturating_sub(self.last_peer_sweep) >= self.settings.peer_sweep_interval_ms {
            self.sweep_peers(now);
            self.last_peer_sweep = now;
        }

        if self.role == Some(Role::Sensor) {
            self.pairing.poll_discovery(now);
            self.pairing.retry_if_needed(
                now,
                self.settings.retry_interval_ms,
                self.settings.discovery_timeout_ms,
            );
        }

        while let Some(delivery) = self.handoff.pop() {
            if let Some(callback) = self.callback.as_mut() {
                callback(&delivery);
            }
        }
    }

    /// Originate a reading. Returns the sequence number the frame carried.
    pub fn send(&mut self, temperature: f32, humidity: f32, co2: f32, source_id: &str) -> Result<u32> {
        if !self.enabled {
            return Err(Error::NotInitialized);
        }
        if self.role != Some(Role::Sensor) {
            return Err(Error::WrongRole);
        }
        if !self.pairing.is_paired() {
            return Err(Error::NotPaired);
        }

        let now = self.clock.uptime_ms();
        let sequence = self.sequence;
        self.sequence = self.sequence.wrapping_add(1);

        let message = MeshMessage::Data(DataMessage {
            hop_budget: self.relay.originate(&self.local_address, sequence, now),
            originator: self.local_address,
            source_id: source_id_from_str(source_id),
            temperature,
            humidity,
            co2,
            sequence,
        });
        let frame = message.encode();

        let result = match self.settings.topology {
            Topology::Flood => self.radio.broadcast(&frame),
            Topology::Star => {
                let gateway = self.pairing.gateway().map(|g| g.address).ok_or(Error::NotPaired)?;
                self.radio.send_to(&gateway, &frame)
            }
        };

        match result {
            Ok(()) => {
                log::debug!("Sent reading seq {} ({})", sequence, source_id);
                Ok(sequence)
            }
            Err(e) => {
                self.stats.send_failures = self.stats.send_failures.wrapping_add(1);
                if e == RadioError::PeerNotFound && self.settings.topology == Topology::Star {
                    self.pairing.on_peer_unknown();
                } else {
                    log::warn!("Failed to send reading seq {}: {}", sequence, e);
                }
                Err(e.into())
            }
        }
    }

    /// Entry point for every frame the radio receives.
    pub fn on_receive(&mut self, source: &MacAddress, bytes: &[u8]) {
        if !self.enabled || *source == self.local_address {
            return;
        }
        self.stats.frames_received = self.stats.frames_received.wrapping_add(1);

        let message = match MeshMessage::decode(bytes)
            .and_then(|m| MessageValidator::validate_message(&m).map(|_| m))
        {
            Ok(message) => message,
            Err(e) => {
                self.stats.malformed_dropped = self.stats.malformed_dropped.wrapping_add(1);
                log::debug!("Dropped frame from {}: {}", MacDisplay(source), e);
                return;
            }
        };

        match message {
            MeshMessage::Beacon(beacon) => self.handle_beacon(source, &beacon),
            MeshMessage::PairRequest(request) => self.handle_pair_request(source, &request),
            MeshMessage::PairAck(ack) => self.handle_pair_ack(source, &ack),
            MeshMessage::Data(data) => self.handle_data(source, &data),
        }
    }

    /// Entry point for the radio's send-complete notification.
    pub fn on_send_complete(&mut self, destination: &MacAddress, status: SendStatus) {
        match status {
            SendStatus::Success => log::trace!("Delivered to {}", MacDisplay(destination)),
            SendStatus::Failed => {
                self.stats.send_failures = self.stats.send_failures.wrapping_add(1);
                log::debug!("Send to {} failed", MacDisplay(destination));
            }
        }
    }

    pub fn set_data_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&MeshDelivery) + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Open a new discovery window now.
    pub fn start_discovery(&mut self) -> Result<()> {
        if !self.enabled {
            return Err(Error::NotInitialized);
        }
        if self.role != Some(Role::Sensor) {
            return Err(Error::WrongRole);
        }
        let now = self.clock.uptime_ms();
        self.pairing.start_discovery(now, self.settings.discovery_timeout_ms);
        Ok(())
    }

    pub fn discovery_status(&self) -> DiscoveryStatus {
        self.pairing.discovery_status()
    }

    /// Sensor pairing with a gateway completed. Always `false` for gateways.
    pub fn is_paired(&self) -> bool {
        self.pairing.is_paired()
    }

    pub fn pairing_state(&self) -> PairingState {
        self.pairing.state()
    }

    pub fn gateway(&self) -> Option<&GatewayCandidate> {
        self.pairing.gateway()
    }

    pub fn active_neighbor_count(&self) -> usize {
        self.peers.active_count()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn role(&self) -> Option<Role> {
        self.role
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn local_address(&self) -> MacAddress {
        self.local_address
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn stats(&self) -> MeshStats {
        MeshStats {
            pairing_regressions: self.pairing.regressions(),
            ..self.stats
        }
    }

    pub fn status(&self) -> MeshStatus {
        MeshStatus {
            enabled: self.enabled,
            role: self.role,
            force_role: self.force_role,
            mac: format!("{}", MacDisplay(&self.local_address)),
            channel: self.channel,
            paired: match self.role {
                Some(Role::Gateway) => true,
                _ => self.pairing.is_paired(),
            },
            peer_count: self.peers.active_count(),
            discovery: self.pairing.discovery_status(),
            stats: self.stats(),
        }
    }

    /// Gateways always beacon. Flood sensors beacon once paired, advertising their gateway's
    /// signal so downstream sensors can pair through them. Star sensors never beacon since
    /// nothing can pair with them.
    fn should_beacon(&self) -> bool {
        match (self.role, self.settings.topology) {
            (Some(Role::Gateway), _) => true,
            (Some(Role::Sensor), Topology::Flood) => self.pairing.is_paired(),
            _ => false,
        }
    }

    fn send_beacon(&mut self, now: u64) {
        let signal_strength = match self.role {
            Some(Role::Gateway) => self.radio.uplink_signal_strength(),
            _ => self.pairing.gateway().map(|g| g.signal_strength),
        }
        .unwrap_or(NEUTRAL_SIGNAL_STRENGTH);

        let beacon = MeshMessage::Beacon(self.discovery_body(signal_strength, now));
        if let Err(e) = self.radio.broadcast(&beacon.encode()) {
            self.stats.send_failures = self.stats.send_failures.wrapping_add(1);
            log::warn!("Failed to send beacon: {}", e);
        } else {
            log::trace!("Beacon sent ({} dBm)", signal_strength);
        }
        self.beacons.mark_sent(now);
    }

    fn sweep_peers(&mut self, now: u64) {
        for address in self.peers.reap_stale(now, self.settings.peer_timeout_ms) {
            log::info!("Peer {} timed out", MacDisplay(&address));
            if let Err(e) = self.radio.remove_neighbor(&address) {
                log::debug!("Failed to remove neighbor {}: {}", MacDisplay(&address), e);
            }
        }
    }

    fn handle_beacon(&mut self, source: &MacAddress, beacon: &DiscoveryMessage) {
        if self.role != Some(Role::Sensor) {
            return;
        }
        let now = self.clock.uptime_ms();
        if let Some(candidate) = self.pairing.on_beacon(*source, beacon, now) {
            self.request_pairing(&candidate);
        }
    }

    fn request_pairing(&mut self, candidate: &GatewayCandidate) {
        // Spread out requests from sensors that heard the same beacon
        let max_jitter = self.settings.pair_jitter_max_us;
        if max_jitter > 0 {
            let jitter = self.rng.next_u32() % max_jitter;
            self.delay.delay_us(jitter);
        }

        let now = self.clock.uptime_ms();
        let request = MeshMessage::PairRequest(self.discovery_body(candidate.signal_strength, now));

        // The candidate is not a registered neighbor yet
        match self.radio.broadcast(&request.encode()) {
            Ok(()) => log::info!("Pairing request sent to {}", MacDisplay(&candidate.address)),
            Err(e) => {
                self.stats.send_failures = self.stats.send_failures.wrapping_add(1);
                log::warn!("Failed to send pairing request: {}", e);
            }
        }
    }

    fn handle_pair_request(&mut self, source: &MacAddress, _request: &DiscoveryMessage) {
        let accepts = match (self.role, self.settings.topology) {
            (Some(Role::Gateway), _) => true,
            (Some(Role::Sensor), Topology::Flood) => true,
            _ => false,
        };
        if !accepts {
            return;
        }

        let now = self.clock.uptime_ms();
        match self.peers.upsert(source, now) {
            Ok(PeerUpdate::Inserted(_)) => log::info!("New peer {}", MacDisplay(source)),
            Ok(PeerUpdate::Refreshed(_)) => {}
            Err(e) => {
                log::warn!("Rejected pairing from {}: {}", MacDisplay(source), e);
                return;
            }
        }

        if !self.radio.has_neighbor(source) {
            if let Err(e) = self.radio.add_neighbor(source, self.channel) {
                log::warn!("Failed to add neighbor {}: {}", MacDisplay(source), e);
                return;
            }
        }

        let ack = MeshMessage::PairAck(self.discovery_body(NEUTRAL_SIGNAL_STRENGTH, now));
        match self.radio.send_to(source, &ack.encode()) {
            Ok(()) => log::debug!("Pairing ack sent to {}", MacDisplay(source)),
            Err(e) => {
                self.stats.send_failures = self.stats.send_failures.wrapping_add(1);
                log::warn!("Failed to ack {}: {}", MacDisplay(source), e);
            }
        }
    }

    fn handle_pair_ack(&mut self, source: &MacAddress, _ack: &DiscoveryMessage) {
        if self.role != Some(Role::Sensor) {
            return;
        }
        let Some(candidate) = self.pairing.on_ack(source) else {
            log::debug!("Ignoring pairing ack from {}", MacDisplay(source));
            return;
        };

        if !self.radio.has_neighbor(&candidate.address) {
            if let Err(e) = self.radio.add_neighbor(&candidate.address, self.channel) {
                log::warn!("Failed to add gateway {}: {}", MacDisplay(&candidate.address), e);
                return;
            }
        }

        self.pairing.confirm_paired();
        log::info!(
            "Paired with {} ({} dBm)",
            MacDisplay(&candidate.address),
            candidate.signal_strength
        );
    }

    fn handle_data(&mut self, source: &MacAddress, message: &DataMessage) {
        let now = self.clock.uptime_ms();

        let forward = match self.relay.process(message, now) {
            RelayDecision::Duplicate => {
                self.stats.duplicates_dropped = self.stats.duplicates_dropped.wrapping_add(1);
                log::trace!(
                    "Duplicate seq {} from {}",
                    message.sequence,
                    MacDisplay(&message.originator)
                );
                return;
            }
            RelayDecision::Accept { forward } => forward,
        };

        self.peers.touch(source, now);

        if self.role == Some(Role::Gateway) {
            self.queue_delivery(source, message, now);
        }

        if let Some(copy) = forward {
            let hop_budget = copy.hop_budget;
            match self.radio.broadcast(&MeshMessage::Data(copy).encode()) {
                Ok(()) => {
                    self.stats.frames_forwarded = self.stats.frames_forwarded.wrapping_add(1);
                    log::debug!(
                        "Forwarded seq {} from {} (hops left {})",
                        message.sequence,
                        MacDisplay(&message.originator),
                        hop_budget
                    );
                }
                Err(e) => {
                    self.stats.send_failures = self.stats.send_failures.wrapping_add(1);
                    log::warn!("Failed to forward: {}", e);
                }
            }
        }
    }

    fn queue_delivery(&mut self, source: &MacAddress, message: &DataMessage, now: u64) {
        if self.callback.is_none() {
            return;
        }

        match self.handoff.push(MeshDelivery::from_message(*source, message, now)) {
            Ok(()) => self.stats.deliveries_queued = self.stats.deliveries_queued.wrapping_add(1),
            Err(_) => {
                self.stats.handoff_overflows = self.stats.handoff_overflows.wrapping_add(1);
                log::warn!("Hand-off buffer full, dropping seq {}", message.sequence);
            }
        }
    }

    fn discovery_body(&self, signal_strength: i8, now: u64) -> DiscoveryMessage {
        DiscoveryMessage {
            device_id: self.device_id,
            sender_address: self.local_address,
            channel: self.channel,
            signal_strength,
            timestamp: now as u32,
        }
    }
}
