use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::delay::DelayNs;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use meshnode_embedded::time::TimeProvider;
use meshnode_embedded::transport::{Radio, RadioError, SendStatus};
use meshnode_embedded::{BROADCAST_ADDRESS, MacAddress};

/// A frame in flight from `source` to `destination`.
#[derive(Debug, Clone)]
pub struct Transmission {
    pub source: MacAddress,
    pub destination: MacAddress,
    pub bytes: Vec<u8>,
}

/// Shared air: who can hear whom, and what is currently in flight.
pub struct Medium {
    links: HashSet<(MacAddress, MacAddress)>,
    in_flight: VecDeque<Transmission>,
    completions: VecDeque<(MacAddress, MacAddress, SendStatus)>,
    loss: f64,
    rng: StdRng,
    transmitted: u64,
}

impl Medium {
    pub fn new(loss: f64, seed: u64) -> Self {
        Self {
            links: HashSet::new(),
            in_flight: VecDeque::new(),
            completions: VecDeque::new(),
            loss,
            rng: StdRng::seed_from_u64(seed),
            transmitted: 0,
        }
    }

    pub fn connect(&mut self, a: MacAddress, b: MacAddress) {
        self.links.insert((a, b));
        self.links.insert((b, a));
    }

    pub fn in_range(&self, a: &MacAddress, b: &MacAddress) -> bool {
        self.links.contains(&(*a, *b))
    }

    fn lost(&mut self) -> bool {
        self.loss > 0.0 && self.rng.random_bool(self.loss)
    }

    fn broadcast(&mut self, source: MacAddress, bytes: &[u8]) {
        self.transmitted += 1;
        let mut hearers: Vec<MacAddress> = self
            .links
            .iter()
            .filter(|(from, _)| *from == source)
            .map(|(_, to)| *to)
            .collect();
        // Delivery order must not depend on hash order
        hearers.sort_unstable();

        for destination in hearers {
            if self.lost() {
                continue;
            }
            self.in_flight.push_back(Transmission {
                source,
                destination,
                bytes: bytes.to_vec(),
            });
        }
    }

    fn unicast(&mut self, source: MacAddress, destination: MacAddress, bytes: &[u8]) {
        self.transmitted += 1;
        let delivered = self.in_range(&source, &destination) && !self.lost();
        if delivered {
            self.in_flight.push_back(Transmission {
                source,
                destination,
                bytes: bytes.to_vec(),
            });
        }

        let status = if delivered {
            SendStatus::Success
        } else {
            SendStatus::Failed
        };
        self.completions.push_back((source, destination, status));
    }

    pub fn next_transmission(&mut self) -> Option<Transmission> {
        self.in_flight.pop_front()
    }

    pub fn next_completion(&mut self) -> Option<(MacAddress, MacAddress, SendStatus)> {
        self.completions.pop_front()
    }

    pub fn transmitted(&self) -> u64 {
        self.transmitted
    }
}

pub type SharedMedium = Arc<Mutex<Medium>>;

fn lock(medium: &SharedMedium) -> MutexGuard<'_, Medium> {
    // A panic while holding the lock leaves the queues consistent
    medium.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One node's radio on the shared medium.
pub struct SimRadio {
    address: MacAddress,
    medium: SharedMedium,
    neighbors: HashMap<MacAddress, u8>,
    uplink_signal: Option<i8>,
}

impl SimRadio {
    pub fn new(address: MacAddress, medium: SharedMedium, uplink_signal: Option<i8>) -> Self {
        Self {
            address,
            medium,
            neighbors: HashMap::new(),
            uplink_signal,
        }
    }

    /// Simulate the driver losing its unicast peers, as after a reboot.
    pub fn forget_neighbors(&mut self) {
        self.neighbors.retain(|address, _| *address == BROADCAST_ADDRESS);
    }
}

impl Radio for SimRadio {
    fn local_address(&self) -> MacAddress {
        self.address
    }

    fn broadcast(&mut self, frame: &[u8]) -> Result<(), RadioError> {
        if !self.neighbors.contains_key(&BROADCAST_ADDRESS) {
            return Err(RadioError::PeerNotFound);
        }
        lock(&self.medium).broadcast(self.address, frame);
        Ok(())
    }

    fn send_to(&mut self, address: &MacAddress, frame: &[u8]) -> Result<(), RadioError> {
        if !self.neighbors.contains_key(address) {
            return Err(RadioError::PeerNotFound);
        }
        lock(&self.medium).unicast(self.address, *address, frame);
        Ok(())
    }

    fn has_neighbor(&self, address: &MacAddress) -> bool {
        self.neighbors.contains_key(address)
    }

    fn add_neighbor(&mut self, address: &MacAddress, channel: u8) -> Result<(), RadioError> {
        self.neighbors.insert(*address, channel);
        Ok(())
    }

    fn remove_neighbor(&mut self, address: &MacAddress) -> Result<(), RadioError> {
        self.neighbors
            .remove(address)
            .map(|_| ())
            .ok_or(RadioError::PeerNotFound)
    }

    fn set_channel(&mut self, _channel: u8) -> Result<(), RadioError> {
        // Every simulated link shares one channel
        Ok(())
    }

    fn uplink_signal_strength(&self) -> Option<i8> {
        self.uplink_signal
    }
}

/// Simulated uptime shared by every node.
#[derive(Debug, Clone, Default)]
pub struct SimClock(Arc<AtomicU64>);

impl SimClock {
    pub fn advance(&self, ms: u64) -> u64 {
        self.0.fetch_add(ms, Ordering::AcqRel) + ms
    }

    pub fn now(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }
}

impl TimeProvider for SimClock {
    fn uptime_ms(&self) -> u64 {
        self.now()
    }
}

/// Pairing jitter is meaningless at millisecond simulation steps.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopDelay;

impl DelayNs for NoopDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
