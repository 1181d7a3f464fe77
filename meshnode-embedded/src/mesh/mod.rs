pub mod beacon;
pub mod dedup;
pub mod handoff;
pub mod manager;
pub mod pairing;
pub mod peers;
pub mod relay;

pub use beacon::*;
pub use dedup::DuplicateCache;
pub use handoff::{HandoffBuffer, MeshDelivery};
pub use manager::{DataCallback, MeshManager};
pub use pairing::{DiscoveryStatus, PairingMachine, PairingState};
pub use peers::{PeerRecord, PeerTable, PeerUpdate};
pub use relay::{FloodRelay, RelayDecision};

/// Neighbors a node keeps pairing state for.
pub const MAX_PEERS: usize = 20;
pub const SEEN_PACKET_CAPACITY: usize = 30;
/// Ring slots between the receive path and the main loop (one stays empty).
pub const HANDOFF_SLOTS: usize = 10;
