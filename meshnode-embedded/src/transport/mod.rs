//! Radio link abstraction.
//!
//! The mesh runs on a connectionless, broadcast-capable link that only knows "neighbors"
//! (registered unicast destinations). Driver glue owns the actual radio and forwards its
//! receive and send-complete events into [`MeshManager::on_receive`] and
//! [`MeshManager::on_send_complete`]; the manager calls back into the driver through [`Radio`].
//!
//! [`MeshManager::on_receive`]: crate::mesh::MeshManager::on_receive
//! [`MeshManager::on_send_complete`]: crate::mesh::MeshManager::on_send_complete

use core::fmt;

use crate::types::MacAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioError {
    /// Destination is not a registered neighbor.
    PeerNotFound,
    NotInitialized,
    NoMemory,
    InvalidArgument,
    /// Any other driver failure, with the driver's raw code.
    Driver(i32),
}

impl fmt::Display for RadioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadioError::PeerNotFound => write!(f, "peer not found"),
            RadioError::NotInitialized => write!(f, "radio not initialized"),
            RadioError::NoMemory => write!(f, "out of memory"),
            RadioError::InvalidArgument => write!(f, "invalid argument"),
            RadioError::Driver(code) => write!(f, "driver error {}", code),
        }
    }
}

/// Outcome reported by the driver once a queued frame left (or failed to leave) the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Success,
    Failed,
}

pub trait Radio {
    /// Link address frames from this node carry.
    fn local_address(&self) -> MacAddress;

    /// Queue a frame to every node in range.
    fn broadcast(&mut self, frame: &[u8]) -> Result<(), RadioError>;

    /// Queue a frame to a registered neighbor.
    fn send_to(&mut self, address: &MacAddress, frame: &[u8]) -> Result<(), RadioError>;

    fn has_neighbor(&self, address: &MacAddress) -> bool;

    fn add_neighbor(&mut self, address: &MacAddress, channel: u8) -> Result<(), RadioError>;

    fn remove_neighbor(&mut self, address: &MacAddress) -> Result<(), RadioError>;

    /// Pin the radio to a channel. Nodes without an infrastructure uplink must do this or they
    /// never hear beacons on the mesh channel.
    fn set_channel(&mut self, _channel: u8) -> Result<(), RadioError> {
        Ok(())
    }

    /// Signal strength of the infrastructure uplink, if the node has one.
    fn uplink_signal_strength(&self) -> Option<i8> {
        None
    }
}
