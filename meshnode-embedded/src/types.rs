use core::fmt;

use serde::{Deserialize, Serialize};

pub type MacAddress = [u8; 6];

/// Bounded sensor identifier carried in data frames (31 bytes plus the NUL terminator on air).
pub type SourceId = heapless::String<SOURCE_ID_MAX_LEN>;

pub const SOURCE_ID_MAX_LEN: usize = 31;

pub const BROADCAST_ADDRESS: MacAddress = [0xFF; 6];

pub const MIN_CHANNEL: u8 = 1;
pub const MAX_CHANNEL: u8 = 13;

/// Reading value meaning "this node does not measure it".
pub const NOT_AVAILABLE: f32 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Sensor,
    Gateway,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Sensor => write!(f, "sensor"),
            Role::Gateway => write!(f, "gateway"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    /// Single hop: only gateways beacon, sensors unicast, nobody relays.
    Star,
    #[default]
    Flood,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorReading {
    pub temperature: f32,
    pub humidity: f32,
    pub co2: f32,
}

impl SensorReading {
    pub fn is_available(value: f32) -> bool {
        value.is_finite() && value != NOT_AVAILABLE
    }
}

pub fn is_valid_channel(channel: u8) -> bool {
    (MIN_CHANNEL..=MAX_CHANNEL).contains(&channel)
}

pub fn is_unicast(address: &MacAddress) -> bool {
    *address != BROADCAST_ADDRESS && address.iter().any(|&b| b != 0)
}

/// Builds a source id from arbitrary text, stopping at the first NUL and truncating on a
/// character boundary so the result always fits the wire field.
pub fn source_id_from_str(text: &str) -> SourceId {
    let mut id = SourceId::new();
    for ch in text.chars() {
        if ch == '\0' || id.push(ch).is_err() {
            break;
        }
    }
    id
}

/// Parses `AA:BB:CC:DD:EE:FF` (or `-` separated) into an address.
pub fn parse_mac(text: &str) -> Option<MacAddress> {
    let mut mac = [0u8; 6];
    let mut parts = text.split(|c: char| c == ':' || c == '-');
    for byte in mac.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(part, 16).ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(mac)
}

/// `Display` adapter printing an address as `AA:BB:CC:DD:EE:FF`.
pub struct MacDisplay<'a>(pub &'a MacAddress);

impl fmt::Display for MacDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = self.0;
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            m[0], m[1], m[2], m[3], m[4], m[5]
        )
    }
}
