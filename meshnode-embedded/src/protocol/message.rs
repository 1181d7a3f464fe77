use crate::types::{MacAddress, SOURCE_ID_MAX_LEN, SourceId, source_id_from_str};
use crate::{Error, Result};

use super::buffer::Frame;

pub const DISCOVERY_FRAME_LEN: usize = 14;
pub const DATA_FRAME_LEN: usize = 56;

// Discovery layout
const DISCOVERY_DEVICE_ID: usize = 1;
const DISCOVERY_SENDER: usize = 2;
const DISCOVERY_CHANNEL: usize = 8;
const DISCOVERY_SIGNAL: usize = 9;
const DISCOVERY_TIMESTAMP: usize = 10;

// Data layout
const DATA_HOP_BUDGET: usize = 1;
const DATA_ORIGINATOR: usize = 2;
const DATA_SOURCE_ID: usize = 8;
const SOURCE_ID_FIELD_LEN: usize = SOURCE_ID_MAX_LEN + 1;
const DATA_TEMPERATURE: usize = 40;
const DATA_HUMIDITY: usize = 44;
const DATA_CO2: usize = 48;
const DATA_SEQUENCE: usize = 52;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Beacon = 0,
    PairRequest = 1,
    PairAck = 2,
    Data = 3,
}

impl MessageType {
    pub fn frame_len(self) -> usize {
        match self {
            MessageType::Beacon | MessageType::PairRequest | MessageType::PairAck => {
                DISCOVERY_FRAME_LEN
            }
            MessageType::Data => DATA_FRAME_LEN,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(MessageType::Beacon),
            1 => Ok(MessageType::PairRequest),
            2 => Ok(MessageType::PairAck),
            3 => Ok(MessageType::Data),
            other => Err(Error::UnknownMessageType(other)),
        }
    }
}

/// Body shared by beacons, pairing requests and pairing acknowledgements.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryMessage {
    pub device_id: u8,
    pub sender_address: MacAddress,
    pub channel: u8,
    pub signal_strength: i8,
    /// Sender uptime in milliseconds, truncated to 32 bits.
    pub timestamp: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataMessage {
    pub hop_budget: u8,
    pub originator: MacAddress,
    pub source_id: SourceId,
    pub temperature: f32,
    pub humidity: f32,
    pub co2: f32,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MeshMessage {
    Beacon(DiscoveryMessage),
    PairRequest(DiscoveryMessage),
    PairAck(DiscoveryMessage),
    Data(DataMessage),
}

impl MeshMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            MeshMessage::Beacon(_) => MessageType::Beacon,
            MeshMessage::PairRequest(_) => MessageType::PairRequest,
            MeshMessage::PairAck(_) => MessageType::PairAck,
            MeshMessage::Data(_) => MessageType::Data,
        }
    }

    /// Parse a received frame. The length is checked against the type byte before any field
    /// is read.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (&type_byte, _) = bytes.split_first().ok_or(Error::BadLength)?;
        let message_type = MessageType::try_from(type_byte)?;

        if bytes.len() != message_type.frame_len() {
            return Err(Error::BadLength);
        }

        Ok(match message_type {
            MessageType::Beacon => MeshMessage::Beacon(decode_discovery(bytes)),
            MessageType::PairRequest => MeshMessage::PairRequest(decode_discovery(bytes)),
            MessageType::PairAck => MeshMessage::PairAck(decode_discovery(bytes)),
            MessageType::Data => MeshMessage::Data(decode_data(bytes)),
        })
    }

    pub fn encode(&self) -> Frame {
        let message_type = self.message_type();
        let mut frame = Frame::zeroed(message_type.frame_len());
        let out = frame.as_mut_slice();
        out[0] = message_type as u8;

        match self {
            MeshMessage::Beacon(body) | MeshMessage::PairRequest(body) | MeshMessage::PairAck(body) => {
                encode_discovery(body, out)
            }
            MeshMessage::Data(body) => encode_data(body, out),
        }

        frame
    }
}

fn encode_discovery(body: &DiscoveryMessage, out: &mut [u8]) {
    out[DISCOVERY_DEVICE_ID] = body.device_id;
    out[DISCOVERY_SENDER..DISCOVERY_SENDER + 6].copy_from_slice(&body.sender_address);
    out[DISCOVERY_CHANNEL] = body.channel;
    out[DISCOVERY_SIGNAL] = body.signal_strength as u8;
    out[DISCOVERY_TIMESTAMP..DISCOVERY_TIMESTAMP + 4].copy_from_slice(&body.timestamp.to_le_bytes());
}

fn decode_discovery(bytes: &[u8]) -> DiscoveryMessage {
    DiscoveryMessage {
        device_id: bytes[DISCOVERY_DEVICE_ID],
        sender_address: read_mac(bytes, DISCOVERY_SENDER),
        channel: bytes[DISCOVERY_CHANNEL],
        signal_strength: bytes[DISCOVERY_SIGNAL] as i8,
        timestamp: read_u32(bytes, DISCOVERY_TIMESTAMP),
    }
}

fn encode_data(body: &DataMessage, out: &mut [u8]) {
    out[DATA_HOP_BUDGET] = body.hop_budget;
    out[DATA_ORIGINATOR..DATA_ORIGINATOR + 6].copy_from_slice(&body.originator);

    // Remaining bytes of the id field stay zero, which also provides the terminator.
    let id = body.source_id.as_bytes();
    let id_len = id.len().min(SOURCE_ID_MAX_LEN);
    out[DATA_SOURCE_ID..DATA_SOURCE_ID + id_len].copy_from_slice(&id[..id_len]);

    out[DATA_TEMPERATURE..DATA_TEMPERATURE + 4].copy_from_slice(&body.temperature.to_le_bytes());
    out[DATA_HUMIDITY..DATA_HUMIDITY + 4].copy_from_slice(&body.humidity.to_le_bytes());
    out[DATA_CO2..DATA_CO2 + 4].copy_from_slice(&body.co2.to_le_bytes());
    out[DATA_SEQUENCE..DATA_SEQUENCE + 4].copy_from_slice(&body.sequence.to_le_bytes());
}

fn decode_data(bytes: &[u8]) -> DataMessage {
    DataMessage {
        hop_budget: bytes[DATA_HOP_BUDGET],
        originator: read_mac(bytes, DATA_ORIGINATOR),
        source_id: read_source_id(&bytes[DATA_SOURCE_ID..DATA_SOURCE_ID + SOURCE_ID_FIELD_LEN]),
        temperature: f32::from_bits(read_u32(bytes, DATA_TEMPERATURE)),
        humidity: f32::from_bits(read_u32(bytes, DATA_HUMIDITY)),
        co2: f32::from_bits(read_u32(bytes, DATA_CO2)),
        sequence: read_u32(bytes, DATA_SEQUENCE),
    }
}

fn read_mac(bytes: &[u8], at: usize) -> MacAddress {
    let mut mac = [0u8; 6];
    mac.copy_from_slice(&bytes[at..at + 6]);
    mac
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Reads a NUL-padded id. The last byte of the field is treated as the terminator even when a
/// sender forgot to write one, and invalid UTF-8 is cut at the first bad byte.
fn read_source_id(field: &[u8]) -> SourceId {
    let raw = &field[..field.len().min(SOURCE_ID_MAX_LEN)];
    let raw = match raw.iter().position(|&b| b == 0) {
        Some(end) => &raw[..end],
        None => raw,
    };
    let text = match core::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&raw[..e.valid_up_to()]).unwrap_or_default(),
    };
    source_id_from_str(text)
}
