use crate::types::{is_unicast, is_valid_channel};
use crate::{Error, Result};

use super::message::{DataMessage, DiscoveryMessage, MeshMessage};

pub struct MessageValidator;

impl MessageValidator {
    /// Reject frames that decoded cleanly but cannot be acted on.
    pub fn validate_message(message: &MeshMessage) -> Result<()> {
        match message {
            MeshMessage::Beacon(body) | MeshMessage::PairRequest(body) | MeshMessage::PairAck(body) => {
                Self::validate_discovery(body)
            }
            MeshMessage::Data(body) => Self::validate_data(body),
        }
    }

    fn validate_discovery(message: &DiscoveryMessage) -> Result<()> {
        if !is_unicast(&message.sender_address) {
            return Err(Error::InvalidMessage);
        }

        // Peers are registered on the advertised channel
        if !is_valid_channel(message.channel) {
            return Err(Error::InvalidMessage);
        }

        Ok(())
    }

    fn validate_data(message: &DataMessage) -> Result<()> {
        // Duplicate suppression keys on the originator
        if !is_unicast(&message.originator) {
            return Err(Error::InvalidMessage);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::types::{BROADCAST_ADDRESS, source_id_from_str};

    use super::*;

    fn discovery(sender_address: [u8; 6], channel: u8) -> DiscoveryMessage {
        DiscoveryMessage {
            device_id: 1,
            sender_address,
            channel,
            signal_strength: -50,
            timestamp: 0,
        }
    }

    #[test]
    fn test_message_validator() {
        let valid = MeshMessage::Beacon(discovery([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC], 6));
        assert!(MessageValidator::validate_message(&valid).is_ok());

        let zero_sender = MeshMessage::PairRequest(discovery([0; 6], 6));
        assert_eq!(
            MessageValidator::validate_message(&zero_sender),
            Err(Error::InvalidMessage)
        );

        let bad_channel = MeshMessage::PairAck(discovery([0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC], 0));
        assert_eq!(
            MessageValidator::validate_message(&bad_channel),
            Err(Error::InvalidMessage)
        );

        let mut data = DataMessage {
            hop_budget: 0,
            originator: [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC],
            source_id: source_id_from_str("soil"),
            temperature: -1.0,
            humidity: 33.0,
            co2: -1.0,
            sequence: 0,
        };
        // An exhausted budget is still deliverable
        assert!(MessageValidator::validate_message(&MeshMessage::Data(data.clone())).is_ok());

        data.originator = BROADCAST_ADDRESS;
        assert_eq!(
            MessageValidator::validate_message(&MeshMessage::Data(data)),
            Err(Error::InvalidMessage)
        );
    }
}
