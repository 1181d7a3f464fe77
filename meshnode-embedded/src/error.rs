use core::fmt;

use crate::transport::RadioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    BadLength,
    UnknownMessageType(u8),
    InvalidMessage,
    InvalidChannel(u8),
    NotInitialized,
    WrongRole,
    NotPaired,
    PeerTableFull,
    HandoffFull,
    Radio(RadioError),
    ConfigError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadLength => write!(f, "Frame length does not match its message type"),
            Error::UnknownMessageType(t) => write!(f, "Unknown message type {}", t),
            Error::InvalidMessage => write!(f, "Invalid message contents"),
            Error::InvalidChannel(ch) => write!(f, "Invalid radio channel {}", ch),
            Error::NotInitialized => write!(f, "Mesh not initialized"),
            Error::WrongRole => write!(f, "Operation not available for this role"),
            Error::NotPaired => write!(f, "Not paired with a gateway"),
            Error::PeerTableFull => write!(f, "Peer table full"),
            Error::HandoffFull => write!(f, "Hand-off buffer full"),
            Error::Radio(e) => write!(f, "Radio error: {}", e),
            Error::ConfigError => write!(f, "Configuration error"),
        }
    }
}

impl From<RadioError> for Error {
    fn from(err: RadioError) -> Self {
        Error::Radio(err)
    }
}

pub type Result<T> = core::result::Result<T, Error>;
