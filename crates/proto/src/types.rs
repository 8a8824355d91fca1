//! Connection-level enums shared by every packet.

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};

/// Packet direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketDirection {
    /// Server to client
    Clientbound,
    /// Client to server
    Serverbound,
}

impl std::fmt::Display for PacketDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clientbound => write!(f, "Clientbound"),
            Self::Serverbound => write!(f, "Serverbound"),
        }
    }
}

/// Protocol state the connection is in. Packet ids are only unique within
/// a (state, direction) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolState {
    Handshaking,
    Status,
    Login,
    Play,
}

impl ProtocolState {
    /// Decode the `next_state` field of the handshake packet.
    pub fn from_next_state(value: i32) -> Result<Self, ProtocolError> {
        match value {
            1 => Ok(Self::Status),
            2 => Ok(Self::Login),
            other => Err(ProtocolError::InvalidState(other)),
        }
    }
}

impl std::fmt::Display for ProtocolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Status => write!(f, "Status"),
            Self::Login => write!(f, "Login"),
            Self::Play => write!(f, "Play"),
        }
    }
}
