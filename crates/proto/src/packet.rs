//! Decoded packet model
//!
//! The wire codec lives outside this workspace. What it hands over is a
//! [`Packet`]: a tagged value whose variant identifies the packet type and
//! whose body carries the already-decoded fields. Every body type implements
//! [`PacketBody`], which is what the event core uses to register one typed
//! event per packet type.

use crate::chat::ChatPosition;
use crate::types::{PacketDirection, ProtocolState};
use bytes::Bytes;
use uuid::Uuid;

/// Static metadata and downcasting for a packet body type
pub trait PacketBody: Clone + std::fmt::Debug + Send + Sync + 'static {
    /// Protocol name of the packet, also used as its event name
    const NAME: &'static str;
    /// Protocol state the packet belongs to
    const STATE: ProtocolState;
    /// Direction the packet travels in
    const DIRECTION: PacketDirection;
    /// Packet id within (state, direction)
    const ID: u32;

    /// Borrow the body if `packet` is of this type
    fn from_packet(packet: &Packet) -> Option<&Self>;

    /// Wrap the body into the tagged packet value
    fn into_packet(self) -> Packet;
}

/// Walks every known packet body type.
///
/// Implemented by consumers that need one piece of typed state per packet
/// type (the dispatcher registers one event per visit).
pub trait PacketVisitor {
    fn visit<P: PacketBody>(&mut self);
}

/// A packet the codec decoded a header for but has no typed body for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPacket {
    pub state: ProtocolState,
    pub direction: PacketDirection,
    pub id: u32,
    pub data: Bytes,
}

macro_rules! packets {
    ($( $name:ident => ($state:ident, $direction:ident, $id:literal) ),* $(,)?) => {
        /// Tagged decoded packet
        #[derive(Debug, Clone, PartialEq)]
        pub enum Packet {
            $( $name($name), )*
            Unknown(UnknownPacket),
        }

        /// Type tag of every packet with a typed body
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PacketKind {
            $( $name, )*
        }

        impl PacketKind {
            pub const ALL: &'static [PacketKind] = &[ $( PacketKind::$name, )* ];

            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$name => stringify!($name), )*
                }
            }

            pub const fn state(self) -> ProtocolState {
                match self {
                    $( Self::$name => ProtocolState::$state, )*
                }
            }

            pub const fn direction(self) -> PacketDirection {
                match self {
                    $( Self::$name => PacketDirection::$direction, )*
                }
            }

            pub const fn id(self) -> u32 {
                match self {
                    $( Self::$name => $id, )*
                }
            }

            /// Resolve a header triple to a packet type
            pub fn lookup(state: ProtocolState, direction: PacketDirection, id: u32) -> Option<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|kind| kind.state() == state && kind.direction() == direction && kind.id() == id)
            }
        }

        impl Packet {
            /// Type tag, `None` for packets without a typed body
            pub fn kind(&self) -> Option<PacketKind> {
                match self {
                    $( Self::$name(_) => Some(PacketKind::$name), )*
                    Self::Unknown(_) => None,
                }
            }

            pub fn name(&self) -> &'static str {
                self.kind().map_or("Unknown", PacketKind::name)
            }

            pub fn state(&self) -> ProtocolState {
                match self {
                    Self::Unknown(unknown) => unknown.state,
                    known => known.kind().map_or(ProtocolState::Handshaking, PacketKind::state),
                }
            }

            pub fn direction(&self) -> PacketDirection {
                match self {
                    Self::Unknown(unknown) => unknown.direction,
                    known => known.kind().map_or(PacketDirection::Clientbound, PacketKind::direction),
                }
            }

            pub fn id(&self) -> u32 {
                match self {
                    Self::Unknown(unknown) => unknown.id,
                    known => known.kind().map_or(0, PacketKind::id),
                }
            }
        }

        $(
            impl PacketBody for $name {
                const NAME: &'static str = stringify!($name);
                const STATE: ProtocolState = ProtocolState::$state;
                const DIRECTION: PacketDirection = PacketDirection::$direction;
                const ID: u32 = $id;

                fn from_packet(packet: &Packet) -> Option<&Self> {
                    match packet {
                        Packet::$name(body) => Some(body),
                        _ => None,
                    }
                }

                fn into_packet(self) -> Packet {
                    Packet::$name(self)
                }
            }

            impl From<$name> for Packet {
                fn from(body: $name) -> Self {
                    Packet::$name(body)
                }
            }
        )*

        /// Visit every packet body type in declaration order
        pub fn visit_packets<V: PacketVisitor>(visitor: &mut V) {
            $( visitor.visit::<$name>(); )*
        }
    };
}

packets! {
    ServerboundSetProtocol => (Handshaking, Serverbound, 0x00),
    ClientboundDisconnectLogin => (Login, Clientbound, 0x00),
    ClientboundEncryptionBegin => (Login, Clientbound, 0x01),
    ClientboundSuccess => (Login, Clientbound, 0x02),
    ClientboundCompress => (Login, Clientbound, 0x03),
    ServerboundLoginStart => (Login, Serverbound, 0x00),
    ServerboundEncryptionBegin => (Login, Serverbound, 0x01),
    ClientboundChat => (Play, Clientbound, 0x0E),
    ClientboundKickDisconnect => (Play, Clientbound, 0x19),
    ClientboundKeepAlive => (Play, Clientbound, 0x1F),
    ServerboundChat => (Play, Serverbound, 0x03),
    ServerboundKeepAlive => (Play, Serverbound, 0x10),
}

/// Handshake that selects the next protocol state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerboundSetProtocol {
    pub protocol_version: i32,
    pub server_host: String,
    pub server_port: u16,
    pub next_state: ProtocolState,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientboundDisconnectLogin {
    /// JSON chat component
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientboundEncryptionBegin {
    pub server_id: String,
    pub public_key: Vec<u8>,
    pub verify_token: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientboundSuccess {
    pub uuid: Uuid,
    pub username: String,
}

/// Enables compression for packets larger than `threshold` bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientboundCompress {
    pub threshold: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerboundLoginStart {
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerboundEncryptionBegin {
    pub shared_secret: Vec<u8>,
    pub verify_token: Vec<u8>,
}

/// Chat line sent by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientboundChat {
    /// JSON chat component, exactly as received
    pub message: String,
    pub position: ChatPosition,
    /// Nil for messages without a player sender
    pub sender: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientboundKickDisconnect {
    /// JSON chat component
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientboundKeepAlive {
    pub keep_alive_id: i64,
}

/// Chat line or command sent by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerboundChat {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerboundKeepAlive {
    pub keep_alive_id: i64,
}
