//! Decoded protocol model for rikerbot
//!
//! This crate contains the typed packet values the event core consumes. The
//! byte-level codec, framing, compression and encryption live in the
//! connection layer; by the time a packet reaches this crate it is already a
//! [`Packet`] with a discoverable [`PacketKind`].

#![warn(
    clippy::expect_used,
    clippy::get_unwrap,
    clippy::if_then_some_else_none,
    clippy::impl_trait_in_params,
    clippy::let_underscore_untyped,
    clippy::unwrap_in_result,
    clippy::unwrap_used,
    clippy::str_to_string,
    clippy::clone_on_ref_ptr,
    clippy::default_trait_access,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::manual_let_else,
    clippy::match_bool,
    clippy::redundant_closure_for_method_calls,
    clippy::trivially_copy_pass_by_ref,
    clippy::unused_self
)]
#![allow(clippy::use_self)]

pub mod chat;
pub mod error;
pub mod packet;
pub mod types;

pub use bytes;
pub use uuid;

pub use chat::{ChatComponent, ChatPosition};
pub use error::ProtocolError;
pub use packet::{
    visit_packets, ClientboundChat, ClientboundCompress, ClientboundDisconnectLogin,
    ClientboundEncryptionBegin, ClientboundKeepAlive, ClientboundKickDisconnect, ClientboundSuccess,
    Packet, PacketBody, PacketKind, PacketVisitor, ServerboundChat, ServerboundEncryptionBegin,
    ServerboundKeepAlive, ServerboundLoginStart, ServerboundSetProtocol, UnknownPacket,
};
pub use types::{PacketDirection, ProtocolState};
