//! Chat translation plugin
//!
//! Every `ClientboundChat` packet becomes exactly one [`ChatMessage`] raised
//! on `chat_received`, in dispatch order. Going the other way, [`ChatCore`]
//! encodes outgoing text into `ServerboundChat` and hands it to the `IO`
//! capability.

use proto::uuid::Uuid;
use proto::{ChatComponent, ChatPosition, ClientboundChat, Packet, ServerboundChat};
use rikerbot::{
    EventCore, EventError, EventHandle, Plugin, PluginDescriptor, SharedSink, SubscriptionTable, EVENT_CAPABILITY,
    IO_CAPABILITY,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

pub const PLUGIN_NAME: &str = "chat";
/// Capability holding the plugin's `Arc<ChatCore>`
pub const CHAT_CAPABILITY: &str = "Chat";
/// Event carrying a [`ChatMessage`] for every inbound chat packet
pub const CHAT_RECEIVED_EVENT: &str = "chat_received";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatDirection {
    Inbound,
    Outbound,
}

/// What a message was built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatContents {
    /// The packet as received from the server
    Decoded(ClientboundChat),
    /// Text the bot is about to send
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sender {
    Player(Uuid),
    Unknown,
}

impl Sender {
    fn from_uuid(uuid: Uuid) -> Self {
        if uuid.is_nil() {
            Self::Unknown
        } else {
            Self::Player(uuid)
        }
    }
}

/// A chat line, inbound or outbound. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    contents: ChatContents,
    direction: ChatDirection,
    sender: Sender,
    is_announcement: bool,
}

impl ChatMessage {
    /// Message decoded from a server packet. System and game-info lines are
    /// announcements, everything else is player speech.
    pub fn inbound(packet: ClientboundChat) -> Self {
        let is_announcement = packet.position != ChatPosition::Chat;
        let sender = Sender::from_uuid(packet.sender);

        Self {
            contents: ChatContents::Decoded(packet),
            direction: ChatDirection::Inbound,
            sender,
            is_announcement,
        }
    }

    /// Message the bot wants to send
    pub fn outbound(text: impl Into<String>) -> Self {
        Self {
            contents: ChatContents::Text(text.into()),
            direction: ChatDirection::Outbound,
            sender: Sender::Unknown,
            is_announcement: false,
        }
    }

    pub fn contents(&self) -> &ChatContents {
        &self.contents
    }

    pub fn direction(&self) -> ChatDirection {
        self.direction
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn is_announcement(&self) -> bool {
        self.is_announcement
    }

    /// Plain text of the message.
    ///
    /// Falls back to the raw component string when the server sent something
    /// that is not valid JSON.
    pub fn text(&self) -> String {
        match &self.contents {
            ChatContents::Decoded(packet) => match ChatComponent::from_json_str(&packet.message) {
                Ok(component) => component.plain_text(),
                Err(e) => {
                    tracing::debug!("Chat component did not parse, using raw text: {}", e);
                    packet.message.clone()
                }
            },
            ChatContents::Text(text) => text.clone(),
        }
    }
}

/// Chat plugin settings, read from `[plugins.chat]`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Longest outgoing message, in characters
    pub max_outbound_length: usize,
    /// Log every inbound line at info level
    pub log_messages: bool,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            max_outbound_length: 256,
            log_messages: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("Cannot encode an inbound chat message")]
    NotOutbound,

    #[error("Chat message is empty")]
    Empty,

    #[error("Chat message is {length} characters long, the limit is {max}")]
    TooLong { length: usize, max: usize },
}

/// The `Chat` capability
pub struct ChatCore {
    events: Arc<EventCore>,
    chat_received: EventHandle<ChatMessage>,
    io: SharedSink,
    settings: ChatSettings,
}

impl ChatCore {
    pub fn new(events: Arc<EventCore>, io: SharedSink, settings: ChatSettings) -> Result<Self, EventError> {
        let chat_received = events.register::<ChatMessage>(CHAT_RECEIVED_EVENT)?;
        Ok(Self {
            events,
            chat_received,
            io,
            settings,
        })
    }

    pub fn parse(packet: &ClientboundChat) -> ChatMessage {
        ChatMessage::inbound(packet.clone())
    }

    pub fn chat_received(&self) -> EventHandle<ChatMessage> {
        self.chat_received
    }

    pub fn settings(&self) -> &ChatSettings {
        &self.settings
    }

    /// Translate one inbound packet and raise `chat_received` for it
    pub fn handle_inbound(&self, packet: &ClientboundChat) -> anyhow::Result<()> {
        let message = Self::parse(packet);
        if self.settings.log_messages {
            tracing::info!(target: "chat", "{}", message.text());
        }

        let report = self.events.emit(&self.chat_received, &message)?;
        if !report.is_clean() {
            tracing::warn!("{} chat_received handlers failed", report.failures.len());
        }
        Ok(())
    }

    /// Build the packet that carries an outbound message
    pub fn encode(&self, message: &ChatMessage) -> Result<ServerboundChat, ChatError> {
        let text = match (message.direction(), message.contents()) {
            (ChatDirection::Outbound, ChatContents::Text(text)) => text,
            _ => return Err(ChatError::NotOutbound),
        };

        if text.is_empty() {
            return Err(ChatError::Empty);
        }
        let length = text.chars().count();
        if length > self.settings.max_outbound_length {
            return Err(ChatError::TooLong {
                length,
                max: self.settings.max_outbound_length,
            });
        }

        Ok(ServerboundChat { message: text.clone() })
    }

    /// Encode `text` and queue it for sending
    pub fn send(&self, text: impl Into<String>) -> anyhow::Result<()> {
        let message = ChatMessage::outbound(text);
        let packet = self.encode(&message)?;
        self.io.send(Packet::ServerboundChat(packet))
    }
}

/// Chat translation plugin
pub struct ChatPlugin {
    core: Arc<ChatCore>,
}

impl ChatPlugin {
    pub fn core(&self) -> &Arc<ChatCore> {
        &self.core
    }
}

impl Plugin for ChatPlugin {
    fn on_events(self: Arc<Self>, table: &mut SubscriptionTable) {
        let core = Arc::clone(&self.core);
        table.on_packet::<ClientboundChat, _>(move |packet| core.handle_inbound(packet));
    }
}

pub fn descriptor() -> PluginDescriptor {
    PluginDescriptor::new(PLUGIN_NAME, |ctx, settings| {
        let events: Arc<EventCore> = ctx.require(EVENT_CAPABILITY)?;
        let io: SharedSink = ctx.require(IO_CAPABILITY)?;
        let settings: ChatSettings = settings.parse()?;

        let core = Arc::new(ChatCore::new(events, io, settings)?);
        ctx.provide(Arc::clone(&core))?;
        Ok(Arc::new(ChatPlugin { core }))
    })
    .with_version(semver::Version::new(0, 1, 0))
    .with_description("Translates chat packets into chat messages and back")
    .requires([EVENT_CAPABILITY, IO_CAPABILITY])
    .announces(CHAT_CAPABILITY)
}
