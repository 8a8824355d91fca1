//! End-to-end chat translation: packet in, `chat_received` out, and back

use parking_lot::Mutex;
use proto::uuid::Uuid;
use proto::{ChatPosition, ClientboundChat, Packet, ServerboundChat};
use rikerbot::{BotConfig, Plugin, PluginDescriptor, PluginError, PluginState, Session, SubscriptionTable};
use rikerbot_plugins::{chat, ChatContents, ChatCore, ChatDirection, ChatMessage, CHAT_CAPABILITY, CHAT_RECEIVED_EVENT};
use std::sync::Arc;

type Inbox = Arc<Mutex<Vec<ChatMessage>>>;

struct Observer {
    inbox: Inbox,
    outgoing: Arc<Mutex<Vec<String>>>,
}

impl Plugin for Observer {
    fn on_events(self: Arc<Self>, table: &mut SubscriptionTable) {
        let inbox = Arc::clone(&self.inbox);
        table.on::<ChatMessage, _>(CHAT_RECEIVED_EVENT, move |message| {
            inbox.lock().push(message.clone());
            Ok(())
        });

        let outgoing = Arc::clone(&self.outgoing);
        table.on_packet::<ServerboundChat, _>(move |packet| {
            outgoing.lock().push(packet.message.clone());
            Ok(())
        });
    }
}

fn observer(inbox: &Inbox, outgoing: &Arc<Mutex<Vec<String>>>) -> PluginDescriptor {
    let inbox = Arc::clone(inbox);
    let outgoing = Arc::clone(outgoing);
    PluginDescriptor::new("observer", move |ctx, _| {
        let _chat: Arc<ChatCore> = ctx.require(CHAT_CAPABILITY)?;
        Ok(Arc::new(Observer {
            inbox: Arc::clone(&inbox),
            outgoing: Arc::clone(&outgoing),
        }))
    })
    .requires([CHAT_CAPABILITY])
}

fn chat_packet(text: &str, position: ChatPosition) -> ClientboundChat {
    ClientboundChat {
        message: format!(r#"{{"text":"{text}"}}"#),
        position,
        sender: Uuid::nil(),
    }
}

#[test]
fn test_hello_yields_exactly_one_chat_received() {
    let inbox = Inbox::default();
    let outgoing = Arc::default();
    let mut session = Session::new(BotConfig::default()).unwrap();
    let _rx = session.attach_io().unwrap();

    // Observer listed first: ordering comes from requirements.
    session
        .load_plugins(vec![observer(&inbox, &outgoing), chat::descriptor()])
        .unwrap();
    session.start().unwrap();
    assert_eq!(session.load_order(), ["chat".to_string(), "observer".to_string()]);

    let packet = chat_packet("hello", ChatPosition::Chat);
    let report = session
        .dispatch(&Packet::ClientboundChat(packet.clone()))
        .unwrap()
        .unwrap();
    assert!(report.is_clean());

    let inbox = inbox.lock();
    assert_eq!(inbox.len(), 1);
    let message = &inbox[0];
    assert_eq!(message.contents(), &ChatContents::Decoded(packet));
    assert_eq!(message.direction(), ChatDirection::Inbound);
    assert!(!message.is_announcement());
    assert_eq!(message.text(), "hello");
}

#[test]
fn test_messages_keep_dispatch_order() {
    let inbox = Inbox::default();
    let outgoing = Arc::default();
    let mut session = Session::new(BotConfig::default()).unwrap();
    let _rx = session.attach_io().unwrap();
    session
        .load_plugins(vec![chat::descriptor(), observer(&inbox, &outgoing)])
        .unwrap();
    session.start().unwrap();

    let lines = ["one", "two", "three", "four"];
    for (i, line) in lines.iter().enumerate() {
        let position = if i % 2 == 0 { ChatPosition::Chat } else { ChatPosition::System };
        session
            .dispatch(&Packet::ClientboundChat(chat_packet(line, position)))
            .unwrap();
    }

    let inbox = inbox.lock();
    let texts: Vec<String> = inbox.iter().map(ChatMessage::text).collect();
    assert_eq!(texts, lines);
    let announcements: Vec<bool> = inbox.iter().map(ChatMessage::is_announcement).collect();
    assert_eq!(announcements, vec![false, true, false, true]);
}

#[test]
fn test_outbound_text_reaches_queue_and_observers() {
    let inbox = Inbox::default();
    let outgoing = Arc::new(Mutex::new(Vec::new()));
    let mut session = Session::new(BotConfig::default()).unwrap();
    let mut rx = session.attach_io().unwrap();
    session
        .load_plugins(vec![chat::descriptor(), observer(&inbox, &outgoing)])
        .unwrap();
    session.start().unwrap();

    let chat: Arc<ChatCore> = session.capabilities().require(CHAT_CAPABILITY).unwrap();
    chat.send("make it so").unwrap();

    assert_eq!(*outgoing.lock(), vec!["make it so".to_string()]);
    assert_eq!(
        rx.try_recv().unwrap(),
        Packet::ServerboundChat(ServerboundChat {
            message: "make it so".to_string()
        })
    );
    assert!(inbox.lock().is_empty());
}

#[test]
fn test_chat_without_io_fails_to_load() {
    let mut session = Session::new(BotConfig::default()).unwrap();
    let result = session.load_plugins(rikerbot_plugins::all());

    assert!(matches!(
        result,
        Err(PluginError::MissingCapability { ref capability, .. }) if capability == "IO"
    ));
    assert_eq!(session.plugin_state("chat"), Some(PluginState::Failed));
}

#[test]
fn test_chat_settings_come_from_config() {
    let config = BotConfig::from_toml_str(
        r#"
        [plugins.chat]
        max_outbound_length = 4
        "#,
    )
    .unwrap();
    let mut session = Session::new(config).unwrap();
    let _rx = session.attach_io().unwrap();
    session.load_plugins(vec![chat::descriptor()]).unwrap();

    let chat: Arc<ChatCore> = session.capabilities().require(CHAT_CAPABILITY).unwrap();
    assert_eq!(chat.settings().max_outbound_length, 4);
    assert!(chat.send("too long").is_err());
    assert!(chat.send("ok").is_ok());
}

#[test]
fn test_invalid_chat_settings_abort_load() {
    let config = BotConfig::from_toml_str(
        r#"
        [plugins.chat]
        max_outbound_length = "lots"
        "#,
    )
    .unwrap();
    let mut session = Session::new(config).unwrap();
    let _rx = session.attach_io().unwrap();

    let result = session.load_plugins(vec![chat::descriptor()]);
    assert!(matches!(result, Err(PluginError::ConstructionFailed { .. })));
    assert!(!session.capabilities().contains(CHAT_CAPABILITY));
}
