//! Chat positions and JSON text components

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where the client displays a chat line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatPosition {
    /// Player chat box
    Chat,
    /// System message in the chat box
    System,
    /// Action bar above the hotbar
    GameInfo,
}

impl ChatPosition {
    pub fn from_byte(value: u8) -> Result<Self, ProtocolError> {
        match value {
            0 => Ok(Self::Chat),
            1 => Ok(Self::System),
            2 => Ok(Self::GameInfo),
            other => Err(ProtocolError::InvalidChatPosition(other)),
        }
    }

    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Chat => 0,
            Self::System => 1,
            Self::GameInfo => 2,
        }
    }
}

/// Translation keys rendered without a language file.
const TRANSLATIONS: &[(&str, &str)] = &[
    ("chat.type.text", "<%s> %s"),
    ("chat.type.announcement", "[%s] %s"),
    ("chat.type.emote", "* %s %s"),
    ("multiplayer.player.joined", "%s joined the game"),
    ("multiplayer.player.left", "%s left the game"),
];

/// A JSON text component.
///
/// Parsing is lenient: unknown keys are ignored and scalar values are
/// rendered as text, so a server sending odd but valid JSON still yields
/// something printable.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatComponent {
    pub text: String,
    pub translate: Option<String>,
    pub with: Vec<ChatComponent>,
    pub extra: Vec<ChatComponent>,
}

impl ChatComponent {
    /// Plain text component
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Parse the JSON form sent on the wire
    pub fn from_json_str(raw: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::from_value(&value))
    }

    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Self::default(),
            Value::String(text) => Self::text(text.clone()),
            Value::Bool(b) => Self::text(b.to_string()),
            Value::Number(n) => Self::text(n.to_string()),
            // The first element is the parent, the rest are its siblings.
            Value::Array(items) => {
                let mut iter = items.iter();
                let mut root = iter.next().map(Self::from_value).unwrap_or_default();
                root.extra.extend(iter.map(Self::from_value));
                root
            }
            Value::Object(map) => {
                let text = match map.get("text") {
                    Some(Value::String(text)) => text.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                let translate = map
                    .get("translate")
                    .and_then(Value::as_str)
                    .map(str::to_owned);
                Self {
                    text,
                    translate,
                    with: Self::list(map.get("with")),
                    extra: Self::list(map.get("extra")),
                }
            }
        }
    }

    fn list(value: Option<&Value>) -> Vec<Self> {
        match value {
            Some(Value::Array(items)) => items.iter().map(Self::from_value).collect(),
            Some(other) => vec![Self::from_value(other)],
            None => Vec::new(),
        }
    }

    /// Flatten the component tree into the text a client would display
    pub fn plain_text(&self) -> String {
        let mut out = String::new();
        self.write_plain(&mut out);
        out
    }

    fn write_plain(&self, out: &mut String) {
        match &self.translate {
            Some(key) => out.push_str(&self.render_translation(key)),
            None => out.push_str(&self.text),
        }
        for child in &self.extra {
            child.write_plain(out);
        }
    }

    fn render_translation(&self, key: &str) -> String {
        let args: Vec<String> = self.with.iter().map(Self::plain_text).collect();
        let Some((_, pattern)) = TRANSLATIONS.iter().find(|(k, _)| *k == key) else {
            if args.is_empty() {
                return key.to_owned();
            }
            return format!("{key} {}", args.join(" "));
        };

        let mut rendered = String::with_capacity(pattern.len());
        let mut next_arg = 0;
        let mut rest = *pattern;
        while let Some(pos) = rest.find("%s") {
            rendered.push_str(&rest[..pos]);
            if let Some(arg) = args.get(next_arg) {
                rendered.push_str(arg);
            }
            next_arg += 1;
            rest = &rest[pos + 2..];
        }
        rendered.push_str(rest);
        rendered
    }
}
