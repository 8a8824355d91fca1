//! Error types for the packet model

use thiserror::Error;

/// Errors raised while interpreting decoded packet fields
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Invalid protocol state: {0}")]
    InvalidState(i32),

    #[error("Invalid chat position: {0}")]
    InvalidChatPosition(u8),

    #[error("Malformed chat component: {0}")]
    MalformedChat(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(ProtocolError::InvalidState(9).to_string(), "Invalid protocol state: 9");
        assert_eq!(
            ProtocolError::InvalidChatPosition(4).to_string(),
            "Invalid chat position: 4"
        );
    }

    #[test]
    fn test_error_from_json() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = ProtocolError::from(json_error);
        assert!(matches!(error, ProtocolError::MalformedChat(_)));
    }
}
