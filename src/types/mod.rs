// src/types/mod.rs - Value types shared by the gateway, the core and the control surface

use serde::{Deserialize, Serialize};

/// Suffix the messaging network uses for group identities.
pub const GROUP_ID_SUFFIX: &str = "@g.us";

/// Domain appended to bare phone numbers to form a user identity.
pub const USER_ID_DOMAIN: &str = "@s.whatsapp.net";

/// Inbound message as delivered by a messaging gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Chat the message was posted in (group identity or direct-chat peer)
    pub chat_id: String,
    /// Participant that authored the message
    pub sender_id: String,
    pub text: String,
    pub is_group: bool,
    pub has_image: bool,
    /// Messages authored by the bot's own account
    pub from_me: bool,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl ChatMessage {
    /// Text message posted to a group
    pub fn group_text(group_id: &str, sender_id: &str, text: &str) -> Self {
        Self {
            chat_id: group_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            is_group: true,
            has_image: false,
            from_me: false,
            timestamp: chrono::Utc::now(),
        }
    }

    /// Direct (one-to-one) message
    pub fn direct_text(peer_id: &str, text: &str) -> Self {
        Self {
            chat_id: peer_id.to_string(),
            sender_id: peer_id.to_string(),
            text: text.to_string(),
            is_group: false,
            has_image: false,
            from_me: false,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn with_image(mut self) -> Self {
        self.has_image = true;
        self
    }
}

/// Connection lifecycle reported by the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    /// Waiting for the account to be paired; carries the opaque pairing code
    AwaitingPairing(String),
    Connected,
    Error(String),
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::AwaitingPairing(_) => "qr",
            ConnectionState::Connected => "connected",
            ConnectionState::Error(_) => "error",
        }
    }
}

/// Events a gateway pushes into the bot
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    Message(ChatMessage),
    ConnectionState(ConnectionState),
}

/// Group metadata known to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: String,
    pub subject: String,
    pub participants: usize,
}

/// Text message the bot wants delivered to a chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundText {
    pub chat_id: String,
    pub text: String,
    pub mentions: Vec<String>,
}

impl OutboundText {
    pub fn new(chat_id: &str, text: String) -> Self {
        Self {
            chat_id: chat_id.to_string(),
            text,
            mentions: Vec::new(),
        }
    }

    pub fn mentioning(mut self, mentions: Vec<String>) -> Self {
        self.mentions = mentions;
        self
    }
}

/// Local part of an identity, i.e. the phone number in `5511999@s.whatsapp.net`
pub fn user_number(user_id: &str) -> &str {
    user_id.split('@').next().unwrap_or(user_id)
}

/// Expand a command argument (`@5511999`, `5511999` or a full identity) into a user identity
pub fn normalize_user_id(raw: &str) -> String {
    let trimmed = raw.trim().trim_start_matches('@');
    if trimmed.contains('@') {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, USER_ID_DOMAIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_number() {
        assert_eq!(user_number("5511999@s.whatsapp.net"), "5511999");
        assert_eq!(user_number("plain"), "plain");
    }

    #[test]
    fn test_normalize_user_id() {
        assert_eq!(normalize_user_id("@5511999"), "5511999@s.whatsapp.net");
        assert_eq!(normalize_user_id("5511999"), "5511999@s.whatsapp.net");
        assert_eq!(normalize_user_id("5511999@s.whatsapp.net"), "5511999@s.whatsapp.net");
    }

    #[test]
    fn test_connection_state_labels() {
        assert_eq!(ConnectionState::Connected.label(), "connected");
        assert_eq!(ConnectionState::AwaitingPairing("code".into()).label(), "qr");
    }
}
