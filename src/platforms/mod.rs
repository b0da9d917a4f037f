use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::types::{ChatMessage, GatewayEvent, GroupInfo};

pub mod console;
pub mod memory;

/// Gateway shared between the dispatcher, command tasks and the control surface
pub type SharedGateway = Arc<RwLock<Box<dyn MessagingGateway>>>;

/// Trait defining the interface every messaging network connection must implement
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Connect to the network and start emitting events
    async fn connect(&mut self) -> Result<()>;

    /// Send a text message to a chat, tagging the given user identities
    async fn send_text(&self, chat_id: &str, text: &str, mentions: &[String]) -> Result<()>;

    /// Send an already transcoded sticker image to a chat
    async fn send_sticker(&self, chat_id: &str, image: Vec<u8>) -> Result<()>;

    /// Current member list of a group
    async fn fetch_group_members(&self, group_id: &str) -> Result<Vec<String>>;

    /// All groups the account participates in
    async fn fetch_groups(&self) -> Result<Vec<GroupInfo>>;

    /// Raw bytes of the image attached to a message
    async fn download_image(&self, message: &ChatMessage) -> Result<Vec<u8>>;

    /// Get the network identifier (e.g. "whatsapp", "console")
    fn platform_name(&self) -> &str;

    /// Get a receiver for inbound events
    fn get_event_receiver(&self) -> Option<broadcast::Receiver<GatewayEvent>>;

    /// Log out and drop the session
    async fn disconnect(&mut self) -> Result<()>;
}

/// Converts an arbitrary image into a sticker payload
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    async fn to_sticker(&self, image: Vec<u8>) -> Result<Vec<u8>>;
}
