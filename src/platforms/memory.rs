// src/platforms/memory.rs - In-process gateway driven by the embedding application

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::platforms::MessagingGateway;
use crate::types::{ChatMessage, ConnectionState, GatewayEvent, GroupInfo, OutboundText};

/// Record of everything the bot delivered through a [`MemoryGateway`]
#[derive(Debug, Default, Clone)]
pub struct Outbox {
    pub texts: Vec<OutboundText>,
    pub stickers: Vec<(String, Vec<u8>)>,
}

/// Gateway whose traffic lives entirely in memory.
///
/// Inbound events are pushed with [`MemoryGateway::inject`]; everything the bot sends
/// is kept in an [`Outbox`] that can be inspected at any time. Cloning yields another
/// handle onto the same gateway.
#[derive(Clone)]
pub struct MemoryGateway {
    events: broadcast::Sender<GatewayEvent>,
    outbox: Arc<RwLock<Outbox>>,
    groups: Arc<RwLock<HashMap<String, (String, Vec<String>)>>>,
    images: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    fail_sends: Arc<RwLock<bool>>,
    connected: Arc<RwLock<bool>>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(1000);
        Self {
            events,
            outbox: Arc::new(RwLock::new(Outbox::default())),
            groups: Arc::new(RwLock::new(HashMap::new())),
            images: Arc::new(RwLock::new(HashMap::new())),
            fail_sends: Arc::new(RwLock::new(false)),
            connected: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a group and its members, in membership order
    pub async fn add_group(&self, group_id: &str, subject: &str, members: &[&str]) {
        self.groups.write().await.insert(
            group_id.to_string(),
            (subject.to_string(), members.iter().map(|m| m.to_string()).collect()),
        );
    }

    /// Image bytes returned for messages from `sender_id`
    pub async fn set_image(&self, sender_id: &str, bytes: Vec<u8>) {
        self.images.write().await.insert(sender_id.to_string(), bytes);
    }

    /// Make every outbound send fail, to exercise transport error paths
    pub async fn set_fail_sends(&self, fail: bool) {
        *self.fail_sends.write().await = fail;
    }

    /// Push an inbound event to subscribers
    pub fn inject(&self, event: GatewayEvent) {
        if self.events.send(event).is_err() {
            debug!("Memory gateway event dropped: no subscribers");
        }
    }

    pub async fn outbox(&self) -> Outbox {
        self.outbox.read().await.clone()
    }

    pub async fn sent_texts(&self) -> Vec<OutboundText> {
        self.outbox.read().await.texts.clone()
    }
}

impl Default for MemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagingGateway for MemoryGateway {
    async fn connect(&mut self) -> Result<()> {
        *self.connected.write().await = true;
        self.inject(GatewayEvent::ConnectionState(ConnectionState::Connected));
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str, mentions: &[String]) -> Result<()> {
        if *self.fail_sends.read().await {
            return Err(anyhow!("memory gateway configured to fail sends"));
        }
        self.outbox.write().await.texts.push(OutboundText {
            chat_id: chat_id.to_string(),
            text: text.to_string(),
            mentions: mentions.to_vec(),
        });
        Ok(())
    }

    async fn send_sticker(&self, chat_id: &str, image: Vec<u8>) -> Result<()> {
        if *self.fail_sends.read().await {
            return Err(anyhow!("memory gateway configured to fail sends"));
        }
        self.outbox.write().await.stickers.push((chat_id.to_string(), image));
        Ok(())
    }

    async fn fetch_group_members(&self, group_id: &str) -> Result<Vec<String>> {
        self.groups
            .read()
            .await
            .get(group_id)
            .map(|(_, members)| members.clone())
            .ok_or_else(|| anyhow!("unknown group {}", group_id))
    }

    async fn fetch_groups(&self) -> Result<Vec<GroupInfo>> {
        let groups = self.groups.read().await;
        let mut infos: Vec<GroupInfo> = groups
            .iter()
            .map(|(id, (subject, members))| GroupInfo {
                id: id.clone(),
                subject: subject.clone(),
                participants: members.len(),
            })
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(infos)
    }

    async fn download_image(&self, message: &ChatMessage) -> Result<Vec<u8>> {
        self.images
            .read()
            .await
            .get(&message.sender_id)
            .cloned()
            .ok_or_else(|| anyhow!("no image stored for {}", message.sender_id))
    }

    fn platform_name(&self) -> &str {
        "memory"
    }

    fn get_event_receiver(&self) -> Option<broadcast::Receiver<GatewayEvent>> {
        Some(self.events.subscribe())
    }

    async fn disconnect(&mut self) -> Result<()> {
        *self.connected.write().await = false;
        self.inject(GatewayEvent::ConnectionState(ConnectionState::Disconnected));
        Ok(())
    }
}
