use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::env;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;

use crate::platforms::MessagingGateway;
use crate::types::{ChatMessage, ConnectionState, GatewayEvent, GroupInfo, GROUP_ID_SUFFIX};

/// Configuration for the console gateway
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    /// Groups the console account pretends to participate in, with their members
    pub groups: HashMap<String, Vec<String>>,
}

impl ConsoleConfig {
    /// Load console groups from `CONSOLE_GROUPS`.
    ///
    /// Format: `group1@g.us=alice,bob;group2@g.us=carol`
    pub fn from_env() -> Result<Self> {
        let raw = env::var("CONSOLE_GROUPS").unwrap_or_default();
        let config = Self::parse(&raw)?;
        info!("Loaded console config with {} groups", config.groups.len());
        Ok(config)
    }

    fn parse(raw: &str) -> Result<Self> {
        let mut groups = HashMap::new();
        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (group, members) = entry
                .split_once('=')
                .with_context(|| format!("invalid CONSOLE_GROUPS entry '{}'", entry))?;
            let members = members
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            groups.insert(group.trim().to_string(), members);
        }
        Ok(Self { groups })
    }
}

/// Line-oriented gateway over stdin/stdout, for running the bot without a network transport.
///
/// Each input line is `<chat_id>|<sender_id>|<text>`; chats ending in `@g.us` are groups.
/// A `[img]` prefix on the text marks the message as carrying an image.
pub struct ConsoleGateway {
    config: ConsoleConfig,
    event_sender: broadcast::Sender<GatewayEvent>,
    reader: Option<JoinHandle<()>>,
    is_connected: Arc<RwLock<bool>>,
}

impl ConsoleGateway {
    pub fn new(config: ConsoleConfig) -> Self {
        let (event_sender, _) = broadcast::channel(1000);
        Self {
            config,
            event_sender,
            reader: None,
            is_connected: Arc::new(RwLock::new(false)),
        }
    }

    /// Install a new stdin reader, stopping the previous one
    fn replace_reader(&mut self, reader: Option<JoinHandle<()>>) {
        if let Some(previous) = std::mem::replace(&mut self.reader, reader) {
            previous.abort();
        }
    }

    fn parse_line(line: &str) -> Option<ChatMessage> {
        let mut parts = line.splitn(3, '|');
        let chat_id = parts.next()?.trim();
        let sender_id = parts.next()?.trim();
        let text = parts.next()?;
        if chat_id.is_empty() || sender_id.is_empty() {
            return None;
        }

        let (text, has_image) = match text.trim_start().strip_prefix("[img]") {
            Some(rest) => (rest.trim(), true),
            None => (text, false),
        };
        // A line with nothing after the separators carries no message
        if text.is_empty() && !has_image {
            return None;
        }

        Some(ChatMessage {
            chat_id: chat_id.to_string(),
            sender_id: sender_id.to_string(),
            text: text.to_string(),
            is_group: chat_id.ends_with(GROUP_ID_SUFFIX),
            has_image,
            from_me: false,
            timestamp: chrono::Utc::now(),
        })
    }
}

#[async_trait]
impl MessagingGateway for ConsoleGateway {
    async fn connect(&mut self) -> Result<()> {
        let sender = self.event_sender.clone();
        let is_connected = Arc::clone(&self.is_connected);

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => match Self::parse_line(&line) {
                        Some(message) => {
                            let _ = sender.send(GatewayEvent::Message(message));
                        }
                        None => warn!("Ignoring malformed console line: {}", line),
                    },
                    Ok(None) => break,
                    Err(e) => {
                        let _ = sender.send(GatewayEvent::ConnectionState(ConnectionState::Error(e.to_string())));
                        break;
                    }
                }
            }
            *is_connected.write().await = false;
            let _ = sender.send(GatewayEvent::ConnectionState(ConnectionState::Disconnected));
            debug!("Console reader finished");
        });
        self.replace_reader(Some(reader));

        *self.is_connected.write().await = true;
        let _ = self.event_sender.send(GatewayEvent::ConnectionState(ConnectionState::Connected));
        info!("Console gateway connected, reading messages from stdin");
        Ok(())
    }

    async fn send_text(&self, chat_id: &str, text: &str, mentions: &[String]) -> Result<()> {
        if !*self.is_connected.read().await {
            return Err(anyhow!("console gateway is not connected"));
        }
        println!("[{}] {}", chat_id, text);
        if !mentions.is_empty() {
            println!("[{}] mentions: {}", chat_id, mentions.join(", "));
        }
        Ok(())
    }

    async fn send_sticker(&self, chat_id: &str, image: Vec<u8>) -> Result<()> {
        println!("[{}] <sticker {} bytes>", chat_id, image.len());
        Ok(())
    }

    async fn fetch_group_members(&self, group_id: &str) -> Result<Vec<String>> {
        self.config
            .groups
            .get(group_id)
            .cloned()
            .ok_or_else(|| anyhow!("console gateway has no metadata for {}", group_id))
    }

    async fn fetch_groups(&self) -> Result<Vec<GroupInfo>> {
        Ok(self
            .config
            .groups
            .iter()
            .map(|(id, members)| GroupInfo {
                id: id.clone(),
                subject: id.clone(),
                participants: members.len(),
            })
            .collect())
    }

    async fn download_image(&self, _message: &ChatMessage) -> Result<Vec<u8>> {
        Err(anyhow!("console gateway cannot carry media"))
    }

    fn platform_name(&self) -> &str {
        "console"
    }

    fn get_event_receiver(&self) -> Option<broadcast::Receiver<GatewayEvent>> {
        Some(self.event_sender.subscribe())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.replace_reader(None);
        *self.is_connected.write().await = false;
        let _ = self.event_sender.send(GatewayEvent::ConnectionState(ConnectionState::Disconnected));
        info!("Console gateway disconnected");
        Ok(())
    }
}
