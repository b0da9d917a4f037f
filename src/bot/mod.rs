use anyhow::Result;
use log::{debug, error, info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};

use crate::config::{BotConfiguration, StickerSettings};
use crate::error::ControlError;
use crate::platforms::{MediaTranscoder, MessagingGateway, SharedGateway};
use crate::types::{ChatMessage, ConnectionState, GatewayEvent, OutboundText};

pub mod classifier;
pub mod commands;
pub mod engagement;
pub mod ledger;
pub mod moderation;
pub mod persistence;
pub mod registry;
pub mod state;
pub mod stickers;

use commands::CommandSystem;
use persistence::{PersistenceCoordinator, StateStore};
use moderation::Outcome;
use state::{ClearScope, StateHandle, StateStats};
use stickers::StickerMaker;

/// Connection summary for the control surface
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub status: String,
    pub qr_code: Option<String>,
    pub active_groups_count: usize,
    pub total_groups: usize,
}

/// One catalog entry as listed by the control surface
#[derive(Debug, Clone, Serialize)]
pub struct GroupListing {
    pub id: String,
    pub name: String,
    pub active: bool,
    pub participants: usize,
}

/// Core bot engine: owns the gateway, the shared state and every message handler
pub struct ModerationBot {
    gateway: SharedGateway,
    state: StateHandle,
    command_system: Arc<CommandSystem>,
    sticker_maker: Arc<StickerMaker>,
    sticker_settings: StickerSettings,
    connection_state: Arc<RwLock<ConnectionState>>,
}

impl ModerationBot {
    /// Build the bot and restore its state from `store`
    pub async fn new(
        config: &BotConfiguration,
        gateway: Box<dyn MessagingGateway>,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let persistence = PersistenceCoordinator::spawn(store);
        let state = StateHandle::load(persistence, config.classifier()?).await;
        let gateway: SharedGateway = Arc::new(RwLock::new(gateway));

        let command_system = Arc::new(CommandSystem::new(
            &config.core.command_prefix,
            state.clone(),
            Arc::clone(&gateway),
            config.engagement.clone(),
        ));

        Ok(Self {
            gateway,
            state,
            command_system,
            sticker_maker: Arc::new(StickerMaker::new(&config.stickers.trigger_word, config.stickers.enabled)),
            sticker_settings: config.stickers.clone(),
            connection_state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        })
    }

    /// Install the transcoder used for sticker requests. Call before [`ModerationBot::start`].
    pub fn with_transcoder(mut self, transcoder: Arc<dyn MediaTranscoder>) -> Self {
        let settings = &self.sticker_settings;
        self.sticker_maker =
            Arc::new(StickerMaker::new(&settings.trigger_word, settings.enabled).with_transcoder(transcoder));
        self
    }

    pub fn state(&self) -> &StateHandle {
        &self.state
    }

    // =================================================================
    // BOT LIFECYCLE
    // =================================================================

    /// Connect the gateway and start the dispatcher. Returns once the tasks are running.
    pub async fn start(&self) -> Result<()> {
        info!("Starting moderation bot...");

        let receiver = {
            let mut gateway = self.gateway.write().await;
            // Subscribe first so the connect notification is not missed
            let receiver = gateway.get_event_receiver();
            gateway.connect().await?;
            info!("Connected {} gateway", gateway.platform_name());
            receiver
        };

        match receiver {
            Some(receiver) => self.start_message_processor(receiver),
            None => warn!("Gateway provides no event receiver; no messages will be processed"),
        }

        info!("Moderation bot started successfully");
        Ok(())
    }

    /// Spawn the outbox and the dispatcher loop
    fn start_message_processor(&self, mut receiver: broadcast::Receiver<GatewayEvent>) {
        let response_tx = Self::spawn_outbox(Arc::clone(&self.gateway));

        let gateway = Arc::clone(&self.gateway);
        let state = self.state.clone();
        let command_system = Arc::clone(&self.command_system);
        let sticker_maker = Arc::clone(&self.sticker_maker);
        let connection_state = Arc::clone(&self.connection_state);

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(GatewayEvent::Message(message)) => {
                        // Each message runs on its own task so a panic cannot take the loop down;
                        // awaiting it keeps per-sender ordering.
                        let handled = tokio::spawn(Self::handle_message(
                            message,
                            Arc::clone(&gateway),
                            state.clone(),
                            Arc::clone(&command_system),
                            Arc::clone(&sticker_maker),
                            response_tx.clone(),
                        ))
                        .await;

                        match handled {
                            Ok(Ok(())) => {}
                            Ok(Err(e)) => error!("Failed to process message: {:#}", e),
                            Err(e) => error!("Message handler crashed, message dropped: {}", e),
                        }
                    }
                    Ok(GatewayEvent::ConnectionState(new_state)) => {
                        Self::handle_connection_state(new_state, &gateway, &state, &connection_state).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Event receiver lagged by {} events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        info!("Event receiver closed");
                        break;
                    }
                }
            }
        });
    }

    /// Route outbound texts to one delivery task per chat.
    ///
    /// Queueing never waits, and a chat whose sends stall only delays its own later texts.
    fn spawn_outbox(gateway: SharedGateway) -> mpsc::UnboundedSender<OutboundText> {
        let (response_tx, mut response_rx) = mpsc::unbounded_channel::<OutboundText>();

        tokio::spawn(async move {
            let mut chats: HashMap<String, mpsc::UnboundedSender<OutboundText>> = HashMap::new();

            while let Some(outbound) = response_rx.recv().await {
                let queue = chats
                    .entry(outbound.chat_id.clone())
                    .or_insert_with_key(|chat_id| Self::spawn_chat_sender(chat_id.clone(), Arc::clone(&gateway)));
                if let Err(mpsc::error::SendError(lost)) = queue.send(outbound) {
                    error!("Delivery task for {} is gone, message dropped", lost.chat_id);
                }
            }
            debug!("Outbox closed");
        });

        response_tx
    }

    fn spawn_chat_sender(chat_id: String, gateway: SharedGateway) -> mpsc::UnboundedSender<OutboundText> {
        let (tx, mut rx) = mpsc::unbounded_channel::<OutboundText>();
        tokio::spawn(async move {
            while let Some(outbound) = rx.recv().await {
                let result = gateway
                    .read()
                    .await
                    .send_text(&outbound.chat_id, &outbound.text, &outbound.mentions)
                    .await;
                match result {
                    Ok(()) => debug!("Sent message to {}", chat_id),
                    Err(e) => error!("Failed to send message to {}: {:#}", chat_id, e),
                }
            }
        });
        tx
    }

    /// Gate, count, moderate and answer a single inbound message
    async fn handle_message(
        message: ChatMessage,
        gateway: SharedGateway,
        state: StateHandle,
        command_system: Arc<CommandSystem>,
        sticker_maker: Arc<StickerMaker>,
        response_tx: mpsc::UnboundedSender<OutboundText>,
    ) -> Result<()> {
        if message.from_me || !message.is_group {
            return Ok(());
        }

        if command_system.is_command(&message.text) {
            if state.record_interaction(&message.chat_id, &message.sender_id).await.is_none() {
                debug!("Ignoring command from unmoderated chat {}", message.chat_id);
                return Ok(());
            }
            return command_system.process_message(&message, &response_tx).await;
        }

        match state.evaluate(&message.chat_id, &message.sender_id, &message.text).await {
            Outcome::Ignored => {
                debug!("Ignoring message from unmoderated chat {}", message.chat_id);
                return Ok(());
            }
            Outcome::Counted => {}
            Outcome::Warned(notice) => {
                if response_tx.send(notice.render()).is_err() {
                    error!("Failed to queue warning for {}: outbox closed", message.sender_id);
                }
            }
        }

        if sticker_maker.is_request(&message) {
            tokio::spawn(async move {
                if let Err(e) = sticker_maker.make(&gateway, &message).await {
                    error!("Failed to create sticker for {}: {:#}", message.sender_id, e);
                }
            });
        }

        Ok(())
    }

    async fn handle_connection_state(
        new_state: ConnectionState,
        gateway: &SharedGateway,
        state: &StateHandle,
        connection_state: &RwLock<ConnectionState>,
    ) {
        info!("Gateway connection state: {}", new_state.label());
        let connected = new_state == ConnectionState::Connected;
        *connection_state.write().await = new_state;

        if connected {
            let (gateway, state) = (Arc::clone(gateway), state.clone());
            tokio::spawn(async move {
                let groups = gateway.read().await.fetch_groups().await;
                match groups {
                    Ok(groups) => {
                        info!("{} groups loaded", groups.len());
                        state.set_catalog(groups).await;
                    }
                    Err(e) => error!("Failed to load groups: {:#}", e),
                }
            });
        }
    }

    /// Serve the control API on `port` in the background
    #[cfg(feature = "web")]
    pub async fn start_web_dashboard(self: Arc<Self>, port: u16) -> Result<()> {
        info!("Starting web dashboard on port {}...", port);
        use crate::web::WebDashboard;

        let dashboard = WebDashboard::new(self);
        tokio::spawn(async move {
            if let Err(e) = dashboard.start_server(port).await {
                error!("Web dashboard stopped: {:#}", e);
            }
        });
        Ok(())
    }

    #[cfg(not(feature = "web"))]
    pub async fn start_web_dashboard(self: Arc<Self>, _port: u16) -> Result<()> {
        warn!("Web dashboard is disabled. Enable with --features web");
        Ok(())
    }

    /// Flush state and log out of the gateway
    pub async fn shutdown(&self) -> Result<()> {
        info!("Shutting down moderation bot...");
        self.state.flush().await;
        if let Err(e) = self.gateway.write().await.disconnect().await {
            error!("Error disconnecting gateway: {:#}", e);
        }
        info!("Moderation bot shutdown complete");
        Ok(())
    }

    // =================================================================
    // CONTROL SURFACE
    // =================================================================

    pub async fn get_status(&self) -> StatusReport {
        let connection = self.connection_state.read().await.clone();
        let stats = self.state.stats().await;
        StatusReport {
            status: connection.label().to_string(),
            qr_code: match connection {
                ConnectionState::AwaitingPairing(code) => Some(code),
                _ => None,
            },
            active_groups_count: stats.active_groups,
            total_groups: stats.total_groups,
        }
    }

    pub async fn connect(&self) -> Result<String, ControlError> {
        self.gateway.write().await.connect().await?;
        Ok("Conectando WhatsApp...".to_string())
    }

    pub async fn disconnect(&self) -> Result<String, ControlError> {
        if *self.connection_state.read().await == ConnectionState::Disconnected {
            return Err(ControlError::NotConnected);
        }
        self.gateway.write().await.disconnect().await?;
        *self.connection_state.write().await = ConnectionState::Disconnected;
        Ok("Desconectado com sucesso!".to_string())
    }

    pub async fn list_groups(&self) -> Vec<GroupListing> {
        self.state
            .groups()
            .await
            .into_iter()
            .map(|(info, active)| GroupListing {
                id: info.id,
                name: info.subject,
                active,
                participants: info.participants,
            })
            .collect()
    }

    pub async fn toggle_group(&self, group_id: &str, active: bool) -> Result<String, ControlError> {
        if group_id.trim().is_empty() {
            return Err(ControlError::Validation("group id cannot be empty".to_string()));
        }
        self.state.set_group_active(group_id, active).await;
        Ok(format!("Grupo {} com sucesso!", if active { "ativado" } else { "desativado" }))
    }

    pub async fn get_blocked_words(&self) -> Vec<String> {
        self.state.blocked_words().await
    }

    /// Replace the blocklist from untyped input; anything but an array of strings is rejected
    pub async fn set_blocked_words(&self, words: &serde_json::Value) -> Result<String, ControlError> {
        let words = parse_word_list(words)?;
        self.state.set_blocked_words(words).await;
        Ok("Palavras atualizadas!".to_string())
    }

    pub async fn get_stats(&self) -> StateStats {
        self.state.stats().await
    }

    pub async fn clear_data(&self, scope: &str) -> Result<String, ControlError> {
        let scope = ClearScope::parse(scope)?;
        self.state.clear(scope).await;
        Ok("Dados limpos com sucesso!".to_string())
    }
}

fn parse_word_list(value: &serde_json::Value) -> Result<Vec<String>, ControlError> {
    let items = value
        .as_array()
        .ok_or_else(|| ControlError::Validation("words must be an array".to_string()))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(|word| word.trim().to_string())
                .ok_or_else(|| ControlError::Validation("every word must be a string".to_string()))
        })
        .collect()
}
