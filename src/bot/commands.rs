use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::bot::engagement::{render_lurkers, render_ranking};
use crate::bot::state::StateHandle;
use crate::config::EngagementSettings;
use crate::platforms::SharedGateway;
use crate::types::{normalize_user_id, ChatMessage, OutboundText};

const HELP_TEXT: &str = "🤖 *BOT ADMINISTRADOR* 🤖\n\n📊 *Comandos:*\n• !ranking - Ver os mais ativos\n• !tocaia - Ver quem só observa\n• !limpar @user - Limpar avisos\n• !ajuda - Este menu\n\n🎨 *Figurinhas:*\nEnvie imagem + \"figurinha\"\n\n⚠️ *Moderação automática ativa!*";

const CLEARED_TEXT: &str = "✅ Avisos limpos para o usuário mencionado!";

/// Commands understood inside moderated groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupCommand {
    Ranking,
    Lurkers,
    /// Target identity, already normalized
    ClearWarnings(String),
    Help,
}

pub struct CommandSystem {
    command_prefix: String,
    state: StateHandle,
    gateway: SharedGateway,
    engagement: EngagementSettings,
}

impl CommandSystem {
    pub fn new(command_prefix: &str, state: StateHandle, gateway: SharedGateway, engagement: EngagementSettings) -> Self {
        Self {
            command_prefix: command_prefix.to_string(),
            state,
            gateway,
            engagement,
        }
    }

    /// Whether the text is addressed to the bot at all
    pub fn is_command(&self, text: &str) -> bool {
        text.starts_with(&self.command_prefix)
    }

    /// Unknown commands, and `limpar` without a target, parse to `None`
    pub fn parse(&self, text: &str) -> Option<GroupCommand> {
        let content = text.strip_prefix(&self.command_prefix)?;
        let mut parts = content.split_whitespace();
        let name = parts.next()?.to_lowercase();

        match name.as_str() {
            "ranking" => Some(GroupCommand::Ranking),
            "tocaia" => Some(GroupCommand::Lurkers),
            "limpar" => parts.next().map(|target| GroupCommand::ClearWarnings(normalize_user_id(target))),
            "ajuda" => Some(GroupCommand::Help),
            _ => None,
        }
    }

    /// Run a command from an activated group.
    ///
    /// Reports that need the group's member list are produced on a separate task so a slow
    /// gateway lookup never holds up the next message.
    pub async fn process_message(&self, message: &ChatMessage, response_sender: &mpsc::UnboundedSender<OutboundText>) -> Result<()> {
        let command = match self.parse(&message.text) {
            Some(command) => command,
            None => {
                debug!("Ignoring unknown command from {}: {}", message.sender_id, message.text);
                return Ok(());
            }
        };

        info!("Executing {:?} for {} in {}", command, message.sender_id, message.chat_id);
        let group_id = message.chat_id.clone();

        match command {
            GroupCommand::Ranking => {
                let state = self.state.clone();
                let gateway = self.gateway.clone();
                let sender = response_sender.clone();
                let limit = self.engagement.ranking_limit;
                tokio::spawn(async move {
                    let members = match gateway.read().await.fetch_group_members(&group_id).await {
                        Ok(members) => Some(members),
                        Err(e) => {
                            warn!("Member lookup for {} failed, ranking by identity match: {:#}", group_id, e);
                            None
                        }
                    };
                    let entries = state.ranking(&group_id, members.as_deref(), limit).await;
                    Self::send_response(&sender, render_ranking(&group_id, &entries));
                });
            }
            GroupCommand::Lurkers => {
                let state = self.state.clone();
                let gateway = self.gateway.clone();
                let sender = response_sender.clone();
                let (threshold, limit) = (self.engagement.lurker_threshold, self.engagement.lurker_limit);
                tokio::spawn(async move {
                    let members = match gateway.read().await.fetch_group_members(&group_id).await {
                        Ok(members) => members,
                        Err(e) => {
                            error!("Failed to fetch members of {}: {:#}", group_id, e);
                            return;
                        }
                    };
                    let entries = state.lurkers(&members, threshold, limit).await;
                    Self::send_response(&sender, render_lurkers(&group_id, &entries));
                });
            }
            GroupCommand::ClearWarnings(user_id) => {
                self.state.clear_warnings(&user_id).await;
                info!("Warnings cleared for {} by {}", user_id, message.sender_id);
                Self::send_response(response_sender, OutboundText::new(&group_id, CLEARED_TEXT.to_string()));
            }
            GroupCommand::Help => {
                Self::send_response(response_sender, OutboundText::new(&group_id, HELP_TEXT.to_string()));
            }
        }

        Ok(())
    }

    fn send_response(sender: &mpsc::UnboundedSender<OutboundText>, response: OutboundText) {
        if let Err(e) = sender.send(response) {
            error!("Failed to queue command response for {}: outbox closed", e.0.chat_id);
        }
    }
}
