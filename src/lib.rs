//! # GroupWarden
//!
//! An automated moderation and engagement bot for group chats.
//!
//! The bot watches the groups an administrator has activated, warns members who post
//! blocked words or links through a three-step escalation cycle, keeps per-user activity
//! counts for engagement reports, and answers a small set of in-group commands.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use groupwarden::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = BotConfiguration::default();
//!     let store = Arc::new(FileStateStore::new(&config.storage.data_file));
//!     let gateway = MemoryGateway::new();
//!
//!     let bot = Arc::new(ModerationBot::new(&config, Box::new(gateway), store).await?);
//!     bot.start().await?;
//!     bot.toggle_group("120363@g.us", true).await?;
//!
//!     bot.clone().start_web_dashboard(config.web.port).await?;
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod config;
pub mod error;
pub mod platforms;
pub mod types;

#[cfg(feature = "web")]
pub mod web;

// Re-export commonly used items
pub mod prelude {
    pub use crate::bot::persistence::{FileStateStore, StateStore};
    pub use crate::bot::ModerationBot;
    pub use crate::config::{BotConfiguration, ConfigurationManager};
    pub use crate::error::ControlError;
    pub use crate::platforms::{
        console::{ConsoleConfig, ConsoleGateway},
        memory::MemoryGateway,
        MediaTranscoder, MessagingGateway,
    };
    pub use crate::types::{ChatMessage, ConnectionState, GatewayEvent, GroupInfo, OutboundText};
    #[cfg(feature = "web")]
    pub use crate::web::{DashboardState, WebDashboard};
    pub use anyhow::Result;
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
