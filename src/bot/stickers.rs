use anyhow::{anyhow, Result};
use log::info;
use std::sync::Arc;

use crate::platforms::{MediaTranscoder, SharedGateway};
use crate::types::ChatMessage;

const STICKER_DONE_TEXT: &str =
    "🎨 *Figurinha criada com sucesso!* 🎨\n\n😂 Agora pode usar essa obra de arte nas conversas! 🎭";

/// Turns captioned images into stickers
pub struct StickerMaker {
    transcoder: Option<Arc<dyn MediaTranscoder>>,
    trigger_word: String,
    enabled: bool,
}

impl StickerMaker {
    pub fn new(trigger_word: &str, enabled: bool) -> Self {
        Self {
            transcoder: None,
            trigger_word: trigger_word.to_lowercase(),
            enabled,
        }
    }

    pub fn with_transcoder(mut self, transcoder: Arc<dyn MediaTranscoder>) -> Self {
        self.transcoder = Some(transcoder);
        self
    }

    /// Image messages whose caption contains the trigger word
    pub fn is_request(&self, message: &ChatMessage) -> bool {
        self.enabled
            && message.has_image
            && !self.trigger_word.is_empty()
            && message.text.to_lowercase().contains(&self.trigger_word)
    }

    /// Download, transcode and send the sticker back, followed by a confirmation text.
    ///
    /// The gateway lock is taken per call and released while transcoding.
    pub async fn make(&self, gateway: &SharedGateway, message: &ChatMessage) -> Result<()> {
        let transcoder = self
            .transcoder
            .as_ref()
            .ok_or_else(|| anyhow!("no media transcoder configured"))?;

        let image = gateway.read().await.download_image(message).await?;
        let sticker = transcoder.to_sticker(image).await?;
        gateway.read().await.send_sticker(&message.chat_id, sticker).await?;
        gateway.read().await.send_text(&message.chat_id, STICKER_DONE_TEXT, &[]).await?;

        info!("Sticker sent to {} for {}", message.chat_id, message.sender_id);
        Ok(())
    }
}
