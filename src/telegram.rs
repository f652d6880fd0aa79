//! Telegram client using teloxide.

use std::path::Path;

use teloxide::prelude::*;
use teloxide::types::{InputFile, ParseMode};
use tracing::{info, warn};

/// Telegram API client.
#[derive(Clone)]
pub struct TelegramClient {
    bot: Bot,
}

impl TelegramClient {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    pub async fn send_html(&self, chat_id: ChatId, text: &str) -> Result<(), String> {
        self.bot
            .send_message(chat_id, text)
            .parse_mode(ParseMode::Html)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send: {e}");
                warn!("{}", msg);
                msg
            })
    }

    pub async fn send_text(&self, chat_id: ChatId, text: &str) -> Result<(), String> {
        self.bot.send_message(chat_id, text).await.map(|_| ()).map_err(|e| {
            let msg = format!("Failed to send: {e}");
            warn!("{}", msg);
            msg
        })
    }

    /// Upload a file from disk as a document.
    pub async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        file_name: &str,
        caption: &str,
    ) -> Result<(), String> {
        info!("📄 Sending {} to chat {}", file_name, chat_id);

        let input_file = InputFile::file(path).file_name(file_name.to_string());
        self.bot
            .send_document(chat_id, input_file)
            .caption(caption)
            .await
            .map(|_| ())
            .map_err(|e| {
                let msg = format!("Failed to send document: {e}");
                warn!("{}", msg);
                msg
            })
    }
}
