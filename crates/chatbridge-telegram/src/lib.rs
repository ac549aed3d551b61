// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram front-end for the bridge.
//!
//! Provides [`TelegramTransport`], the outbound delivery path via the Bot
//! API, and webhook update extraction in [`extract`]. The HTTP endpoint
//! that receives updates lives in the gateway crate.

pub mod extract;

pub use extract::{extract_update, BotCommand, ExtractedMessage, TelegramInbound};

use async_trait::async_trait;
use chatbridge_config::model::TelegramConfig;
use chatbridge_core::error::BridgeError;
use chatbridge_core::transport::ChatTransport;
use chatbridge_core::types::{ChatIdentity, FileUpload, Platform};
use teloxide::prelude::*;
use teloxide::types::InputFile;
use tracing::{debug, info};
use url::Url;

/// Telegram delivery via teloxide. One photo or document per Bot API call.
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Requires `telegram.bot_token` to be set and non-empty.
    pub fn new(config: &TelegramConfig) -> Result<Self, BridgeError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            BridgeError::Config("telegram.bot_token is required for the Telegram bridge".into())
        })?;
        if token.is_empty() {
            return Err(BridgeError::Config(
                "telegram.bot_token cannot be empty".into(),
            ));
        }
        Ok(Self {
            bot: Bot::new(token),
        })
    }

    /// Transport talking to a non-default Bot API server. Test hook.
    pub fn with_api_url(token: &str, api_url: Url) -> Self {
        Self {
            bot: Bot::new(token).set_api_url(api_url),
        }
    }

    /// Returns a reference to the underlying teloxide Bot.
    pub fn bot(&self) -> &Bot {
        &self.bot
    }
}

fn chat_id(chat: &ChatIdentity) -> Result<ChatId, BridgeError> {
    chat.external_id
        .parse::<i64>()
        .map(ChatId)
        .map_err(|_| BridgeError::channel(format!("invalid telegram chat id: {}", chat.external_id)))
}

fn send_error(what: &str, e: teloxide::RequestError) -> BridgeError {
    BridgeError::Channel {
        message: format!("failed to {what}: {e}"),
        source: Some(Box::new(e)),
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    fn platform(&self) -> Platform {
        Platform::Telegram
    }

    fn max_attachments_per_message(&self) -> usize {
        1
    }

    async fn send_text(&self, chat: &ChatIdentity, text: &str) -> Result<(), BridgeError> {
        let chat_id = chat_id(chat)?;
        self.bot
            .send_message(chat_id, text)
            .await
            .map_err(|e| send_error("send message", e))?;
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: &ChatIdentity,
        photo: FileUpload,
        caption: Option<&str>,
    ) -> Result<(), BridgeError> {
        let chat_id = chat_id(chat)?;
        let input = InputFile::memory(photo.data).file_name(photo.file_name);
        let mut request = self.bot.send_photo(chat_id, input);
        if let Some(caption) = caption {
            request = request.caption(caption.to_string());
        }
        request.await.map_err(|e| send_error("send photo", e))?;
        Ok(())
    }

    async fn send_documents(
        &self,
        chat: &ChatIdentity,
        documents: Vec<FileUpload>,
    ) -> Result<(), BridgeError> {
        let chat_id = chat_id(chat)?;
        for document in documents {
            let input = InputFile::memory(document.data).file_name(document.file_name);
            self.bot
                .send_document(chat_id, input)
                .await
                .map_err(|e| send_error("send document", e))?;
        }
        Ok(())
    }
}

/// Point the bot's webhook at `{public_url}/telegram/webhook`, passing the
/// secret token when one is configured so the gateway can authenticate
/// incoming updates.
pub async fn register_webhook(
    bot: &Bot,
    public_url: &str,
    secret_token: Option<&str>,
) -> Result<(), BridgeError> {
    let endpoint = format!("{}/telegram/webhook", public_url.trim_end_matches('/'));
    let url = Url::parse(&endpoint)
        .map_err(|e| BridgeError::Config(format!("invalid telegram.webhook_public_url: {e}")))?;
    debug!(%url, "registering Telegram webhook");
    let mut request = bot.set_webhook(url.clone());
    if let Some(secret) = secret_token {
        request = request.secret_token(secret.to_string());
    }
    request
        .await
        .map_err(|e| send_error("register webhook", e))?;
    info!(%url, "Telegram webhook registered");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_bot_token() {
        let config = TelegramConfig::default();
        assert!(TelegramTransport::new(&config).is_err());
    }

    #[test]
    fn new_rejects_empty_token() {
        let config = TelegramConfig {
            bot_token: Some(String::new()),
            ..Default::default()
        };
        assert!(TelegramTransport::new(&config).is_err());
    }

    #[test]
    fn new_accepts_valid_token() {
        let config = TelegramConfig {
            bot_token: Some("123456:ABC-DEF1234ghIkl-zyx57W2v1u123ew11".into()),
            ..Default::default()
        };
        assert!(TelegramTransport::new(&config).is_ok());
    }

    #[test]
    fn chat_id_requires_numeric_external_id() {
        let good = ChatIdentity::new(Platform::Telegram, "12345");
        assert_eq!(chat_id(&good).unwrap(), ChatId(12345));
        let bad = ChatIdentity::new(Platform::Telegram, "not-a-number");
        assert!(chat_id(&bad).is_err());
    }
}
