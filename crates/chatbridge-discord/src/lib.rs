// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discord front-end for the bridge.
//!
//! Delivers agent replies as direct messages over the Discord REST API
//! (v10). DM channel ids are cached per user so each conversation costs
//! one channel-create call. Inbound traffic arrives through the gateway's
//! ticket endpoint, not through a Discord gateway connection.

pub mod avatar;

pub use avatar::{avatar_from_user, AvatarRef};

use std::time::Duration;

use async_trait::async_trait;
use chatbridge_config::model::DiscordConfig;
use chatbridge_core::error::BridgeError;
use chatbridge_core::transport::ChatTransport;
use chatbridge_core::types::{ChatIdentity, FileUpload, Platform};
use dashmap::DashMap;
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tracing::debug;

const DISCORD_API: &str = "https://discord.com/api/v10";

/// Discord caps message content at 2000 characters.
const MESSAGE_CHAR_LIMIT: usize = 2000;

/// Discord DM transport over the REST API.
pub struct DiscordTransport {
    http: reqwest::Client,
    base_url: String,
    token: String,
    // user id -> DM channel id
    dm_channels: DashMap<String, String>,
}

impl DiscordTransport {
    /// Requires `discord.bot_token` to be set and non-empty.
    pub fn new(config: &DiscordConfig) -> Result<Self, BridgeError> {
        let token = config.bot_token.as_deref().ok_or_else(|| {
            BridgeError::Config("discord.bot_token is required for the Discord bridge".into())
        })?;
        if token.is_empty() {
            return Err(BridgeError::Config(
                "discord.bot_token cannot be empty".into(),
            ));
        }
        Self::with_base_url(token, DISCORD_API)
    }

    /// Explicit API base, used by tests.
    pub fn with_base_url(token: &str, base_url: &str) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent("chatbridge/0.1")
            .build()
            .map_err(|e| BridgeError::Channel {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            dm_channels: DashMap::new(),
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header("Authorization", format!("Bot {}", self.token))
    }

    async fn expect_json(&self, resp: reqwest::Response, what: &str) -> Result<Value, BridgeError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(400).collect();
            return Err(BridgeError::channel(format!(
                "{what} returned {status}: {snippet}"
            )));
        }
        resp.json::<Value>().await.map_err(|e| BridgeError::Channel {
            message: format!("{what} returned invalid JSON: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// DM channel id for a user, opening one on first use.
    async fn dm_channel(&self, user_id: &str) -> Result<String, BridgeError> {
        if let Some(channel) = self.dm_channels.get(user_id) {
            return Ok(channel.clone());
        }
        let resp = self
            .request(reqwest::Method::POST, "/users/@me/channels")
            .json(&serde_json::json!({"recipient_id": user_id}))
            .send()
            .await
            .map_err(|e| BridgeError::Channel {
                message: format!("DM channel create failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        let body = self.expect_json(resp, "DM channel create").await?;
        let channel = channel_id(&body).ok_or_else(|| {
            BridgeError::channel("DM channel create response carried no channel id")
        })?;
        debug!(user_id, channel, "opened DM channel");
        self.dm_channels.insert(user_id.to_string(), channel.clone());
        Ok(channel)
    }

    async fn post_message(&self, channel: &str, content: &str) -> Result<(), BridgeError> {
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/channels/{channel}/messages"),
            )
            .json(&serde_json::json!({"content": content}))
            .send()
            .await
            .map_err(|e| BridgeError::Channel {
                message: format!("message send failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        self.expect_json(resp, "message send").await?;
        Ok(())
    }

    async fn post_files(
        &self,
        channel: &str,
        content: &str,
        files: Vec<FileUpload>,
    ) -> Result<(), BridgeError> {
        let mut form = Form::new().part(
            "payload_json",
            Part::text(serde_json::json!({"content": content}).to_string())
                .mime_str("application/json")
                .map_err(|e| BridgeError::Channel {
                    message: format!("invalid payload part: {e}"),
                    source: Some(Box::new(e)),
                })?,
        );
        for (i, file) in files.into_iter().enumerate() {
            let part = Part::bytes(file.data.clone()).file_name(file.file_name.clone());
            let part = match part.mime_str(&file.content_type) {
                Ok(part) => part,
                Err(_) => Part::bytes(file.data).file_name(file.file_name),
            };
            form = form.part(format!("files[{i}]"), part);
        }
        let resp = self
            .request(
                reqwest::Method::POST,
                &format!("/channels/{channel}/messages"),
            )
            .multipart(form)
            .send()
            .await
            .map_err(|e| BridgeError::Channel {
                message: format!("file upload failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        self.expect_json(resp, "file upload").await?;
        Ok(())
    }

    /// Fetch a user profile, used for avatar sync on ticket open.
    pub async fn get_user(&self, user_id: &str) -> Result<Value, BridgeError> {
        let resp = self
            .request(reqwest::Method::GET, &format!("/users/{user_id}"))
            .send()
            .await
            .map_err(|e| BridgeError::Channel {
                message: format!("user lookup failed: {e}"),
                source: Some(Box::new(e)),
            })?;
        self.expect_json(resp, "user lookup").await
    }

    /// Avatar reference for a user, or `None` when the lookup fails.
    pub async fn user_avatar(&self, user_id: &str) -> Option<AvatarRef> {
        let user =
            chatbridge_core::best_effort("discord user lookup", self.get_user(user_id)).await?;
        Some(avatar_from_user(&user, user_id))
    }
}

fn channel_id(body: &Value) -> Option<String> {
    match body.get("id") {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

/// Split text into pieces within the Discord content limit, on char
/// boundaries.
fn chunk_content(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in text.chars() {
        if count == limit {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl ChatTransport for DiscordTransport {
    fn platform(&self) -> Platform {
        Platform::Discord
    }

    fn max_attachments_per_message(&self) -> usize {
        10
    }

    async fn send_text(&self, chat: &ChatIdentity, text: &str) -> Result<(), BridgeError> {
        if text.is_empty() {
            return Ok(());
        }
        let channel = self.dm_channel(&chat.external_id).await?;
        for chunk in chunk_content(text, MESSAGE_CHAR_LIMIT) {
            self.post_message(&channel, &chunk).await?;
        }
        Ok(())
    }

    async fn send_photo(
        &self,
        chat: &ChatIdentity,
        photo: FileUpload,
        caption: Option<&str>,
    ) -> Result<(), BridgeError> {
        let channel = self.dm_channel(&chat.external_id).await?;
        self.post_files(&channel, caption.unwrap_or_default(), vec![photo])
            .await
    }

    async fn send_documents(
        &self,
        chat: &ChatIdentity,
        documents: Vec<FileUpload>,
    ) -> Result<(), BridgeError> {
        if documents.is_empty() {
            return Ok(());
        }
        let channel = self.dm_channel(&chat.external_id).await?;
        self.post_files(&channel, "", documents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_requires_bot_token() {
        let config = DiscordConfig::default();
        assert!(DiscordTransport::new(&config).is_err());
    }

    #[test]
    fn chunking_respects_limit_and_boundaries() {
        assert!(chunk_content("", 5).is_empty());
        assert_eq!(chunk_content("short", 2000), vec!["short".to_string()]);
        let chunks = chunk_content(&"x".repeat(4500), 2000);
        assert_eq!(
            chunks.iter().map(String::len).collect::<Vec<_>>(),
            vec![2000, 2000, 500]
        );
        // Multi-byte chars must not be split.
        let chunks = chunk_content("ééé", 2);
        assert_eq!(chunks, vec!["éé".to_string(), "é".to_string()]);
    }

    #[test]
    fn channel_id_accepts_string_or_number() {
        assert_eq!(
            channel_id(&serde_json::json!({"id": "123"})).as_deref(),
            Some("123")
        );
        assert_eq!(
            channel_id(&serde_json::json!({"id": 123})).as_deref(),
            Some("123")
        );
        assert_eq!(channel_id(&serde_json::json!({})), None);
    }
}
