// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook update extraction.
//!
//! Turns a raw Bot API `Update` into either a bot command or a relayable
//! [`InboundMessage`]. Media is not downloaded here; attachments carry the
//! Bot API file URL and the relay's fetcher downloads them with its normal
//! size and retry limits.

use chatbridge_core::best_effort;
use chatbridge_core::error::BridgeError;
use chatbridge_core::types::{ChatIdentity, InboundAttachment, Platform};
use teloxide::prelude::*;
use teloxide::types::{ChatKind, FileMeta, Update, UpdateKind};
use tracing::debug;

/// Commands users can issue in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Status,
}

/// What a webhook update amounts to after extraction.
#[derive(Debug)]
pub enum TelegramInbound {
    Command {
        identity: ChatIdentity,
        display_name: Option<String>,
        command: BotCommand,
    },
    Message {
        identity: ChatIdentity,
        message: ExtractedMessage,
    },
    Ignored(&'static str),
}

/// Extracted message payload: display name, text, attachment URLs.
#[derive(Debug, Default)]
pub struct ExtractedMessage {
    pub display_name: Option<String>,
    pub text: String,
    pub attachments: Vec<InboundAttachment>,
}

/// Extract a webhook update. Only private-chat message updates are
/// relayed; everything else is reported as `Ignored` with a reason.
pub async fn extract_update(bot: &Bot, update: &Update) -> TelegramInbound {
    let UpdateKind::Message(msg) = &update.kind else {
        return TelegramInbound::Ignored("non-message update");
    };
    if !matches!(msg.chat.kind, ChatKind::Private(_)) {
        debug!(chat_id = msg.chat.id.0, "ignoring non-private chat");
        return TelegramInbound::Ignored("non-private chat");
    }

    let identity = ChatIdentity::new(Platform::Telegram, msg.chat.id.0.to_string());
    let display_name = sender_display_name(msg);

    if let Some(command) = msg.text().and_then(parse_command) {
        return TelegramInbound::Command {
            identity,
            display_name,
            command,
        };
    }

    let text = msg
        .text()
        .or_else(|| msg.caption())
        .unwrap_or_default()
        .to_string();
    let attachments = extract_attachments(bot, msg).await;
    if text.is_empty() && attachments.is_empty() {
        return TelegramInbound::Ignored("unsupported message type");
    }

    TelegramInbound::Message {
        identity,
        message: ExtractedMessage {
            display_name,
            text,
            attachments,
        },
    }
}

/// Recognize `/start` and `/status`, with or without a `@botname` suffix
/// or trailing arguments.
pub fn parse_command(text: &str) -> Option<BotCommand> {
    let first = text.trim().split_whitespace().next()?;
    let name = first.split('@').next().unwrap_or(first);
    match name {
        "/start" => Some(BotCommand::Start),
        "/status" => Some(BotCommand::Status),
        _ => None,
    }
}

/// Sender's full name, falling back to the username.
pub fn sender_display_name(msg: &Message) -> Option<String> {
    let user = msg.from.as_ref()?;
    let full = user.full_name();
    if !full.trim().is_empty() {
        return Some(full);
    }
    user.username.clone()
}

async fn extract_attachments(bot: &Bot, msg: &Message) -> Vec<InboundAttachment> {
    let mut out = Vec::new();

    // Telegram provides multiple photo sizes; the last one is the largest.
    if let Some(largest) = msg.photo().and_then(|sizes| sizes.last()) {
        push_attachment(
            bot,
            &mut out,
            &largest.file,
            Some("photo.jpg".to_string()),
            Some("image/jpeg".to_string()),
        )
        .await;
    }
    if let Some(doc) = msg.document() {
        push_attachment(
            bot,
            &mut out,
            &doc.file,
            doc.file_name.clone(),
            doc.mime_type.as_ref().map(|m| m.to_string()),
        )
        .await;
    }
    if let Some(video) = msg.video() {
        push_attachment(
            bot,
            &mut out,
            &video.file,
            video.file_name.clone().or_else(|| Some("video.mp4".into())),
            video.mime_type.as_ref().map(|m| m.to_string()),
        )
        .await;
    }
    if let Some(audio) = msg.audio() {
        push_attachment(
            bot,
            &mut out,
            &audio.file,
            audio.file_name.clone().or_else(|| Some("audio.mp3".into())),
            audio.mime_type.as_ref().map(|m| m.to_string()),
        )
        .await;
    }
    if let Some(voice) = msg.voice() {
        push_attachment(
            bot,
            &mut out,
            &voice.file,
            Some("voice.ogg".to_string()),
            voice.mime_type.as_ref().map(|m| m.to_string()),
        )
        .await;
    }

    out
}

/// Resolve one file to a download URL; a failed resolution drops only
/// that attachment.
async fn push_attachment(
    bot: &Bot,
    out: &mut Vec<InboundAttachment>,
    meta: &FileMeta,
    file_name: Option<String>,
    content_type: Option<String>,
) {
    if let Some(url) = best_effort("resolve telegram file", file_url(bot, meta)).await {
        out.push(InboundAttachment {
            url,
            file_name,
            content_type,
        });
    }
}

/// Resolve file metadata to the Bot API download URL via `getFile`.
async fn file_url(bot: &Bot, meta: &FileMeta) -> Result<String, BridgeError> {
    let file = bot
        .get_file(meta.id.clone())
        .await
        .map_err(|e| BridgeError::Channel {
            message: format!("failed to get file info: {e}"),
            source: Some(Box::new(e)),
        })?;
    Ok(format!(
        "https://api.telegram.org/file/bot{}/{}",
        bot.token(),
        file.path
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_update(message: serde_json::Value) -> Update {
        // teloxide's custom Update deserializer misparses via from_value;
        // round-trip through a string so it sees a self-describing input.
        let json = serde_json::json!({
            "update_id": 1,
            "message": message,
        });
        serde_json::from_str(&json.to_string()).expect("failed to deserialize mock update")
    }

    fn private_text_update(chat_id: i64, text: &str) -> Update {
        make_update(serde_json::json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": {"id": chat_id, "type": "private", "first_name": "Ada"},
            "from": {
                "id": chat_id,
                "is_bot": false,
                "first_name": "Ada",
                "last_name": "Lovelace",
            },
            "text": text,
        }))
    }

    fn test_bot() -> Bot {
        Bot::new("123456:TEST")
    }

    #[test]
    fn command_parsing() {
        assert_eq!(parse_command("/start"), Some(BotCommand::Start));
        assert_eq!(parse_command("/start extra args"), Some(BotCommand::Start));
        assert_eq!(parse_command("/status@helpdesk_bot"), Some(BotCommand::Status));
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/help"), None);
    }

    #[tokio::test]
    async fn text_message_extracts_identity_and_name() {
        let update = private_text_update(4242, "my printer is on fire");
        match extract_update(&test_bot(), &update).await {
            TelegramInbound::Message { identity, message } => {
                assert_eq!(identity, ChatIdentity::new(Platform::Telegram, "4242"));
                assert_eq!(message.text, "my printer is on fire");
                assert_eq!(message.display_name.as_deref(), Some("Ada Lovelace"));
                assert!(message.attachments.is_empty());
            }
            other => panic!("expected message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn command_text_becomes_command() {
        let update = private_text_update(4242, "/status");
        match extract_update(&test_bot(), &update).await {
            TelegramInbound::Command {
                identity, command, ..
            } => {
                assert_eq!(identity.external_id, "4242");
                assert_eq!(command, BotCommand::Status);
            }
            other => panic!("expected command, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn group_chat_is_ignored() {
        let update = make_update(serde_json::json!({
            "message_id": 1,
            "date": 1700000000i64,
            "chat": {"id": -100123i64, "type": "supergroup", "title": "Ops"},
            "from": {"id": 7, "is_bot": false, "first_name": "Ada"},
            "text": "hello",
        }));
        assert!(matches!(
            extract_update(&test_bot(), &update).await,
            TelegramInbound::Ignored("non-private chat")
        ));
    }
}
