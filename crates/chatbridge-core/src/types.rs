// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the bridge crates.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Chat platform a session belongs to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Telegram,
    Discord,
}

/// Opaque key identifying a user's conversation thread on a chat platform.
///
/// The `external_id` is the platform's chat/user id rendered as a string
/// (Telegram chat id, Discord user id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatIdentity {
    pub platform: Platform,
    pub external_id: String,
}

impl ChatIdentity {
    pub fn new(platform: Platform, external_id: impl Into<String>) -> Self {
        Self {
            platform,
            external_id: external_id.into(),
        }
    }

    /// Derived unique email-like key used to find or create the helpdesk
    /// contact without duplicates.
    pub fn contact_email(&self) -> String {
        format!("{}@{}", self.external_id, self.platform)
    }
}

impl std::fmt::Display for ChatIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.platform, self.external_id)
    }
}

/// One row of the session table: the durable mapping from a chat identity
/// to its helpdesk contact and currently open conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub identity: ChatIdentity,
    pub contact_id: Option<i64>,
    pub conversation_id: Option<i64>,
    pub display_name: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Append-only record of a closed conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Closure {
    pub identity: ChatIdentity,
    pub conversation_id: i64,
    pub closed_at: i64,
}

/// An attachment reference on an inbound chat message, resolvable to a
/// downloadable URL. The relay downloads it before forwarding.
#[derive(Debug, Clone)]
pub struct InboundAttachment {
    pub url: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
}

/// A fully downloaded file ready to be re-uploaded to the opposite system.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contact_email_embeds_platform() {
        let id = ChatIdentity::new(Platform::Telegram, "42");
        assert_eq!(id.contact_email(), "42@telegram");
        let id = ChatIdentity::new(Platform::Discord, "9001");
        assert_eq!(id.contact_email(), "9001@discord");
    }

    #[test]
    fn platform_round_trips_through_strings() {
        assert_eq!(Platform::Telegram.to_string(), "telegram");
        assert_eq!("discord".parse::<Platform>().unwrap(), Platform::Discord);
    }
}
