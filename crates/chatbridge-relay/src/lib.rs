// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bidirectional relay between chat platforms and the helpdesk.
//!
//! [`inbound::InboundRelay`] carries chat messages into helpdesk
//! conversations; [`outbound::OutboundRelay`] carries agent replies and
//! closure notices back out. Both share the session store, the
//! conversation index, and the attachment fetcher.

pub mod attachments;
pub mod index;
pub mod inbound;
pub mod locks;
pub mod outbound;

pub use attachments::{AttachmentFetcher, AttachmentOutcome};
pub use index::ConversationIndex;
pub use inbound::{AvatarInfo, InboundMessage, InboundRelay, OpenTicket, TicketRefs};
pub use outbound::OutboundRelay;

use chatbridge_config::model::BridgeConfig;
use chatbridge_core::error::BridgeError;
use chatbridge_core::types::Platform;

/// Which helpdesk inbox each platform files conversations under.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformInboxes {
    pub telegram: Option<i64>,
    pub discord: Option<i64>,
}

impl PlatformInboxes {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            telegram: config.telegram.inbox_id,
            discord: config.discord.inbox_id,
        }
    }

    pub fn get(&self, platform: Platform) -> Option<i64> {
        match platform {
            Platform::Telegram => self.telegram,
            Platform::Discord => self.discord,
        }
    }

    /// Inbox for a platform, as a routing error when unconfigured.
    pub fn require(&self, platform: Platform) -> Result<i64, BridgeError> {
        self.get(platform)
            .ok_or_else(|| BridgeError::Routing(format!("no inbox configured for {platform}")))
    }

    /// Reverse lookup: which platform owns an inbox id.
    pub fn platform_for(&self, inbox_id: i64) -> Option<Platform> {
        if self.telegram == Some(inbox_id) {
            Some(Platform::Telegram)
        } else if self.discord == Some(inbox_id) {
            Some(Platform::Discord)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inbox_reverse_lookup() {
        let inboxes = PlatformInboxes {
            telegram: Some(5),
            discord: Some(7),
        };
        assert_eq!(inboxes.platform_for(5), Some(Platform::Telegram));
        assert_eq!(inboxes.platform_for(7), Some(Platform::Discord));
        assert_eq!(inboxes.platform_for(9), None);
        assert_eq!(inboxes.get(Platform::Discord), Some(7));
        assert!(inboxes.require(Platform::Telegram).is_ok());
        assert!(PlatformInboxes::default().require(Platform::Telegram).is_err());
    }
}
