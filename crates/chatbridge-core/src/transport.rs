// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound chat delivery trait implemented by the platform adapters.

use async_trait::async_trait;

use crate::error::BridgeError;
use crate::types::{ChatIdentity, FileUpload, Platform};

/// Outbound side of a chat platform: text, photos, and document batches
/// addressed by chat identity.
///
/// The outbound relay decides message composition (agent prefix, which
/// attachment becomes the inline image); the transport only knows how to
/// deliver and what its platform's attachment cap is.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    fn platform(&self) -> Platform;

    /// Maximum attachments the platform accepts in a single message.
    /// The relay batches document sends to respect this.
    fn max_attachments_per_message(&self) -> usize;

    async fn send_text(&self, chat: &ChatIdentity, text: &str) -> Result<(), BridgeError>;

    /// Sends one inline image, optionally captioned.
    async fn send_photo(
        &self,
        chat: &ChatIdentity,
        photo: FileUpload,
        caption: Option<&str>,
    ) -> Result<(), BridgeError>;

    /// Sends one platform message carrying up to
    /// [`max_attachments_per_message`](Self::max_attachments_per_message) files.
    async fn send_documents(
        &self,
        chat: &ChatIdentity,
        documents: Vec<FileUpload>,
    ) -> Result<(), BridgeError>;
}
