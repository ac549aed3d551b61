// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat → helpdesk relay.
//!
//! Lazily materializes the contact and conversation for a chat identity
//! on its first message, then posts the message (text, attachments, or
//! both) into the conversation. All processing for one identity runs
//! under its keyed lock so concurrent webhook deliveries cannot
//! double-create anything.

use std::sync::Arc;

use chatbridge_chatwoot::client::{ChatwootClient, CreateContactOutcome, NewContact};
use chatbridge_core::best_effort;
use chatbridge_core::error::BridgeError;
use chatbridge_core::types::{ChatIdentity, FileUpload, InboundAttachment, Session};
use tracing::{info, warn};

use chatbridge_storage::SessionStore;

use crate::attachments::{AttachmentFetcher, AttachmentOutcome};
use crate::index::ConversationIndex;
use crate::locks::KeyedLocks;
use crate::PlatformInboxes;

/// A normalized message from a chat platform, ready to relay.
#[derive(Debug, Clone, Default)]
pub struct InboundMessage {
    pub display_name: Option<String>,
    pub text: String,
    pub attachments: Vec<InboundAttachment>,
    pub avatar_url: Option<String>,
}

/// Platform avatar reference with a stable hash for change detection.
#[derive(Debug, Clone)]
pub struct AvatarInfo {
    pub url: String,
    pub hash: String,
}

/// Request to open a ticket explicitly (the Discord ticket form).
#[derive(Debug, Clone)]
pub struct OpenTicket {
    pub name: String,
    pub email: Option<String>,
    pub problem: Option<String>,
    pub avatar: Option<AvatarInfo>,
}

/// Ids of the ticket an [`OpenTicket`] produced.
#[derive(Debug, Clone, Copy)]
pub struct TicketRefs {
    pub contact_id: i64,
    pub conversation_id: i64,
}

pub struct InboundRelay {
    client: Arc<ChatwootClient>,
    store: SessionStore,
    index: Arc<ConversationIndex>,
    fetcher: Arc<AttachmentFetcher>,
    locks: KeyedLocks,
    inboxes: PlatformInboxes,
}

impl InboundRelay {
    pub fn new(
        client: Arc<ChatwootClient>,
        store: SessionStore,
        index: Arc<ConversationIndex>,
        fetcher: Arc<AttachmentFetcher>,
        inboxes: PlatformInboxes,
    ) -> Self {
        Self {
            client,
            store,
            index,
            fetcher,
            locks: KeyedLocks::new(),
            inboxes,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Relay one chat message into the helpdesk.
    pub async fn handle(
        &self,
        identity: &ChatIdentity,
        message: InboundMessage,
    ) -> Result<(), BridgeError> {
        let _guard = self.locks.lock(identity).await;
        let session = self.store.get_or_create(identity).await?;

        if let Some(name) = &message.display_name {
            if session.display_name.as_deref() != Some(name.as_str()) {
                self.store.set_display_name(identity, name).await?;
                if let Some(contact_id) = session.contact_id {
                    best_effort(
                        "contact name update",
                        self.client
                            .update_contact(contact_id, serde_json::json!({ "name": name })),
                    )
                    .await;
                }
            }
        }

        let contact_id = self.ensure_contact(identity, &session, &message).await?;
        let conversation_id = self
            .ensure_conversation(identity, contact_id, session.conversation_id)
            .await?;

        let uploads = self.download_attachments(&message.attachments).await;
        let text = message.text.trim();
        if text.is_empty() && uploads.is_empty() {
            return Ok(());
        }
        if uploads.is_empty() {
            self.client.post_text_message(conversation_id, text).await?;
        } else {
            self.client
                .post_incoming_multipart(conversation_id, text, uploads)
                .await?;
        }
        info!(%identity, conversation_id, "relayed inbound message");
        Ok(())
    }

    /// Open (or reuse) a ticket for an identity without posting a user
    /// message: validate, ensure contact + conversation, best-effort
    /// welcome note and avatar sync.
    pub async fn open_ticket(
        &self,
        identity: &ChatIdentity,
        ticket: OpenTicket,
    ) -> Result<TicketRefs, BridgeError> {
        let _guard = self.locks.lock(identity).await;
        let session = self.store.get_or_create(identity).await?;
        self.store.set_display_name(identity, &ticket.name).await?;

        let email = ticket
            .email
            .clone()
            .unwrap_or_else(|| identity.contact_email());
        let message = InboundMessage {
            display_name: Some(ticket.name.clone()),
            avatar_url: ticket.avatar.as_ref().map(|a| a.url.clone()),
            ..Default::default()
        };
        let contact_id = match session.contact_id {
            Some(id) => id,
            None => {
                let id = self
                    .find_or_create_contact(identity, &email, &ticket.name, &message)
                    .await?;
                self.store.set_contact(identity, id).await?;
                id
            }
        };
        let conversation_id = self
            .ensure_conversation(identity, contact_id, session.conversation_id)
            .await?;

        if let Some(avatar) = &ticket.avatar {
            self.sync_avatar(contact_id, avatar).await;
        }

        let welcome = format!(
            "Ticket opened for {} ({}).\nIssue: {}",
            ticket.name,
            email,
            ticket.problem.as_deref().unwrap_or("not specified"),
        );
        best_effort(
            "welcome message",
            self.client.post_text_message(conversation_id, &welcome),
        )
        .await;

        Ok(TicketRefs {
            contact_id,
            conversation_id,
        })
    }

    async fn ensure_contact(
        &self,
        identity: &ChatIdentity,
        session: &Session,
        message: &InboundMessage,
    ) -> Result<i64, BridgeError> {
        if let Some(id) = session.contact_id {
            return Ok(id);
        }
        let email = identity.contact_email();
        let name = message
            .display_name
            .clone()
            .unwrap_or_else(|| identity.external_id.clone());
        let id = self
            .find_or_create_contact(identity, &email, &name, message)
            .await?;
        self.store.set_contact(identity, id).await?;
        Ok(id)
    }

    /// Search-first, then create; a 422 on create means we lost a race
    /// (or the contact predates the store) and search must find it.
    async fn find_or_create_contact(
        &self,
        identity: &ChatIdentity,
        email: &str,
        name: &str,
        message: &InboundMessage,
    ) -> Result<i64, BridgeError> {
        if let Some(id) = self.client.search_contact(email).await? {
            if let Some(avatar_url) = &message.avatar_url {
                best_effort(
                    "avatar update",
                    self.client
                        .update_contact(id, serde_json::json!({ "avatar_url": avatar_url })),
                )
                .await;
            }
            return Ok(id);
        }
        let contact = NewContact {
            inbox_id: self.inboxes.require(identity.platform)?,
            source_id: identity.external_id.clone(),
            name: name.to_string(),
            email: email.to_string(),
            avatar_url: message.avatar_url.clone(),
        };
        match self.client.create_contact(&contact).await? {
            CreateContactOutcome::Created(id) => {
                info!(%identity, contact_id = id, "created helpdesk contact");
                Ok(id)
            }
            CreateContactOutcome::AlreadyExists => self
                .client
                .search_contact(email)
                .await?
                .ok_or_else(|| BridgeError::helpdesk("contact exists but search found nothing")),
        }
    }

    /// Reuse the recorded conversation, else an open one in our inbox,
    /// else create one.
    async fn ensure_conversation(
        &self,
        identity: &ChatIdentity,
        contact_id: i64,
        recorded: Option<i64>,
    ) -> Result<i64, BridgeError> {
        if let Some(id) = recorded {
            self.index.insert(id, identity.clone());
            return Ok(id);
        }
        let inbox_id = self.inboxes.require(identity.platform)?;
        let existing = self
            .client
            .contact_conversations(contact_id)
            .await?
            .into_iter()
            .find(|c| c.status == "open" && c.inbox_id == Some(inbox_id));
        let id = match existing {
            Some(conversation) => conversation.id,
            None => {
                let id = self
                    .client
                    .create_conversation(&identity.external_id, inbox_id, contact_id)
                    .await?;
                info!(%identity, conversation_id = id, "created helpdesk conversation");
                id
            }
        };
        self.store.set_conversation(identity, Some(id)).await?;
        self.index.insert(id, identity.clone());
        Ok(id)
    }

    async fn download_attachments(&self, attachments: &[InboundAttachment]) -> Vec<FileUpload> {
        let mut uploads = Vec::with_capacity(attachments.len());
        for attachment in attachments {
            match self
                .fetcher
                .fetch(&attachment.url, attachment.content_type.as_deref())
                .await
            {
                Ok(AttachmentOutcome::Fetched(mut upload)) => {
                    if let Some(name) = &attachment.file_name {
                        upload.file_name = name.clone();
                    }
                    uploads.push(upload);
                }
                Ok(AttachmentOutcome::Skipped(reason)) => {
                    warn!(url = %attachment.url, reason, "skipped inbound attachment");
                }
                Err(error) => {
                    warn!(url = %attachment.url, %error, "failed to download inbound attachment");
                }
            }
        }
        uploads
    }

    /// Re-upload the avatar only when the stored hash differs.
    async fn sync_avatar(&self, contact_id: i64, avatar: &AvatarInfo) {
        let current = best_effort("avatar lookup", self.client.get_contact(contact_id)).await;
        let current_hash = current
            .as_ref()
            .and_then(|c| {
                c.pointer("/payload/custom_attributes/discord_avatar_hash")
                    .or_else(|| c.pointer("/custom_attributes/discord_avatar_hash"))
            })
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if current_hash == avatar.hash {
            return;
        }
        best_effort(
            "avatar sync",
            self.client.update_contact(
                contact_id,
                serde_json::json!({
                    "avatar_url": avatar.url,
                    "custom_attributes": { "discord_avatar_hash": avatar.hash },
                }),
            ),
        )
        .await;
    }
}
