// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Helpdesk → chat relay.
//!
//! Consumes normalized webhook events: agent messages are formatted and
//! delivered through the platform transport, resolutions clear the
//! session mapping and notify the user once. Events that cannot be routed
//! to a chat identity are logged and dropped; retrying cannot create a
//! mapping that does not exist.

use std::sync::Arc;

use chatbridge_chatwoot::client::ChatwootClient;
use chatbridge_chatwoot::events::{
    self, AgentMessage, ConversationClosed, HelpdeskEvent,
};
use chatbridge_core::best_effort;
use chatbridge_core::dedup::LruSet;
use chatbridge_core::error::BridgeError;
use chatbridge_core::transport::ChatTransport;
use chatbridge_core::types::{ChatIdentity, FileUpload, Platform};
use serde_json::Value;
use tracing::{debug, info, warn};

use chatbridge_storage::SessionStore;

use crate::attachments::{is_image, AttachmentFetcher, AttachmentOutcome};
use crate::index::ConversationIndex;
use crate::PlatformInboxes;

pub struct OutboundRelay {
    client: Arc<ChatwootClient>,
    store: SessionStore,
    index: Arc<ConversationIndex>,
    fetcher: Arc<AttachmentFetcher>,
    dedup: tokio::sync::Mutex<LruSet>,
    transports: Vec<Arc<dyn ChatTransport>>,
    inboxes: PlatformInboxes,
}

impl OutboundRelay {
    pub fn new(
        client: Arc<ChatwootClient>,
        store: SessionStore,
        index: Arc<ConversationIndex>,
        fetcher: Arc<AttachmentFetcher>,
        inboxes: PlatformInboxes,
        dedup_capacity: usize,
    ) -> Self {
        Self {
            client,
            store,
            index,
            fetcher,
            dedup: tokio::sync::Mutex::new(LruSet::new(dedup_capacity)),
            transports: Vec::new(),
            inboxes,
        }
    }

    pub fn register_transport(&mut self, transport: Arc<dyn ChatTransport>) {
        self.transports.push(transport);
    }

    fn transport_for(&self, platform: Platform) -> Option<&Arc<dyn ChatTransport>> {
        self.transports.iter().find(|t| t.platform() == platform)
    }

    /// Process one webhook delivery. The hint is a per-delivery request id
    /// appended to the dedup key.
    pub async fn handle_event(&self, event: &Value, hint: Option<&str>) -> Result<(), BridgeError> {
        if let Some(key) = events::dedup_key(event, hint) {
            if !self.dedup.lock().await.add(key.as_str()) {
                debug!(key, "dropping duplicate helpdesk event");
                return Ok(());
            }
        }
        match events::normalize(event) {
            HelpdeskEvent::AgentMessage(message) => self.deliver_agent_message(message).await,
            HelpdeskEvent::ConversationClosed(closed) => self.handle_closure(closed).await,
            HelpdeskEvent::Ignored(reason) => {
                debug!(reason, "ignoring helpdesk event");
                Ok(())
            }
        }
    }

    async fn deliver_agent_message(&self, message: AgentMessage) -> Result<(), BridgeError> {
        let Some(identity) = self
            .resolve_identity(
                message.conversation_id,
                message.source_id.as_deref(),
                message.inbox_id,
            )
            .await?
        else {
            warn!(
                conversation_id = ?message.conversation_id,
                "dropping agent message with no resolvable chat identity"
            );
            return Ok(());
        };
        let Some(transport) = self.transport_for(identity.platform) else {
            warn!(%identity, "no transport registered for platform");
            return Ok(());
        };

        let agent = message.agent_name.as_deref().unwrap_or("Support");
        let prefix = format!("Agent {agent}:");
        if !message.content.is_empty() {
            transport
                .send_text(&identity, &format!("{prefix}\n{}", message.content))
                .await?;
        }

        let mut documents: Vec<FileUpload> = Vec::new();
        let mut caption_pending = message.content.is_empty();
        for attachment in &message.attachments {
            let fetched = self
                .fetcher
                .fetch(&attachment.url, attachment.file_type.as_deref())
                .await;
            let file = match fetched {
                Ok(AttachmentOutcome::Fetched(file)) => file,
                Ok(AttachmentOutcome::Skipped(reason)) => {
                    warn!(url = %attachment.url, reason, "skipped outbound attachment");
                    continue;
                }
                Err(error) => {
                    warn!(url = %attachment.url, %error, "failed to fetch outbound attachment");
                    continue;
                }
            };
            let image = attachment.file_type.as_deref() == Some("image")
                || is_image(&file.content_type, &file.file_name);
            if image {
                let caption = caption_pending.then_some(prefix.as_str());
                best_effort(
                    "photo delivery",
                    transport.send_photo(&identity, file, caption),
                )
                .await;
            } else {
                documents.push(file);
            }
            caption_pending = false;
        }

        let cap = transport.max_attachments_per_message().max(1);
        while !documents.is_empty() {
            let batch: Vec<FileUpload> = documents
                .drain(..cap.min(documents.len()))
                .collect();
            best_effort(
                "document delivery",
                transport.send_documents(&identity, batch),
            )
            .await;
        }

        info!(%identity, "relayed agent message");
        Ok(())
    }

    async fn handle_closure(&self, closed: ConversationClosed) -> Result<(), BridgeError> {
        let Some(conversation_id) = closed.conversation_id else {
            debug!("closure event without conversation id");
            return Ok(());
        };
        let Some(identity) = self
            .resolve_identity(
                Some(conversation_id),
                closed.source_id.as_deref(),
                closed.inbox_id,
            )
            .await?
        else {
            warn!(conversation_id, "closure for unknown conversation");
            return Ok(());
        };

        // The same resolution arrives through several event shapes; only
        // the first one notifies.
        if !self
            .dedup
            .lock()
            .await
            .add(events::close_notify_key(conversation_id))
        {
            return Ok(());
        }

        self.store.set_conversation(&identity, None).await?;
        self.index.remove(conversation_id);
        self.store.record_closure(&identity, conversation_id).await?;

        let ticket = closed.display_id.unwrap_or(conversation_id);
        if let Some(transport) = self.transport_for(identity.platform) {
            best_effort(
                "closure notice",
                transport.send_text(
                    &identity,
                    &format!(
                        "Ticket #{ticket} has been closed.\n\
                         If anything else comes up, just send a new message \
                         and a new ticket will be opened."
                    ),
                ),
            )
            .await;
        }
        info!(%identity, conversation_id, ticket, "conversation closed");
        Ok(())
    }

    /// Resolve the chat identity an event belongs to.
    ///
    /// Order: explicit source id (platform from the inbox id, or the only
    /// registered transport) → in-memory index → session store → the
    /// conversation detail API as a last resort.
    async fn resolve_identity(
        &self,
        conversation_id: Option<i64>,
        source_id: Option<&str>,
        inbox_id: Option<i64>,
    ) -> Result<Option<ChatIdentity>, BridgeError> {
        if let Some(source_id) = source_id.filter(|s| !s.is_empty()) {
            if let Some(platform) = self.platform_hint(inbox_id) {
                return Ok(Some(ChatIdentity::new(platform, source_id)));
            }
        }
        let Some(conversation_id) = conversation_id else {
            return Ok(None);
        };
        if let Some(identity) = self.index.get(conversation_id) {
            return Ok(Some(identity));
        }
        if let Some(session) = self.store.find_by_conversation(conversation_id).await? {
            self.index.insert(conversation_id, session.identity.clone());
            return Ok(Some(session.identity));
        }

        // Last resort: ask the helpdesk for the conversation detail.
        let Some(detail) =
            best_effort("conversation lookup", self.client.get_conversation(conversation_id)).await
        else {
            return Ok(None);
        };
        let source_id = detail
            .pointer("/conversation/contact_inbox/source_id")
            .or_else(|| detail.pointer("/contact_inbox/source_id"))
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let inbox_id = detail
            .pointer("/conversation/inbox_id")
            .or_else(|| detail.get("inbox_id"))
            .and_then(Value::as_i64)
            .or(inbox_id);
        match (source_id, self.platform_hint(inbox_id)) {
            (Some(source_id), Some(platform)) => {
                let identity = ChatIdentity::new(platform, source_id);
                self.index.insert(conversation_id, identity.clone());
                Ok(Some(identity))
            }
            _ => Ok(None),
        }
    }

    /// Which platform an inbox id belongs to; with a single registered
    /// transport the answer is unambiguous even without an inbox id.
    fn platform_hint(&self, inbox_id: Option<i64>) -> Option<Platform> {
        if let Some(platform) = inbox_id.and_then(|id| self.inboxes.platform_for(id)) {
            return Some(platform);
        }
        match self.transports.as_slice() {
            [only] => Some(only.platform()),
            _ => None,
        }
    }
}
