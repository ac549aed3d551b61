// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatwoot webhook event normalization.
//!
//! Webhook payloads arrive in several shapes depending on Chatwoot version
//! and event kind: ids, sender, and conversation data may sit at the top
//! level or nested under `message`. [`normalize`] flattens all of them
//! into one typed enum before any relay logic runs, so the outbound relay
//! never touches raw JSON.

use serde_json::Value;

/// Dedup key for a webhook delivery.
///
/// Events with a top-level `id` key on `evt:{id}:{event}` plus the
/// effective status; otherwise message events key on
/// `msg:{message_id}:{event}`. A delivery hint (request id header) is
/// appended when present. `None` means the payload has no stable identity
/// and must be processed without deduplication.
///
/// `conversation_*` events reuse the conversation id as the top-level
/// `id`, so a bare `evt:{id}` would make an earlier routine update
/// suppress the later resolution of the same conversation. The event name
/// and status keep those deliveries distinct.
pub fn dedup_key(event: &Value, hint: Option<&str>) -> Option<String> {
    let name = event_name(event);
    let base = if let Some(id) = event.get("id") {
        let id = json_scalar(id)?;
        match effective_status(event) {
            Some(status) => format!("evt:{id}:{name}:{status}"),
            None => format!("evt:{id}:{name}"),
        }
    } else if let Some(message) = event.get("message").filter(|m| m.is_object()) {
        let message_id = message.get("id").and_then(json_scalar)?;
        format!("msg:{message_id}:{name}")
    } else {
        return None;
    };
    Some(match hint {
        Some(hint) => format!("{base}:{hint}"),
        None => base,
    })
}

/// Status component of the dedup key: the current status when the event
/// carries one, else the resolution recorded in `changed_attributes`.
fn effective_status(event: &Value) -> Option<String> {
    status_now(event)
        .map(|s| s.to_lowercase())
        .or_else(|| status_resolved(event).then(|| "resolved".to_string()))
}

/// Dedup key guarding the one-time closure notification.
pub fn close_notify_key(conversation_id: i64) -> String {
    format!("close-notify:{conversation_id}")
}

/// Attachment reference on an agent message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAttachment {
    pub url: String,
    pub file_type: Option<String>,
}

/// An agent (staff) message that should be relayed to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AgentMessage {
    pub conversation_id: Option<i64>,
    pub display_id: Option<i64>,
    pub source_id: Option<String>,
    pub inbox_id: Option<i64>,
    pub agent_name: Option<String>,
    pub content: String,
    pub attachments: Vec<EventAttachment>,
}

/// A conversation the helpdesk resolved or closed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversationClosed {
    pub conversation_id: Option<i64>,
    pub display_id: Option<i64>,
    pub source_id: Option<String>,
    pub inbox_id: Option<i64>,
}

/// A webhook event reduced to what the outbound relay acts on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HelpdeskEvent {
    AgentMessage(AgentMessage),
    ConversationClosed(ConversationClosed),
    Ignored(&'static str),
}

/// Classify a webhook payload. Agent-message detection runs first, then
/// explicit status changes, then closure-looking activity messages.
pub fn normalize(event: &Value) -> HelpdeskEvent {
    let name = event_name(event);

    if matches!(name.as_str(), "message_created" | "message_updated") && is_agent_outgoing(event) {
        let message = event.get("message");
        let content = event
            .get("content")
            .and_then(Value::as_str)
            .or_else(|| message.and_then(|m| m.get("content")).and_then(Value::as_str))
            .unwrap_or_default()
            .trim()
            .to_string();
        return HelpdeskEvent::AgentMessage(AgentMessage {
            conversation_id: conversation_id(event),
            display_id: display_id(event),
            source_id: extract_source_id(event),
            inbox_id: inbox_id(event),
            agent_name: agent_name(event),
            content,
            attachments: attachments(event),
        });
    }

    if matches!(
        name.as_str(),
        "conversation_status_changed" | "conversation_updated" | "conversation_resolved"
    ) {
        let mut status = status_now(event).unwrap_or_default().to_lowercase();
        if status.is_empty() && name == "conversation_updated" && status_resolved(event) {
            status = "resolved".to_string();
        }
        if status == "resolved" {
            return HelpdeskEvent::ConversationClosed(closed_event(event));
        }
        return HelpdeskEvent::Ignored("conversation event without resolution");
    }

    // Activity messages announcing a resolution do not pass the agent
    // check; catch them by status or phrasing.
    if name == "message_created" {
        let content = event
            .get("content")
            .and_then(Value::as_str)
            .or_else(|| event.pointer("/message/content").and_then(Value::as_str))
            .unwrap_or_default()
            .trim();
        let resolved = status_now(event)
            .map(|s| s.eq_ignore_ascii_case("resolved"))
            .unwrap_or(false);
        if resolved || looks_like_close_text(content) {
            return HelpdeskEvent::ConversationClosed(closed_event(event));
        }
    }

    HelpdeskEvent::Ignored("unhandled event")
}

fn closed_event(event: &Value) -> ConversationClosed {
    ConversationClosed {
        conversation_id: conversation_id(event),
        display_id: display_id(event),
        source_id: extract_source_id(event),
        inbox_id: inbox_id(event),
    }
}

fn event_name(event: &Value) -> String {
    event
        .get("event")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase()
}

/// Staffness check across both event shapes. Contact senders are never
/// staff; explicit user/agent sender types are; `message_type` outgoing
/// is the fallback.
fn is_agent_outgoing(event: &Value) -> bool {
    let message = event.get("message").cloned().unwrap_or_default();
    let sender_type = message
        .get("sender_type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    let top_sender = event
        .pointer("/sender/type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_lowercase();
    if sender_type == "contact" || top_sender == "contact" {
        return false;
    }
    if matches!(sender_type.as_str(), "user" | "agent") {
        return true;
    }
    let message_type = message.get("message_type").or_else(|| event.get("message_type"));
    match message_type {
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        Some(Value::String(s)) => s.eq_ignore_ascii_case("outgoing"),
        _ => false,
    }
}

/// The chat identity travels in different places depending on the event
/// shape; try each known path in order.
fn extract_source_id(event: &Value) -> Option<String> {
    const PATHS: [&str; 4] = [
        "/message/conversation/contact_inbox/source_id",
        "/conversation/contact_inbox/source_id",
        "/message/content_attributes/source_id",
        "/meta/sender/additional_attributes/source_id",
    ];
    for path in PATHS {
        let value = match event.pointer(path) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => continue,
        };
        if !value.is_empty() {
            return Some(value);
        }
    }
    None
}

fn conversation_id(event: &Value) -> Option<i64> {
    let candidates = [
        event.get("conversation_id"),
        event.pointer("/conversation/id"),
        event.pointer("/message/conversation/id"),
    ];
    for candidate in candidates.into_iter().flatten() {
        if let Some(id) = as_i64(candidate) {
            return Some(id);
        }
    }
    // conversation_* events carry the conversation itself at top level.
    if event_name(event).starts_with("conversation_") {
        return event.get("id").and_then(as_i64);
    }
    None
}

fn display_id(event: &Value) -> Option<i64> {
    let candidates = [
        event.pointer("/conversation/display_id"),
        event.get("display_id"),
        event.pointer("/message/conversation/display_id"),
    ];
    candidates.into_iter().flatten().find_map(as_i64)
}

fn inbox_id(event: &Value) -> Option<i64> {
    let candidates = [
        event.pointer("/inbox/id"),
        event.pointer("/conversation/inbox_id"),
        event.pointer("/message/inbox_id"),
        event.pointer("/message/conversation/inbox_id"),
    ];
    candidates.into_iter().flatten().find_map(as_i64)
}

fn agent_name(event: &Value) -> Option<String> {
    let candidates = [
        event.pointer("/message/sender"),
        event.get("sender"),
        event.get("user"),
    ];
    for sender in candidates.into_iter().flatten() {
        let name = sender
            .get("available_name")
            .or_else(|| sender.get("name"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }
    None
}

fn attachments(event: &Value) -> Vec<EventAttachment> {
    let list = event
        .get("attachments")
        .or_else(|| event.pointer("/message/attachments"))
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    list.iter()
        .filter_map(|att| {
            let url = att
                .get("data_url")
                .or_else(|| att.get("download_url"))
                .or_else(|| att.get("file_url"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            if url.is_empty() {
                return None;
            }
            Some(EventAttachment {
                url: url.to_string(),
                file_type: att
                    .get("file_type")
                    .or_else(|| att.get("content_type"))
                    .and_then(Value::as_str)
                    .map(|s| s.to_lowercase()),
            })
        })
        .collect()
}

fn status_now(event: &Value) -> Option<String> {
    let candidates = [
        event.get("status"),
        event.get("current_status"),
        event.pointer("/conversation/status"),
        event.pointer("/message/conversation/status"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// `changed_attributes` arrives either as a map or as a list of maps.
fn status_resolved(event: &Value) -> bool {
    let current_value = |item: &Value| {
        item.pointer("/status/current_value")
            .and_then(Value::as_str)
            .map(|s| s.eq_ignore_ascii_case("resolved"))
            .unwrap_or(false)
    };
    match event.get("changed_attributes") {
        Some(changed @ Value::Object(_)) => current_value(changed),
        Some(Value::Array(items)) => items.iter().any(current_value),
        _ => event
            .pointer("/conversation/status")
            .and_then(Value::as_str)
            .map(|s| s.eq_ignore_ascii_case("resolved"))
            .unwrap_or(false),
    }
}

/// Activity text announcing a resolution, in the phrasings Chatwoot
/// produces in English and Russian installations.
fn looks_like_close_text(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    if text.is_empty() {
        return false;
    }
    const TOKENS: [&str; 10] = [
        "resolved the conversation",
        "marked conversation as resolved",
        "closed the conversation",
        "conversation closed",
        "завершил диалог",
        "завершила диалог",
        "закрыл диалог",
        "закрыла диалог",
        "диалог завершён",
        "диалог завершен",
    ];
    TOKENS.iter().any(|token| text.contains(token))
}

fn as_i64(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn json_scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
