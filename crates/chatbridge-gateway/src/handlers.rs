// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the webhook gateway.
//!
//! Handlers answer 200 to webhook sources whenever the delivery itself was
//! understood, even when processing fails: Telegram and Chatwoot both
//! retry non-2xx responses, and a poison event must not wedge the queue.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use chatbridge_core::best_effort;
use chatbridge_core::transport::ChatTransport;
use chatbridge_core::types::{ChatIdentity, Platform};
use chatbridge_relay::{AvatarInfo, InboundMessage, OpenTicket};
use chatbridge_storage::SessionStore;
use chatbridge_telegram::{BotCommand, TelegramInbound};
use serde::Deserialize;
use serde_json::json;
use teloxide::types::Update;
use tracing::{debug, error, warn};

use crate::server::GatewayState;
use crate::verify::decode_body;

const START_TEXT: &str = "Hello! Describe your issue in a message here and a \
support ticket will be opened for you automatically.";

const DELIVERY_FAILED_TEXT: &str =
    "Could not deliver your message. Please try again later.";

/// GET /healthz
pub async fn healthz(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    let health = &state.health;
    Json(json!({
        "status": "ok",
        "auth_mode": health.auth_mode,
        "telegram_inbox": health.telegram_inbox,
        "discord_inbox": health.discord_inbox,
        "uptime_secs": health.start_time.elapsed().as_secs(),
    }))
}

/// POST /telegram/webhook
pub async fn telegram_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.telegram_secret {
        let provided = headers
            .get("x-telegram-bot-api-secret-token")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if provided != secret {
            warn!("telegram update with missing or wrong secret token");
            return (StatusCode::UNAUTHORIZED, Json(json!({"ok": false}))).into_response();
        }
    }

    let Some(telegram) = &state.telegram else {
        warn!("telegram update received but no telegram transport is configured");
        return Json(json!({"ok": true})).into_response();
    };

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            // Answer 200 anyway: Telegram redelivers on errors and the
            // payload will not get any more parseable.
            warn!(error = %e, "unparseable telegram update");
            return Json(json!({"ok": false})).into_response();
        }
    };

    match chatbridge_telegram::extract_update(telegram.bot(), &update).await {
        TelegramInbound::Command {
            identity, command, ..
        } => {
            let text = match command {
                BotCommand::Start => START_TEXT.to_string(),
                BotCommand::Status => status_text(&state.store, &identity).await,
            };
            best_effort(
                "send command reply",
                telegram.send_text(&identity, &text),
            )
            .await;
        }
        TelegramInbound::Message { identity, message } => {
            let inbound = InboundMessage {
                display_name: message.display_name,
                text: message.text,
                attachments: message.attachments,
                ..Default::default()
            };
            if let Err(e) = state.inbound.handle(&identity, inbound).await {
                error!(%identity, error = %e, "failed to relay telegram message");
                best_effort(
                    "send delivery failure notice",
                    telegram.send_text(&identity, DELIVERY_FAILED_TEXT),
                )
                .await;
            }
        }
        TelegramInbound::Ignored(reason) => {
            debug!(reason, "ignoring telegram update");
        }
    }
    Json(json!({"ok": true})).into_response()
}

/// Ticket summary for the `/status` command.
async fn status_text(store: &SessionStore, identity: &ChatIdentity) -> String {
    let current = match store.get(identity).await {
        Ok(session) => session.and_then(|s| s.conversation_id),
        Err(e) => {
            warn!(%identity, error = %e, "status lookup failed");
            None
        }
    };
    let current_line = match current {
        Some(id) => format!("Current ticket: #{id}"),
        None => "Current ticket: none (not opened yet)".to_string(),
    };
    let last_line = match store.last_closure(identity).await {
        Ok(Some(closure)) => {
            let when = chrono::DateTime::from_timestamp(closure.closed_at, 0)
                .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
                .unwrap_or_else(|| closure.closed_at.to_string());
            format!("Last closed ticket: #{} at {when}.", closure.conversation_id)
        }
        _ => "No closed tickets yet.".to_string(),
    };
    format!("{current_line}\n{last_line}")
}

/// POST /chatwoot/webhook (and the legacy /webhook alias)
pub async fn chatwoot_webhook(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if !state.webhook_auth.verify(&headers, &body) {
        warn!("rejected helpdesk webhook: verification failed");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "unauthorized"})),
        )
            .into_response();
    }

    let decoded = match decode_body(&headers, &body) {
        Ok(decoded) => decoded,
        Err(e) => {
            warn!(error = %e, "undecodable helpdesk webhook body");
            return (StatusCode::BAD_REQUEST, Json(json!({"status": "bad body"})))
                .into_response();
        }
    };
    let event: serde_json::Value = match serde_json::from_slice(&decoded) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "helpdesk webhook body is not JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"status": "invalid json"})),
            )
                .into_response();
        }
    };

    let hint = headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if let Err(e) = state.outbound.handle_event(&event, hint.as_deref()).await {
        // Processing failures are logged, not surfaced: Chatwoot would
        // redeliver the same event and fail the same way.
        error!(error = %e, "failed to process helpdesk event");
    }
    Json(json!({"status": "ok"})).into_response()
}

/// Request body for POST /tickets.
#[derive(Debug, Deserialize)]
pub struct TicketRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub problem_text: Option<String>,
    #[serde(default, alias = "discord_user_id")]
    pub discord_user: Option<String>,
}

/// POST /tickets
pub async fn create_ticket(
    State(state): State<GatewayState>,
    Json(body): Json<TicketRequest>,
) -> Response {
    let name = body.name.as_deref().unwrap_or("").trim().to_string();
    let email = body.email.as_deref().unwrap_or("").trim().to_string();
    let mut missing = Vec::new();
    if name.is_empty() {
        missing.push("name");
    }
    if email.is_empty() {
        missing.push("email");
    }
    if !missing.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "error": format!("Missing required fields: {}", missing.join(", ")),
            })),
        )
            .into_response();
    }

    let discord_user = body
        .discord_user
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    // Without a platform user id the session is keyed by email, matching
    // the conversation source_id fallback.
    let identity = ChatIdentity::new(Platform::Discord, discord_user.unwrap_or(&email));

    let avatar = match (&state.discord, discord_user) {
        (Some(discord), Some(user_id)) => discord
            .user_avatar(user_id)
            .await
            .map(|a| AvatarInfo {
                url: a.url,
                hash: a.hash,
            }),
        _ => None,
    };

    let ticket = OpenTicket {
        name,
        email: Some(email),
        problem: body
            .problem_text
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        avatar,
    };
    match state.inbound.open_ticket(&identity, ticket).await {
        Ok(refs) => Json(json!({
            "success": true,
            "contact_id": refs.contact_id,
            "conversation_id": refs.conversation_id,
        }))
        .into_response(),
        Err(e) => {
            error!(%identity, error = %e, "ticket open failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"success": false, "error": "internal server error"})),
            )
                .into_response()
        }
    }
}
