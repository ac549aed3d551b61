// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes and shared state for the webhook endpoints.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::routing::{get, post};
use axum::Router;
use chatbridge_core::error::BridgeError;
use chatbridge_discord::DiscordTransport;
use chatbridge_relay::{InboundRelay, OutboundRelay};
use chatbridge_storage::SessionStore;
use chatbridge_telegram::TelegramTransport;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::verify::WebhookAuth;

/// Snapshot reported by the health endpoint.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: Instant,
    pub auth_mode: &'static str,
    pub telegram_inbox: Option<i64>,
    pub discord_inbox: Option<i64>,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub inbound: Arc<InboundRelay>,
    pub outbound: Arc<OutboundRelay>,
    pub store: SessionStore,
    pub telegram: Option<Arc<TelegramTransport>>,
    pub discord: Option<Arc<DiscordTransport>>,
    pub webhook_auth: Arc<WebhookAuth>,
    pub telegram_secret: Option<String>,
    pub health: HealthState,
}

/// Build the gateway router.
///
/// `/webhook` is an alias for `/chatwoot/webhook`, kept for deployments
/// that registered the shorter path.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/telegram/webhook", post(handlers::telegram_webhook))
        .route("/chatwoot/webhook", post(handlers::chatwoot_webhook))
        .route("/webhook", post(handlers::chatwoot_webhook))
        .route("/tickets", post(handlers::create_ticket))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until the shutdown future resolves.
pub async fn start_server(
    bind_address: &str,
    port: u16,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<(), BridgeError> {
    let app = router(state);
    let addr = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| BridgeError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| BridgeError::Internal(format!("gateway server error: {e}")))
}
