// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `chatbridge serve` command implementation.
//!
//! Wires up storage, the helpdesk client, the relays, the configured
//! chat transports, and the webhook gateway, then serves until a
//! shutdown signal arrives.

use std::sync::Arc;
use std::time::Instant;

use chatbridge_chatwoot::client::ChatwootClient;
use chatbridge_config::model::BridgeConfig;
use chatbridge_core::best_effort;
use chatbridge_core::error::BridgeError;
use chatbridge_core::transport::ChatTransport;
use chatbridge_discord::DiscordTransport;
use chatbridge_gateway::{start_server, GatewayState, HealthState, WebhookAuth};
use chatbridge_relay::{
    AttachmentFetcher, ConversationIndex, InboundRelay, OutboundRelay, PlatformInboxes,
};
use chatbridge_telegram::TelegramTransport;
use tracing::{info, warn};

/// Runs the `chatbridge serve` command.
pub async fn run_serve(config: BridgeConfig) -> Result<(), BridgeError> {
    init_tracing(&config.service.log_level);

    info!("starting chatbridge serve");

    let store = chatbridge_storage::open_store(&config.storage).await?;
    let client = Arc::new(ChatwootClient::new(&config.chatwoot)?);
    let index = Arc::new(ConversationIndex::new());
    let fetcher = Arc::new(AttachmentFetcher::new(&config.relay)?);
    let inboxes = PlatformInboxes::from_config(&config);

    let inbound = Arc::new(InboundRelay::new(
        Arc::clone(&client),
        store.clone(),
        Arc::clone(&index),
        Arc::clone(&fetcher),
        inboxes,
    ));
    let mut outbound = OutboundRelay::new(
        Arc::clone(&client),
        store.clone(),
        index,
        fetcher,
        inboxes,
        config.relay.dedup_capacity,
    );

    let telegram = if config.telegram.bot_token.is_some() {
        let transport = Arc::new(TelegramTransport::new(&config.telegram)?);
        outbound.register_transport(Arc::clone(&transport) as Arc<dyn ChatTransport>);
        info!(inbox = ?config.telegram.inbox_id, "telegram front-end enabled");
        Some(transport)
    } else {
        None
    };
    let discord = if config.discord.bot_token.is_some() {
        let transport = Arc::new(DiscordTransport::new(&config.discord)?);
        outbound.register_transport(Arc::clone(&transport) as Arc<dyn ChatTransport>);
        info!(inbox = ?config.discord.inbox_id, "discord front-end enabled");
        Some(transport)
    } else {
        None
    };
    if telegram.is_none() && discord.is_none() {
        warn!("no chat front-end configured; only webhook endpoints will respond");
    }

    if let (Some(transport), Some(public_url)) =
        (&telegram, config.telegram.webhook_public_url.as_deref())
    {
        best_effort(
            "register telegram webhook",
            chatbridge_telegram::register_webhook(
                transport.bot(),
                public_url,
                config.telegram.webhook_secret_token.as_deref(),
            ),
        )
        .await;
    }

    let state = GatewayState {
        inbound,
        outbound: Arc::new(outbound),
        store,
        telegram,
        discord,
        webhook_auth: Arc::new(WebhookAuth::from_config(&config.chatwoot)),
        telegram_secret: config.telegram.webhook_secret_token.clone(),
        health: HealthState {
            start_time: Instant::now(),
            auth_mode: client.auth_mode(),
            telegram_inbox: config.telegram.inbox_id,
            discord_inbox: config.discord.inbox_id,
        },
    };

    start_server(
        &config.service.bind_address,
        config.service.port,
        state,
        shutdown_signal(),
    )
    .await
}

/// Resolves when SIGINT (Ctrl+C) or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => {
                info!("received SIGINT (Ctrl+C), shutting down");
            }
            _ = sigterm.recv() => {
                info!("received SIGTERM, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
        info!("received Ctrl+C, shutting down");
    }
}

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("chatbridge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
