// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook gateway for the bridge.
//!
//! Serves the Telegram update webhook, the Chatwoot event webhook, the
//! Discord ticket-open endpoint, and a health probe.

pub mod handlers;
pub mod server;
pub mod verify;

pub use server::{router, start_server, GatewayState, HealthState};
pub use verify::WebhookAuth;
