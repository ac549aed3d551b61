// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the chatbridge relay.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level bridge configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional at the serde level;
/// semantic requirements (helpdesk endpoint, at least one channel) are
/// enforced by post-deserialization validation.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    /// HTTP server binding and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// Chatwoot endpoint, credentials, and webhook verification.
    #[serde(default)]
    pub chatwoot: ChatwootConfig,

    /// Telegram front-end settings.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Discord front-end settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// SQLite session store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Attachment relay and dedup cache tuning.
    #[serde(default)]
    pub relay: RelayConfig,
}

/// HTTP server and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Address the webhook server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Port the webhook server binds to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5500
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Chatwoot endpoint and credential configuration.
///
/// Authentication is either a static API token (`api_token`) or a rotating
/// Devise triple bootstrapped from `access_token`/`client`/`uid` and
/// refreshed via `/auth/sign_in` using `password`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ChatwootConfig {
    /// Base URL of the Chatwoot installation, without trailing slash.
    #[serde(default)]
    pub base_url: Option<String>,

    /// Chatwoot account id.
    #[serde(default = "default_account_id")]
    pub account_id: i64,

    /// Static API access token. When set, credential refresh is disabled.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Devise `access-token` header seed.
    #[serde(default)]
    pub access_token: Option<String>,

    /// Devise `client` header seed.
    #[serde(default)]
    pub client: Option<String>,

    /// Devise `uid` header seed (the service account email).
    #[serde(default)]
    pub uid: Option<String>,

    /// Service account password used by `/auth/sign_in` refresh.
    #[serde(default)]
    pub password: Option<String>,

    /// When set, webhook bodies must carry a valid HMAC-SHA256 signature.
    #[serde(default)]
    pub webhook_hmac_secret: Option<String>,

    /// When set (and no HMAC secret is), webhook deliveries must carry
    /// this value in `X-Webhook-Token`.
    #[serde(default)]
    pub webhook_token: Option<String>,
}

impl Default for ChatwootConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            account_id: default_account_id(),
            api_token: None,
            access_token: None,
            client: None,
            uid: None,
            password: None,
            webhook_hmac_secret: None,
            webhook_token: None,
        }
    }
}

fn default_account_id() -> i64 {
    1
}

/// Telegram front-end configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Bot API token. The Telegram bridge is enabled when set.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Chatwoot inbox id Telegram conversations are filed under.
    #[serde(default)]
    pub inbox_id: Option<i64>,

    /// Expected `X-Telegram-Bot-Api-Secret-Token` header. Enforced when set.
    #[serde(default)]
    pub webhook_secret_token: Option<String>,

    /// Public HTTPS base of this service; when set, the webhook is
    /// registered with Telegram at startup.
    #[serde(default)]
    pub webhook_public_url: Option<String>,
}

/// Discord front-end configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DiscordConfig {
    /// Bot token. The Discord bridge is enabled when set.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Chatwoot inbox id Discord conversations are filed under.
    #[serde(default)]
    pub inbox_id: Option<i64>,
}

/// SQLite session store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL journal mode.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    "chatbridge.db".to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// Attachment relay and dedup cache tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Maximum attachment size in bytes; larger downloads are skipped.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Total attempts for a transiently-404ing attachment download.
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    /// Capacity of the in-memory dedup cache.
    #[serde(default = "default_dedup_capacity")]
    pub dedup_capacity: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: default_max_attachment_bytes(),
            fetch_attempts: default_fetch_attempts(),
            dedup_capacity: default_dedup_capacity(),
        }
    }
}

fn default_max_attachment_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_fetch_attempts() -> u32 {
    4
}

fn default_dedup_capacity() -> usize {
    4096
}
