// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports the XDG hierarchy: `./chatbridge.toml` >
//! `~/.config/chatbridge/chatbridge.toml` > `/etc/chatbridge/chatbridge.toml`
//! with environment variable overrides via the `CHATBRIDGE_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::BridgeConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/chatbridge/chatbridge.toml` (system-wide)
/// 3. `~/.config/chatbridge/chatbridge.toml` (user XDG config)
/// 4. `./chatbridge.toml` (local directory)
/// 5. `CHATBRIDGE_*` environment variables
pub fn load_config() -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file("/etc/chatbridge/chatbridge.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("chatbridge/chatbridge.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("chatbridge.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<BridgeConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(BridgeConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `CHATBRIDGE_TELEGRAM_BOT_TOKEN` must map
/// to `telegram.bot_token`, not `telegram.bot.token`.
fn env_provider() -> Env {
    Env::prefixed("CHATBRIDGE_").map(|key| {
        // `key` is the lowercased env var name with the prefix stripped.
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("chatwoot_", "chatwoot.", 1)
            .replacen("telegram_", "telegram.", 1)
            .replacen("discord_", "discord.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("relay_", "relay.", 1);
        mapped.into()
    })
}
