// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Enforces the startup requirements that cannot be expressed via serde
//! attributes: the helpdesk endpoint, usable credential material, and at
//! least one enabled chat front-end. Any error here is fatal; the process
//! must not start serving with a broken configuration.

use crate::diagnostic::ConfigError;
use crate::model::BridgeConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)`
/// with all collected validation errors (does not fail fast).
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    match config.chatwoot.base_url.as_deref().map(str::trim) {
        None | Some("") => errors.push(ConfigError::Validation {
            message: "chatwoot.base_url is required".to_string(),
        }),
        Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
            errors.push(ConfigError::Validation {
                message: format!("chatwoot.base_url `{url}` must be an http(s) URL"),
            });
        }
        _ => {}
    }

    if config.chatwoot.account_id <= 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "chatwoot.account_id must be positive, got {}",
                config.chatwoot.account_id
            ),
        });
    }

    // Either a static API token, or enough Devise material to sign in.
    let has_api_token = is_set(&config.chatwoot.api_token);
    let has_devise_seed = is_set(&config.chatwoot.access_token)
        && is_set(&config.chatwoot.client)
        && is_set(&config.chatwoot.uid);
    let can_sign_in = is_set(&config.chatwoot.uid) && is_set(&config.chatwoot.password);
    if !has_api_token && !has_devise_seed && !can_sign_in {
        errors.push(ConfigError::Validation {
            message: "chatwoot credentials required: set chatwoot.api_token, or the \
                      access_token/client/uid triple, or uid + password for sign-in"
                .to_string(),
        });
    }

    let telegram_enabled = is_set(&config.telegram.bot_token);
    let discord_enabled = is_set(&config.discord.bot_token);
    if !telegram_enabled && !discord_enabled {
        errors.push(ConfigError::Validation {
            message: "at least one front-end must be configured: set telegram.bot_token \
                      and/or discord.bot_token"
                .to_string(),
        });
    }

    if telegram_enabled && config.telegram.inbox_id.is_none() {
        errors.push(ConfigError::Validation {
            message: "telegram.inbox_id is required when telegram.bot_token is set".to_string(),
        });
    }

    if discord_enabled && config.discord.inbox_id.is_none() {
        errors.push(ConfigError::Validation {
            message: "discord.inbox_id is required when discord.bot_token is set".to_string(),
        });
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.relay.fetch_attempts == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.fetch_attempts must be at least 1".to_string(),
        });
    }

    if config.relay.dedup_capacity == 0 {
        errors.push(ConfigError::Validation {
            message: "relay.dedup_capacity must be at least 1".to_string(),
        });
    }

    if errors.is_empty() { Ok(()) } else { Err(errors) }
}

fn is_set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}
