// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for the bridge.
//!
//! The store keeps the durable mapping between chat identities (Telegram
//! chats, Discord users) and their helpdesk contact/conversation ids, plus
//! an append-only log of closed conversations. Schema changes are shipped
//! as embedded refinery migrations and applied on open.

pub mod database;
pub mod migrations;
pub mod queries;
pub mod store;

pub use database::Database;
pub use store::SessionStore;

use chatbridge_config::model::StorageConfig;
use chatbridge_core::error::BridgeError;

/// Open the database described by the storage configuration and wrap it
/// in a [`SessionStore`].
pub async fn open_store(config: &StorageConfig) -> Result<SessionStore, BridgeError> {
    let db = Database::open_with_options(&config.database_path, config.wal_mode).await?;
    Ok(SessionStore::new(db))
}
