// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! High-level session store used by the relays.
//!
//! Wraps the query modules with timestamps and a single write retry. A
//! transient SQLITE_BUSY under concurrent webhook load should not lose a
//! contact or conversation mapping.

use std::time::Duration;

use chatbridge_core::error::BridgeError;
use chatbridge_core::retry::RetryPolicy;
use chatbridge_core::types::{ChatIdentity, Closure, Session};

use crate::database::Database;
use crate::queries::{closures, sessions};

/// Writes are retried once after a short delay.
const WRITE_RETRY: RetryPolicy = RetryPolicy::new(2, Duration::from_millis(100));

/// The durable identity map: chat identity -> helpdesk contact/conversation,
/// plus closure history.
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn now() -> i64 {
        chrono::Utc::now().timestamp()
    }

    /// Fetch the session for `identity`, creating an empty row on first
    /// contact. Concurrent first messages collapse to one row.
    pub async fn get_or_create(&self, identity: &ChatIdentity) -> Result<Session, BridgeError> {
        let now = Self::now();
        let inserted = WRITE_RETRY
            .run(|_| sessions::insert_if_absent(&self.db, identity, now), |_| true)
            .await?;
        if inserted {
            tracing::info!(%identity, "created session");
        }
        sessions::get_session(&self.db, identity)
            .await?
            .ok_or_else(|| BridgeError::Internal(format!("session vanished for {identity}")))
    }

    pub async fn get(&self, identity: &ChatIdentity) -> Result<Option<Session>, BridgeError> {
        sessions::get_session(&self.db, identity).await
    }

    pub async fn set_contact(
        &self,
        identity: &ChatIdentity,
        contact_id: i64,
    ) -> Result<(), BridgeError> {
        let now = Self::now();
        WRITE_RETRY
            .run(
                |_| sessions::set_contact(&self.db, identity, contact_id, now),
                |_| true,
            )
            .await
    }

    /// Set or clear (`None`) the open conversation for an identity.
    pub async fn set_conversation(
        &self,
        identity: &ChatIdentity,
        conversation_id: Option<i64>,
    ) -> Result<(), BridgeError> {
        let now = Self::now();
        WRITE_RETRY
            .run(
                |_| sessions::set_conversation(&self.db, identity, conversation_id, now),
                |_| true,
            )
            .await
    }

    pub async fn set_display_name(
        &self,
        identity: &ChatIdentity,
        display_name: &str,
    ) -> Result<(), BridgeError> {
        let now = Self::now();
        WRITE_RETRY
            .run(
                |_| sessions::set_display_name(&self.db, identity, display_name, now),
                |_| true,
            )
            .await
    }

    /// Resolve a helpdesk conversation id to the session that owns it.
    pub async fn find_by_conversation(
        &self,
        conversation_id: i64,
    ) -> Result<Option<Session>, BridgeError> {
        sessions::find_by_conversation(&self.db, conversation_id).await
    }

    /// Record that the helpdesk closed a conversation for this identity.
    pub async fn record_closure(
        &self,
        identity: &ChatIdentity,
        conversation_id: i64,
    ) -> Result<(), BridgeError> {
        let closure = Closure {
            identity: identity.clone(),
            conversation_id,
            closed_at: Self::now(),
        };
        WRITE_RETRY
            .run(|_| closures::insert_closure(&self.db, &closure), |_| true)
            .await
    }

    pub async fn last_closure(
        &self,
        identity: &ChatIdentity,
    ) -> Result<Option<Closure>, BridgeError> {
        closures::last_closure(&self.db, identity).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_core::types::Platform;
    use tempfile::tempdir;

    async fn setup_store() -> (SessionStore, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("test.db").to_str().unwrap())
            .await
            .unwrap();
        (SessionStore::new(db), dir)
    }

    #[tokio::test]
    async fn get_or_create_is_idempotent() {
        let (store, _dir) = setup_store().await;
        let identity = ChatIdentity::new(Platform::Telegram, "555");

        let first = store.get_or_create(&identity).await.unwrap();
        let second = store.get_or_create(&identity).await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.contact_id, None);
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let (store, _dir) = setup_store().await;
        let identity = ChatIdentity::new(Platform::Discord, "777");

        store.get_or_create(&identity).await.unwrap();
        store.set_contact(&identity, 12).await.unwrap();
        store.set_display_name(&identity, "Grace").await.unwrap();
        store.set_conversation(&identity, Some(90)).await.unwrap();

        let session = store.get(&identity).await.unwrap().unwrap();
        assert_eq!(session.contact_id, Some(12));
        assert_eq!(session.conversation_id, Some(90));
        assert_eq!(session.display_name.as_deref(), Some("Grace"));

        let owner = store.find_by_conversation(90).await.unwrap().unwrap();
        assert_eq!(owner.identity, identity);

        // Helpdesk closes the conversation: clear the mapping, log history.
        store.record_closure(&identity, 90).await.unwrap();
        store.set_conversation(&identity, None).await.unwrap();

        assert!(store.find_by_conversation(90).await.unwrap().is_none());
        let closure = store.last_closure(&identity).await.unwrap().unwrap();
        assert_eq!(closure.conversation_id, 90);
    }
}
