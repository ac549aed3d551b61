// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session CRUD operations.

use chatbridge_core::error::BridgeError;
use chatbridge_core::types::{ChatIdentity, Platform, Session};
use rusqlite::params;

use crate::database::Database;

const SESSION_COLUMNS: &str =
    "platform, external_id, contact_id, conversation_id, display_name, created_at, updated_at";

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<Session> {
    let platform: String = row.get(0)?;
    let platform: Platform = platform.parse().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Session {
        identity: ChatIdentity {
            platform,
            external_id: row.get(1)?,
        },
        contact_id: row.get(2)?,
        conversation_id: row.get(3)?,
        display_name: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

/// Insert a session row if none exists for the identity yet.
///
/// Returns `true` if a row was inserted. Uses `INSERT OR IGNORE` so
/// concurrent first-message races collapse to a single row.
pub async fn insert_if_absent(
    db: &Database,
    identity: &ChatIdentity,
    now: i64,
) -> Result<bool, BridgeError> {
    let identity = identity.clone();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO sessions (platform, external_id, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![identity.platform.to_string(), identity.external_id, now, now],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Get the session for a chat identity.
pub async fn get_session(
    db: &Database,
    identity: &ChatIdentity,
) -> Result<Option<Session>, BridgeError> {
    let identity = identity.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE platform = ?1 AND external_id = ?2",
            ))?;
            let result = stmt.query_row(
                params![identity.platform.to_string(), identity.external_id],
                row_to_session,
            );
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the helpdesk contact id for an identity.
pub async fn set_contact(
    db: &Database,
    identity: &ChatIdentity,
    contact_id: i64,
    now: i64,
) -> Result<(), BridgeError> {
    let identity = identity.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET contact_id = ?1, updated_at = ?2
                 WHERE platform = ?3 AND external_id = ?4",
                params![
                    contact_id,
                    now,
                    identity.platform.to_string(),
                    identity.external_id
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record (or clear, with `None`) the open conversation for an identity.
pub async fn set_conversation(
    db: &Database,
    identity: &ChatIdentity,
    conversation_id: Option<i64>,
    now: i64,
) -> Result<(), BridgeError> {
    let identity = identity.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET conversation_id = ?1, updated_at = ?2
                 WHERE platform = ?3 AND external_id = ?4",
                params![
                    conversation_id,
                    now,
                    identity.platform.to_string(),
                    identity.external_id
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Record the user's display name as last seen on the chat platform.
pub async fn set_display_name(
    db: &Database,
    identity: &ChatIdentity,
    display_name: &str,
    now: i64,
) -> Result<(), BridgeError> {
    let identity = identity.clone();
    let display_name = display_name.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE sessions SET display_name = ?1, updated_at = ?2
                 WHERE platform = ?3 AND external_id = ?4",
                params![
                    display_name,
                    now,
                    identity.platform.to_string(),
                    identity.external_id
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Resolve a helpdesk conversation back to the chat identity that owns it.
pub async fn find_by_conversation(
    db: &Database,
    conversation_id: i64,
) -> Result<Option<Session>, BridgeError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE conversation_id = ?1",
            ))?;
            let result = stmt.query_row(params![conversation_id], row_to_session);
            match result {
                Ok(session) => Ok(Some(session)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let db = Database::open(db_path.to_str().unwrap()).await.unwrap();
        (db, dir)
    }

    fn telegram_chat(id: &str) -> ChatIdentity {
        ChatIdentity::new(Platform::Telegram, id)
    }

    #[tokio::test]
    async fn insert_and_get_roundtrips() {
        let (db, _dir) = setup_db().await;
        let identity = telegram_chat("100");

        assert!(insert_if_absent(&db, &identity, 1_000).await.unwrap());
        let session = get_session(&db, &identity).await.unwrap().unwrap();
        assert_eq!(session.identity, identity);
        assert_eq!(session.contact_id, None);
        assert_eq!(session.conversation_id, None);
        assert_eq!(session.created_at, 1_000);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn second_insert_is_ignored() {
        let (db, _dir) = setup_db().await;
        let identity = telegram_chat("100");

        assert!(insert_if_absent(&db, &identity, 1_000).await.unwrap());
        assert!(!insert_if_absent(&db, &identity, 2_000).await.unwrap());
        let session = get_session(&db, &identity).await.unwrap().unwrap();
        assert_eq!(session.created_at, 1_000);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn identities_are_scoped_by_platform() {
        let (db, _dir) = setup_db().await;
        let tg = telegram_chat("7");
        let dc = ChatIdentity::new(Platform::Discord, "7");

        insert_if_absent(&db, &tg, 1).await.unwrap();
        set_contact(&db, &tg, 55, 2).await.unwrap();

        assert!(get_session(&db, &dc).await.unwrap().is_none());
        let tg_session = get_session(&db, &tg).await.unwrap().unwrap();
        assert_eq!(tg_session.contact_id, Some(55));

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn conversation_can_be_set_and_cleared() {
        let (db, _dir) = setup_db().await;
        let identity = telegram_chat("8");
        insert_if_absent(&db, &identity, 1).await.unwrap();

        set_conversation(&db, &identity, Some(33), 2).await.unwrap();
        let found = find_by_conversation(&db, 33).await.unwrap().unwrap();
        assert_eq!(found.identity, identity);

        set_conversation(&db, &identity, None, 3).await.unwrap();
        assert!(find_by_conversation(&db, 33).await.unwrap().is_none());
        let session = get_session(&db, &identity).await.unwrap().unwrap();
        assert_eq!(session.conversation_id, None);
        assert_eq!(session.updated_at, 3);

        db.close().await.unwrap();
    }

    #[tokio::test]
    async fn display_name_updates() {
        let (db, _dir) = setup_db().await;
        let identity = telegram_chat("9");
        insert_if_absent(&db, &identity, 1).await.unwrap();

        set_display_name(&db, &identity, "Ada", 2).await.unwrap();
        let session = get_session(&db, &identity).await.unwrap().unwrap();
        assert_eq!(session.display_name.as_deref(), Some("Ada"));

        db.close().await.unwrap();
    }
}
