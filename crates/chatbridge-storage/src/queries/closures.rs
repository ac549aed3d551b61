// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closure history operations.

use chatbridge_core::error::BridgeError;
use chatbridge_core::types::{ChatIdentity, Closure, Platform};
use rusqlite::params;

use crate::database::Database;

/// Append a closure record.
pub async fn insert_closure(db: &Database, closure: &Closure) -> Result<(), BridgeError> {
    let closure = closure.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO closures (platform, external_id, conversation_id, closed_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    closure.identity.platform.to_string(),
                    closure.identity.external_id,
                    closure.conversation_id,
                    closure.closed_at,
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(crate::database::map_tr_err)
}

/// Most recent closure for a chat identity, if any.
pub async fn last_closure(
    db: &Database,
    identity: &ChatIdentity,
) -> Result<Option<Closure>, BridgeError> {
    let identity = identity.clone();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT platform, external_id, conversation_id, closed_at
                 FROM closures WHERE platform = ?1 AND external_id = ?2
                 ORDER BY id DESC LIMIT 1",
            )?;
            let result = stmt.query_row(
                params![identity.platform.to_string(), identity.external_id],
                |row| {
                    let platform: String = row.get(0)?;
                    let platform: Platform = platform.parse().map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            0,
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    Ok(Closure {
                        identity: ChatIdentity {
                            platform,
                            external_id: row.get(1)?,
                        },
                        conversation_id: row.get(2)?,
                        closed_at: row.get(3)?,
                    })
                },
            );
            match result {
                Ok(closure) => Ok(Some(closure)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
        .map_err(crate::database::map_tr_err)
}
