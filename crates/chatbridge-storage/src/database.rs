// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background thread.
//! Do NOT create additional Connection instances for writes.

use chatbridge_core::error::BridgeError;
use tokio_rusqlite::Connection;

use crate::migrations::run_migrations;

/// Handle to the bridge's SQLite database.
///
/// Cloning is cheap: the underlying connection is shared and all calls go
/// through the same background worker thread.
#[derive(Clone)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the database at `path`, apply PRAGMAs, and run
    /// pending migrations.
    pub async fn open(path: &str) -> Result<Self, BridgeError> {
        Self::open_with_options(path, true).await
    }

    /// Open with explicit control over WAL mode. Non-WAL is only useful
    /// for databases on filesystems that do not support it.
    pub async fn open_with_options(path: &str, wal_mode: bool) -> Result<Self, BridgeError> {
        let conn = Connection::open(path).await.map_err(|e| BridgeError::Storage {
            source: Box::new(e),
        })?;

        // The closure carries its own error type so pragma failures and
        // migration failures can both travel through `?`.
        conn.call(
            move |conn| -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
                if wal_mode {
                    conn.pragma_update(None, "journal_mode", "WAL")?;
                }
                conn.pragma_update(None, "synchronous", "NORMAL")?;
                conn.pragma_update(None, "foreign_keys", "ON")?;
                conn.busy_timeout(std::time::Duration::from_secs(5))?;
                run_migrations(conn)?;
                Ok(())
            },
        )
        .await
        .map_err(|e| BridgeError::Storage {
            source: match e {
                tokio_rusqlite::Error::Error(inner) => inner,
                other => other.to_string().into(),
            },
        })?;

        tracing::debug!(path, wal_mode, "database opened");
        Ok(Self { conn })
    }

    /// Access the underlying async connection for query modules.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Flush and close the connection.
    pub async fn close(self) -> Result<(), BridgeError> {
        self.conn.close().await.map_err(map_tr_err)
    }
}

/// Map a tokio-rusqlite error into the bridge's storage error.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> BridgeError {
    BridgeError::Storage {
        source: Box::new(e),
    }
}
