// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the chatbridge relay.

use thiserror::Error;

/// The primary error type used across all chatbridge crates.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Configuration errors (missing endpoints, credential material, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Helpdesk API errors (contact/conversation/message operations, sign-in).
    #[error("helpdesk error: {message}")]
    Helpdesk {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Chat platform errors (Telegram/Discord send or download failure).
    #[error("channel error: {message}")]
    Channel {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// An event references a conversation or chat with no known mapping.
    /// Logged and dropped by callers; retrying cannot create the mapping.
    #[error("unresolvable routing: {0}")]
    Routing(String),

    /// Attachment download or upload failure after retries.
    #[error("attachment error: {message}")]
    Attachment {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Shorthand for a helpdesk error without an underlying source.
    pub fn helpdesk(message: impl Into<String>) -> Self {
        Self::Helpdesk {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a channel error without an underlying source.
    pub fn channel(message: impl Into<String>) -> Self {
        Self::Channel {
            message: message.into(),
            source: None,
        }
    }
}
