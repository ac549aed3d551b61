// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared building blocks for the chatbridge helpdesk relay.
//!
//! Defines the error taxonomy, the chat-identity and attachment types used
//! across crate boundaries, the bounded dedup cache, the reusable retry
//! policy, and the [`ChatTransport`] trait implemented by the platform
//! adapters.

pub mod dedup;
pub mod error;
pub mod retry;
pub mod transport;
pub mod types;

pub use dedup::LruSet;
pub use error::BridgeError;
pub use retry::RetryPolicy;
pub use transport::ChatTransport;
pub use types::*;

use std::future::Future;

/// Runs a side-channel operation whose failure must never propagate.
///
/// Errors are logged with the given label and swallowed; callers get the
/// success value when there is one. Used for avatar sync, welcome messages,
/// and contact-name updates.
pub async fn best_effort<T, F>(what: &str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, BridgeError>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(error) => {
            tracing::warn!(%error, what, "best-effort operation failed");
            None
        }
    }
}
