// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reusable bounded retry with exponential backoff.
//!
//! One policy parameterizes the two retry sites in the bridge (attachment
//! fetch on transient 404, store write retry) instead of two hand-rolled
//! loops. The retryable predicate decides which errors are worth another
//! attempt; everything else fails immediately.

use std::future::Future;
use std::time::Duration;

/// Bounded retry policy: `max_attempts` total tries, delays of
/// `base_delay * 2^attempt` between them.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Policy matching the helpdesk attachment store's eventual
    /// consistency: 4 attempts, 2s base delay (2s, 4s, 8s waits).
    pub const fn attachment_fetch() -> Self {
        Self::new(4, Duration::from_secs(2))
    }

    /// Runs `op` until it succeeds, a non-retryable error occurs, or the
    /// attempt budget is exhausted. The closure receives the zero-based
    /// attempt number.
    pub async fn run<T, E, F, Fut, P>(&self, mut op: F, retryable: P) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    if attempt + 1 >= attempts || !retryable(&error) {
                        return Err(error);
                    }
                    let wait = self.base_delay * 2u32.pow(attempt);
                    tracing::warn!(attempt = attempt + 1, ?wait, "retrying after transient failure");
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
            }
        }
    }
}
