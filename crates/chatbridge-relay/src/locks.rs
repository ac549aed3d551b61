// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-chat-identity serialization.
//!
//! Two webhook deliveries for the same chat must not race contact or
//! conversation creation. Each identity gets its own async mutex; locks
//! for distinct identities do not contend.

use std::sync::Arc;

use chatbridge_core::types::ChatIdentity;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<ChatIdentity, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for one identity, creating it on first use.
    pub async fn lock(&self, identity: &ChatIdentity) -> OwnedMutexGuard<()> {
        let mutex = self
            .locks
            .entry(identity.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        mutex.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_core::types::Platform;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn same_identity_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let running = Arc::new(AtomicU32::new(0));
        let identity = ChatIdentity::new(Platform::Telegram, "1");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let running = Arc::clone(&running);
            let identity = identity.clone();
            handles.push(tokio::spawn(async move {
                let _guard = locks.lock(&identity).await;
                assert_eq!(running.fetch_add(1, Ordering::SeqCst), 0);
                tokio::task::yield_now().await;
                running.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn distinct_identities_do_not_contend() {
        let locks = KeyedLocks::new();
        let a = locks.lock(&ChatIdentity::new(Platform::Telegram, "1")).await;
        // Holding identity "1" must not block identity "2".
        let _b = locks.lock(&ChatIdentity::new(Platform::Telegram, "2")).await;
        drop(a);
    }
}
