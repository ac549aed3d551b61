// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory conversation → chat identity cache.
//!
//! Fast path for outbound routing; the session store remains the source
//! of truth and repopulates this cache after a restart.

use chatbridge_core::types::ChatIdentity;
use dashmap::DashMap;

#[derive(Default)]
pub struct ConversationIndex {
    map: DashMap<i64, ChatIdentity>,
}

impl ConversationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, conversation_id: i64, identity: ChatIdentity) {
        self.map.insert(conversation_id, identity);
    }

    pub fn get(&self, conversation_id: i64) -> Option<ChatIdentity> {
        self.map.get(&conversation_id).map(|e| e.value().clone())
    }

    pub fn remove(&self, conversation_id: i64) {
        self.map.remove(&conversation_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatbridge_core::types::Platform;

    #[test]
    fn insert_get_remove() {
        let index = ConversationIndex::new();
        let identity = ChatIdentity::new(Platform::Discord, "9");
        index.insert(5, identity.clone());
        assert_eq!(index.get(5), Some(identity));
        index.remove(5);
        assert_eq!(index.get(5), None);
    }
}
