// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatwoot integration: REST client with transparent Devise credential
//! refresh, and webhook event normalization.

pub mod client;
pub mod credentials;
pub mod events;

pub use client::{
    ChatwootClient, ConversationSummary, CreateContactOutcome, MultipartPayload, NewContact,
    Payload,
};
pub use credentials::{CredentialState, DeviseTokens};
pub use events::{AgentMessage, ConversationClosed, EventAttachment, HelpdeskEvent};
