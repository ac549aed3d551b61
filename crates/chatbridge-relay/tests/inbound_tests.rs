// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound relay scenarios against a mocked helpdesk.

use std::sync::Arc;
use std::time::Duration;

use chatbridge_chatwoot::client::ChatwootClient;
use chatbridge_config::model::ChatwootConfig;
use chatbridge_core::retry::RetryPolicy;
use chatbridge_core::types::{ChatIdentity, Platform};
use chatbridge_relay::{
    AttachmentFetcher, ConversationIndex, InboundMessage, InboundRelay, OpenTicket,
    PlatformInboxes,
};
use chatbridge_storage::{Database, SessionStore};
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn setup_relay(server: &MockServer) -> (Arc<InboundRelay>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(dir.path().join("test.db").to_str().unwrap())
        .await
        .unwrap();
    let store = SessionStore::new(db);
    let config = ChatwootConfig {
        base_url: Some(server.uri()),
        account_id: 1,
        api_token: Some("tok".to_string()),
        ..Default::default()
    };
    let client = Arc::new(ChatwootClient::new(&config).unwrap());
    let fetcher = Arc::new(
        AttachmentFetcher::with_policy(RetryPolicy::new(2, Duration::from_millis(10)), 1024 * 1024)
            .unwrap(),
    );
    let inboxes = PlatformInboxes {
        telegram: Some(5),
        discord: Some(7),
    };
    let relay = Arc::new(InboundRelay::new(
        client,
        store,
        Arc::new(ConversationIndex::new()),
        fetcher,
        inboxes,
    ));
    (relay, dir)
}

/// Mocks for the full first-message flow: contact search misses, contact
/// create, empty conversation list, conversation create, message post.
async fn mount_new_ticket_mocks(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/1/contacts/search"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"payload": []})),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/1/contacts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 21})))
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/1/contacts/21/conversations"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"payload": []})),
        )
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/1/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 40})))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn first_message_creates_contact_conversation_and_posts() {
    let server = MockServer::start().await;
    mount_new_ticket_mocks(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/1/conversations/40/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let (relay, _dir) = setup_relay(&server).await;
    let identity = ChatIdentity::new(Platform::Telegram, "42");
    relay
        .handle(
            &identity,
            InboundMessage {
                display_name: Some("Ada".to_string()),
                text: "hello support".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let session = relay.store().get(&identity).await.unwrap().unwrap();
    assert_eq!(session.contact_id, Some(21));
    assert_eq!(session.conversation_id, Some(40));
    assert_eq!(session.display_name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn second_message_reuses_recorded_conversation() {
    let server = MockServer::start().await;
    mount_new_ticket_mocks(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/1/conversations/40/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
        .expect(2)
        .mount(&server)
        .await;

    let (relay, _dir) = setup_relay(&server).await;
    let identity = ChatIdentity::new(Platform::Telegram, "42");
    for text in ["first", "second"] {
        relay
            .handle(
                &identity,
                InboundMessage {
                    display_name: Some("Ada".to_string()),
                    text: text.to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }
    // The expect(1) counters on the create mocks verify no duplicates.
}

#[tokio::test]
async fn concurrent_messages_create_one_conversation() {
    let server = MockServer::start().await;
    mount_new_ticket_mocks(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/1/conversations/40/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
        .expect(4)
        .mount(&server)
        .await;

    let (relay, _dir) = setup_relay(&server).await;
    let identity = ChatIdentity::new(Platform::Telegram, "42");
    let mut handles = Vec::new();
    for i in 0..4 {
        let relay = Arc::clone(&relay);
        let identity = identity.clone();
        handles.push(tokio::spawn(async move {
            relay
                .handle(
                    &identity,
                    InboundMessage {
                        text: format!("message {i}"),
                        ..Default::default()
                    },
                )
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn create_conflict_falls_back_to_search() {
    let server = MockServer::start().await;
    // First search misses; create answers 422; second search finds it.
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/1/contacts/search"))
        .and(query_param("q", "42@discord"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"payload": []})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/1/contacts"))
        .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
            "message": "Email has already been taken"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/1/contacts/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "payload": [{"id": 77}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/accounts/1/contacts/77/conversations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "payload": [{"id": 90, "status": "open", "inbox": {"id": 7}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/1/conversations/90/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
        .mount(&server)
        .await;

    let (relay, _dir) = setup_relay(&server).await;
    let identity = ChatIdentity::new(Platform::Discord, "42");
    relay
        .handle(
            &identity,
            InboundMessage {
                text: "hi".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let session = relay.store().get(&identity).await.unwrap().unwrap();
    // Reused the found contact and its open conversation in our inbox.
    assert_eq!(session.contact_id, Some(77));
    assert_eq!(session.conversation_id, Some(90));
}

#[tokio::test]
async fn open_ticket_posts_welcome_and_returns_refs() {
    let server = MockServer::start().await;
    mount_new_ticket_mocks(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/v1/accounts/1/conversations/40/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let (relay, _dir) = setup_relay(&server).await;
    let identity = ChatIdentity::new(Platform::Discord, "555");
    let refs = relay
        .open_ticket(
            &identity,
            OpenTicket {
                name: "Grace".to_string(),
                email: Some("grace@example.com".to_string()),
                problem: Some("cannot log in".to_string()),
                avatar: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(refs.contact_id, 21);
    assert_eq!(refs.conversation_id, 40);

    let session = relay.store().get(&identity).await.unwrap().unwrap();
    assert_eq!(session.display_name.as_deref(), Some("Grace"));
    assert_eq!(session.conversation_id, Some(40));
}
