// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment fetcher behavior against a mocked file host.

use std::time::Duration;

use chatbridge_core::retry::RetryPolicy;
use chatbridge_relay::{AttachmentFetcher, AttachmentOutcome};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_fetcher(max_bytes: u64) -> AttachmentFetcher {
    AttachmentFetcher::with_policy(RetryPolicy::new(4, Duration::from_millis(10)), max_bytes)
        .unwrap()
}

#[tokio::test]
async fn transient_404_succeeds_on_later_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/photo.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/files/photo.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/jpeg")
                .set_body_bytes(vec![0xFF, 0xD8, 0xFF]),
        )
        .mount(&server)
        .await;

    let fetcher = fast_fetcher(1024);
    let outcome = fetcher
        .fetch(&format!("{}/files/photo.jpg", server.uri()), None)
        .await
        .unwrap();
    match outcome {
        AttachmentOutcome::Fetched(file) => {
            assert_eq!(file.file_name, "photo.jpg");
            assert_eq!(file.content_type, "image/jpeg");
            assert_eq!(file.data, vec![0xFF, 0xD8, 0xFF]);
        }
        other => panic!("expected fetched, got {other:?}"),
    }
}

#[tokio::test]
async fn persistent_404_is_skipped_after_all_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/gone.pdf"))
        .respond_with(ResponseTemplate::new(404))
        .expect(4)
        .mount(&server)
        .await;

    let fetcher = fast_fetcher(1024);
    let outcome = fetcher
        .fetch(&format!("{}/files/gone.pdf", server.uri()), None)
        .await
        .unwrap();
    assert!(matches!(outcome, AttachmentOutcome::Skipped("not found")));
}

#[tokio::test]
async fn server_error_fails_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/broken"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fast_fetcher(1024);
    let err = fetcher
        .fetch(&format!("{}/files/broken", server.uri()), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("500"), "got: {err}");
}

#[tokio::test]
async fn oversize_body_is_skipped() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/huge.bin"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/octet-stream")
                .set_body_bytes(vec![0u8; 64]),
        )
        .mount(&server)
        .await;

    let fetcher = fast_fetcher(16);
    let outcome = fetcher
        .fetch(&format!("{}/files/huge.bin", server.uri()), None)
        .await
        .unwrap();
    assert!(matches!(outcome, AttachmentOutcome::Skipped("too large")));
}

#[tokio::test]
async fn hint_fills_missing_content_type_and_extension() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/files/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1, 2, 3]))
        .mount(&server)
        .await;

    let fetcher = fast_fetcher(1024);
    let outcome = fetcher
        .fetch(&format!("{}/files/blob", server.uri()), Some("image/png"))
        .await
        .unwrap();
    match outcome {
        AttachmentOutcome::Fetched(file) => {
            assert_eq!(file.content_type, "image/png");
            assert_eq!(file.file_name, "blob.png");
        }
        other => panic!("expected fetched, got {other:?}"),
    }
}
