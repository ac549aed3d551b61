// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Attachment download with bounded 404 retry.
//!
//! Helpdesk file URLs are backed by object storage and can 404 for a few
//! seconds after the webhook fires. A 404 is retried with exponential
//! backoff; every other error status is final. Oversize files are skipped,
//! not failed: the rest of the message still goes through.

use std::time::Duration;

use chatbridge_config::model::RelayConfig;
use chatbridge_core::error::BridgeError;
use chatbridge_core::retry::RetryPolicy;
use chatbridge_core::types::FileUpload;
use reqwest::StatusCode;
use tracing::warn;

/// Result of one attachment fetch. `Skipped` is a successful outcome:
/// the caller logs it and moves on without the file.
#[derive(Debug)]
pub enum AttachmentOutcome {
    Fetched(FileUpload),
    Skipped(&'static str),
}

enum FetchError {
    NotFound,
    Failed(BridgeError),
}

/// Downloads attachment URLs into memory, bounded by the configured
/// size limit.
pub struct AttachmentFetcher {
    http: reqwest::Client,
    policy: RetryPolicy,
    max_bytes: u64,
}

impl AttachmentFetcher {
    pub fn new(config: &RelayConfig) -> Result<Self, BridgeError> {
        Self::with_policy(
            RetryPolicy::new(
                config.fetch_attempts,
                RetryPolicy::attachment_fetch().base_delay,
            ),
            config.max_attachment_bytes,
        )
    }

    /// Explicit policy constructor, used where the backoff schedule must
    /// differ from the configured default.
    pub fn with_policy(policy: RetryPolicy, max_bytes: u64) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .user_agent("chatbridge/0.1")
            .build()
            .map_err(|e| BridgeError::Attachment {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;
        Ok(Self {
            http,
            policy,
            max_bytes,
        })
    }

    /// Download `url`, following redirects. The type hint (from the
    /// webhook attachment entry) is used when the response carries no
    /// usable content type.
    pub async fn fetch(
        &self,
        url: &str,
        type_hint: Option<&str>,
    ) -> Result<AttachmentOutcome, BridgeError> {
        let result = self
            .policy
            .run(
                |_| self.fetch_once(url, type_hint),
                |e| matches!(e, FetchError::NotFound),
            )
            .await;
        match result {
            Ok(outcome) => Ok(outcome),
            Err(FetchError::NotFound) => {
                warn!(url, "attachment still missing after retries, skipping");
                Ok(AttachmentOutcome::Skipped("not found"))
            }
            Err(FetchError::Failed(error)) => Err(error),
        }
    }

    async fn fetch_once(
        &self,
        url: &str,
        type_hint: Option<&str>,
    ) -> Result<AttachmentOutcome, FetchError> {
        let resp = self.http.get(url).send().await.map_err(|e| {
            FetchError::Failed(BridgeError::Attachment {
                message: format!("GET {url} failed: {e}"),
                source: Some(Box::new(e)),
            })
        })?;

        if resp.status() == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound);
        }
        if !resp.status().is_success() {
            return Err(FetchError::Failed(BridgeError::Attachment {
                message: format!("GET {url} returned {}", resp.status()),
                source: None,
            }));
        }
        if let Some(length) = resp.content_length() {
            if length > self.max_bytes {
                warn!(url, length, max = self.max_bytes, "attachment too large");
                return Ok(AttachmentOutcome::Skipped("too large"));
            }
        }

        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .filter(|v| !v.is_empty())
            .or_else(|| type_hint.map(str::to_string))
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let data = resp.bytes().await.map_err(|e| {
            FetchError::Failed(BridgeError::Attachment {
                message: format!("reading {url} failed: {e}"),
                source: Some(Box::new(e)),
            })
        })?;
        if data.len() as u64 > self.max_bytes {
            warn!(url, length = data.len(), max = self.max_bytes, "attachment too large");
            return Ok(AttachmentOutcome::Skipped("too large"));
        }

        let file_name = ensure_extension(filename_from_url(url), &content_type);
        Ok(AttachmentOutcome::Fetched(FileUpload {
            file_name,
            content_type,
            data: data.to_vec(),
        }))
    }
}

/// Last path segment of the URL, without query string. Falls back to
/// `"file"` when the path ends in a slash.
pub fn filename_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let name = path.rsplit('/').next().unwrap_or_default();
    if name.is_empty() {
        "file".to_string()
    } else {
        name.to_string()
    }
}

/// Append an extension derived from the content type when the name has
/// none. Common image types map explicitly; everything else goes through
/// a mime lookup, with `.bin` as the last resort.
pub fn ensure_extension(name: String, content_type: &str) -> String {
    if name.rsplit('/').next().unwrap_or(&name).contains('.') {
        return name;
    }
    let ext = match content_type {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => mime_guess::get_mime_extensions_str(content_type)
            .and_then(|exts| exts.first().copied())
            .unwrap_or("bin"),
    };
    format!("{name}.{ext}")
}

/// True when the attachment should be delivered as an inline image.
pub fn is_image(content_type: &str, file_name: &str) -> bool {
    if content_type.contains("image") {
        return true;
    }
    mime_guess::from_path(file_name)
        .first()
        .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_strips_query_and_path() {
        assert_eq!(
            filename_from_url("https://cw/rails/blobs/abc/photo.jpg?sig=zzz"),
            "photo.jpg"
        );
        assert_eq!(filename_from_url("https://cw/files/"), "file");
    }

    #[test]
    fn extension_appended_from_content_type() {
        assert_eq!(ensure_extension("photo".into(), "image/jpeg"), "photo.jpg");
        assert_eq!(ensure_extension("pic".into(), "image/webp"), "pic.webp");
        assert_eq!(ensure_extension("photo.png".into(), "image/jpeg"), "photo.png");
        assert_eq!(
            ensure_extension("blob".into(), "application/x-unknown-thing"),
            "blob.bin"
        );
    }

    #[test]
    fn image_classification() {
        assert!(is_image("image/png", "x"));
        assert!(is_image("image", "x"));
        assert!(is_image("application/octet-stream", "photo.jpg"));
        assert!(!is_image("application/pdf", "doc.pdf"));
    }
}
