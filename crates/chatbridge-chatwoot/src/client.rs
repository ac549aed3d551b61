// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Chatwoot application API.
//!
//! Every request goes through the refresh-and-retry protocol: Devise
//! headers are read from the current credential snapshot; a 401 takes the
//! refresh lock, re-signs in via `/auth/sign_in` (unless another task beat
//! us to it), and retries the original request exactly once. Multipart
//! bodies are buffered so the retry can rebuild them.

use std::sync::Arc;
use std::time::Duration;

use chatbridge_config::model::ChatwootConfig;
use chatbridge_core::error::BridgeError;
use chatbridge_core::types::FileUpload;
use reqwest::{Method, StatusCode};
use tracing::{debug, warn};

use crate::credentials::{CredentialState, DeviseTokens};

/// A request body that can be rebuilt for the post-refresh retry.
pub enum Payload {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartPayload),
}

/// Buffered multipart form: plain fields plus file parts.
#[derive(Clone, Default)]
pub struct MultipartPayload {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, FileUpload)>,
}

impl MultipartPayload {
    fn to_form(&self) -> reqwest::multipart::Form {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in &self.fields {
            form = form.text(name.clone(), value.clone());
        }
        for (name, file) in &self.files {
            let part = reqwest::multipart::Part::bytes(file.data.clone())
                .file_name(file.file_name.clone());
            let part = match part.mime_str(&file.content_type) {
                Ok(part) => part,
                Err(_) => reqwest::multipart::Part::bytes(file.data.clone())
                    .file_name(file.file_name.clone()),
            };
            form = form.part(name.clone(), part);
        }
        form
    }
}

/// Fields sent when creating a helpdesk contact.
#[derive(Debug, Clone)]
pub struct NewContact {
    pub inbox_id: i64,
    pub source_id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

/// Result of a contact create attempt. Chatwoot answers 422 when the
/// derived email is already taken.
#[derive(Debug, PartialEq, Eq)]
pub enum CreateContactOutcome {
    Created(i64),
    AlreadyExists,
}

/// One entry of a contact's conversation list, in the fields the bridge
/// cares about.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub id: i64,
    pub display_id: Option<i64>,
    pub inbox_id: Option<i64>,
    pub status: String,
}

/// Chatwoot application API client.
pub struct ChatwootClient {
    http: reqwest::Client,
    base_url: String,
    account_id: i64,
    credentials: Arc<CredentialState>,
}

impl ChatwootClient {
    pub fn new(config: &ChatwootConfig) -> Result<Self, BridgeError> {
        let base_url = config
            .base_url
            .as_deref()
            .map(|u| u.trim_end_matches('/').to_string())
            .ok_or_else(|| BridgeError::Config("chatwoot.base_url is required".to_string()))?;

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .user_agent("chatbridge/0.1")
            .build()
            .map_err(|e| BridgeError::Helpdesk {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            http,
            base_url,
            account_id: config.account_id,
            credentials: Arc::new(CredentialState::from_config(config)),
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialState> {
        &self.credentials
    }

    pub fn auth_mode(&self) -> &'static str {
        self.credentials.auth_mode()
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/api/v1/accounts/{}{}",
            self.base_url, self.account_id, path
        )
    }

    async fn send(
        &self,
        method: &Method,
        url: &str,
        payload: &Payload,
        snapshot: Option<&Arc<DeviseTokens>>,
    ) -> Result<reqwest::Response, BridgeError> {
        let mut req = self.http.request(method.clone(), url);
        for (name, value) in self.credentials.headers_for(snapshot) {
            req = req.header(name, value);
        }
        req = match payload {
            Payload::Empty => req,
            Payload::Json(body) => req.json(body),
            Payload::Multipart(multipart) => req.multipart(multipart.to_form()),
        };
        req.send().await.map_err(|e| BridgeError::Helpdesk {
            message: format!("{method} {url} failed: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Send a request against the application API, refreshing Devise
    /// credentials and retrying once on 401.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        payload: Payload,
    ) -> Result<reqwest::Response, BridgeError> {
        let url = self.api_url(path);
        let before = self.credentials.snapshot();
        let resp = self.send(&method, &url, &payload, before.as_ref()).await?;

        if resp.status() != StatusCode::UNAUTHORIZED || self.credentials.is_static() {
            self.credentials.update_from_headers(resp.headers());
            return Ok(resp);
        }

        warn!(%method, path, "got 401, attempting credential refresh");
        {
            let _guard = self.credentials.refresh_lock().lock().await;
            let current = self.credentials.snapshot();
            let refreshed_elsewhere = match (&before, &current) {
                (Some(before), Some(current)) => before.access_token != current.access_token,
                (before, current) => before.is_some() != current.is_some(),
            };
            if !refreshed_elsewhere && !self.sign_in().await {
                // Refresh failed: surface the original 401 to the caller.
                return Ok(resp);
            }
        }

        let snapshot = self.credentials.snapshot();
        let retry = self.send(&method, &url, &payload, snapshot.as_ref()).await?;
        self.credentials.update_from_headers(retry.headers());
        Ok(retry)
    }

    /// Re-authenticate via `/auth/sign_in`, installing the returned triple.
    /// Returns false (after logging) when sign-in is impossible or fails.
    async fn sign_in(&self) -> bool {
        let Some(email) = self.credentials.sign_in_email() else {
            tracing::error!("cannot re-authenticate: no uid configured");
            return false;
        };
        let Some(password) = self.credentials.password() else {
            tracing::error!("cannot re-authenticate: no password configured");
            return false;
        };

        let url = format!("{}/auth/sign_in", self.base_url);
        let result = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await;
        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                tracing::error!(error = %e, "sign_in request failed");
                return false;
            }
        };
        if resp.status() != StatusCode::OK {
            tracing::error!(status = %resp.status(), "sign_in rejected");
            return false;
        }

        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let access_token = header("access-token");
        let client = header("client");
        let uid = header("uid");

        // Some installations return the token in the body instead.
        let body: serde_json::Value = resp.json().await.unwrap_or_default();
        let data = body.get("data").unwrap_or(&body);
        let body_str = |key: &str| {
            data.get(key)
                .and_then(|v| v.as_str())
                .map(str::to_string)
                .filter(|v| !v.is_empty())
        };

        let Some(access_token) = access_token.or_else(|| body_str("access_token")) else {
            tracing::error!("sign_in succeeded but returned no access token");
            return false;
        };
        let previous = self.credentials.snapshot();
        self.credentials.install(DeviseTokens {
            access_token,
            client: client
                .or_else(|| previous.as_ref().map(|t| t.client.clone()))
                .unwrap_or_default(),
            uid: uid.or_else(|| body_str("uid")).unwrap_or(email),
        });
        tracing::info!("re-authenticated with helpdesk");
        true
    }

    /// Parse a successful JSON response; map error statuses to a helpdesk
    /// error carrying the status and a body snippet.
    async fn expect_json(resp: reqwest::Response) -> Result<serde_json::Value, BridgeError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(400).collect();
            return Err(BridgeError::helpdesk(format!(
                "helpdesk returned {status}: {snippet}"
            )));
        }
        resp.json().await.map_err(|e| BridgeError::Helpdesk {
            message: format!("invalid JSON from helpdesk: {e}"),
            source: Some(Box::new(e)),
        })
    }

    // ---- Contacts ----

    /// Look up a contact by the derived email; returns its id when found.
    pub async fn search_contact(&self, query: &str) -> Result<Option<i64>, BridgeError> {
        let path = format!("/contacts/search?q={}", urlencode(query));
        let resp = self.request(Method::GET, &path, Payload::Empty).await?;
        let body = Self::expect_json(resp).await?;
        let id = body
            .get("payload")
            .and_then(|p| p.as_array())
            .and_then(|items| items.first())
            .and_then(|c| c.get("id"))
            .and_then(as_i64);
        Ok(id)
    }

    /// Create a contact; 422 (email taken) is reported as `AlreadyExists`
    /// so the caller can fall back to search.
    pub async fn create_contact(
        &self,
        contact: &NewContact,
    ) -> Result<CreateContactOutcome, BridgeError> {
        let mut body = serde_json::json!({
            "inbox_id": contact.inbox_id,
            "source_id": contact.source_id,
            "name": contact.name,
            "email": contact.email,
        });
        if let Some(avatar_url) = &contact.avatar_url {
            body["avatar_url"] = serde_json::Value::String(avatar_url.clone());
        }
        let resp = self
            .request(Method::POST, "/contacts", Payload::Json(body))
            .await?;
        if resp.status() == StatusCode::UNPROCESSABLE_ENTITY {
            debug!(email = %contact.email, "contact already exists");
            return Ok(CreateContactOutcome::AlreadyExists);
        }
        let body = Self::expect_json(resp).await?;
        let id = body
            .get("id")
            .and_then(as_i64)
            .or_else(|| {
                body.pointer("/payload/contact/id").and_then(as_i64)
            })
            .ok_or_else(|| BridgeError::helpdesk("contact create returned no id"))?;
        Ok(CreateContactOutcome::Created(id))
    }

    /// Raw contact detail; used to compare the stored avatar hash before
    /// re-uploading.
    pub async fn get_contact(&self, contact_id: i64) -> Result<serde_json::Value, BridgeError> {
        let resp = self
            .request(
                Method::GET,
                &format!("/contacts/{contact_id}"),
                Payload::Empty,
            )
            .await?;
        Self::expect_json(resp).await
    }

    /// PATCH contact fields (name, avatar_url). Used best-effort.
    pub async fn update_contact(
        &self,
        contact_id: i64,
        fields: serde_json::Value,
    ) -> Result<(), BridgeError> {
        let resp = self
            .request(
                Method::PATCH,
                &format!("/contacts/{contact_id}"),
                Payload::Json(fields),
            )
            .await?;
        Self::expect_json(resp).await.map(|_| ())
    }

    // ---- Conversations ----

    pub async fn contact_conversations(
        &self,
        contact_id: i64,
    ) -> Result<Vec<ConversationSummary>, BridgeError> {
        let resp = self
            .request(
                Method::GET,
                &format!("/contacts/{contact_id}/conversations"),
                Payload::Empty,
            )
            .await?;
        let body = Self::expect_json(resp).await?;
        let items = body
            .get("payload")
            .or_else(|| body.get("data"))
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let mut conversations = Vec::with_capacity(items.len());
        for item in &items {
            let Some(id) = item.get("id").and_then(as_i64) else {
                continue;
            };
            conversations.push(ConversationSummary {
                id,
                display_id: item.get("display_id").and_then(as_i64),
                inbox_id: item
                    .pointer("/inbox/id")
                    .or_else(|| item.get("inbox_id"))
                    .and_then(as_i64),
                status: item
                    .get("status")
                    .and_then(|s| s.as_str())
                    .unwrap_or_default()
                    .to_lowercase(),
            });
        }
        Ok(conversations)
    }

    pub async fn create_conversation(
        &self,
        source_id: &str,
        inbox_id: i64,
        contact_id: i64,
    ) -> Result<i64, BridgeError> {
        let body = serde_json::json!({
            "source_id": source_id,
            "inbox_id": inbox_id,
            "contact_id": contact_id,
        });
        let resp = self
            .request(Method::POST, "/conversations", Payload::Json(body))
            .await?;
        let body = Self::expect_json(resp).await?;
        body.get("id")
            .and_then(as_i64)
            .ok_or_else(|| BridgeError::helpdesk("conversation create returned no id"))
    }

    /// Raw conversation detail, used as the last resort to recover the
    /// chat identity from `contact_inbox.source_id`.
    pub async fn get_conversation(
        &self,
        conversation_id: i64,
    ) -> Result<serde_json::Value, BridgeError> {
        let resp = self
            .request(
                Method::GET,
                &format!("/conversations/{conversation_id}"),
                Payload::Empty,
            )
            .await?;
        Self::expect_json(resp).await
    }

    // ---- Messages ----

    /// Post an incoming text message into a conversation.
    pub async fn post_text_message(
        &self,
        conversation_id: i64,
        content: &str,
    ) -> Result<(), BridgeError> {
        let body = serde_json::json!({
            "content": content,
            "message_type": 0,
            "private": false,
        });
        let resp = self
            .request(
                Method::POST,
                &format!("/conversations/{conversation_id}/messages"),
                Payload::Json(body),
            )
            .await?;
        Self::expect_json(resp).await.map(|_| ())
    }

    /// Post an incoming message with file attachments. Attachment-only
    /// messages use a single-space placeholder content.
    pub async fn post_incoming_multipart(
        &self,
        conversation_id: i64,
        content: &str,
        uploads: Vec<FileUpload>,
    ) -> Result<(), BridgeError> {
        let content = if content.is_empty() { " " } else { content };
        let payload = MultipartPayload {
            fields: vec![
                ("content".to_string(), content.to_string()),
                ("message_type".to_string(), "incoming".to_string()),
                ("private".to_string(), "false".to_string()),
            ],
            files: uploads
                .into_iter()
                .map(|f| ("attachments[]".to_string(), f))
                .collect(),
        };
        let resp = self
            .request(
                Method::POST,
                &format!("/conversations/{conversation_id}/messages"),
                Payload::Multipart(payload),
            )
            .await?;
        Self::expect_json(resp).await.map(|_| ())
    }
}

fn as_i64(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn urlencode(value: &str) -> String {
    use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
    utf8_percent_encode(value, NON_ALPHANUMERIC).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencode_escapes_reserved_characters() {
        assert_eq!(urlencode("42@telegram"), "42%40telegram");
        assert_eq!(urlencode("a b"), "a%20b");
    }

    #[test]
    fn multipart_payload_rebuilds_form() {
        let payload = MultipartPayload {
            fields: vec![("content".into(), " ".into())],
            files: vec![(
                "attachments[]".into(),
                FileUpload {
                    file_name: "photo.jpg".into(),
                    content_type: "image/jpeg".into(),
                    data: vec![1, 2, 3],
                },
            )],
        };
        // Building twice must work; the buffered payload is reused on retry.
        let _first = payload.to_form();
        let _second = payload.to_form();
    }
}
