// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chatwoot credential state.
//!
//! Two modes: a static API access token (no rotation), or a Devise
//! token-auth triple that Chatwoot may rotate on any response. The triple
//! is read lock-free via arc-swap on every request; rotation installs a
//! fresh snapshot. The refresh mutex serializes `/auth/sign_in` so a burst
//! of 401s produces a single re-authentication.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use chatbridge_config::model::ChatwootConfig;
use reqwest::header::HeaderMap;

/// One immutable snapshot of the Devise token-auth triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviseTokens {
    pub access_token: String,
    pub client: String,
    pub uid: String,
}

/// Shared credential state for the Chatwoot client.
pub struct CredentialState {
    api_token: Option<String>,
    tokens: ArcSwapOption<DeviseTokens>,
    uid: Option<String>,
    password: Option<String>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl CredentialState {
    pub fn from_config(config: &ChatwootConfig) -> Self {
        let tokens = match (&config.access_token, &config.client, &config.uid) {
            (Some(access_token), Some(client), Some(uid))
                if !access_token.is_empty() && !client.is_empty() && !uid.is_empty() =>
            {
                Some(Arc::new(DeviseTokens {
                    access_token: access_token.clone(),
                    client: client.clone(),
                    uid: uid.clone(),
                }))
            }
            _ => None,
        };
        Self {
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
            tokens: ArcSwapOption::from(tokens),
            uid: config.uid.clone(),
            password: config.password.clone(),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// True when a static API token is configured; 401s are then final.
    pub fn is_static(&self) -> bool {
        self.api_token.is_some()
    }

    /// Reported by the health endpoint.
    pub fn auth_mode(&self) -> &'static str {
        if self.api_token.is_some() {
            "api_token"
        } else if self.tokens.load().is_some() {
            "devise"
        } else {
            "none"
        }
    }

    /// Email used by `/auth/sign_in`: the live uid, falling back to the
    /// configured seed.
    pub fn sign_in_email(&self) -> Option<String> {
        self.tokens
            .load()
            .as_ref()
            .map(|t| t.uid.clone())
            .or_else(|| self.uid.clone())
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn snapshot(&self) -> Option<Arc<DeviseTokens>> {
        self.tokens.load_full()
    }

    pub fn install(&self, tokens: DeviseTokens) {
        self.tokens.store(Some(Arc::new(tokens)));
    }

    pub fn refresh_lock(&self) -> &tokio::sync::Mutex<()> {
        &self.refresh_lock
    }

    /// Authentication headers for one request, pinned to the given
    /// snapshot so a retry after refresh sees different headers.
    pub fn headers_for(&self, snapshot: Option<&Arc<DeviseTokens>>) -> Vec<(&'static str, String)> {
        let mut headers = vec![("Accept", "application/json".to_string())];
        if let Some(token) = &self.api_token {
            headers.push(("api_access_token", token.clone()));
        } else if let Some(tokens) = snapshot {
            headers.push(("access-token", tokens.access_token.clone()));
            headers.push(("client", tokens.client.clone()));
            headers.push(("uid", tokens.uid.clone()));
        }
        headers
    }

    /// Opportunistic rotation: any response carrying all three Devise
    /// headers replaces the triple when it differs from the current one.
    pub fn update_from_headers(&self, headers: &HeaderMap) {
        if self.api_token.is_some() {
            return;
        }
        let get = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let (Some(access_token), Some(client), Some(uid)) =
            (get("access-token"), get("client"), get("uid"))
        else {
            return;
        };
        let fresh = DeviseTokens {
            access_token,
            client,
            uid,
        };
        let current = self.tokens.load();
        if current.as_deref() != Some(&fresh) {
            tracing::info!("devise tokens rotated from response headers");
            self.install(fresh);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderName, HeaderValue};

    fn devise_config() -> ChatwootConfig {
        ChatwootConfig {
            access_token: Some("t1".into()),
            client: Some("c1".into()),
            uid: Some("ops@example.com".into()),
            password: Some("secret".into()),
            ..Default::default()
        }
    }

    fn header_map(entries: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in entries {
            map.insert(
                HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn static_token_wins_over_devise() {
        let mut config = devise_config();
        config.api_token = Some("static".into());
        let state = CredentialState::from_config(&config);
        assert!(state.is_static());
        assert_eq!(state.auth_mode(), "api_token");
        let headers = state.headers_for(state.snapshot().as_ref());
        assert!(headers.iter().any(|(n, v)| *n == "api_access_token" && v == "static"));
        assert!(!headers.iter().any(|(n, _)| *n == "access-token"));
    }

    #[test]
    fn devise_headers_reflect_snapshot() {
        let state = CredentialState::from_config(&devise_config());
        assert_eq!(state.auth_mode(), "devise");
        let headers = state.headers_for(state.snapshot().as_ref());
        assert!(headers.iter().any(|(n, v)| *n == "access-token" && v == "t1"));
        assert!(headers.iter().any(|(n, v)| *n == "uid" && v == "ops@example.com"));
    }

    #[test]
    fn rotation_requires_all_three_headers() {
        let state = CredentialState::from_config(&devise_config());
        state.update_from_headers(&header_map(&[("access-token", "t2"), ("client", "c2")]));
        assert_eq!(state.snapshot().unwrap().access_token, "t1");

        state.update_from_headers(&header_map(&[
            ("access-token", "t2"),
            ("client", "c2"),
            ("uid", "ops@example.com"),
        ]));
        assert_eq!(state.snapshot().unwrap().access_token, "t2");
    }

    #[test]
    fn static_mode_never_rotates() {
        let mut config = devise_config();
        config.api_token = Some("static".into());
        let state = CredentialState::from_config(&config);
        state.update_from_headers(&header_map(&[
            ("access-token", "t2"),
            ("client", "c2"),
            ("uid", "u2"),
        ]));
        assert_eq!(state.snapshot().unwrap().access_token, "t1");
    }
}
