// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Webhook request authentication and body decoding.

use std::io::Read;

use axum::http::{header, HeaderMap};
use chatbridge_config::model::ChatwootConfig;
use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use hmac::{Hmac, Mac};
use sha2::Sha256;

/// Verification material for helpdesk webhook deliveries.
///
/// Precedence: with an HMAC secret configured only a valid signature is
/// accepted; otherwise a shared token is compared when configured; with
/// neither, deliveries are accepted as-is.
pub struct WebhookAuth {
    hmac_secret: Option<String>,
    shared_token: Option<String>,
}

impl WebhookAuth {
    pub fn from_config(config: &ChatwootConfig) -> Self {
        Self {
            hmac_secret: config.webhook_hmac_secret.clone(),
            shared_token: config.webhook_token.clone(),
        }
    }

    pub fn verify(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        if let Some(secret) = &self.hmac_secret {
            let Some(provided) = header_str(headers, "x-chatwoot-webhook-signature")
                .or_else(|| header_str(headers, "x-chatwoot-signature"))
            else {
                return false;
            };
            let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
                return false;
            };
            mac.update(body);
            let expected = hex::encode(mac.finalize().into_bytes());
            return constant_time_eq(provided.trim(), &expected);
        }
        if let Some(token) = &self.shared_token {
            return header_str(headers, "x-webhook-token")
                .map(|provided| constant_time_eq(provided, token))
                .unwrap_or(false);
        }
        true
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name)?.to_str().ok()
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len()
        && a.bytes()
            .zip(b.bytes())
            .fold(0u8, |acc, (x, y)| acc | (x ^ y))
            == 0
}

/// Decompress the request body per its `Content-Encoding`. Deflate is
/// tried as zlib first, then raw, since senders disagree on framing.
pub fn decode_body(headers: &HeaderMap, body: &[u8]) -> Result<Vec<u8>, String> {
    let encoding = headers
        .get(header::CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match encoding.as_str() {
        "" | "identity" => Ok(body.to_vec()),
        "gzip" => {
            let mut out = Vec::new();
            GzDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| format!("bad gzip body: {e}"))?;
            Ok(out)
        }
        "deflate" => {
            let mut out = Vec::new();
            if ZlibDecoder::new(body).read_to_end(&mut out).is_ok() {
                return Ok(out);
            }
            out.clear();
            DeflateDecoder::new(body)
                .read_to_end(&mut out)
                .map_err(|e| format!("bad deflate body: {e}"))?;
            Ok(out)
        }
        other => Err(format!("unsupported content-encoding: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn auth(hmac_secret: Option<&str>, token: Option<&str>) -> WebhookAuth {
        WebhookAuth {
            hmac_secret: hmac_secret.map(str::to_string),
            shared_token: token.map(str::to_string),
        }
    }

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn hmac_mode_accepts_valid_signature_on_either_header() {
        let body = br#"{"event":"message_created"}"#;
        let signature = sign("s3cret", body);
        for name in ["x-chatwoot-webhook-signature", "x-chatwoot-signature"] {
            let mut headers = HeaderMap::new();
            headers.insert(name, signature.parse().unwrap());
            assert!(auth(Some("s3cret"), None).verify(&headers, body));
        }
    }

    #[test]
    fn hmac_mode_rejects_bad_or_missing_signature() {
        let body = b"payload";
        let mut headers = HeaderMap::new();
        assert!(!auth(Some("s3cret"), None).verify(&headers, body));
        headers.insert("x-chatwoot-signature", "deadbeef".parse().unwrap());
        assert!(!auth(Some("s3cret"), None).verify(&headers, body));
    }

    #[test]
    fn hmac_takes_precedence_over_token() {
        let mut headers = HeaderMap::new();
        headers.insert("x-webhook-token", "tok".parse().unwrap());
        assert!(!auth(Some("s3cret"), Some("tok")).verify(&headers, b"x"));
    }

    #[test]
    fn token_mode_compares_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-webhook-token", "tok".parse().unwrap());
        assert!(auth(None, Some("tok")).verify(&headers, b"x"));
        assert!(!auth(None, Some("other")).verify(&headers, b"x"));
        assert!(!auth(None, Some("tok")).verify(&HeaderMap::new(), b"x"));
    }

    #[test]
    fn open_mode_accepts_everything() {
        assert!(auth(None, None).verify(&HeaderMap::new(), b"anything"));
    }

    #[test]
    fn gzip_body_is_decoded() {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(b"{\"a\":1}").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, "gzip".parse().unwrap());
        assert_eq!(decode_body(&headers, &compressed).unwrap(), b"{\"a\":1}");
    }

    #[test]
    fn deflate_accepts_zlib_and_raw_framing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, "deflate".parse().unwrap());

        let mut zlib =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        zlib.write_all(b"zlib-framed").unwrap();
        assert_eq!(
            decode_body(&headers, &zlib.finish().unwrap()).unwrap(),
            b"zlib-framed"
        );

        let mut raw =
            flate2::write::DeflateEncoder::new(Vec::new(), flate2::Compression::default());
        raw.write_all(b"raw-framed").unwrap();
        assert_eq!(
            decode_body(&headers, &raw.finish().unwrap()).unwrap(),
            b"raw-framed"
        );
    }

    #[test]
    fn unknown_encoding_is_rejected() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_ENCODING, "br".parse().unwrap());
        assert!(decode_body(&headers, b"x").is_err());
    }
}
