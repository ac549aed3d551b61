// SPDX-FileCopyrightText: 2026 Chatbridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Avatar URL derivation from a Discord user object.

use serde_json::Value;

/// A user's avatar CDN URL plus a stable hash for change detection.
///
/// Users without a custom avatar get one of the default embed avatars;
/// the synthetic `default_{n}` hash keeps change detection working for
/// them too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvatarRef {
    pub url: String,
    pub hash: String,
}

/// Derive the avatar URL and hash from a `GET /users/{id}` response.
///
/// Custom avatars live under `cdn.discordapp.com/avatars`; an `a_` hash
/// prefix means the avatar is animated and served as GIF. Without a
/// custom avatar the default index comes from the legacy discriminator,
/// or from the user id for users migrated to unique usernames.
pub fn avatar_from_user(user: &Value, user_id: &str) -> AvatarRef {
    if let Some(hash) = user.get("avatar").and_then(Value::as_str).filter(|h| !h.is_empty()) {
        let ext = if hash.starts_with("a_") { "gif" } else { "png" };
        return AvatarRef {
            url: format!("https://cdn.discordapp.com/avatars/{user_id}/{hash}.{ext}?size=256"),
            hash: hash.to_string(),
        };
    }

    let discriminator = user
        .get("discriminator")
        .and_then(Value::as_str)
        .unwrap_or("0");
    let index = if discriminator != "0" && !discriminator.is_empty() {
        discriminator.parse::<u64>().map(|d| d % 5).unwrap_or(0)
    } else {
        user_id.parse::<u64>().map(|id| (id >> 22) % 6).unwrap_or(0)
    };
    AvatarRef {
        url: format!("https://cdn.discordapp.com/embed/avatars/{index}.png"),
        hash: format!("default_{index}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_avatar_is_png() {
        let user = serde_json::json!({"avatar": "abc123", "discriminator": "0"});
        let avatar = avatar_from_user(&user, "999");
        assert_eq!(
            avatar.url,
            "https://cdn.discordapp.com/avatars/999/abc123.png?size=256"
        );
        assert_eq!(avatar.hash, "abc123");
    }

    #[test]
    fn animated_avatar_is_gif() {
        let user = serde_json::json!({"avatar": "a_zzz", "discriminator": "0"});
        let avatar = avatar_from_user(&user, "999");
        assert!(avatar.url.ends_with("a_zzz.gif?size=256"));
    }

    #[test]
    fn legacy_discriminator_picks_default() {
        let user = serde_json::json!({"avatar": null, "discriminator": "1337"});
        let avatar = avatar_from_user(&user, "999");
        assert_eq!(avatar.url, "https://cdn.discordapp.com/embed/avatars/2.png");
        assert_eq!(avatar.hash, "default_2");
    }

    #[test]
    fn migrated_user_default_comes_from_id() {
        let user = serde_json::json!({"avatar": null, "discriminator": "0"});
        // (175928847299117063 >> 22) % 6 == 2
        let avatar = avatar_from_user(&user, "175928847299117063");
        assert_eq!(avatar.hash, "default_2");
    }
}
