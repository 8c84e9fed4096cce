//! Caller authentication.
//!
//! The chat endpoints only need an identity and a role; how tokens are
//! minted and validated is a deployment concern behind the
//! [`Authenticator`] trait. [`StaticTokenAuthenticator`] covers tests and
//! single-tenant deployments with a fixed token list.

use std::collections::HashMap;

use quill_core::ids::UserId;

/// An authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthUser {
    /// Caller identity.
    pub user_id: UserId,
    /// Role claim driving the admission tier.
    pub role: String,
}

/// Resolves bearer tokens to callers.
pub trait Authenticator: Send + Sync {
    /// Resolve a token. `None` means unauthenticated.
    fn authenticate(&self, token: &str) -> Option<AuthUser>;
}

/// Fixed token table.
#[derive(Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, AuthUser>,
}

impl StaticTokenAuthenticator {
    /// Empty table; every request is unauthenticated.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a user and role.
    pub fn insert(&mut self, token: impl Into<String>, user_id: impl Into<UserId>, role: impl Into<String>) {
        let _ = self.tokens.insert(
            token.into(),
            AuthUser {
                user_id: user_id.into(),
                role: role.into(),
            },
        );
    }

    /// Build a table from `token:user:role` entries. Malformed entries are
    /// skipped with a warning.
    #[must_use]
    pub fn from_entries(entries: &[String]) -> Self {
        let mut auth = Self::new();
        for entry in entries {
            let mut parts = entry.splitn(3, ':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(token), Some(user), Some(role))
                    if !token.is_empty() && !user.is_empty() && !role.is_empty() =>
                {
                    auth.insert(token, user, role);
                }
                _ => tracing::warn!(entry, "skipping malformed api token entry"),
            }
        }
        auth
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, token: &str) -> Option<AuthUser> {
        self.tokens.get(token).cloned()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
#[must_use]
pub fn bearer_token(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_token_resolves() {
        let mut auth = StaticTokenAuthenticator::new();
        auth.insert("tok-1", "user-1", "moderator");

        let user = auth.authenticate("tok-1").unwrap();
        assert_eq!(user.user_id, UserId::from("user-1"));
        assert_eq!(user.role, "moderator");
    }

    #[test]
    fn unknown_token_is_none() {
        let auth = StaticTokenAuthenticator::new();
        assert!(auth.authenticate("nope").is_none());
    }

    #[test]
    fn entries_are_parsed_and_malformed_skipped() {
        let auth = StaticTokenAuthenticator::from_entries(&[
            "tok-1:alice:user".to_string(),
            "broken".to_string(),
            "tok-2:bob:admin".to_string(),
            ":missing:token".to_string(),
        ]);
        assert!(auth.authenticate("tok-1").is_some());
        assert_eq!(auth.authenticate("tok-2").unwrap().role, "admin");
        assert!(auth.authenticate("broken").is_none());
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(bearer_token("Bearer abc"), Some("abc"));
        assert_eq!(bearer_token("Bearer "), None);
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("abc"), None);
    }
}
