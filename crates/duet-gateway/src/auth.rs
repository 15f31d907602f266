//! Gateway authentication - bearer tokens mapped to owner ids

use axum::http::HeaderMap;
use serde::Deserialize;
use tracing::{debug, warn};

/// A user allowed to talk to the gateway
#[derive(Clone, Deserialize)]
pub struct UserCredential {
    pub id: String,
    pub token: String,
}

impl std::fmt::Debug for UserCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCredential")
            .field("id", &self.id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Resolves the caller of a request to an owner id
#[derive(Debug, Clone, Default)]
pub struct IdentityResolver {
    users: Vec<UserCredential>,
}

impl IdentityResolver {
    pub fn new(users: Vec<UserCredential>) -> Self {
        let users: Vec<_> = users
            .into_iter()
            .filter(|u| {
                if u.token.is_empty() {
                    warn!("Gateway user '{}' has no token and can never sign in", u.id);
                    false
                } else {
                    true
                }
            })
            .collect();
        Self { users }
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    /// Owner id for a raw token, if any user holds it
    pub fn resolve_token(&self, provided: &str) -> Option<&str> {
        if provided.is_empty() {
            return None;
        }
        // Check every entry so timing does not reveal which user matched
        let mut found = None;
        for user in &self.users {
            if constant_time_eq(user.token.as_bytes(), provided.as_bytes()) && found.is_none() {
                found = Some(user.id.as_str());
            }
        }
        found
    }

    /// Owner id for the `Authorization: Bearer` header of a request
    pub fn resolve(&self, headers: &HeaderMap) -> Option<String> {
        let token = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(extract_bearer_token);

        match token {
            Some(t) => {
                let owner = self.resolve_token(t).map(str::to_string);
                if owner.is_none() {
                    warn!("Gateway auth: unknown token");
                }
                owner
            }
            None => {
                debug!("Gateway auth: no bearer token provided");
                None
            }
        }
    }
}

/// Extract bearer token from an Authorization header value.
///
/// Expects format: `Bearer <token>`
pub fn extract_bearer_token(header_value: &str) -> Option<&str> {
    let token = header_value.trim().strip_prefix("Bearer ")?.trim();
    if token.is_empty() { None } else { Some(token) }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> IdentityResolver {
        IdentityResolver::new(vec![
            UserCredential {
                id: "alice".to_string(),
                token: "tok-alice".to_string(),
            },
            UserCredential {
                id: "bob".to_string(),
                token: "tok-bob".to_string(),
            },
            UserCredential {
                id: "nobody".to_string(),
                token: String::new(),
            },
        ])
    }

    #[test]
    fn test_resolve_token() {
        let r = resolver();
        assert_eq!(r.user_count(), 2);
        assert_eq!(r.resolve_token("tok-alice"), Some("alice"));
        assert_eq!(r.resolve_token("tok-bob"), Some("bob"));
        assert_eq!(r.resolve_token("tok-carol"), None);
        assert_eq!(r.resolve_token(""), None);
    }

    #[test]
    fn test_resolve_headers() {
        let r = resolver();
        let mut headers = HeaderMap::new();
        assert_eq!(r.resolve(&headers), None);

        headers.insert("authorization", "Bearer tok-bob".parse().unwrap());
        assert_eq!(r.resolve(&headers).as_deref(), Some("bob"));

        headers.insert("authorization", "Basic tok-bob".parse().unwrap());
        assert_eq!(r.resolve(&headers), None);
    }

    #[test]
    fn test_no_users_rejects_everyone() {
        let r = IdentityResolver::default();
        assert_eq!(r.resolve_token("anything"), None);
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("Bearer  spaced "), Some("spaced"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc123"), None);
        assert_eq!(extract_bearer_token(""), None);
    }

    #[test]
    fn test_credential_debug_hides_token() {
        let cred = UserCredential {
            id: "alice".to_string(),
            token: "super-secret".to_string(),
        };
        let dbg = format!("{:?}", cred);
        assert!(dbg.contains("alice"));
        assert!(!dbg.contains("super-secret"));
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"hello", b"hello"));
        assert!(!constant_time_eq(b"hello", b"world"));
        assert!(!constant_time_eq(b"short", b"longer"));
    }
}
