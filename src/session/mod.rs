//! Session layer: login handshake, token persistence, authenticated requests.
//!
//! Every probe run is a brand-new short-lived process, so this layer rebuilds
//! its state from disk on each invocation. Probes only ever see the
//! [`FritzboxClient`](dispatcher::FritzboxClient) fetch contract; the
//! authenticator and the cache stay behind it.

pub mod auth;
pub mod cache;
pub mod dispatcher;
pub mod transport;

use std::fmt;

/// Fixed-width all-zero SID the router uses to signal "not authenticated",
/// both as the first-response placeholder and as the rejection marker after
/// a failed challenge round trip.
pub const ZERO_SID: &str = "0000000000000000";

/// Login credentials. The password is only ever used transiently to compute
/// the challenge digest and is never written to disk.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Opaque session token issued by the router after a successful login.
///
/// Construction rejects the all-zero sentinel and blank values, so a held
/// `SessionToken` is always a plausible credential: it can be cached and it
/// can be sent as the `sid` request parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    /// Wrap a SID string, returning `None` for the all-zero sentinel and for
    /// empty or whitespace-only input.
    pub fn new(sid: impl Into<String>) -> Option<Self> {
        let sid = sid.into();
        let trimmed = sid.trim();
        if trimmed.is_empty() || trimmed == ZERO_SID {
            return None;
        }
        Some(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_sentinel() {
        assert!(SessionToken::new(ZERO_SID).is_none());
        assert!(SessionToken::new("").is_none());
        assert!(SessionToken::new("  \n").is_none());
    }

    #[test]
    fn accepts_real_sid() {
        let token = SessionToken::new("9c977765016899f8").unwrap();
        assert_eq!(token.as_str(), "9c977765016899f8");
    }

    #[test]
    fn trims_trailing_newline() {
        // Cache files end with whatever the writer left; reads normalize.
        let token = SessionToken::new("9c977765016899f8\n").unwrap();
        assert_eq!(token.as_str(), "9c977765016899f8");
    }
}
