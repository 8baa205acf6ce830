//! Crate-wide error taxonomy.
//!
//! Probes receive exactly these kinds from the session layer and decide exit
//! codes and message formatting themselves; the library never prints to a
//! user-facing channel.

use thiserror::Error;

/// Result alias used across the session layer.
pub type FritzResult<T> = Result<T, FritzError>;

/// Failure kinds surfaced by the session layer.
///
/// An expired session (HTTP 403 on an authenticated fetch) is not represented
/// here: the dispatcher consumes it internally with a single re-login and
/// retry. Only a second failure of the same fetch becomes one of these.
#[derive(Debug, Error)]
pub enum FritzError {
    /// Malformed configuration or identity, e.g. the reserved `__` separator
    /// appearing in the host or username. Never retried.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The router rejected the credentials (all-zero SID after a full
    /// challenge round trip). Fatal; retrying with the same password is
    /// pointless and the operator must act.
    #[error("authentication rejected by router: {0}")]
    Auth(String),

    /// Network or protocol failure reaching the router.
    #[error("transport failure: {0}")]
    Transport(String),

    /// TLS trust failure against the configured certificate. Kept separate
    /// from [`FritzError::Transport`] so operators can tell a certificate
    /// mismatch from a dead network path.
    #[error("certificate verification failed: {0}")]
    CertVerification(String),

    /// Non-403 HTTP error status from an authenticated page fetch.
    #[error("router returned HTTP {status} for {page}")]
    Upstream { status: u16, page: String },
}
