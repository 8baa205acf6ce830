//! # fritzmon
//!
//! Munin probes for AVM Fritz!Box routers. The box exposes no public metrics
//! API, so the probes authenticate against the same web interface a human
//! administrator uses, issue the internal XHR calls of the web UI, and turn
//! the JSON payloads into munin plugin output.
//!
//! The heart of the crate is the session layer: the proprietary
//! challenge-response login (`login_sid.lua`), a file-backed session cache
//! shared across the short-lived probe processes, and a dispatcher that
//! retries an expired session exactly once before giving up.
//!
//! ## Example
//!
//! ```no_run
//! use fritzmon::{FritzboxClient, FritzboxConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FritzboxConfig::from_env()?;
//!     let client = FritzboxClient::new(&config)?;
//!     let body = client
//!         .post_page("data.lua", &[("xhr", "1"), ("page", "energy")])
//!         .await?;
//!     println!("{}", String::from_utf8_lossy(&body));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod endpoint;
pub mod error;
pub mod probes;
pub mod session;

pub use crate::config::FritzboxConfig;
pub use crate::endpoint::Endpoint;
pub use crate::error::{FritzError, FritzResult};

pub use crate::session::auth::{challenge_response, Authenticator, SessionInfo, LOGIN_PAGE};
pub use crate::session::cache::SessionCache;
pub use crate::session::dispatcher::FritzboxClient;
pub use crate::session::transport::{HttpTransport, PageResponse, ReqwestTransport};
pub use crate::session::{Credentials, SessionToken, ZERO_SID};

pub use crate::probes::{Command, Probe, ProbeError, ProbeResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
