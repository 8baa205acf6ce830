//! HTTP transport seam between the session layer and `reqwest`.
//!
//! The trait keeps the dispatcher and authenticator testable against scripted
//! responses. Implementations report the status code instead of raising on
//! non-2xx, because the dispatcher itself decides what a 403 means.

use std::fs;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::redirect::Policy;
use url::Url;

use crate::error::{FritzError, FritzResult};

/// Raw page response: status plus unparsed body bytes.
#[derive(Debug, Clone)]
pub struct PageResponse {
    pub status: u16,
    pub body: Bytes,
}

impl PageResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Minimal transport used by the session layer: query-string GET and
/// form-encoded POST against the router's web interface.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// GET the URL (query parameters already encoded into it).
    async fn get(&self, url: &Url) -> FritzResult<PageResponse>;

    /// POST the fields as `application/x-www-form-urlencoded`.
    async fn post_form(&self, url: &Url, fields: &[(String, String)]) -> FritzResult<PageResponse>;
}

/// Reqwest-backed transport.
///
/// Redirects are disabled so an authentication redirect never masquerades as
/// page content, and each call is bounded by the configured timeout since
/// probe processes have no supervising event loop to cancel them.
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport. When `certificate` is given, it replaces the system
    /// trust store entirely: Fritz!Box certificates are self-signed and the
    /// operator exports exactly one trust anchor.
    pub fn new(timeout: Duration, certificate: Option<&Path>) -> FritzResult<Self> {
        let mut builder = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(timeout);

        if let Some(path) = certificate {
            let pem = fs::read(path).map_err(|err| {
                FritzError::CertVerification(format!(
                    "cannot read certificate {}: {err}",
                    path.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&pem).map_err(|err| {
                FritzError::CertVerification(format!(
                    "cannot parse certificate {}: {err}",
                    path.display()
                ))
            })?;
            builder = builder
                .tls_built_in_root_certs(false)
                .add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|err| FritzError::Transport(err.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing reqwest client. The client should already have
    /// redirects disabled.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &Url) -> FritzResult<PageResponse> {
        let response = self
            .client
            .get(url.as_str())
            .header(reqwest::header::ACCEPT, "application/xml")
            .send()
            .await
            .map_err(map_transport_error)?;

        to_page_response(response).await
    }

    async fn post_form(&self, url: &Url, fields: &[(String, String)]) -> FritzResult<PageResponse> {
        let response = self
            .client
            .post(url.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .form(fields)
            .send()
            .await
            .map_err(map_transport_error)?;

        to_page_response(response).await
    }
}

async fn to_page_response(response: reqwest::Response) -> FritzResult<PageResponse> {
    let status = response.status().as_u16();
    let body = response.bytes().await.map_err(map_transport_error)?;
    Ok(PageResponse { status, body })
}

/// Map a reqwest failure into the taxonomy, keeping TLS trust failures
/// distinct so operators can tell a certificate mismatch from a dead link.
fn map_transport_error(err: reqwest::Error) -> FritzError {
    let mut messages = vec![err.to_string()];
    let mut source = std::error::Error::source(&err);
    while let Some(inner) = source {
        messages.push(inner.to_string());
        source = inner.source();
    }
    let combined = messages.join(": ");

    let lowered = combined.to_ascii_lowercase();
    if lowered.contains("certificate") || lowered.contains("self-signed") {
        FritzError::CertVerification(combined)
    } else {
        FritzError::Transport(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_certificate_file_is_a_distinct_error() {
        let result = ReqwestTransport::new(
            Duration::from_secs(5),
            Some(Path::new("/nonexistent/box.cer")),
        );
        assert!(matches!(result, Err(FritzError::CertVerification(_))));
    }

    #[test]
    fn garbage_certificate_is_a_distinct_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), b"not a pem").unwrap();
        let result = ReqwestTransport::new(Duration::from_secs(5), Some(file.path()));
        assert!(matches!(result, Err(FritzError::CertVerification(_))));
    }

    #[test]
    fn success_range() {
        let ok = PageResponse {
            status: 204,
            body: Bytes::new(),
        };
        assert!(ok.is_success());
        let forbidden = PageResponse {
            status: 403,
            body: Bytes::new(),
        };
        assert!(!forbidden.is_success());
    }
}
