//! Router endpoint identity and URL construction.

use url::Url;

use crate::error::{FritzError, FritzResult};

/// Identifies one router instance: host, port, and whether TLS is used.
///
/// Also scopes the session cache key, together with the username.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub use_tls: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, use_tls: bool) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls,
        }
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_tls { "https" } else { "http" }
    }

    fn default_port(&self) -> u16 {
        if self.use_tls { 443 } else { 80 }
    }

    /// Base URI of the router's web interface. The port is omitted when it is
    /// the default for the chosen scheme.
    pub fn base_url(&self) -> FritzResult<Url> {
        let text = if self.port == self.default_port() {
            format!("{}://{}", self.scheme(), self.host)
        } else {
            format!("{}://{}:{}", self.scheme(), self.host, self.port)
        };
        Url::parse(&text).map_err(|err| FritzError::Config(format!("invalid endpoint {text}: {err}")))
    }

    /// URL of a page path under the base URI.
    pub fn page_url(&self, page: &str) -> FritzResult<Url> {
        self.base_url()?
            .join(page)
            .map_err(|err| FritzError::Config(format!("invalid page path {page}: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_is_elided() {
        let https = Endpoint::new("fritz.box", 443, true);
        assert_eq!(https.base_url().unwrap().as_str(), "https://fritz.box/");

        let http = Endpoint::new("fritz.box", 80, false);
        assert_eq!(http.base_url().unwrap().as_str(), "http://fritz.box/");
    }

    #[test]
    fn non_default_port_is_kept() {
        let endpoint = Endpoint::new("192.168.178.1", 8443, true);
        assert_eq!(
            endpoint.base_url().unwrap().as_str(),
            "https://192.168.178.1:8443/"
        );
    }

    #[test]
    fn page_url_joins_path() {
        let endpoint = Endpoint::new("fritz.box", 443, true);
        assert_eq!(
            endpoint.page_url("login_sid.lua").unwrap().as_str(),
            "https://fritz.box/login_sid.lua"
        );
        assert_eq!(
            endpoint.page_url("internet/dsl_stats_tab.lua").unwrap().as_str(),
            "https://fritz.box/internet/dsl_stats_tab.lua"
        );
    }
}
