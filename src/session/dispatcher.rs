//! Authenticated request dispatcher.
//!
//! Wraps every page fetch with the cached-token fast path and the single
//! expired-session recovery cycle. Probes see only [`FritzboxClient`]; they
//! never touch the authenticator or the cache directly.

use std::sync::Arc;

use bytes::Bytes;
use http::Method;
use url::Url;

use crate::config::FritzboxConfig;
use crate::endpoint::Endpoint;
use crate::error::{FritzError, FritzResult};
use crate::session::auth::Authenticator;
use crate::session::cache::SessionCache;
use crate::session::transport::{HttpTransport, PageResponse, ReqwestTransport};
use crate::session::{Credentials, SessionToken};

/// Parameter name carrying the session token. Always appended by the
/// dispatcher; a probe-supplied value for it is dropped.
const SID_PARAM: &str = "sid";

/// One fetch attempt either yields the page or reports the session expired.
/// Anything else is an error and terminates the fetch.
enum Attempt {
    Success(Bytes),
    SessionExpired,
}

/// Client for authenticated page fetches against one router.
pub struct FritzboxClient {
    endpoint: Endpoint,
    credentials: Credentials,
    cache: SessionCache,
    transport: Arc<dyn HttpTransport>,
}

impl FritzboxClient {
    /// Build a client from resolved configuration, using the reqwest
    /// transport with the configured timeout and trust anchor.
    pub fn new(config: &FritzboxConfig) -> FritzResult<Self> {
        let transport =
            ReqwestTransport::new(config.timeout, config.certificate.as_deref())?;
        Ok(Self::with_transport(
            config.endpoint(),
            config.credentials(),
            SessionCache::new(&config.state_dir),
            Arc::new(transport),
        ))
    }

    /// Build a client over an arbitrary transport.
    pub fn with_transport(
        endpoint: Endpoint,
        credentials: Credentials,
        cache: SessionCache,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            endpoint,
            credentials,
            cache,
            transport,
        }
    }

    /// GET a page with the session token in the query string.
    pub async fn get_page(&self, page: &str, params: &[(&str, &str)]) -> FritzResult<Bytes> {
        self.fetch(page, Method::GET, params).await
    }

    /// POST a page with the session token as a form field.
    pub async fn post_page(&self, page: &str, params: &[(&str, &str)]) -> FritzResult<Bytes> {
        self.fetch(page, Method::POST, params).await
    }

    /// Fetch a page, authenticated.
    ///
    /// With a cached token the page is attempted directly; HTTP 403 means the
    /// session expired, so the token is discarded, a fresh login runs (which
    /// also updates the cache) and the request is retried exactly once. With
    /// no cached token the login runs first, avoiding a guaranteed-failing
    /// round trip. Any other HTTP error, or a failing retry, is fatal: the
    /// external scheduler re-invokes these one-shot processes periodically
    /// and owns the retry budget.
    pub async fn fetch(
        &self,
        page: &str,
        method: Method,
        params: &[(&str, &str)],
    ) -> FritzResult<Bytes> {
        if let Some(token) = self.cache.load(&self.endpoint, &self.credentials.username)? {
            match self.attempt(page, &method, params, &token).await? {
                Attempt::Success(body) => return Ok(body),
                Attempt::SessionExpired => {
                    log::info!("cached session for {} expired, logging in again", self.endpoint.host);
                }
            }
        } else {
            log::debug!("no cached session for {}, logging in", self.endpoint.host);
        }

        let authenticator = Authenticator::new(&self.endpoint, &self.credentials);
        let token = authenticator
            .login(self.transport.as_ref(), &self.cache)
            .await?;

        match self.attempt(page, &method, params, &token).await? {
            Attempt::Success(body) => Ok(body),
            // Second failure of the same fetch; terminal, surfaced as-is.
            Attempt::SessionExpired => Err(FritzError::Upstream {
                status: 403,
                page: page.to_string(),
            }),
        }
    }

    async fn attempt(
        &self,
        page: &str,
        method: &Method,
        params: &[(&str, &str)],
        token: &SessionToken,
    ) -> FritzResult<Attempt> {
        let url = self.endpoint.page_url(page)?;
        let response = if *method == Method::GET {
            let url = with_query(url, params, token);
            self.transport.get(&url).await?
        } else if *method == Method::POST {
            let fields = form_fields(params, token);
            self.transport.post_form(&url, &fields).await?
        } else {
            return Err(FritzError::Config(format!(
                "unsupported request method {method}"
            )));
        };

        classify(response, page)
    }
}

fn classify(response: PageResponse, page: &str) -> FritzResult<Attempt> {
    if response.is_success() {
        return Ok(Attempt::Success(response.body));
    }
    if response.status == 403 {
        return Ok(Attempt::SessionExpired);
    }
    Err(FritzError::Upstream {
        status: response.status,
        page: page.to_string(),
    })
}

/// Encode the parameters into the query string, with the session token last.
/// Probe-supplied `sid` values are dropped: the dispatcher owns that key.
fn with_query(mut url: Url, params: &[(&str, &str)], token: &SessionToken) -> Url {
    {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            if *key == SID_PARAM {
                continue;
            }
            pairs.append_pair(key, value);
        }
        pairs.append_pair(SID_PARAM, token.as_str());
    }
    url
}

/// Same merge rule as [`with_query`], as form fields.
fn form_fields(params: &[(&str, &str)], token: &SessionToken) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = params
        .iter()
        .filter(|(key, _)| *key != SID_PARAM)
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    fields.push((SID_PARAM.to_string(), token.as_str().to_string()));
    fields
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token() -> SessionToken {
        SessionToken::new("9c977765016899f8").unwrap()
    }

    #[test]
    fn query_carries_params_and_token() {
        let url = Url::parse("https://fritz.box/data.lua").unwrap();
        let url = with_query(url, &[("xhr", "1"), ("page", "energy")], &token());
        assert_eq!(
            url.as_str(),
            "https://fritz.box/data.lua?xhr=1&page=energy&sid=9c977765016899f8"
        );
    }

    #[test]
    fn probe_supplied_sid_is_overridden() {
        let url = Url::parse("https://fritz.box/data.lua").unwrap();
        let url = with_query(url, &[("sid", "forged")], &token());
        assert_eq!(url.as_str(), "https://fritz.box/data.lua?sid=9c977765016899f8");

        let fields = form_fields(&[("sid", "forged"), ("xhr", "1")], &token());
        assert_eq!(
            fields,
            vec![
                ("xhr".to_string(), "1".to_string()),
                ("sid".to_string(), "9c977765016899f8".to_string()),
            ]
        );
    }

    #[test]
    fn empty_params_still_carry_the_token() {
        let fields = form_fields(&[], &token());
        assert_eq!(
            fields,
            vec![("sid".to_string(), "9c977765016899f8".to_string())]
        );
    }
}
