//! HTTP client with tracing and an optional domain allowlist.
//!
//! Web and token strategies talk to a handful of vendor endpoints. The
//! wrapper keeps credentials out of spans and lets a strategy pin the
//! domains its cookies may ever be sent to.

use reqwest::{Client, Response, StatusCode, header, header::HeaderMap};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::error::HttpError;

/// Default request timeout.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

const USER_AGENT: &str = concat!("quotawatch/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// HTTP Client
// ============================================================================

/// HTTP client wrapper with tracing and domain allowlist.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    allowed_domains: Option<Vec<String>>,
}

impl HttpClient {
    /// Creates a new HTTP client with default settings.
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    /// Creates a new HTTP client with a custom timeout.
    ///
    /// If the configured client cannot be built (broken TLS setup), a
    /// default client is used instead and a warning is logged; requests
    /// then surface the underlying problem as errors.
    pub fn with_timeout(timeout: Duration) -> Self {
        let inner = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to configure HTTP client, using defaults");
                Client::new()
            });

        Self {
            inner,
            allowed_domains: None,
        }
    }

    /// Restricts requests to `domains` and their subdomains.
    #[must_use]
    pub fn allow_only<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_domains = Some(domains.into_iter().map(Into::into).collect());
        self
    }

    fn check_domain(&self, url: &str) -> Result<(), HttpError> {
        let Some(allowed) = &self.allowed_domains else {
            return Ok(());
        };

        let parsed = Url::parse(url).map_err(|e| HttpError::InvalidUrl(e.to_string()))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| HttpError::InvalidUrl("No host in URL".to_string()))?;

        let ok = allowed.iter().any(|domain| {
            host == domain
                || host
                    .strip_suffix(domain.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        });
        if ok {
            Ok(())
        } else {
            Err(HttpError::DomainNotAllowed(host.to_string()))
        }
    }

    /// Performs a GET request.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        self.check_domain(url)?;
        let response = self.inner.get(url).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a GET request with custom headers.
    #[instrument(skip(self, headers), fields(url = %url))]
    pub async fn get_with_headers(
        &self,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Response, HttpError> {
        self.check_domain(url)?;
        let response = self.inner.get(url).headers(headers).send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a GET request with an `Authorization` header.
    #[instrument(skip(self, auth_header), fields(url = %url))]
    pub async fn get_with_auth(&self, url: &str, auth_header: &str) -> Result<Response, HttpError> {
        self.check_domain(url)?;
        let response = self
            .inner
            .get(url)
            .header(header::AUTHORIZATION, auth_header)
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }

    /// Performs a GET request with a `Cookie` header.
    #[instrument(skip(self, cookies), fields(url = %url))]
    pub async fn get_with_cookies(&self, url: &str, cookies: &str) -> Result<Response, HttpError> {
        self.check_domain(url)?;
        let response = self
            .inner
            .get(url)
            .header(header::COOKIE, cookies)
            .send()
            .await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Response Extensions
// ============================================================================

/// Status helpers shared by web and token strategies.
pub trait ResponseExt {
    /// 401 or 403: the credential was sent and refused.
    fn is_auth_failure(&self) -> bool;

    /// 429.
    fn is_rate_limited(&self) -> bool;
}

impl ResponseExt for Response {
    fn is_auth_failure(&self) -> bool {
        is_auth_status(self.status())
    }

    fn is_rate_limited(&self) -> bool {
        self.status() == StatusCode::TOO_MANY_REQUESTS
    }
}

/// Returns true for 401 and 403.
pub fn is_auth_status(status: StatusCode) -> bool {
    matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_allowlist() {
        let client = HttpClient::new().allow_only(["claude.ai", "chatgpt.com"]);

        assert!(client.check_domain("https://claude.ai/api/organizations").is_ok());
        assert!(client.check_domain("https://api.claude.ai/x").is_ok());
        assert!(client.check_domain("https://chatgpt.com/backend-api/wham/usage").is_ok());
        assert!(client.check_domain("https://evilclaude.ai/").is_err());
        assert!(client.check_domain("https://evil.com/claude.ai").is_err());
        assert!(client.check_domain("not-a-url").is_err());
    }

    #[test]
    fn test_no_restrictions() {
        assert!(HttpClient::new().check_domain("https://any.domain.com").is_ok());
    }

    #[test]
    fn test_auth_status() {
        assert!(is_auth_status(StatusCode::UNAUTHORIZED));
        assert!(is_auth_status(StatusCode::FORBIDDEN));
        assert!(!is_auth_status(StatusCode::NOT_FOUND));
    }
}
