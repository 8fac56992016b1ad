//! Service endpoint declarations.
//!
//! A [`ServiceEndpoint`] is what the embedding application registers at
//! startup; validation (URL parsing, header parsing, uniqueness) happens
//! once when the [`Portico`] handle is built, never at request time.
//!
//! [`Portico`]: crate::client::Portico

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use url::Url;

use crate::error::{Error, Result};

/// Default per-request timeout.
pub(crate) const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// A named backend target, immutable after registration.
#[derive(Debug, Clone)]
pub struct ServiceEndpoint {
    name: String,
    base_url: String,
    refresh_path: Option<String>,
    timeout: Option<Duration>,
    headers: Vec<(String, String)>,
}

impl ServiceEndpoint {
    /// Declare a service with a unique name and a base address.
    pub fn new(name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            refresh_path: None,
            timeout: None,
            headers: Vec::new(),
        }
    }

    /// Declare the path (relative to the base address) that exchanges a
    /// refresh credential for a new access credential. At most one
    /// registered service may declare this.
    pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
        self.refresh_path = Some(path.into());
        self
    }

    /// Override the per-request timeout for this service.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Add a default header sent with every request to this service.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// The service name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn declares_refresh(&self) -> bool {
        self.refresh_path.is_some()
    }

    /// Validate and resolve into the internal representation.
    pub(crate) fn resolve(&self) -> Result<Service> {
        if self.name.is_empty() {
            return Err(Error::Config("service name cannot be empty".to_string()));
        }

        // Normalize the base URL so relative joins behave predictably.
        let mut base_url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("service '{}': invalid base URL: {}", self.name, e)))?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            let name = HeaderName::try_from(name.as_str()).map_err(|_| {
                Error::Config(format!("service '{}': invalid header name '{}'", self.name, name))
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                Error::Config(format!("service '{}': invalid header value", self.name))
            })?;
            headers.insert(name, value);
        }

        let refresh_url = match &self.refresh_path {
            Some(path) => Some(base_url.join(path.trim_start_matches('/')).map_err(|e| {
                Error::Config(format!("service '{}': invalid refresh path: {}", self.name, e))
            })?),
            None => None,
        };

        Ok(Service {
            name: self.name.clone(),
            base_url,
            refresh_url,
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            headers,
        })
    }
}

/// Resolved service entry held by the built client.
#[derive(Debug, Clone)]
pub(crate) struct Service {
    pub(crate) name: String,
    pub(crate) base_url: Url,
    pub(crate) refresh_url: Option<Url>,
    pub(crate) timeout: Duration,
    pub(crate) headers: HeaderMap,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_normalizes_trailing_slash() {
        let svc = ServiceEndpoint::new("api", "http://localhost:8080")
            .resolve()
            .unwrap();
        assert_eq!(svc.base_url.as_str(), "http://localhost:8080/");
    }

    #[test]
    fn test_resolve_rejects_bad_url() {
        let result = ServiceEndpoint::new("api", "not a url").resolve();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_resolve_rejects_empty_name() {
        let result = ServiceEndpoint::new("", "http://localhost:8080").resolve();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_refresh_url_joins_base() {
        let svc = ServiceEndpoint::new("auth", "http://localhost:8080/auth")
            .refresh_path("/token/refresh")
            .resolve()
            .unwrap();
        assert_eq!(
            svc.refresh_url.unwrap().as_str(),
            "http://localhost:8080/auth/token/refresh"
        );
    }

    #[test]
    fn test_headers_are_parsed() {
        let svc = ServiceEndpoint::new("api", "http://localhost:8080")
            .header("x-tenant", "acme")
            .resolve()
            .unwrap();
        assert_eq!(svc.headers.get("x-tenant").unwrap(), "acme");
    }

    #[test]
    fn test_invalid_header_name_rejected() {
        let result = ServiceEndpoint::new("api", "http://localhost:8080")
            .header("bad header", "v")
            .resolve();
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
