//! Main client implementation.
//!
//! [`Portico`] is built once at application start and passed around by
//! the embedding application; it is a cheap clone over shared state.
//! Request flows obtain a [`ServiceClient`] by service name and go
//! through a single dispatch pipeline: attach the bearer credential,
//! send, and on a refreshable authentication failure hand off to the
//! refresh coordinator and re-dispatch exactly once.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use url::Url;

use portico_session::{
    AuthFailureRule, CredentialMode, RefreshCoordinator, SharedCredentialStore,
    UnauthenticatedHook,
};

use crate::config::{Service, ServiceEndpoint};
use crate::error::{Error, ErrorResponse, Result};
use crate::notify::Notifier;

/// Portico client handle.
///
/// # Example
///
/// ```no_run
/// use portico_client::{Portico, ServiceEndpoint};
/// use portico_session::{CredentialMode, MemoryCredentialStore};
///
/// # async fn example() -> portico_client::Result<()> {
/// let portico = Portico::builder()
///     .service(
///         ServiceEndpoint::new("api", "http://localhost:8080")
///             .refresh_path("/auth/refresh"),
///     )
///     .credential_store(MemoryCredentialStore::shared())
///     .mode(CredentialMode::Storage)
///     .build()?;
///
/// let api = portico.service("api")?;
/// let profile: serde_json::Value = api.get("users/me").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Portico {
    /// Inner shared state.
    inner: Arc<PorticoInner>,
}

/// Inner client state (shared across clones).
pub(crate) struct PorticoInner {
    /// HTTP client shared by all services (and the refresh call, so that
    /// cookie-mode credentials ride the same jar).
    pub(crate) http: reqwest::Client,
    /// Resolved service registry, looked up by name.
    pub(crate) services: Vec<Service>,
    /// Source of truth for credentials.
    pub(crate) store: SharedCredentialStore,
    /// How credentials travel on the wire.
    pub(crate) mode: CredentialMode,
    /// Refreshable-failure predicate.
    pub(crate) rule: AuthFailureRule,
    /// Optional mutation notifications.
    pub(crate) notifier: Option<Notifier>,
    /// Single-flight refresh coordination.
    pub(crate) coordinator: RefreshCoordinator,
}

impl Portico {
    /// Create a new client builder.
    pub fn builder() -> PorticoBuilder {
        PorticoBuilder::new()
    }

    /// Look up a registered service by name.
    pub fn service(&self, name: &str) -> Result<ServiceClient> {
        let index = self
            .inner
            .services
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| Error::UnknownService(name.to_string()))?;
        Ok(ServiceClient {
            portico: self.clone(),
            index,
        })
    }

    /// The configured credential mode.
    pub fn mode(&self) -> CredentialMode {
        self.inner.mode
    }

    /// Force a credential refresh outside the request path (e.g. on
    /// resume-from-sleep). Joins a refresh that is already in flight
    /// instead of starting a second one.
    pub async fn refresh(&self) -> Result<String> {
        Ok(self.inner.coordinator.refresh().await?)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a [`Portico`] handle.
#[derive(Default)]
pub struct PorticoBuilder {
    services: Vec<ServiceEndpoint>,
    store: Option<SharedCredentialStore>,
    mode: Option<CredentialMode>,
    rule: Option<AuthFailureRule>,
    notifier: Option<Notifier>,
    on_unauthenticated: Option<UnauthenticatedHook>,
}

impl PorticoBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service endpoint.
    pub fn service(mut self, endpoint: ServiceEndpoint) -> Self {
        self.services.push(endpoint);
        self
    }

    /// Set the credential store (required).
    pub fn credential_store(mut self, store: SharedCredentialStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the credential mode. Defaults to [`CredentialMode::Storage`].
    pub fn mode(mut self, mode: CredentialMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Override the authentication-failure detection rule.
    pub fn failure_rule(mut self, rule: AuthFailureRule) -> Self {
        self.rule = Some(rule);
        self
    }

    /// Set the notification sink for mutation outcomes.
    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the callback invoked when refresh is impossible or fails
    /// terminally, so the application can redirect to re-authentication.
    pub fn on_unauthenticated(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_unauthenticated = Some(Arc::new(hook));
        self
    }

    /// Validate the configuration and build the client.
    pub fn build(self) -> Result<Portico> {
        let store = self
            .store
            .ok_or_else(|| Error::Config("credential_store is required".to_string()))?;
        let mode = self.mode.unwrap_or(CredentialMode::Storage);

        let mut services = Vec::with_capacity(self.services.len());
        for endpoint in &self.services {
            let service = endpoint.resolve()?;
            if services.iter().any(|s: &Service| s.name == service.name) {
                return Err(Error::Config(format!(
                    "duplicate service name '{}'",
                    service.name
                )));
            }
            services.push(service);
        }

        let refreshers: Vec<&str> = self
            .services
            .iter()
            .filter(|e| e.declares_refresh())
            .map(|e| e.name())
            .collect();
        if refreshers.len() > 1 {
            return Err(Error::Config(format!(
                "multiple services declare a refresh path: {}",
                refreshers.join(", ")
            )));
        }
        let refresh_url = services.iter().find_map(|s| s.refresh_url.clone());

        let mut http = reqwest::Client::builder()
            .user_agent(format!("portico/{}", env!("CARGO_PKG_VERSION")));
        if mode == CredentialMode::Cookie {
            http = http.cookie_store(true);
        }
        let http = http.build()?;

        let coordinator = RefreshCoordinator::new(
            http.clone(),
            refresh_url,
            mode,
            store.clone(),
            self.on_unauthenticated,
        );

        Ok(Portico {
            inner: Arc::new(PorticoInner {
                http,
                services,
                store,
                mode,
                rule: self.rule.unwrap_or_default(),
                notifier: self.notifier,
                coordinator,
            }),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceClient
// ─────────────────────────────────────────────────────────────────────────────

/// Typed request surface for one registered service.
#[derive(Clone)]
pub struct ServiceClient {
    portico: Portico,
    index: usize,
}

impl ServiceClient {
    fn service(&self) -> &Service {
        &self.portico.inner.services[self.index]
    }

    /// Build a URL for an API path relative to the service base address.
    pub(crate) fn url(&self, path: &str) -> Result<Url> {
        self.service()
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(Error::from)
    }

    /// Start building a request for this service.
    pub fn request(&self, method: Method, path: &str) -> ServiceRequest {
        ServiceRequest {
            client: self.clone(),
            method,
            path: path.to_string(),
            query: None,
            body: None,
            success_notice: None,
        }
    }

    /// Make a GET request.
    pub async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path).send().await
    }

    /// Make a GET request with query parameters.
    pub async fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        Q: serde::Serialize + ?Sized,
    {
        self.request(Method::GET, path).query(query)?.send().await
    }

    /// Make a POST request.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.request(Method::POST, path).json(body)?.send().await
    }

    /// Make a PUT request.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.request(Method::PUT, path).json(body)?.send().await
    }

    /// Make a PATCH request.
    pub async fn patch<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize + ?Sized,
    {
        self.request(Method::PATCH, path).json(body)?.send().await
    }

    /// Make a DELETE request.
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.request(Method::DELETE, path).send_unit().await
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ServiceRequest
// ─────────────────────────────────────────────────────────────────────────────

/// A request being assembled against one service.
pub struct ServiceRequest {
    client: ServiceClient,
    method: Method,
    path: String,
    query: Option<serde_json::Value>,
    body: Option<serde_json::Value>,
    success_notice: Option<String>,
}

impl ServiceRequest {
    /// Set a JSON body.
    pub fn json<B: serde::Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Set query parameters.
    pub fn query<Q: serde::Serialize + ?Sized>(mut self, query: &Q) -> Result<Self> {
        self.query = Some(serde_json::to_value(query)?);
        Ok(self)
    }

    /// Message handed to the notification sink when this mutation
    /// succeeds. Ignored for GET requests and when no sink is configured.
    pub fn notify_success(mut self, message: impl Into<String>) -> Self {
        self.success_notice = Some(message.into());
        self
    }

    /// Send the request and decode the JSON response body.
    pub async fn send<T: serde::de::DeserializeOwned>(self) -> Result<T> {
        let mutation = self.method != Method::GET;
        let notice = self.success_notice.clone();
        let notifier = self.client.portico.inner.notifier.clone();

        let result = async {
            let response = self.execute().await?;
            Ok(response.json::<T>().await?)
        }
        .await;

        if mutation {
            notify_settled(notifier.as_ref(), &result, notice.as_deref());
        }
        result
    }

    /// Send the request, discarding any response body.
    pub async fn send_unit(self) -> Result<()> {
        let mutation = self.method != Method::GET;
        let notice = self.success_notice.clone();
        let notifier = self.client.portico.inner.notifier.clone();

        let result = async {
            self.execute().await?;
            Ok(())
        }
        .await;

        if mutation {
            notify_settled(notifier.as_ref(), &result, notice.as_deref());
        }
        result
    }

    /// Dispatch with interception: returns the successful response, or an
    /// extracted error after at most one refresh-and-retry cycle.
    async fn execute(&self) -> Result<reqwest::Response> {
        let inner = &self.client.portico.inner;
        let url = self.client.url(&self.path)?;

        let response = self.dispatch_once(&url).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let bytes = response.bytes().await?;

        if !inner.rule.matches(status, &bytes) {
            return Err(extract_error(status, &bytes));
        }

        tracing::debug!(%url, %status, "authentication failure, attempting credential refresh");
        if let Err(err) = inner.coordinator.refresh().await {
            // The coordinator already cleared the store and fired the
            // unauthenticated hook; the caller sees the original failure.
            tracing::debug!(error = %err, "refresh failed, surfacing original failure");
            return Err(extract_error(status, &bytes));
        }

        // Retry exactly once with the refreshed credential. A second
        // authentication failure is surfaced, never refreshed again.
        let retried = self.dispatch_once(&url).await?;
        if retried.status().is_success() {
            Ok(retried)
        } else {
            let status = retried.status();
            let bytes = retried.bytes().await?;
            Err(extract_error(status, &bytes))
        }
    }

    /// Build and send the request once, attaching the current credential.
    async fn dispatch_once(&self, url: &Url) -> Result<reqwest::Response> {
        let inner = &self.client.portico.inner;
        let service = self.client.service();

        let mut request = inner
            .http
            .request(self.method.clone(), url.clone())
            .timeout(service.timeout)
            .headers(service.headers.clone());

        if let Some(query) = &self.query {
            request = request.query(query);
        }
        if let Some(body) = &self.body {
            request = request.json(body);
        }

        // Cookie mode sends nothing explicit; the jar carries the session.
        if inner.mode == CredentialMode::Storage {
            if let Some(token) = inner.store.access_token().await {
                request = request.bearer_auth(token);
            }
        }

        tracing::debug!(method = %self.method, %url, "dispatching request");
        Ok(request.send().await?)
    }
}

/// Invoke the notification sink for a settled mutation.
fn notify_settled<T>(notifier: Option<&Notifier>, result: &Result<T>, notice: Option<&str>) {
    let Some(notifier) = notifier else {
        return;
    };
    match result {
        Ok(_) => {
            if let Some(message) = notice {
                notifier.success(message);
            }
        }
        Err(err) => notifier.error(&err.to_string()),
    }
}

/// Extract an error from a failed response's status and body.
fn extract_error(status: StatusCode, body: &[u8]) -> Error {
    match serde_json::from_slice::<ErrorResponse>(body) {
        Ok(err) => {
            if status == StatusCode::NOT_FOUND {
                Error::NotFound(err.message)
            } else if status == StatusCode::UNAUTHORIZED {
                Error::Auth(err.message)
            } else {
                Error::Api {
                    status: status.as_u16(),
                    code: err.code,
                    message: err.message,
                }
            }
        }
        Err(_) => Error::Api {
            status: status.as_u16(),
            code: "unknown".to_string(),
            message: format!("HTTP {}", status.as_u16()),
        },
    }
}

#[cfg(test)]
mod tests {
    use portico_session::{MemoryCredentialStore, SessionError};

    use super::*;

    fn builder_with_store() -> PorticoBuilder {
        Portico::builder().credential_store(MemoryCredentialStore::shared())
    }

    #[test]
    fn test_builder_requires_credential_store() {
        let result = Portico::builder()
            .service(ServiceEndpoint::new("api", "http://localhost:8080"))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_duplicate_service_names() {
        let result = builder_with_store()
            .service(ServiceEndpoint::new("api", "http://a.example"))
            .service(ServiceEndpoint::new("api", "http://b.example"))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_multiple_refresh_paths() {
        let result = builder_with_store()
            .service(ServiceEndpoint::new("a", "http://a.example").refresh_path("/refresh"))
            .service(ServiceEndpoint::new("b", "http://b.example").refresh_path("/refresh"))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_invalid_base_url() {
        let result = builder_with_store()
            .service(ServiceEndpoint::new("api", "::nope::"))
            .build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_unknown_service_lookup() {
        let portico = builder_with_store()
            .service(ServiceEndpoint::new("api", "http://localhost:8080"))
            .build()
            .unwrap();

        assert!(portico.service("api").is_ok());
        assert!(matches!(
            portico.service("nope"),
            Err(Error::UnknownService(_))
        ));
    }

    #[test]
    fn test_url_building() {
        let portico = builder_with_store()
            .service(ServiceEndpoint::new("api", "http://localhost:8080"))
            .build()
            .unwrap();
        let api = portico.service("api").unwrap();

        let url = api.url("users/me").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/users/me");

        let url = api.url("/users/me").unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/users/me");
    }

    #[test]
    fn test_default_mode_is_storage() {
        let portico = builder_with_store().build().unwrap();
        assert_eq!(portico.mode(), CredentialMode::Storage);
    }

    #[tokio::test]
    async fn test_forced_refresh_without_endpoint_is_session_error() {
        let portico = builder_with_store()
            .service(ServiceEndpoint::new("api", "http://localhost:8080"))
            .build()
            .unwrap();

        let err = portico.refresh().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Session(SessionError::RefreshUnavailable(_))
        ));
    }

    #[test]
    fn test_extract_error_shapes() {
        let err = extract_error(
            StatusCode::NOT_FOUND,
            br#"{"code":"MISSING","message":"no such user"}"#,
        );
        assert!(err.is_not_found());

        let err = extract_error(
            StatusCode::UNAUTHORIZED,
            br#"{"code":"TOKEN_EXPIRED","message":"expired"}"#,
        );
        assert!(err.is_auth_error());

        let err = extract_error(StatusCode::BAD_GATEWAY, b"gateway exploded");
        assert!(matches!(err, Error::Api { status: 502, .. }));
    }
}
