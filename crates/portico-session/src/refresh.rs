//! Single-flight token refresh.
//!
//! The coordinator owns the only piece of shared mutable state in the
//! system: the handle to the in-flight refresh operation. Any number of
//! requests that hit an authentication failure while a refresh is
//! outstanding await the same shared future and observe the identical
//! settlement; the handle is cleared when the operation settles so the
//! next failure starts a brand-new refresh.

use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use url::Url;

use crate::error::{Result, SessionError};
use crate::store::SharedCredentialStore;

/// Callback invoked when the session cannot be recovered and the
/// application must re-authenticate the user.
pub type UnauthenticatedHook = Arc<dyn Fn() + Send + Sync>;

/// Where credentials travel on the wire.
///
/// An explicit closed set: the mode is chosen up front, never inferred
/// from which callbacks happen to be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// Tokens are read from and written to the [`CredentialStore`]
    /// explicitly; the access token travels as a bearer header and the
    /// refresh token as a request body field.
    ///
    /// [`CredentialStore`]: crate::store::CredentialStore
    Storage,
    /// Tokens travel via the HTTP client's cookie jar; requests carry no
    /// explicit token fields.
    Cookie,
}

type RefreshFuture = Shared<BoxFuture<'static, Result<String>>>;

/// Coordinates credential refresh so that concurrent triggers collapse
/// into one network call.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    http: reqwest::Client,
    endpoint: Option<Url>,
    mode: CredentialMode,
    store: SharedCredentialStore,
    on_unauthenticated: Option<UnauthenticatedHook>,
    inflight: Mutex<Option<RefreshFuture>>,
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("endpoint", &self.inner.endpoint)
            .field("mode", &self.inner.mode)
            .finish_non_exhaustive()
    }
}

/// Refresh request body in storage mode.
#[derive(Debug, Serialize)]
struct RefreshRequest {
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

/// Refresh response envelope: `{ "data": { "accessToken": ..., "refreshToken": ... } }`.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    data: RefreshedTokens,
}

#[derive(Debug, Deserialize)]
struct RefreshedTokens {
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: Option<String>,
}

impl RefreshCoordinator {
    /// Create a coordinator.
    ///
    /// `endpoint` is the absolute refresh URL (service base address plus
    /// refresh path), or `None` when no service declares a refresh path,
    /// in which case every trigger fails immediately without a network
    /// call.
    pub fn new(
        http: reqwest::Client,
        endpoint: Option<Url>,
        mode: CredentialMode,
        store: SharedCredentialStore,
        on_unauthenticated: Option<UnauthenticatedHook>,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                http,
                endpoint,
                mode,
                store,
                on_unauthenticated,
                inflight: Mutex::new(None),
            }),
        }
    }

    /// Exchange the refresh credential for a new access token.
    ///
    /// Single-flight: if a refresh is already outstanding, awaits its
    /// result instead of issuing a second call. On failure the stored
    /// credentials are cleared and the unauthenticated hook fires exactly
    /// once per failed operation.
    pub async fn refresh(&self) -> Result<String> {
        let fut = {
            let mut slot = self.inner.inflight.lock().await;
            match slot.as_ref() {
                Some(existing) => {
                    tracing::debug!("joining in-flight credential refresh");
                    existing.clone()
                }
                None => {
                    let inner = Arc::clone(&self.inner);
                    let fut: RefreshFuture = async move {
                        let outcome = perform_refresh(&inner).await;
                        // Back to idle before any waiter observes the
                        // settlement, so the next failure starts fresh.
                        inner.inflight.lock().await.take();
                        match outcome {
                            Ok(token) => {
                                tracing::info!("credential refresh succeeded");
                                Ok(token)
                            }
                            Err(err) => {
                                tracing::warn!(error = %err, "credential refresh failed");
                                inner.store.clear().await;
                                if let Some(hook) = &inner.on_unauthenticated {
                                    hook();
                                }
                                Err(err)
                            }
                        }
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        fut.await
    }
}

/// Perform the actual refresh call. Runs at most once per operation.
async fn perform_refresh(inner: &CoordinatorInner) -> Result<String> {
    let endpoint = inner.endpoint.clone().ok_or_else(|| {
        SessionError::RefreshUnavailable("no service declares a refresh path".to_string())
    })?;

    let mut request = inner.http.post(endpoint);
    if inner.mode == CredentialMode::Storage {
        let refresh_token = inner.store.refresh_token().await.ok_or_else(|| {
            SessionError::RefreshUnavailable("no refresh token in store".to_string())
        })?;
        request = request.json(&RefreshRequest { refresh_token });
    }

    let response = request
        .send()
        .await
        .map_err(|e| SessionError::Network(format!("Refresh request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(SessionError::Backend {
            status: status.as_u16(),
            message,
        });
    }

    let body: RefreshResponse = response
        .json()
        .await
        .map_err(|e| SessionError::Malformed(e.to_string()))?;

    inner
        .store
        .store_access_token(body.data.access_token.clone())
        .await;

    // The refresh credential is only application-visible in storage mode;
    // in cookie mode the jar already holds whatever the server set.
    if inner.mode == CredentialMode::Storage {
        if let Some(refresh_token) = body.data.refresh_token {
            inner.store.store_refresh_token(refresh_token).await;
        }
    }

    Ok(body.data.access_token)
}
