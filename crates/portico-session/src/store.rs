//! Credential storage.
//!
//! The store is the sole source of truth for the current credentials.
//! The rest of the crate only reads and writes through this trait and
//! never holds a token longer than a single request construction.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

// ============================================================================
// CredentialStore Trait
// ============================================================================

/// Trait for reading and writing session credentials.
///
/// Supplied by the embedding application (browser storage, keychain,
/// config file, ...). Token values are opaque; the session layer never
/// inspects them beyond presence checks.
#[async_trait]
pub trait CredentialStore: Send + Sync + std::fmt::Debug {
    /// Current access token, if any.
    async fn access_token(&self) -> Option<String>;

    /// Replace the access token.
    async fn store_access_token(&self, token: String);

    /// Current refresh token, if any. Only consulted in storage mode;
    /// in cookie mode the refresh credential rides along in the cookie jar.
    async fn refresh_token(&self) -> Option<String>;

    /// Replace the refresh token.
    async fn store_refresh_token(&self, token: String);

    /// Remove all stored credentials.
    async fn clear(&self);
}

/// Shared credential store for use across async contexts.
pub type SharedCredentialStore = Arc<dyn CredentialStore>;

// ============================================================================
// MemoryCredentialStore
// ============================================================================

/// In-memory credential store.
///
/// Suitable for tests and for applications that keep tokens only for the
/// process lifetime.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    access: RwLock<Option<String>>,
    refresh: RwLock<Option<String>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with both tokens.
    pub fn with_tokens(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: RwLock::new(Some(access.into())),
            refresh: RwLock::new(Some(refresh.into())),
        }
    }

    /// Create a shared handle around a fresh store.
    pub fn shared() -> SharedCredentialStore {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn access_token(&self) -> Option<String> {
        self.access.read().await.clone()
    }

    async fn store_access_token(&self, token: String) {
        let mut guard = self.access.write().await;
        *guard = Some(token);
    }

    async fn refresh_token(&self) -> Option<String> {
        self.refresh.read().await.clone()
    }

    async fn store_refresh_token(&self, token: String) {
        let mut guard = self.refresh.write().await;
        *guard = Some(token);
    }

    async fn clear(&self) {
        let mut access = self.access.write().await;
        *access = None;
        let mut refresh = self.refresh.write().await;
        *refresh = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryCredentialStore::new();
        assert!(store.access_token().await.is_none());
        assert!(store.refresh_token().await.is_none());
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let store = MemoryCredentialStore::new();
        store.store_access_token("access".to_string()).await;
        store.store_refresh_token("refresh".to_string()).await;

        assert_eq!(store.access_token().await.as_deref(), Some("access"));
        assert_eq!(store.refresh_token().await.as_deref(), Some("refresh"));
    }

    #[tokio::test]
    async fn test_clear_removes_both_tokens() {
        let store = MemoryCredentialStore::with_tokens("a", "r");
        store.clear().await;

        assert!(store.access_token().await.is_none());
        assert!(store.refresh_token().await.is_none());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_value() {
        let store = MemoryCredentialStore::with_tokens("old", "r");
        store.store_access_token("new".to_string()).await;
        assert_eq!(store.access_token().await.as_deref(), Some("new"));
    }
}
