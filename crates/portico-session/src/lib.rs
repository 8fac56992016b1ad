//! Credential lifecycle and single-flight token refresh for portico.
//!
//! Owns the session side of the portico client layer: where the current
//! access credential lives, how an authentication failure is recognized,
//! and the guarantee that any number of concurrent failures collapse into
//! exactly one refresh call whose outcome every waiter observes.
//!
//! # Components
//!
//! - [`store`] — [`CredentialStore`] trait plus an in-memory implementation
//! - [`rule`] — [`AuthFailureRule`]: the configurable "credential expired" predicate
//! - [`refresh`] — [`RefreshCoordinator`]: single-flight refresh over the wire

pub mod error;
pub mod refresh;
pub mod rule;
pub mod store;

pub use error::{Result, SessionError};
pub use refresh::{CredentialMode, RefreshCoordinator, UnauthenticatedHook};
pub use rule::{AuthFailureRule, CODE_TOKEN_EXPIRED, CODE_TOKEN_MISSING};
pub use store::{CredentialStore, MemoryCredentialStore, SharedCredentialStore};
