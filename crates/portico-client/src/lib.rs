//! Named-service HTTP convenience layer with automatic bearer injection
//! and single-flight token refresh.
//!
//! Applications declare their backend services once at startup, then
//! issue typed requests against them. Every request carries the current
//! access credential; when a response signals that the credential
//! expired, the layer refreshes it (collapsing concurrent failures into
//! one refresh call) and retries the request exactly once. Mutation
//! outcomes can optionally surface user-facing notifications.
//!
//! # Example
//!
//! ```no_run
//! use portico_client::{Notifier, Portico, ServiceEndpoint};
//! use portico_session::{CredentialMode, MemoryCredentialStore};
//!
//! # async fn example() -> portico_client::Result<()> {
//! let portico = Portico::builder()
//!     .service(
//!         ServiceEndpoint::new("billing", "https://billing.example.com")
//!             .refresh_path("/auth/refresh"),
//!     )
//!     .service(ServiceEndpoint::new("catalog", "https://catalog.example.com"))
//!     .credential_store(MemoryCredentialStore::shared())
//!     .mode(CredentialMode::Storage)
//!     .notifier(Notifier::new().on_error(|msg| eprintln!("request failed: {msg}")))
//!     .on_unauthenticated(|| eprintln!("session expired, please sign in again"))
//!     .build()?;
//!
//! let billing = portico.service("billing")?;
//! let invoice: serde_json::Value = billing
//!     .request(reqwest::Method::POST, "invoices")
//!     .json(&serde_json::json!({ "amount": 42 }))?
//!     .notify_success("Invoice created")
//!     .send()
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! Caching, request deduplication by key, and background refetch are out
//! of scope; pair this crate with whatever query layer the application
//! already uses.

pub mod client;
pub mod config;
pub mod error;
pub mod notify;

pub use client::{Portico, PorticoBuilder, ServiceClient, ServiceRequest};
pub use config::ServiceEndpoint;
pub use error::{Error, Result};
pub use notify::Notifier;

// Session layer re-exports, so most embedders need a single import.
pub use portico_session::{
    AuthFailureRule, CredentialMode, CredentialStore, MemoryCredentialStore, RefreshCoordinator,
    SessionError, SharedCredentialStore,
};
