//! Keyringmux - Pluggable credential storage with automatic backend selection.
//!
//! Keyringmux gives applications one API for storing, retrieving, and
//! deleting passwords keyed by a `(service, account)` pair. The actual
//! storage is delegated to interchangeable backends; a registry picks the
//! best one available on the host, honoring explicit overrides.
//!
//! # Features
//!
//! - **Unified API**: Same calls regardless of the underlying store
//! - **Async/Await**: Built on tokio for non-blocking I/O
//! - **Automatic Selection**: Highest-priority supported backend wins
//! - **Input Validation**: Identifiers and passwords are checked before any backend sees them
//! - **Encrypted Fallback**: AES-256-GCM file store when no native manager exists
//!
//! # Quick Start
//!
//! ```no_run
//! #[tokio::main]
//! async fn main() -> keyringmux::Result<()> {
//!     keyringmux::set_password("myapp", "alice", "s3cret").await?;
//!
//!     let password = keyringmux::get_password("myapp", "alice").await?;
//!     assert_eq!(password.as_deref(), Some("s3cret"));
//!
//!     keyringmux::delete_password("myapp", "alice").await?;
//!     Ok(())
//! }
//! ```
//!
//! # Built-in Backends
//!
//! | Backend | Id | Priority | Notes |
//! |---------|----|----------|-------|
//! | Encrypted file | `encrypted-file` | 0.5 | AES-256-GCM, single file |
//! | Null | `null` | -1 | Discards writes, never finds anything |
//! | Fail | `fail` | 0 | Every operation errors with [`KeyringError::NoBackend`], never auto-registered |
//! | Mock | `mock` | 1 | Feature `mock`, never auto-registered |
//!
//! Platform credential managers plug in through
//! [`Registry::register_backend`].
//!
//! # Selection Overrides
//!
//! - `KEYRING_BACKEND=<id>` forces a backend
//! - `KEYRING_PROPERTY_<NAME>=<value>` sets backend property `<name>`
//! - `<config dir>/keyringmux/config.json` may name a `defaultBackend`
//!   and per-backend `backendProperties`

pub mod backend;
pub mod backends;
pub mod config;
pub mod credential;
pub mod error;
pub mod registry;
pub mod validation;

pub use backend::{Backend, BackendFactory, BackendIdentity, Diagnostics};
pub use backends::file::EncryptedFileBackend;
pub use config::{KeyringConfig, Properties};
pub use credential::Credential;
pub use error::{KeyringError, Result};
pub use registry::Registry;

use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Returns the process-wide registry, creating it on first use.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

/// Returns the active keyring of the process-wide registry.
pub async fn get_keyring() -> Result<Arc<dyn Backend>> {
    registry().get_keyring().await
}

/// Installs `backend` as the process-wide active keyring.
pub async fn set_keyring(backend: Arc<dyn Backend>) {
    registry().set_keyring(backend).await
}

/// Retrieves a password from the active keyring.
pub async fn get_password(service: &str, account: &str) -> Result<Option<String>> {
    get_keyring().await?.get_password(service, account).await
}

/// Stores a password in the active keyring.
pub async fn set_password(service: &str, account: &str, password: &str) -> Result<()> {
    get_keyring()
        .await?
        .set_password(service, account, password)
        .await
}

/// Deletes a password from the active keyring.
pub async fn delete_password(service: &str, account: &str) -> Result<()> {
    get_keyring().await?.delete_password(service, account).await
}

/// Retrieves a credential from the active keyring.
pub async fn get_credential(service: &str, account: Option<&str>) -> Result<Option<Credential>> {
    get_keyring().await?.get_credential(service, account).await
}
