//! Backend trait definition for password storage mechanisms.
//!
//! This module defines the core [`Backend`] trait that every storage
//! mechanism must satisfy, and the [`BackendFactory`] trait the
//! [`Registry`](crate::Registry) uses to discover and construct backends.

use crate::validation::{validate_identifier, validate_password};
use crate::{Credential, KeyringError, Properties, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;

/// Key/value report returned by [`Backend::diagnose`].
pub type Diagnostics = BTreeMap<String, String>;

/// Immutable `(id, name, priority)` triplet tagging a backend.
///
/// `priority` ranks backends during auto-detection: the highest wins.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendIdentity {
    /// Stable identifier used by `KEYRING_BACKEND` and the config file
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Auto-detection rank
    pub priority: f64,
}

impl BackendIdentity {
    /// Creates a new identity.
    pub fn new(id: impl Into<String>, name: impl Into<String>, priority: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            priority,
        }
    }

    /// Returns the contract-minimum diagnostics: `id`, `name`, `priority`.
    pub fn diagnostics(&self) -> Diagnostics {
        let mut report = Diagnostics::new();
        report.insert("id".to_string(), self.id.clone());
        report.insert("name".to_string(), self.name.clone());
        report.insert("priority".to_string(), self.priority.to_string());
        report
    }
}

/// Backend represents one mechanism for storing passwords.
///
/// Implementors provide the storage hooks ([`read_password`],
/// [`write_password`], [`remove_password`] and optionally
/// [`list_usernames`]). Callers use the provided methods
/// ([`get_password`], [`set_password`], [`delete_password`],
/// [`get_credential`]), which normalize and validate every service,
/// account and password before any hook runs. Hooks therefore only ever
/// see validated input.
///
/// All implementations must be `Send + Sync` to support concurrent access
/// across async tasks.
///
/// [`read_password`]: Backend::read_password
/// [`write_password`]: Backend::write_password
/// [`remove_password`]: Backend::remove_password
/// [`list_usernames`]: Backend::list_usernames
/// [`get_password`]: Backend::get_password
/// [`set_password`]: Backend::set_password
/// [`delete_password`]: Backend::delete_password
/// [`get_credential`]: Backend::get_credential
///
/// # Example
///
/// ```no_run
/// use keyringmux::{Backend, EncryptedFileBackend, Properties};
///
/// #[tokio::main]
/// async fn main() -> keyringmux::Result<()> {
///     let backend = EncryptedFileBackend::new(Properties::new())?;
///
///     backend.set_password("my-app", "alice", "s3cr3t").await?;
///     let password = backend.get_password("my-app", "alice").await?;
///
///     assert_eq!(password.as_deref(), Some("s3cr3t"));
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait Backend: Send + Sync {
    // ========================================================================
    // Metadata
    // ========================================================================

    /// Returns the backend's `(id, name, priority)` triplet.
    fn identity(&self) -> &BackendIdentity;

    /// Returns the backend id (e.g., "encrypted-file", "null").
    fn id(&self) -> &str {
        &self.identity().id
    }

    /// Returns the human-readable backend name.
    fn name(&self) -> &str {
        &self.identity().name
    }

    /// Returns the auto-detection priority.
    fn priority(&self) -> f64 {
        self.identity().priority
    }

    /// Returns the effective properties of this instance.
    fn properties(&self) -> &Properties;

    /// Returns a new instance with `overrides` merged over this instance's
    /// properties.
    ///
    /// The receiver is never mutated and remains usable alongside the
    /// derived instance. `KEYRING_PROPERTY_*` environment variables are
    /// re-applied after the merge so they keep precedence.
    fn with_properties(&self, overrides: &Properties) -> Result<Box<dyn Backend>>;

    /// Returns a key/value report about this backend.
    ///
    /// Always contains `id`, `name` and `priority`. Implementations may add
    /// operational details but never secret material.
    fn diagnose(&self) -> Diagnostics {
        self.identity().diagnostics()
    }

    // ========================================================================
    // Storage hooks (inputs already validated)
    // ========================================================================

    /// Reads the password for `(service, account)`.
    async fn read_password(&self, service: &str, account: &str) -> Result<Option<String>>;

    /// Stores `password` for `(service, account)`, replacing any existing value.
    async fn write_password(&self, service: &str, account: &str, password: &str) -> Result<()>;

    /// Removes the password for `(service, account)`.
    ///
    /// # Errors
    ///
    /// Must return [`KeyringError::PasswordDelete`] if no such entry exists.
    async fn remove_password(&self, service: &str, account: &str) -> Result<()>;

    /// Lists known usernames for `service`, used by [`get_credential`]
    /// when no account is given.
    ///
    /// Ordering is backend-specific. The default knows no usernames.
    ///
    /// [`get_credential`]: Backend::get_credential
    async fn list_usernames(&self, _service: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    // ========================================================================
    // Operations
    // ========================================================================

    /// Retrieves the password for `(service, account)`.
    ///
    /// Returns `Ok(None)` if no password is stored.
    ///
    /// # Errors
    ///
    /// - [`KeyringError::InvalidIdentifier`]: service or account rejected
    ///   by validation (no backend I/O is attempted)
    async fn get_password(&self, service: &str, account: &str) -> Result<Option<String>> {
        let service = validate_identifier("service", service)?;
        let account = validate_identifier("account", account)?;
        self.read_password(&service, &account).await
    }

    /// Stores `password` for `(service, account)`.
    ///
    /// # Errors
    ///
    /// - [`KeyringError::InvalidIdentifier`] / [`KeyringError::InvalidPassword`]:
    ///   input rejected by validation
    /// - [`KeyringError::Locked`]: the underlying storage is locked
    /// - [`KeyringError::PasswordSet`]: the write failed
    async fn set_password(&self, service: &str, account: &str, password: &str) -> Result<()> {
        let service = validate_identifier("service", service)?;
        let account = validate_identifier("account", account)?;
        let password = validate_password(password)?;
        self.write_password(&service, &account, &password)
            .await
            .map_err(|err| KeyringError::set_failed(service.as_str(), err))
    }

    /// Deletes the password for `(service, account)`.
    ///
    /// # Errors
    ///
    /// - [`KeyringError::InvalidIdentifier`]: input rejected by validation
    /// - [`KeyringError::Locked`]: the underlying storage is locked
    /// - [`KeyringError::PasswordDelete`]: no such entry, or deletion failed
    async fn delete_password(&self, service: &str, account: &str) -> Result<()> {
        let service = validate_identifier("service", service)?;
        let account = validate_identifier("account", account)?;
        self.remove_password(&service, &account)
            .await
            .map_err(|err| KeyringError::delete_failed(&service, err))
    }

    /// Retrieves a credential for `service`.
    ///
    /// With an `account`, this is [`get_password`](Backend::get_password)
    /// wrapped in a [`Credential`]. Without one, the first username reported
    /// by [`list_usernames`](Backend::list_usernames) is used. A username
    /// whose password disappeared between the two lookups is a miss.
    async fn get_credential(
        &self,
        service: &str,
        account: Option<&str>,
    ) -> Result<Option<Credential>> {
        let service = validate_identifier("service", service)?;

        let username = match account {
            Some(account) => validate_identifier("account", account)?,
            None => match self.list_usernames(&service).await?.into_iter().next() {
                Some(username) => username,
                None => return Ok(None),
            },
        };

        Ok(self
            .read_password(&service, &username)
            .await?
            .map(|password| Credential::new(username, password)))
    }
}

/// Constructs backends for the [`Registry`](crate::Registry).
///
/// A factory declares the id of the backend it builds, an optional
/// platform-support probe, and a constructor taking initial properties.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use keyringmux::{Backend, BackendFactory, KeyringError, Properties, Result};
///
/// struct KeychainFactory;
///
/// #[async_trait]
/// impl BackendFactory for KeychainFactory {
///     fn id(&self) -> &str {
///         "macos-keychain"
///     }
///
///     async fn is_supported(&self) -> Result<bool> {
///         Ok(cfg!(target_os = "macos"))
///     }
///
///     fn create(&self, _properties: Properties) -> Result<Box<dyn Backend>> {
///         Err(KeyringError::BackendUnavailable("security CLI not found".into()))
///     }
/// }
/// ```
#[async_trait]
pub trait BackendFactory: Send + Sync {
    /// Returns the id of the backend this factory builds.
    fn id(&self) -> &str;

    /// Reports whether the backend can run on this host.
    ///
    /// The registry skips the factory when this returns `Ok(false)` or an
    /// error. Factories without a meaningful probe keep the default.
    async fn is_supported(&self) -> Result<bool> {
        Ok(true)
    }

    /// Constructs a backend with `properties` as the constructor argument.
    ///
    /// # Errors
    ///
    /// Return [`KeyringError::BackendUnavailable`] when the backend cannot
    /// be used here; the registry excludes it silently. Any other error
    /// propagates to the caller of the registry.
    fn create(&self, properties: Properties) -> Result<Box<dyn Backend>>;
}
