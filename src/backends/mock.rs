//! Mock backend for testing.
//!
//! This backend provides a complete in-memory implementation with error
//! injection capabilities for testing code that uses keyringmux, and a
//! configurable factory for exercising backend selection.

use crate::backend::{Backend, BackendFactory, BackendIdentity, Diagnostics};
use crate::*;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Per-service entries, kept in insertion order.
type Entries = HashMap<String, Vec<(String, String)>>;

/// Mock backend for testing.
///
/// Stores all data in memory with support for error injection to simulate
/// failure conditions. Usernames are listed in first-inserted order.
///
/// # Example
///
/// ```
/// use keyringmux::backends::mock::MockBackend;
/// use keyringmux::{Backend, KeyringError};
///
/// #[tokio::main]
/// async fn main() -> keyringmux::Result<()> {
///     let mut backend = MockBackend::new();
///
///     // Pre-populate with test data
///     backend.set_entry("svc", "alice", "pw").await;
///
///     // Test error conditions
///     backend.get_error = Some(KeyringError::Config("test".to_string()));
///
///     let result = backend.get_password("svc", "alice").await;
///     assert!(result.is_err());
///
///     Ok(())
/// }
/// ```
pub struct MockBackend {
    identity: BackendIdentity,
    properties: Properties,
    entries: Arc<RwLock<Entries>>,

    /// Report the store as locked on every operation
    pub locked: bool,
    /// Error to return from `get_password()` and `get_credential()`
    pub get_error: Option<KeyringError>,
    /// Error to return from `set_password()`
    pub set_error: Option<KeyringError>,
    /// Error to return from `delete_password()`
    pub delete_error: Option<KeyringError>,
}

impl MockBackend {
    /// Creates a new mock backend with empty storage.
    pub fn new() -> Self {
        Self::with_identity(MockFactory::default_identity())
    }

    /// Creates a mock backend with a custom identity.
    pub fn with_identity(identity: BackendIdentity) -> Self {
        Self::build(identity, Properties::new(), Arc::default())
    }

    fn build(identity: BackendIdentity, properties: Properties, entries: Arc<RwLock<Entries>>) -> Self {
        Self {
            identity,
            properties: properties.apply_env(),
            entries,
            locked: false,
            get_error: None,
            set_error: None,
            delete_error: None,
        }
    }

    /// Pre-populates the backend with an entry, bypassing validation.
    ///
    /// Useful for setting up test fixtures.
    pub async fn set_entry(
        &self,
        service: impl Into<String>,
        account: impl Into<String>,
        password: impl Into<String>,
    ) {
        let mut entries = self.entries.write().await;
        upsert(&mut entries, service.into(), account.into(), password.into());
    }

    /// Returns the number of stored entries across all services.
    pub async fn len(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check(&self, injected: &Option<KeyringError>) -> Result<()> {
        if self.locked {
            return Err(KeyringError::Locked(format!("{} is locked", self.identity.name)));
        }
        if let Some(ref err) = injected {
            return Err(KeyringError::Other(anyhow::anyhow!("{}", err)));
        }
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn upsert(entries: &mut Entries, service: String, account: String, password: String) {
    let accounts = entries.entry(service).or_default();
    match accounts.iter_mut().find(|(name, _)| *name == account) {
        Some(existing) => existing.1 = password,
        None => accounts.push((account, password)),
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn identity(&self) -> &BackendIdentity {
        &self.identity
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    /// Derived instances share storage with the receiver but not its
    /// injected errors.
    fn with_properties(&self, overrides: &Properties) -> Result<Box<dyn Backend>> {
        Ok(Box::new(Self::build(
            self.identity.clone(),
            self.properties.merge(overrides),
            Arc::clone(&self.entries),
        )))
    }

    fn diagnose(&self) -> Diagnostics {
        let mut report = self.identity.diagnostics();
        report.insert("persistence".to_string(), "memory".to_string());
        if let Ok(entries) = self.entries.try_read() {
            let count: usize = entries.values().map(Vec::len).sum();
            report.insert("entries".to_string(), count.to_string());
        }
        report
    }

    async fn read_password(&self, service: &str, account: &str) -> Result<Option<String>> {
        self.check(&self.get_error)?;

        let entries = self.entries.read().await;
        Ok(entries.get(service).and_then(|accounts| {
            accounts
                .iter()
                .find(|(name, _)| name == account)
                .map(|(_, password)| password.clone())
        }))
    }

    async fn write_password(&self, service: &str, account: &str, password: &str) -> Result<()> {
        self.check(&self.set_error)?;

        let mut entries = self.entries.write().await;
        upsert(
            &mut entries,
            service.to_string(),
            account.to_string(),
            password.to_string(),
        );
        Ok(())
    }

    async fn remove_password(&self, service: &str, account: &str) -> Result<()> {
        self.check(&self.delete_error)?;

        let mut entries = self.entries.write().await;
        let accounts = entries
            .get_mut(service)
            .ok_or_else(|| KeyringError::PasswordDelete("password not found".to_string()))?;
        let index = accounts
            .iter()
            .position(|(name, _)| name == account)
            .ok_or_else(|| KeyringError::PasswordDelete("password not found".to_string()))?;

        accounts.remove(index);
        if accounts.is_empty() {
            entries.remove(service);
        }
        Ok(())
    }

    async fn list_usernames(&self, service: &str) -> Result<Vec<String>> {
        self.check(&self.get_error)?;

        let entries = self.entries.read().await;
        Ok(entries
            .get(service)
            .map(|accounts| accounts.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    Supported,
    Unsupported,
    Fails,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construction {
    Succeeds,
    Unavailable,
    Broken,
}

/// Configurable factory producing [`MockBackend`] instances.
///
/// All instances built by one factory share storage, so a backend picked
/// up through the registry sees data seeded through [`MockFactory::backend`].
///
/// ```
/// use keyringmux::backends::mock::MockFactory;
/// use keyringmux::{BackendIdentity, Registry};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> keyringmux::Result<()> {
///     let registry = Registry::empty();
///     registry
///         .register_backend(Arc::new(MockFactory::new(BackendIdentity::new("high", "High", 9.0))))
///         .await;
///     registry
///         .register_backend(Arc::new(MockFactory::new(BackendIdentity::new("low", "Low", 1.0))))
///         .await;
///
///     let keyring = registry.get_keyring().await?;
///     assert_eq!(keyring.id(), "high");
///     Ok(())
/// }
/// ```
pub struct MockFactory {
    identity: BackendIdentity,
    entries: Arc<RwLock<Entries>>,
    probe: Probe,
    construction: Construction,
}

impl MockFactory {
    /// Creates a factory whose backends carry `identity`.
    pub fn new(identity: BackendIdentity) -> Self {
        Self {
            identity,
            entries: Arc::default(),
            probe: Probe::Supported,
            construction: Construction::Succeeds,
        }
    }

    fn default_identity() -> BackendIdentity {
        BackendIdentity::new("mock", "Mock keyring", 1.0)
    }

    /// The platform probe reports the backend as unsupported.
    pub fn unsupported(mut self) -> Self {
        self.probe = Probe::Unsupported;
        self
    }

    /// The platform probe itself errors.
    pub fn probe_fails(mut self) -> Self {
        self.probe = Probe::Fails;
        self
    }

    /// Construction fails with [`KeyringError::BackendUnavailable`].
    pub fn unavailable(mut self) -> Self {
        self.construction = Construction::Unavailable;
        self
    }

    /// Construction fails with an error the registry must not swallow.
    pub fn broken(mut self) -> Self {
        self.construction = Construction::Broken;
        self
    }

    /// Returns a backend sharing this factory's storage, for seeding data.
    pub fn backend(&self) -> MockBackend {
        MockBackend::build(self.identity.clone(), Properties::new(), Arc::clone(&self.entries))
    }
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new(Self::default_identity())
    }
}

#[async_trait]
impl BackendFactory for MockFactory {
    fn id(&self) -> &str {
        &self.identity.id
    }

    async fn is_supported(&self) -> Result<bool> {
        match self.probe {
            Probe::Supported => Ok(true),
            Probe::Unsupported => Ok(false),
            Probe::Fails => Err(KeyringError::Other(anyhow::anyhow!(
                "{} probe failed",
                self.identity.id
            ))),
        }
    }

    fn create(&self, properties: Properties) -> Result<Box<dyn Backend>> {
        match self.construction {
            Construction::Succeeds => Ok(Box::new(MockBackend::build(
                self.identity.clone(),
                properties,
                Arc::clone(&self.entries),
            ))),
            Construction::Unavailable => Err(KeyringError::BackendUnavailable(format!(
                "{} is not usable on this host",
                self.identity.id
            ))),
            Construction::Broken => Err(KeyringError::Init(format!(
                "{} failed to initialize",
                self.identity.id
            ))),
        }
    }
}
