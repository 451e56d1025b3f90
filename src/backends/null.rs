//! Null backend.
//!
//! Explicitly disables password storage: nothing is ever stored, reads
//! always miss, and deletes always fail. It is also the registry's last
//! resort when auto-detection finds no eligible backend.

use crate::backend::{Backend, BackendFactory, BackendIdentity};
use crate::{KeyringError, Properties, Result};
use async_trait::async_trait;
use tracing::debug;

/// Backend id of [`NullBackend`].
pub const ID: &str = "null";

/// Backend that stores nothing.
///
/// # Example
///
/// ```
/// use keyringmux::backends::null::NullBackend;
/// use keyringmux::{Backend, Properties};
///
/// #[tokio::main]
/// async fn main() -> keyringmux::Result<()> {
///     let backend = NullBackend::new(Properties::new());
///
///     backend.set_password("svc", "alice", "ignored").await?;
///     assert_eq!(backend.get_password("svc", "alice").await?, None);
///     assert!(backend.delete_password("svc", "alice").await.is_err());
///     Ok(())
/// }
/// ```
pub struct NullBackend {
    identity: BackendIdentity,
    properties: Properties,
}

impl NullBackend {
    /// Creates a null backend.
    pub fn new(properties: Properties) -> Self {
        Self {
            identity: BackendIdentity::new(ID, "Null keyring", -1.0),
            properties: properties.apply_env(),
        }
    }
}

impl Default for NullBackend {
    fn default() -> Self {
        Self::new(Properties::new())
    }
}

#[async_trait]
impl Backend for NullBackend {
    fn identity(&self) -> &BackendIdentity {
        &self.identity
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn with_properties(&self, overrides: &Properties) -> Result<Box<dyn Backend>> {
        Ok(Box::new(Self::new(self.properties.merge(overrides))))
    }

    async fn read_password(&self, _service: &str, _account: &str) -> Result<Option<String>> {
        Ok(None)
    }

    async fn write_password(&self, service: &str, _account: &str, _password: &str) -> Result<()> {
        debug!(service, "null keyring discarded password");
        Ok(())
    }

    async fn remove_password(&self, _service: &str, _account: &str) -> Result<()> {
        Err(KeyringError::PasswordDelete(
            "null keyring stores no passwords".to_string(),
        ))
    }
}

/// Factory for [`NullBackend`]. Always supported.
pub struct NullFactory;

#[async_trait]
impl BackendFactory for NullFactory {
    fn id(&self) -> &str {
        ID
    }

    fn create(&self, properties: Properties) -> Result<Box<dyn Backend>> {
        Ok(Box::new(NullBackend::new(properties)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_null_backend_semantics() {
        let backend = NullBackend::default();

        backend.set_password("svc", "alice", "pw").await.unwrap();
        assert_eq!(backend.get_password("svc", "alice").await.unwrap(), None);
        assert_eq!(backend.get_credential("svc", None).await.unwrap(), None);

        let result = backend.delete_password("svc", "alice").await;
        assert!(matches!(result, Err(KeyringError::PasswordDelete(_))));
    }

    #[test]
    fn test_null_identity() {
        let backend = NullBackend::default();
        assert_eq!(backend.id(), "null");
        assert_eq!(backend.priority(), -1.0);
    }

    #[test]
    fn test_with_properties_leaves_receiver_untouched() {
        let backend = NullBackend::new(Properties::new().with("mode", "a"));
        let derived = backend
            .with_properties(&Properties::new().with("mode", "b"))
            .unwrap();

        assert_eq!(backend.properties().get("mode"), Some("a"));
        assert_eq!(derived.properties().get("mode"), Some("b"));
    }
}
