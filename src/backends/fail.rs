//! Fail backend.
//!
//! Every operation errors with [`KeyringError::NoBackend`]. Registering
//! [`FailFactory`] and selecting it (`KEYRING_BACKEND=fail`) makes a
//! missing keyring loud instead of silently discarding writes the way the
//! null backend does. It is not part of the seed set.

use crate::backend::{Backend, BackendFactory, BackendIdentity};
use crate::{KeyringError, Properties, Result};
use async_trait::async_trait;

/// Backend id of [`FailBackend`].
pub const ID: &str = "fail";

const MESSAGE: &str = "no recommended backend was available; \
    install a keyring backend or set KEYRING_BACKEND";

/// Backend that refuses every operation.
pub struct FailBackend {
    identity: BackendIdentity,
    properties: Properties,
}

impl FailBackend {
    /// Creates a fail backend.
    pub fn new(properties: Properties) -> Self {
        Self {
            identity: BackendIdentity::new(ID, "Fail keyring", 0.0),
            properties: properties.apply_env(),
        }
    }
}

#[async_trait]
impl Backend for FailBackend {
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
        Err(KeyringError::NoBackend(MESSAGE.to_string()))
    }

    async fn write_password(&self, _service: &str, _account: &str, _password: &str) -> Result<()> {
        Err(KeyringError::NoBackend(MESSAGE.to_string()))
    }

    async fn remove_password(&self, _service: &str, _account: &str) -> Result<()> {
        Err(KeyringError::NoBackend(MESSAGE.to_string()))
    }
}

/// Factory for [`FailBackend`]. Always supported.
pub struct FailFactory;

#[async_trait]
impl BackendFactory for FailFactory {
    fn id(&self) -> &str {
        ID
    }

    fn create(&self, properties: Properties) -> Result<Box<dyn Backend>> {
        Ok(Box::new(FailBackend::new(properties)))
    }
}
