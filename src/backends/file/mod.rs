//! Encrypted file backend.
//!
//! The fallback used when no native credential manager is available. All
//! passwords live in one file holding a versioned AES-256-GCM envelope:
//!
//! ```text
//! [version: 1 byte][nonce: 12 bytes][auth tag: 16 bytes][ciphertext]
//! ```
//!
//! The plaintext is the JSON map `service → (account → password)`.
//!
//! # Key Material
//!
//! The 32-byte master key is taken from `KEYRING_FILE_MASTER_KEY` (64 hex
//! characters) if set. Otherwise it is read from the key file, which is
//! generated with owner-only permissions on first use.
//!
//! # Example
//!
//! ```no_run
//! use keyringmux::{Backend, EncryptedFileBackend, Properties};
//!
//! #[tokio::main]
//! async fn main() -> keyringmux::Result<()> {
//!     let backend = EncryptedFileBackend::new(
//!         Properties::new().with("file_path", "/srv/myapp/keyring.enc"),
//!     )?;
//!
//!     backend.set_password("myapp", "deploy-bot", "hunter2").await?;
//!     Ok(())
//! }
//! ```

mod backend;
pub mod envelope;
pub mod key;
pub mod path;

pub use backend::{EncryptedFileBackend, Store, FILE_PATH_PROPERTY, ID, KEY_PATH_PROPERTY};

use crate::{Backend, BackendFactory, Properties, Result};
use async_trait::async_trait;

/// Factory for [`EncryptedFileBackend`].
///
/// Has no platform probe: the store works anywhere a data directory or a
/// configured path exists.
pub struct EncryptedFileFactory;

#[async_trait]
impl BackendFactory for EncryptedFileFactory {
    fn id(&self) -> &str {
        ID
    }

    fn create(&self, properties: Properties) -> Result<Box<dyn Backend>> {
        Ok(Box::new(EncryptedFileBackend::new(properties)?))
    }
}
