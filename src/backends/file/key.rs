//! Master key resolution for the encrypted file store.

use crate::{KeyringError, Result};
use rand::{rngs::OsRng, RngCore};
use std::fmt;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Environment variable supplying the master key as 64 hex characters.
pub const MASTER_KEY_ENV_VAR: &str = "KEYRING_FILE_MASTER_KEY";

/// Master key length in bytes.
pub const KEY_LEN: usize = 32;

/// 256-bit symmetric key, zeroed on drop. `Debug` never prints the bytes.
#[derive(Clone)]
pub struct MasterKey(Zeroizing<[u8; KEY_LEN]>);

impl MasterKey {
    /// Generates a key from the OS random number generator.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self(bytes)
    }

    /// Builds a key from exactly [`KEY_LEN`] raw bytes.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        if raw.len() != KEY_LEN {
            return Err(KeyringError::Config(format!(
                "key file must contain exactly {KEY_LEN} bytes, found {}",
                raw.len()
            )));
        }

        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        bytes.copy_from_slice(raw);
        Ok(Self(bytes))
    }

    /// Builds a key from exactly 64 hex characters.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        if encoded.len() != KEY_LEN * 2 {
            return Err(KeyringError::Config(format!(
                "{MASTER_KEY_ENV_VAR} must be exactly {} hex characters",
                KEY_LEN * 2
            )));
        }

        let raw = Zeroizing::new(hex::decode(encoded).map_err(|_| {
            KeyringError::Config(format!("{MASTER_KEY_ENV_VAR} is not valid hex"))
        })?);
        Self::from_bytes(&raw)
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("MasterKey(<redacted>)")
    }
}

/// Resolves the master key.
///
/// Order: [`MASTER_KEY_ENV_VAR`] if set, otherwise the key file at
/// `key_path`, generated on first use.
pub async fn resolve(key_path: &Path) -> Result<MasterKey> {
    match std::env::var(MASTER_KEY_ENV_VAR) {
        Ok(encoded) => {
            debug!("using master key from environment");
            MasterKey::from_hex(&encoded)
        }
        Err(std::env::VarError::NotPresent) => load_or_create(key_path).await,
        Err(std::env::VarError::NotUnicode(_)) => Err(KeyringError::Config(format!(
            "{MASTER_KEY_ENV_VAR} is not valid UTF-8"
        ))),
    }
}

/// Reads the key file at `path`, creating it with a random key if absent.
///
/// The file is created owner-only (`0o600`), its parent directory
/// owner-only (`0o700`) when missing.
pub async fn load_or_create(path: &Path) -> Result<MasterKey> {
    match tokio::fs::read(path).await {
        Ok(raw) => return MasterKey::from_bytes(&Zeroizing::new(raw)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    if let Some(parent) = path.parent() {
        create_private_dir(parent).await?;
    }

    let key = MasterKey::generate();
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    match options.open(path).await {
        Ok(mut file) => {
            file.write_all(key.as_bytes()).await?;
            file.sync_all().await?;
            info!(path = %path.display(), "generated new master key file");
            Ok(key)
        }
        // Another writer created it first; use theirs.
        Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
            let raw = Zeroizing::new(tokio::fs::read(path).await?);
            MasterKey::from_bytes(&raw)
        }
        Err(err) => Err(err.into()),
    }
}

/// Creates `dir` and any missing ancestors, owner-only on Unix.
pub(crate) async fn create_private_dir(dir: &Path) -> Result<()> {
    if dir.as_os_str().is_empty() || tokio::fs::try_exists(dir).await? {
        return Ok(());
    }

    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o700);
    builder.create(dir).await?;
    Ok(())
}
