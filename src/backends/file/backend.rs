//! Encrypted file backend implementation.

use super::envelope;
use super::key::{self, MasterKey};
use super::path::{checked_path, default_data_root, resolve_store_path};
use crate::backend::{Backend, BackendIdentity};
use crate::{KeyringError, Properties, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::OnceCell;
use tracing::{debug, instrument};
use zeroize::Zeroizing;

/// Backend id of [`EncryptedFileBackend`].
pub const ID: &str = "encrypted-file";

/// Property naming the data file.
pub const FILE_PATH_PROPERTY: &str = "file_path";

/// Property naming the key file.
pub const KEY_PATH_PROPERTY: &str = "key_path";

/// Decrypted store contents: service → (account → password).
pub type Store = BTreeMap<String, BTreeMap<String, String>>;

/// Password store kept in a single AES-256-GCM encrypted file.
///
/// Every operation reads the whole file, and every mutation rewrites it
/// through a temporary file and an atomic rename. Writers within one
/// process are not serialized against each other: two concurrent
/// `set_password` calls race, and the last rename wins.
///
/// Properties:
///
/// - `file_path`: data file (default `<data dir>/keyringmux/keyring.enc`)
/// - `key_path`: key file (default: the data file name with `.key` appended)
///
/// The master key comes from `KEYRING_FILE_MASTER_KEY` when set.
pub struct EncryptedFileBackend {
    identity: BackendIdentity,
    properties: Properties,
    file_path: PathBuf,
    key_path: PathBuf,
    key: OnceCell<MasterKey>,
}

impl EncryptedFileBackend {
    /// Creates a backend from constructor properties.
    ///
    /// `KEYRING_PROPERTY_*` environment variables are applied over
    /// `properties` before paths are resolved. No file is touched.
    ///
    /// # Errors
    ///
    /// - [`KeyringError::Config`]: a configured path is in a protected location
    /// - [`KeyringError::BackendUnavailable`]: no path configured and no
    ///   platform data directory exists
    pub fn new(properties: Properties) -> Result<Self> {
        let properties = properties.apply_env();
        let data_root = default_data_root();

        let file_path = resolve_store_path(properties.get(FILE_PATH_PROPERTY), data_root.as_deref())?;
        let key_path = match properties.get(KEY_PATH_PROPERTY) {
            Some(configured) => checked_path(configured)?,
            None => default_key_path(&file_path),
        };
        if key_path == file_path {
            return Err(KeyringError::Config(
                "key file and store file must be different paths".to_string(),
            ));
        }

        Ok(Self {
            identity: BackendIdentity::new(ID, "Encrypted file keyring", 0.5),
            properties,
            file_path,
            key_path,
            key: OnceCell::new(),
        })
    }

    /// Returns the resolved data file location.
    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Returns the resolved key file location.
    pub fn key_path(&self) -> &Path {
        &self.key_path
    }

    async fn master_key(&self) -> Result<&MasterKey> {
        self.key.get_or_try_init(|| key::resolve(&self.key_path)).await
    }

    /// Reads and decrypts the store.
    ///
    /// A missing file is an empty store. Once the file exists, any failure
    /// (authentication, version, JSON) is returned rather than treated as
    /// empty.
    #[instrument(skip_all)]
    pub async fn read_store(&self) -> Result<Store> {
        let envelope = match tokio::fs::read(&self.file_path).await {
            Ok(envelope) => envelope,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!("encrypted store not written yet");
                return Ok(Store::new());
            }
            Err(err) => return Err(err.into()),
        };

        let key = self.master_key().await?;
        let plaintext = Zeroizing::new(envelope::open(&envelope, key)?);
        serde_json::from_slice(&plaintext).map_err(|_| {
            KeyringError::Decryption("decrypted store is not valid JSON".to_string())
        })
    }

    /// Encrypts and persists the store.
    ///
    /// Writes a temporary file next to the data file (owner-only
    /// permissions) and renames it into place, so readers never see a
    /// partial envelope and a crash leaves the previous one intact.
    #[instrument(skip_all)]
    pub async fn write_store(&self, store: &Store) -> Result<()> {
        let key = self.master_key().await?;
        let plaintext = Zeroizing::new(serde_json::to_vec(store)?);
        let envelope = envelope::seal(&plaintext, key)?;

        let parent = self
            .file_path
            .parent()
            .ok_or_else(|| KeyringError::Config("invalid store path".to_string()))?;
        key::create_private_dir(parent).await?;

        let tmp_path = parent.join(format!(
            ".{}.{}.tmp",
            self.file_path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            uuid::Uuid::new_v4()
        ));

        if let Err(err) = write_private(&tmp_path, &envelope).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }
        if let Err(err) = tokio::fs::rename(&tmp_path, &self.file_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }

        debug!(services = store.len(), "encrypted store written");
        Ok(())
    }
}

/// `keyring.enc` becomes `keyring.enc.key`.
fn default_key_path(file_path: &Path) -> PathBuf {
    let mut name = file_path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".key");
    file_path.with_file_name(name)
}

async fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl Backend for EncryptedFileBackend {
    fn identity(&self) -> &BackendIdentity {
        &self.identity
    }

    fn properties(&self) -> &Properties {
        &self.properties
    }

    fn with_properties(&self, overrides: &Properties) -> Result<Box<dyn Backend>> {
        Ok(Box::new(Self::new(self.properties.merge(overrides))?))
    }

    async fn read_password(&self, service: &str, account: &str) -> Result<Option<String>> {
        let store = self.read_store().await?;
        Ok(store
            .get(service)
            .and_then(|accounts| accounts.get(account))
            .cloned())
    }

    async fn write_password(&self, service: &str, account: &str, password: &str) -> Result<()> {
        let mut store = self.read_store().await?;
        store
            .entry(service.to_string())
            .or_default()
            .insert(account.to_string(), password.to_string());
        self.write_store(&store).await
    }

    async fn remove_password(&self, service: &str, account: &str) -> Result<()> {
        let mut store = self.read_store().await?;

        let accounts = store
            .get_mut(service)
            .ok_or_else(|| KeyringError::PasswordDelete("password not found".to_string()))?;
        if accounts.remove(account).is_none() {
            return Err(KeyringError::PasswordDelete("password not found".to_string()));
        }
        if accounts.is_empty() {
            store.remove(service);
        }

        self.write_store(&store).await
    }

    /// Lists accounts for `service` in alphabetical order.
    async fn list_usernames(&self, service: &str) -> Result<Vec<String>> {
        let store = self.read_store().await?;
        Ok(store
            .get(service)
            .map(|accounts| accounts.keys().cloned().collect())
            .unwrap_or_default())
    }
}
