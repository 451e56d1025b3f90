//! Backend properties and the persisted registry configuration.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable naming a backend id to use unconditionally.
pub const BACKEND_ENV_VAR: &str = "KEYRING_BACKEND";

/// Prefix for environment variables injected into every backend's
/// properties. `KEYRING_PROPERTY_FILE_PATH=/x` sets property `file_path`.
pub const PROPERTY_ENV_PREFIX: &str = "KEYRING_PROPERTY_";

/// Per-backend configuration properties.
///
/// Properties are populated from three sources in increasing precedence:
/// constructor argument, runtime overrides passed to
/// [`Backend::with_properties`](crate::Backend::with_properties), and
/// `KEYRING_PROPERTY_*` environment variables. Environment values are
/// applied on construction and again after every merge, so they always win.
///
/// ```
/// use keyringmux::Properties;
///
/// let base = Properties::new().with("file_path", "/tmp/a.enc");
/// let derived = base.merge(&Properties::new().with("file_path", "/tmp/b.enc"));
///
/// assert_eq!(base.get("file_path"), Some("/tmp/a.enc"));
/// assert_eq!(derived.get("file_path"), Some("/tmp/b.enc"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Properties(BTreeMap<String, String>);

impl Properties {
    /// Creates an empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a property, builder style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Sets a property.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Gets a property value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Returns true if no properties are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns a new map with `overrides` shallow-merged over `self`.
    pub fn merge(&self, overrides: &Properties) -> Self {
        let mut merged = self.0.clone();
        merged.extend(overrides.0.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self(merged)
    }

    /// Applies `KEYRING_PROPERTY_*` variables from the process environment.
    pub fn apply_env(self) -> Self {
        self.apply_env_from(std::env::vars())
    }

    /// Applies `KEYRING_PROPERTY_*` variables from an explicit variable list.
    ///
    /// Property names are the variable suffix, lower-cased.
    pub fn apply_env_from<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (name, value) in vars {
            if let Some(key) = name.strip_prefix(PROPERTY_ENV_PREFIX) {
                if !key.is_empty() {
                    self.0.insert(key.to_lowercase(), value);
                }
            }
        }
        self
    }
}

impl FromIterator<(String, String)> for Properties {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Persisted keyring preferences.
///
/// Wire format:
///
/// ```json
/// {
///   "defaultBackend": "encrypted-file",
///   "backendProperties": { "encrypted-file": { "file_path": "/srv/keyring.enc" } }
/// }
/// ```
///
/// Property values may be any JSON scalar; non-string values are stored in
/// their JSON text form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringConfig {
    /// Backend id to use when no environment override is present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_backend: Option<String>,

    /// Property overrides keyed by backend id
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub backend_properties: BTreeMap<String, BTreeMap<String, serde_json::Value>>,
}

impl KeyringConfig {
    /// Loads the configuration file at `path`.
    ///
    /// A missing file means "no preference" and yields `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Any other I/O error, or malformed JSON, is returned as-is.
    pub async fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match tokio::fs::read(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no keyring config file");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        let config = serde_json::from_slice(&contents)?;
        Ok(Some(config))
    }

    /// Returns the recorded property overrides for `backend_id`, if any.
    pub fn properties_for(&self, backend_id: &str) -> Option<Properties> {
        let raw = self.backend_properties.get(backend_id)?;
        Some(
            raw.iter()
                .map(|(key, value)| {
                    let value = match value {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (key.clone(), value)
                })
                .collect(),
        )
    }
}

/// Default location of the registry configuration file.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("keyringmux").join("config.json"))
}
