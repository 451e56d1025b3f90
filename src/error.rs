//! Error types for keyring operations.

use thiserror::Error;

/// Result type alias using [`KeyringError`].
pub type Result<T> = std::result::Result<T, KeyringError>;

/// Errors that can occur during keyring operations.
///
/// Messages never carry passwords, key material, or raw output from
/// external tools. All errors implement `std::error::Error` and can be
/// chained with `source()`.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// Service or account name failed validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),

    /// Password failed validation.
    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// Writing a password failed.
    #[error("failed to set password for service {service}: {source}")]
    PasswordSet {
        /// Service the write was attempted for
        service: String,
        /// Underlying error
        #[source]
        source: Box<KeyringError>,
    },

    /// Deleting a password failed, including when no such entry exists.
    #[error("failed to delete password: {0}")]
    PasswordDelete(String),

    /// Backend construction or selection failed.
    #[error("keyring initialization failed: {0}")]
    Init(String),

    /// Underlying storage is locked and must be unlocked first.
    #[error("keyring is locked: {0}")]
    Locked(String),

    /// No usable backend could be resolved.
    #[error("no keyring backend available: {0}")]
    NoBackend(String),

    /// The backend cannot run on this host.
    ///
    /// Raised by factories during construction. The registry drops such
    /// backends from the candidate list instead of propagating the error.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Encrypted store could not be authenticated or decoded.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Encrypted store carries a format version this build cannot read.
    #[error("unsupported store format version: {0}")]
    UnsupportedVersion(u8),

    /// Invalid configuration (master key, paths, config file contents).
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Other error (catch-all).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KeyringError {
    /// Wraps an error raised while writing a password.
    ///
    /// Validation and lock errors are passed through untouched so callers
    /// can still tell a rejected input or a locked store apart from a
    /// failed write.
    ///
    /// # Example
    ///
    /// ```
    /// use keyringmux::KeyringError;
    ///
    /// let err = KeyringError::set_failed("svc", KeyringError::Config("bad key".into()));
    /// assert_eq!(
    ///     err.to_string(),
    ///     "failed to set password for service svc: configuration error: bad key"
    /// );
    /// ```
    pub fn set_failed(service: impl Into<String>, err: KeyringError) -> Self {
        match err {
            err @ (Self::InvalidIdentifier(_)
            | Self::InvalidPassword(_)
            | Self::Locked(_)
            | Self::PasswordSet { .. }) => err,
            err => Self::PasswordSet {
                service: service.into(),
                source: Box::new(err),
            },
        }
    }

    /// Folds an error raised while deleting a password into
    /// [`KeyringError::PasswordDelete`].
    ///
    /// Validation and lock errors pass through untouched, as in
    /// [`set_failed`](KeyringError::set_failed).
    ///
    /// ```
    /// use keyringmux::KeyringError;
    ///
    /// let err = KeyringError::delete_failed("svc", KeyringError::Decryption("bad tag".into()));
    /// assert_eq!(
    ///     err.to_string(),
    ///     "failed to delete password: service svc: decryption failed: bad tag"
    /// );
    /// ```
    pub fn delete_failed(service: &str, err: KeyringError) -> Self {
        match err {
            err @ (Self::InvalidIdentifier(_) | Self::Locked(_) | Self::PasswordDelete(_)) => err,
            err => Self::PasswordDelete(format!("service {service}: {err}")),
        }
    }
}
