//! Credential data structure.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A username/password pair returned by
/// [`Backend::get_credential`](crate::Backend::get_credential).
///
/// Both fields are always present; a credential is never partially valid.
/// The `Debug` output redacts the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Account name
    pub username: String,

    /// Secret associated with the account
    pub password: String,
}

impl Credential {
    /// Creates a new credential.
    ///
    /// # Example
    ///
    /// ```
    /// use keyringmux::Credential;
    ///
    /// let cred = Credential::new("alice", "s3cr3t");
    /// assert_eq!(cred.username, "alice");
    /// assert!(!format!("{cred:?}").contains("s3cr3t"));
    /// ```
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_serialization() {
        let cred = Credential::new("alice", "pw");
        let json = serde_json::to_string(&cred).unwrap();
        assert_eq!(json, r#"{"username":"alice","password":"pw"}"#);
    }

    #[test]
    fn test_debug_redacts_password() {
        let cred = Credential::new("bob", "hunter2");
        let debug = format!("{:?}", cred);
        assert!(debug.contains("bob"));
        assert!(!debug.contains("hunter2"));
    }
}
