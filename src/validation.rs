//! Input validation shared by every backend.
//!
//! Service and account names may end up as arguments to external tools
//! (keychain CLIs, `secret-tool`, PowerShell scripts), so they are held to a
//! conservative allow-list. Passwords are never interpolated into a shell
//! and only have their length checked.

use crate::{KeyringError, Result};
use unicode_normalization::UnicodeNormalization;

/// Maximum allowed length for service and account names, in UTF-16 code units.
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Maximum allowed password length, in UTF-16 code units.
pub const MAX_PASSWORD_LENGTH: usize = 4096;

/// Returns the NFC form of `value`.
pub fn normalize(value: &str) -> String {
    value.nfc().collect()
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '@' | '-')
}

/// Normalizes and validates a service or account name.
///
/// `kind` names the field in error messages ("service", "account").
/// Returns the normalized identifier on success.
///
/// # Errors
///
/// Returns [`KeyringError::InvalidIdentifier`] if the normalized name is
/// empty, longer than [`MAX_IDENTIFIER_LENGTH`], or contains anything other
/// than `[A-Za-z0-9._@-]`.
///
/// # Example
///
/// ```
/// use keyringmux::validation::validate_identifier;
///
/// assert_eq!(validate_identifier("service", "my-app").unwrap(), "my-app");
/// assert!(validate_identifier("account", "alice@example.com").is_ok());
///
/// assert!(validate_identifier("service", "").is_err());
/// assert!(validate_identifier("service", "app; rm -rf /").is_err());
/// assert!(validate_identifier("account", "../etc/passwd").is_err());
/// ```
pub fn validate_identifier(kind: &str, value: &str) -> Result<String> {
    let normalized = normalize(value);

    if normalized.is_empty() {
        return Err(KeyringError::InvalidIdentifier(format!(
            "{kind} cannot be empty"
        )));
    }

    if normalized.encode_utf16().count() > MAX_IDENTIFIER_LENGTH {
        return Err(KeyringError::InvalidIdentifier(format!(
            "{kind} exceeds maximum length of {MAX_IDENTIFIER_LENGTH} characters"
        )));
    }

    if !normalized.chars().all(is_identifier_char) {
        return Err(KeyringError::InvalidIdentifier(format!(
            "{kind} contains invalid characters (allowed: A-Z a-z 0-9 . _ @ -)"
        )));
    }

    Ok(normalized)
}

/// Normalizes and validates a password.
///
/// # Errors
///
/// Returns [`KeyringError::InvalidPassword`] if the normalized password is
/// empty or longer than [`MAX_PASSWORD_LENGTH`]. The message never echoes
/// the password.
pub fn validate_password(password: &str) -> Result<String> {
    let normalized = normalize(password);

    if normalized.is_empty() {
        return Err(KeyringError::InvalidPassword(
            "password cannot be empty".to_string(),
        ));
    }

    if normalized.encode_utf16().count() > MAX_PASSWORD_LENGTH {
        return Err(KeyringError::InvalidPassword(format!(
            "password exceeds maximum length of {MAX_PASSWORD_LENGTH} characters"
        )));
    }

    Ok(normalized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("service", "my-service").is_ok());
        assert!(validate_identifier("service", "API_KEY_123").is_ok());
        assert!(validate_identifier("service", "prod.database").is_ok());
        assert!(validate_identifier("account", "user@example.com").is_ok());
    }

    #[test]
    fn test_empty_identifier() {
        let result = validate_identifier("service", "");
        assert!(matches!(result, Err(KeyringError::InvalidIdentifier(_))));
        assert!(result.unwrap_err().to_string().contains("empty"));
    }

    #[test]
    fn test_identifier_length_limit() {
        assert!(validate_identifier("account", &"a".repeat(255)).is_ok());

        let result = validate_identifier("account", &"a".repeat(256));
        assert!(result.unwrap_err().to_string().contains("maximum length"));
    }

    #[test]
    fn test_injection_attempts_rejected() {
        let dangerous = [
            "name;id", "name|grep", "a&&b", "$(whoami)", "`id`", "a<b", "a>b", "(x)",
            "\\path", "it's", "say\"hi\"", "line\nbreak", "cr\rlf", "nul\0byte",
            "path/to", "with space",
        ];

        for name in dangerous {
            let result = validate_identifier("service", name);
            assert!(
                matches!(result, Err(KeyringError::InvalidIdentifier(_))),
                "expected {name:?} to fail validation"
            );
        }
    }

    #[test]
    fn test_identifier_normalized_to_nfc() {
        // "e" + combining acute normalizes to a single non-ASCII code point,
        // which the allow-list then rejects.
        let result = validate_identifier("account", "caf\u{0065}\u{0301}");
        assert!(matches!(result, Err(KeyringError::InvalidIdentifier(_))));
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("s3cr3t with spaces; and $symbols").is_ok());
        assert!(validate_password(&"p".repeat(4096)).is_ok());

        assert!(matches!(
            validate_password(""),
            Err(KeyringError::InvalidPassword(_))
        ));
        assert!(matches!(
            validate_password(&"p".repeat(4097)),
            Err(KeyringError::InvalidPassword(_))
        ));
    }

    #[test]
    fn test_password_normalized_to_nfc() {
        let decomposed = "caf\u{0065}\u{0301}";
        assert_eq!(validate_password(decomposed).unwrap(), "caf\u{00e9}");
    }

    #[test]
    fn test_password_error_does_not_echo_secret() {
        let secret = "x".repeat(5000);
        let err = validate_password(&secret).unwrap_err();
        assert!(!err.to_string().contains("xxxx"));
    }
}
