//! Data file location for the encrypted store.

use crate::{KeyringError, Result};
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Default data file name inside the data root.
pub const DEFAULT_FILE_NAME: &str = "keyring.enc";

/// Roots no configured path may fall under, compared component-wise after
/// lower-casing and converting separators to `/`.
const DENIED_PREFIXES: &[&str] = &[
    "/etc",
    "/sys",
    "/proc",
    "/dev",
    "/root",
    "c:/windows",
    "c:/system",
];

/// Platform data root for keyringmux, e.g. `~/.local/share/keyringmux`.
pub fn default_data_root() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("keyringmux"))
}

/// Resolves the data file location.
///
/// A `configured` path is made absolute and lexically normalized, then
/// rejected if it falls under a protected system root. A configured path
/// outside `data_root` is accepted with a warning. Without a configured
/// path, the default file inside `data_root` is used.
///
/// # Errors
///
/// - [`KeyringError::Config`]: configured path is in a protected location
/// - [`KeyringError::BackendUnavailable`]: nothing configured and no data
///   root could be determined
pub fn resolve_store_path(configured: Option<&str>, data_root: Option<&Path>) -> Result<PathBuf> {
    let Some(configured) = configured else {
        return data_root
            .map(|root| root.join(DEFAULT_FILE_NAME))
            .ok_or_else(|| {
                KeyringError::BackendUnavailable(
                    "could not determine a data directory for the encrypted store".to_string(),
                )
            });
    };

    let path = checked_path(configured)?;

    if let Some(root) = data_root {
        if !path.starts_with(normalize(root)) {
            warn!(
                path = %path.display(),
                data_root = %root.display(),
                "encrypted store path is outside the keyring data directory"
            );
        }
    }

    Ok(path)
}

/// Makes `configured` absolute, normalizes it, and applies the deny-list.
pub fn checked_path(configured: &str) -> Result<PathBuf> {
    if configured.trim().is_empty() {
        return Err(KeyringError::Config("configured path is empty".to_string()));
    }

    let absolute = std::path::absolute(configured)?;
    let path = normalize(&absolute);

    if is_denied(&path) {
        return Err(KeyringError::Config(
            "configured path points into a protected system location".to_string(),
        ));
    }

    Ok(path)
}

fn is_denied(path: &Path) -> bool {
    let folded = PathBuf::from(path.to_string_lossy().replace('\\', "/").to_lowercase());
    DENIED_PREFIXES
        .iter()
        .any(|prefix| folded.starts_with(prefix))
}

/// Resolves `.` and `..` components without touching the filesystem.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::MakeWriter;

    #[test]
    fn test_default_path_inside_data_root() {
        let root = Path::new("/home/alice/.local/share/keyringmux");
        let path = resolve_store_path(None, Some(root)).unwrap();
        assert_eq!(path, root.join("keyring.enc"));
    }

    #[test]
    fn test_no_data_root_is_unavailable() {
        assert!(matches!(
            resolve_store_path(None, None),
            Err(KeyringError::BackendUnavailable(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_deny_list() {
        for denied in [
            "/etc/keyring.enc",
            "/ETC/keyring.enc",
            "/sys/x",
            "/proc/self/mem",
            "/dev/null",
            "/root/keyring.enc",
            "/tmp/../etc/shadow",
            "/var/./../etc/x",
        ] {
            assert!(
                matches!(checked_path(denied), Err(KeyringError::Config(_))),
                "{denied} should be rejected"
            );
        }
    }

    #[test]
    fn test_windows_roots_denied() {
        assert!(is_denied(Path::new("C:\\Windows\\System32\\x.enc")));
        assert!(is_denied(Path::new("c:\\system\\x.enc")));
        assert!(!is_denied(Path::new("D:\\data\\x.enc")));
    }

    #[test]
    fn test_deny_list_matches_whole_components() {
        for allowed in [
            "/etcd-data/keyring.enc",
            "/devel/keyring.enc",
            "/rootfs/keyring.enc",
            "/system/keyring.enc",
            "c:/windows-backup/keyring.enc",
        ] {
            assert!(!is_denied(Path::new(allowed)), "{allowed} should be allowed");
        }
        assert!(is_denied(Path::new("/etc")));
        assert!(is_denied(Path::new("/root/.config/keyring.enc")));
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl<'a> MakeWriter<'a> for LogBuffer {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Runs `f` with a warn-level subscriber and returns what it logged.
    fn warnings_during<T>(f: impl FnOnce() -> T) -> (T, String) {
        let buffer = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(buffer.clone())
            .with_max_level(tracing::Level::WARN)
            .with_ansi(false)
            .finish();

        let result = tracing::subscriber::with_default(subscriber, f);
        let logged = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        (result, logged)
    }

    #[cfg(unix)]
    #[test]
    fn test_outside_data_root_is_allowed_with_warning() {
        let (path, logged) = warnings_during(|| {
            resolve_store_path(
                Some("/srv/secrets/keyring.enc"),
                Some(Path::new("/home/alice/.local/share/keyringmux")),
            )
        });

        assert_eq!(path.unwrap(), PathBuf::from("/srv/secrets/keyring.enc"));
        assert!(logged.contains("WARN"), "{logged}");
        assert!(logged.contains("outside the keyring data directory"), "{logged}");
        assert!(logged.contains("path=/srv/secrets/keyring.enc"), "{logged}");
        assert!(
            logged.contains("data_root=/home/alice/.local/share/keyringmux"),
            "{logged}"
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_inside_data_root_is_silent() {
        let (path, logged) = warnings_during(|| {
            resolve_store_path(
                Some("/home/alice/.local/share/keyringmux/work/keyring.enc"),
                Some(Path::new("/home/alice/.local/share/keyringmux")),
            )
        });

        assert!(path.is_ok());
        assert!(logged.is_empty(), "{logged}");
    }

    #[cfg(unix)]
    #[test]
    fn test_normalize_is_lexical() {
        assert_eq!(
            normalize(Path::new("/srv/./a/../b/keyring.enc")),
            PathBuf::from("/srv/b/keyring.enc")
        );
        assert_eq!(normalize(Path::new("/../..")), PathBuf::from("/"));
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(matches!(checked_path("  "), Err(KeyringError::Config(_))));
    }
}
