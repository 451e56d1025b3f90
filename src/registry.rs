//! Backend registry and selection.
//!
//! The [`Registry`] owns the list of known backend factories, the cached
//! list of backends usable on this host, the active keyring, and the
//! active selection limit.

use crate::backend::{Backend, BackendFactory, Diagnostics};
use crate::backends::null::NullBackend;
use crate::config::{default_config_path, KeyringConfig, BACKEND_ENV_VAR};
use crate::{KeyringError, Properties, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Selection-limit predicate: only backends it accepts are eligible for
/// auto-detection.
pub type Limit = Arc<dyn Fn(&dyn Backend) -> bool + Send + Sync>;

/// Wraps a closure as a [`Limit`].
///
/// ```
/// use keyringmux::registry::limit_by;
///
/// let only_positive = limit_by(|backend| backend.priority() > 0.0);
/// ```
pub fn limit_by<F>(predicate: F) -> Limit
where
    F: Fn(&dyn Backend) -> bool + Send + Sync + 'static,
{
    Arc::new(predicate)
}

/// Process-wide backend registry.
///
/// Selection order in [`init_backend`](Registry::init_backend):
///
/// 1. `KEYRING_BACKEND` names a backend id. If it is not available the
///    call fails; it never falls through to auto-detection.
/// 2. The config file names a `defaultBackend`, loaded with any recorded
///    `backendProperties`.
/// 3. Auto-detection: the highest-priority supported backend accepted by
///    the limit, first registered winning ties, or the null backend if
///    none qualifies.
///
/// # Example
///
/// ```no_run
/// use keyringmux::Registry;
///
/// #[tokio::main]
/// async fn main() -> keyringmux::Result<()> {
///     let registry = Registry::new();
///     let keyring = registry.get_keyring().await?;
///
///     println!("using {} (priority {})", keyring.name(), keyring.priority());
///     Ok(())
/// }
/// ```
pub struct Registry {
    factories: RwLock<Vec<Arc<dyn BackendFactory>>>,
    cache: Mutex<Option<Vec<Arc<dyn Backend>>>>,
    active: RwLock<Option<Arc<dyn Backend>>>,
    limit: RwLock<Option<Limit>>,
    config_path: Option<PathBuf>,
}

impl Registry {
    /// Creates a registry seeded with the built-in backends, reading the
    /// config file from its default location.
    pub fn new() -> Self {
        Self::with_factories(crate::backends::seed_factories(), default_config_path())
    }

    /// Creates a registry with no factories and no config file.
    pub fn empty() -> Self {
        Self::with_factories(Vec::new(), None)
    }

    fn with_factories(factories: Vec<Arc<dyn BackendFactory>>, config_path: Option<PathBuf>) -> Self {
        Self {
            factories: RwLock::new(factories),
            cache: Mutex::new(None),
            active: RwLock::new(None),
            limit: RwLock::new(None),
            config_path,
        }
    }

    /// Reads persisted configuration from `path` instead of the default.
    pub fn with_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// Disables persisted configuration.
    pub fn without_config(mut self) -> Self {
        self.config_path = None;
        self
    }

    /// Registers a backend factory.
    ///
    /// The factory is appended after existing ones, so it loses priority
    /// ties against them. The supported-backend cache is invalidated.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use keyringmux::{Backend, BackendFactory, Properties, Registry, Result};
    /// use std::sync::Arc;
    ///
    /// struct MyFactory;
    ///
    /// #[async_trait::async_trait]
    /// impl BackendFactory for MyFactory {
    ///     fn id(&self) -> &str {
    ///         "my-backend"
    ///     }
    ///
    ///     fn create(&self, properties: Properties) -> Result<Box<dyn Backend>> {
    ///         // Create and return backend instance
    ///         # unimplemented!()
    ///     }
    /// }
    ///
    /// # async fn run() {
    /// Registry::new().register_backend(Arc::new(MyFactory)).await;
    /// # }
    /// ```
    pub async fn register_backend(&self, factory: Arc<dyn BackendFactory>) {
        debug!(id = factory.id(), "registering backend factory");
        self.factories.write().await.push(factory);
        *self.cache.lock().await = None;
    }

    /// Returns every backend usable on this host, in registration order.
    ///
    /// Factories whose probe reports unsupported, or whose probe errors,
    /// are skipped. A factory failing with
    /// [`KeyringError::BackendUnavailable`] is skipped too. The result is
    /// cached until a factory is registered or the registry is reset.
    ///
    /// # Errors
    ///
    /// Any other construction error is returned and nothing is cached.
    pub async fn get_all_backends(&self) -> Result<Vec<Arc<dyn Backend>>> {
        let mut cache = self.cache.lock().await;
        if let Some(ref backends) = *cache {
            return Ok(backends.clone());
        }

        let factories = self.factories.read().await.clone();
        let mut backends: Vec<Arc<dyn Backend>> = Vec::with_capacity(factories.len());

        for factory in factories {
            match factory.is_supported().await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(id = factory.id(), "backend not supported on this host");
                    continue;
                }
                Err(err) => {
                    debug!(id = factory.id(), error = %err, "backend support probe failed");
                    continue;
                }
            }

            match factory.create(Properties::new()) {
                Ok(backend) => backends.push(Arc::from(backend)),
                Err(KeyringError::BackendUnavailable(reason)) => {
                    debug!(id = factory.id(), %reason, "backend unavailable");
                }
                Err(err) => return Err(err),
            }
        }

        *cache = Some(backends.clone());
        Ok(backends)
    }

    /// Loads a supported backend by id.
    ///
    /// Returns `Ok(None)` if no supported backend has that id or `limit`
    /// rejects it. With `overrides`, a derived instance is returned via
    /// [`Backend::with_properties`].
    pub async fn load_backend_by_id(
        &self,
        id: &str,
        limit: Option<&Limit>,
        overrides: Option<&Properties>,
    ) -> Result<Option<Arc<dyn Backend>>> {
        let found = self
            .get_all_backends()
            .await?
            .into_iter()
            .find(|backend| backend.id() == id);

        let Some(backend) = found else {
            return Ok(None);
        };

        if let Some(limit) = limit {
            if !limit(backend.as_ref()) {
                return Ok(None);
            }
        }

        match overrides {
            Some(overrides) => Ok(Some(Arc::from(backend.with_properties(overrides)?))),
            None => Ok(Some(backend)),
        }
    }

    /// Runs backend selection and installs the result as the active keyring.
    ///
    /// `limit` becomes the active selection limit.
    ///
    /// # Errors
    ///
    /// - [`KeyringError::Init`]: `KEYRING_BACKEND` or the config file names
    ///   a backend that is not available
    /// - Config file read/parse errors other than "file not found"
    /// - Construction errors from [`get_all_backends`](Registry::get_all_backends)
    pub async fn init_backend(&self, limit: Option<Limit>) -> Result<Arc<dyn Backend>> {
        *self.limit.write().await = limit.clone();

        let backend = self.select(limit.as_ref()).await?;
        info!(id = backend.id(), priority = backend.priority(), "keyring backend selected");

        *self.active.write().await = Some(Arc::clone(&backend));
        Ok(backend)
    }

    async fn select(&self, limit: Option<&Limit>) -> Result<Arc<dyn Backend>> {
        if let Some(id) = std::env::var(BACKEND_ENV_VAR).ok().filter(|id| !id.is_empty()) {
            return self.load_backend_by_id(&id, None, None).await?.ok_or_else(|| {
                KeyringError::Init(format!(
                    "backend '{id}' named by {BACKEND_ENV_VAR} is not available"
                ))
            });
        }

        if let Some(backend) = self.load_from_config().await? {
            return Ok(backend);
        }

        let candidates = self.get_all_backends().await?;
        let mut best: Option<Arc<dyn Backend>> = None;
        for backend in candidates {
            if let Some(limit) = limit {
                if !limit(backend.as_ref()) {
                    continue;
                }
            }
            if best
                .as_ref()
                .map_or(true, |current| backend.priority() > current.priority())
            {
                best = Some(backend);
            }
        }

        Ok(best.unwrap_or_else(|| {
            debug!("no eligible backend, falling back to null keyring");
            Arc::new(NullBackend::default())
        }))
    }

    async fn load_from_config(&self) -> Result<Option<Arc<dyn Backend>>> {
        let Some(ref path) = self.config_path else {
            return Ok(None);
        };
        let Some(config) = KeyringConfig::load(path).await? else {
            return Ok(None);
        };
        let Some(ref id) = config.default_backend else {
            return Ok(None);
        };

        let overrides = config.properties_for(id);
        self.load_backend_by_id(id, None, overrides.as_ref())
            .await?
            .map(Some)
            .ok_or_else(|| {
                KeyringError::Init(format!(
                    "backend '{id}' named in {} is not available",
                    path.display()
                ))
            })
    }

    /// Returns the active keyring, running selection on first use with the
    /// active limit.
    pub async fn get_keyring(&self) -> Result<Arc<dyn Backend>> {
        if let Some(ref backend) = *self.active.read().await {
            return Ok(Arc::clone(backend));
        }

        let limit = self.limit.read().await.clone();
        self.init_backend(limit).await
    }

    /// Installs `backend` as the active keyring, bypassing selection.
    pub async fn set_keyring(&self, backend: Arc<dyn Backend>) {
        debug!(id = backend.id(), "keyring backend set explicitly");
        *self.active.write().await = Some(backend);
    }

    /// Returns the diagnostics of every supported backend.
    pub async fn diagnose_all(&self) -> Result<Vec<Diagnostics>> {
        Ok(self
            .get_all_backends()
            .await?
            .iter()
            .map(|backend| backend.diagnose())
            .collect())
    }

    /// Clears the backend cache, the active keyring, and the active limit.
    ///
    /// For test harnesses only.
    #[doc(hidden)]
    pub async fn reset(&self) {
        *self.cache.lock().await = None;
        *self.active.write().await = None;
        *self.limit.write().await = None;
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, feature = "mock"))]
mod tests {
    use super::*;
    use crate::backends::mock::MockFactory;
    use crate::BackendIdentity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn mock(id: &str, priority: f64) -> MockFactory {
        MockFactory::new(BackendIdentity::new(id, id.to_uppercase(), priority))
    }

    async fn registry_with(factories: Vec<MockFactory>) -> Registry {
        let registry = Registry::empty();
        for factory in factories {
            registry.register_backend(Arc::new(factory)).await;
        }
        registry
    }

    fn ids(backends: &[Arc<dyn Backend>]) -> Vec<String> {
        backends.iter().map(|b| b.id().to_string()).collect()
    }

    #[tokio::test]
    async fn test_highest_priority_wins() {
        let registry = registry_with(vec![mock("low", 1.0), mock("high", 5.0), mock("mid", 3.0)]).await;

        let keyring = registry.get_keyring().await.unwrap();
        assert_eq!(keyring.id(), "high");
    }

    #[tokio::test]
    async fn test_ties_go_to_first_registered() {
        let registry = registry_with(vec![mock("first", 2.0), mock("second", 2.0)]).await;

        let keyring = registry.init_backend(None).await.unwrap();
        assert_eq!(keyring.id(), "first");
    }

    #[tokio::test]
    async fn test_unsupported_and_unavailable_are_skipped() {
        let registry = registry_with(vec![
            mock("unsupported", 9.0).unsupported(),
            mock("probe-error", 8.0).probe_fails(),
            mock("unavailable", 7.0).unavailable(),
            mock("usable", 1.0),
        ])
        .await;

        let backends = registry.get_all_backends().await.unwrap();
        assert_eq!(ids(&backends), vec!["usable"]);
    }

    #[tokio::test]
    async fn test_other_construction_errors_propagate() {
        let registry = registry_with(vec![mock("usable", 1.0), mock("broken", 2.0).broken()]).await;

        let result = registry.get_all_backends().await;
        assert!(matches!(result, Err(KeyringError::Init(_))));
    }

    #[tokio::test]
    async fn test_backend_list_cached_until_registration() {
        struct CountingFactory(Arc<AtomicUsize>);

        #[async_trait]
        impl BackendFactory for CountingFactory {
            fn id(&self) -> &str {
                "counting"
            }

            async fn is_supported(&self) -> Result<bool> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }

            fn create(&self, _properties: Properties) -> Result<Box<dyn Backend>> {
                Ok(Box::new(NullBackend::default()))
            }
        }

        let probes = Arc::new(AtomicUsize::new(0));
        let registry = Registry::empty();
        registry
            .register_backend(Arc::new(CountingFactory(Arc::clone(&probes))))
            .await;

        registry.get_all_backends().await.unwrap();
        registry.get_all_backends().await.unwrap();
        assert_eq!(probes.load(Ordering::SeqCst), 1);

        registry.register_backend(Arc::new(mock("late", 1.0))).await;
        let backends = registry.get_all_backends().await.unwrap();
        assert_eq!(probes.load(Ordering::SeqCst), 2);
        assert_eq!(backends.len(), 2);
    }

    #[tokio::test]
    async fn test_limit_rejecting_everything_falls_back_to_null() {
        let registry = registry_with(vec![mock("a", 1.0), mock("b", 2.0)]).await;

        let keyring = registry
            .init_backend(Some(limit_by(|_| false)))
            .await
            .unwrap();
        assert_eq!(keyring.id(), "null");
        assert_eq!(keyring.priority(), -1.0);

        keyring.set_password("svc", "alice", "pw").await.unwrap();
        assert_eq!(keyring.get_password("svc", "alice").await.unwrap(), None);
        assert!(matches!(
            keyring.delete_password("svc", "alice").await,
            Err(KeyringError::PasswordDelete(_))
        ));
    }

    #[tokio::test]
    async fn test_limit_filters_auto_detection() {
        let registry = registry_with(vec![mock("a", 1.0), mock("b", 2.0)]).await;

        let keyring = registry
            .init_backend(Some(limit_by(|backend| backend.id() != "b")))
            .await
            .unwrap();
        assert_eq!(keyring.id(), "a");
    }

    #[tokio::test]
    async fn test_active_limit_reused_after_reset_of_active() {
        let registry = registry_with(vec![mock("a", 1.0), mock("b", 2.0)]).await;
        registry
            .init_backend(Some(limit_by(|backend| backend.id() == "a")))
            .await
            .unwrap();

        *registry.active.write().await = None;
        assert_eq!(registry.get_keyring().await.unwrap().id(), "a");

        registry.reset().await;
        assert_eq!(registry.get_keyring().await.unwrap().id(), "b");
    }

    #[tokio::test]
    async fn test_empty_registry_yields_null() {
        let registry = Registry::empty();
        assert_eq!(registry.get_keyring().await.unwrap().id(), "null");
    }

    #[tokio::test]
    async fn test_load_backend_by_id() {
        let registry = registry_with(vec![mock("a", 1.0), mock("b", 2.0)]).await;

        let found = registry.load_backend_by_id("a", None, None).await.unwrap();
        assert_eq!(found.unwrap().id(), "a");

        assert!(registry
            .load_backend_by_id("missing", None, None)
            .await
            .unwrap()
            .is_none());

        let reject_a = limit_by(|backend| backend.id() != "a");
        assert!(registry
            .load_backend_by_id("a", Some(&reject_a), None)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_load_backend_by_id_with_overrides() {
        let registry = registry_with(vec![mock("a", 1.0)]).await;
        let overrides = Properties::new().with("region", "eu");

        let derived = registry
            .load_backend_by_id("a", None, Some(&overrides))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(derived.properties().get("region"), Some("eu"));

        let cached = registry.load_backend_by_id("a", None, None).await.unwrap().unwrap();
        assert_eq!(cached.properties().get("region"), None);
    }

    #[tokio::test]
    async fn test_set_keyring_bypasses_detection() {
        let registry = registry_with(vec![mock("high", 9.0)]).await;
        let pinned = mock("pinned", 0.1).create(Properties::new()).unwrap();

        registry.set_keyring(Arc::from(pinned)).await;
        assert_eq!(registry.get_keyring().await.unwrap().id(), "pinned");
    }

    #[tokio::test]
    async fn test_active_keyring_memoized() {
        let registry = registry_with(vec![mock("a", 1.0)]).await;
        let first = registry.get_keyring().await.unwrap();

        registry.register_backend(Arc::new(mock("b", 5.0))).await;
        let second = registry.get_keyring().await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_config_file_selects_backend_with_properties() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(
            &config_path,
            r#"{"defaultBackend": "a", "backendProperties": {"a": {"region": "eu"}}}"#,
        )
        .unwrap();

        let registry = registry_with(vec![mock("a", 1.0), mock("b", 2.0)])
            .await
            .with_config_path(&config_path);

        let keyring = registry.get_keyring().await.unwrap();
        assert_eq!(keyring.id(), "a");
        assert_eq!(keyring.properties().get("region"), Some("eu"));
    }

    #[tokio::test]
    async fn test_config_without_default_uses_auto_detection() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"backendProperties": {}}"#).unwrap();

        let registry = registry_with(vec![mock("a", 1.0), mock("b", 2.0)])
            .await
            .with_config_path(&config_path);

        assert_eq!(registry.get_keyring().await.unwrap().id(), "b");
    }

    #[tokio::test]
    async fn test_missing_config_file_is_no_preference() {
        let dir = tempfile::tempdir().unwrap();
        let registry = registry_with(vec![mock("a", 1.0)])
            .await
            .with_config_path(dir.path().join("absent.json"));

        assert_eq!(registry.get_keyring().await.unwrap().id(), "a");
    }

    #[tokio::test]
    async fn test_malformed_config_file_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, "{ nope").unwrap();

        let registry = registry_with(vec![mock("a", 1.0)])
            .await
            .with_config_path(&config_path);

        assert!(matches!(
            registry.get_keyring().await,
            Err(KeyringError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_config_naming_unknown_backend_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config.json");
        std::fs::write(&config_path, r#"{"defaultBackend": "nope"}"#).unwrap();

        let registry = registry_with(vec![mock("a", 1.0)])
            .await
            .with_config_path(&config_path);

        assert!(matches!(
            registry.get_keyring().await,
            Err(KeyringError::Init(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_set_without_file_store_resolves_to_null() {
        let registry = Registry::with_factories(crate::backends::seed_factories(), None);

        let backends = registry.get_all_backends().await.unwrap();
        assert!(backends.iter().all(|backend| backend.id() != "fail"));

        let keyring = registry
            .init_backend(Some(limit_by(|backend| backend.id() != "encrypted-file")))
            .await
            .unwrap();
        assert_eq!(keyring.id(), "null");
    }

    #[tokio::test]
    async fn test_diagnose_all() {
        let registry = registry_with(vec![mock("a", 1.0), mock("b", 2.0)]).await;

        let reports = registry.diagnose_all().await.unwrap();
        let ids: Vec<_> = reports.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
