//! Backend implementations.
//!
//! Native OS bindings and CLI adapters are supplied by other crates and
//! plugged in through [`Registry::register_backend`](crate::Registry::register_backend).

pub mod fail;
pub mod file;
pub mod null;

#[cfg(feature = "mock")]
pub mod mock;

use crate::BackendFactory;
use std::sync::Arc;

/// Returns the factories every registry starts with.
///
/// The mock and fail backends are never seeded; callers register them
/// explicitly.
pub fn seed_factories() -> Vec<Arc<dyn BackendFactory>> {
    vec![
        Arc::new(file::EncryptedFileFactory),
        Arc::new(null::NullFactory),
    ]
}
