use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

/// Compute-once cache for a value obtained through a fallible native call.
///
/// Uses a single-flight pattern: concurrent first callers are serialized so
/// the resolver runs at most once per successful value. A failed resolution
/// leaves the cell empty and is not retried by the cell itself.
pub(crate) struct ResolveOnce<T> {
    /// Resolved value (read lock for the fast path).
    cached: RwLock<Option<Arc<T>>>,
    /// Serializes resolutions.
    resolve_lock: Mutex<()>,
}

impl<T> ResolveOnce<T> {
    pub(crate) fn new() -> Self {
        Self {
            cached: RwLock::new(None),
            resolve_lock: Mutex::new(()),
        }
    }

    /// The cached value, if resolved.
    pub(crate) fn get(&self) -> Option<Arc<T>> {
        self.cached.read().as_ref().map(Arc::clone)
    }

    pub(crate) fn is_resolved(&self) -> bool {
        self.cached.read().is_some()
    }

    /// Returns the cached value or runs `resolve` to produce it.
    pub(crate) fn get_or_try_resolve<E, F>(&self, resolve: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.get() {
            return Ok(value);
        }

        let _resolve_guard = self.resolve_lock.lock();

        // Another caller may have resolved while we waited.
        if let Some(value) = self.get() {
            return Ok(value);
        }

        let value = Arc::new(resolve()?);
        *self.cached.write() = Some(Arc::clone(&value));
        Ok(value)
    }
}
