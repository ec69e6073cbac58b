//! Atomic publication of catalog snapshots

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use super::builder::{build_catalog, BuilderConfig};
use crate::domain::{BuildError, Catalog};
use crate::query::ModuleQuery;

/// Shared reference to the current catalog
///
/// Readers take a [`snapshot`](Self::snapshot) and resolve against it for as
/// long as they like. A rebuild constructs the replacement off to the side and
/// swaps it in with a single pointer store, so readers only ever see a
/// complete catalog. A failed rebuild leaves the current catalog in place.
#[derive(Debug, Clone)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<Catalog>>>,
}

impl CatalogHandle {
    #[must_use]
    pub fn new(catalog: Catalog) -> Self {
        Self { current: Arc::new(RwLock::new(Arc::new(catalog))) }
    }

    /// The most recently published catalog
    #[must_use]
    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Replace the current catalog, returning the previous one
    pub fn publish(&self, catalog: Catalog) -> Arc<Catalog> {
        self.swap_in(Arc::new(catalog))
    }

    fn swap_in(&self, next: Arc<Catalog>) -> Arc<Catalog> {
        let mut slot = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, next)
    }

    /// Build a fresh catalog and publish it if the build succeeds
    ///
    /// # Errors
    /// Returns the build error; the current catalog is left untouched
    pub fn rebuild(
        &self,
        query: &dyn ModuleQuery,
        config: &BuilderConfig,
    ) -> Result<Arc<Catalog>, BuildError> {
        let built = Arc::new(build_catalog(query, config)?);
        self.swap_in(Arc::clone(&built));
        Ok(built)
    }
}

/// Coalesces reload requests so none is lost while a rebuild runs
///
/// A request made while a rebuild is in flight is remembered and triggers
/// exactly one more rebuild once the current one finishes, however many
/// requests arrived in the meantime.
#[derive(Debug, Clone, Default)]
pub struct ReloadGate {
    pending: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
}

impl ReloadGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reload request
    ///
    /// Returns `true` when the caller must start [`drain`](Self::drain).
    /// Returns `false` when a running drain will pick the request up.
    pub fn request(&self) -> bool {
        self.pending.store(true, Ordering::SeqCst);
        !self.running.swap(true, Ordering::SeqCst)
    }

    /// Run `rebuild` until no request is pending, returning how many ran
    ///
    /// Must only be called after [`request`](Self::request) returned `true`.
    pub fn drain<F: FnMut()>(&self, mut rebuild: F) -> usize {
        let mut runs = 0;
        loop {
            while self.pending.swap(false, Ordering::SeqCst) {
                rebuild();
                runs += 1;
            }
            self.running.store(false, Ordering::SeqCst);

            // A request may have landed between the last swap and the store
            if !self.pending.load(Ordering::SeqCst) || self.running.swap(true, Ordering::SeqCst) {
                return runs;
            }
        }
    }

    /// Whether a drain is currently running
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}
