//! Directory of the stores active in this process.
//!
//! The registry maps a stream identity to exactly one store. Registering a
//! second store under an occupied identity replaces the first in a single
//! upsert under the write lock, so no reader ever observes zero or two stores
//! for that identity mid-replacement.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, info, warn};

use crate::error::StoreError;
use crate::store::RoutableStore;

/// Process-local store directory keyed by stream identity.
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, Arc<dyn RoutableStore>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self {
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// The shared process-wide registry.
    pub fn global() -> Arc<StoreRegistry> {
        static GLOBAL: OnceLock<Arc<StoreRegistry>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(StoreRegistry::new())))
    }

    /// Install `store` under its identity, returning the store it evicted.
    ///
    /// A store with a blank identity cannot be routed to and is ignored.
    pub fn register(&self, store: Arc<dyn RoutableStore>) -> Option<Arc<dyn RoutableStore>> {
        let identity = store.stream().to_string();
        if identity.trim().is_empty() {
            warn!("ignoring store registration with blank identity");
            return None;
        }

        let previous = self
            .stores
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.clone(), store);

        if previous.is_some() {
            info!(stream = %identity, "store replaced");
        } else {
            info!(stream = %identity, "store registered");
        }
        previous
    }

    /// The store currently registered for `identity`.
    pub fn get(&self, identity: &str) -> Option<Arc<dyn RoutableStore>> {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read-only copy of the registered stores.
    ///
    /// The snapshot holds its own references; stores replaced afterwards
    /// remain usable through it until it is dropped.
    pub fn snapshot(&self) -> RegistrySnapshot {
        let mut stores: Vec<Arc<dyn RoutableStore>> = self
            .stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        stores.sort_by(|a, b| a.stream().cmp(b.stream()));
        RegistrySnapshot { stores }
    }

    /// Run every registered store's bulk loader.
    ///
    /// Failures are isolated per store and returned as `(identity, error)`.
    pub fn load_all(&self) -> Vec<(String, StoreError)> {
        let snapshot = self.snapshot();
        let mut failures = Vec::new();
        for store in snapshot.iter() {
            match store.bulk_load() {
                Ok(()) => debug!(stream = %store.stream(), "store loaded"),
                Err(e) => {
                    warn!(stream = %store.stream(), error = %e, "store load failed");
                    failures.push((store.stream().to_string(), e));
                }
            }
        }
        failures
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("streams", &self.snapshot().identities())
            .finish()
    }
}

/// Immutable view of a registry at one instant, ordered by identity.
#[derive(Clone, Default)]
pub struct RegistrySnapshot {
    stores: Vec<Arc<dyn RoutableStore>>,
}

impl RegistrySnapshot {
    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn RoutableStore>> {
        self.stores.iter()
    }

    pub fn identities(&self) -> Vec<&str> {
        self.stores.iter().map(|s| s.stream()).collect()
    }

    /// Stores subscribed to `stream`, in snapshot order.
    pub fn matching<'a>(
        &'a self,
        stream: &'a str,
    ) -> impl Iterator<Item = &'a Arc<dyn RoutableStore>> + 'a {
        self.stores.iter().filter(move |s| s.stream() == stream)
    }
}

impl FromIterator<Arc<dyn RoutableStore>> for RegistrySnapshot {
    /// Build a snapshot from an explicit store list, keeping its order.
    fn from_iter<I: IntoIterator<Item = Arc<dyn RoutableStore>>>(iter: I) -> Self {
        Self {
            stores: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreResult;
    use crate::memory::JsonDocumentStore;
    use crate::store::Applied;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use storesync_types::EventKind;

    struct Named {
        identity: String,
        loads: AtomicUsize,
        fail_load: bool,
    }

    impl Named {
        fn new(identity: &str) -> Arc<Self> {
            Arc::new(Self {
                identity: identity.into(),
                loads: AtomicUsize::new(0),
                fail_load: false,
            })
        }
    }

    impl RoutableStore for Named {
        fn stream(&self) -> &str {
            &self.identity
        }

        fn apply(&self, _kind: EventKind, _payload: &str) -> StoreResult<Applied> {
            Ok(Applied::PayloadAbsent)
        }

        fn bulk_load(&self) -> StoreResult<()> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail_load {
                Err(StoreError::Backend("unreachable".into()))
            } else {
                Ok(())
            }
        }
    }

    fn same(a: &Arc<dyn RoutableStore>, b: &Arc<Named>) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
    }

    #[test]
    fn empty_registry_snapshot() {
        let registry = StoreRegistry::new();
        let snap = registry.snapshot();
        assert!(snap.is_empty());
        assert!(registry.is_empty());
        assert!(registry.get("user").is_none());
    }

    #[test]
    fn register_distinct_streams() {
        let registry = StoreRegistry::new();
        assert!(registry.register(Named::new("user")).is_none());
        assert!(registry.register(Named::new("order")).is_none());
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.snapshot().identities(), vec!["order", "user"]);
    }

    #[test]
    fn replacement_wins() {
        let registry = StoreRegistry::new();
        let a = Named::new("user");
        let b = Named::new("user");
        registry.register(a.clone());
        let evicted = registry.register(b.clone()).unwrap();

        assert!(same(&evicted, &a));
        let snap = registry.snapshot();
        assert_eq!(snap.len(), 1);
        let current = snap.matching("user").next().unwrap();
        assert!(same(current, &b));
        assert!(!same(current, &a));
    }

    #[test]
    fn blank_identity_is_ignored() {
        let registry = StoreRegistry::new();
        assert!(registry.register(Named::new("")).is_none());
        assert!(registry.register(Named::new("   ")).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn snapshot_outlives_replacement() {
        let registry = StoreRegistry::new();
        let a = Named::new("user");
        registry.register(a.clone());
        let snap = registry.snapshot();
        registry.register(Named::new("user"));
        assert!(same(snap.matching("user").next().unwrap(), &a));
    }

    #[test]
    fn typed_stores_share_one_registry() {
        let registry = StoreRegistry::new();
        let users = Arc::new(JsonDocumentStore::keyed_by_field("user", "userId"));
        registry.register(users.clone());
        registry.register(Named::new("audit"));
        assert!(registry.contains("user"));
        assert!(registry.contains("audit"));
    }

    #[test]
    fn load_all_isolates_failures() {
        let registry = StoreRegistry::new();
        let ok = Named::new("ok");
        let broken = Arc::new(Named {
            identity: "broken".into(),
            loads: AtomicUsize::new(0),
            fail_load: true,
        });
        registry.register(broken.clone());
        registry.register(ok.clone());

        let failures = registry.load_all();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "broken");
        assert_eq!(ok.loads.load(Ordering::SeqCst), 1);
        assert_eq!(broken.loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_registration_keeps_one_per_identity() {
        let registry = Arc::new(StoreRegistry::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let registry = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    let stream = format!("stream-{}", (t + i) % 5);
                    registry.register(Named::new(&stream));
                    assert!(registry.contains(&stream));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.len(), 5);
        assert_eq!(registry.snapshot().len(), 5);
    }

    #[test]
    fn global_registry_is_shared() {
        let a = StoreRegistry::global();
        let b = StoreRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    proptest! {
        #[test]
        fn one_store_per_identity(sequence in proptest::collection::vec(0usize..6, 0..40)) {
            let registry = StoreRegistry::new();
            let mut last: HashMap<String, Arc<Named>> = HashMap::new();
            for id in sequence {
                let identity = format!("s{id}");
                let store = Named::new(&identity);
                registry.register(store.clone());
                last.insert(identity, store);
            }

            let snap = registry.snapshot();
            prop_assert_eq!(snap.len(), last.len());
            for (identity, expected) in &last {
                let found: Vec<_> = snap.matching(identity).collect();
                prop_assert_eq!(found.len(), 1);
                prop_assert!(same(found[0], expected));
            }
        }
    }
}
