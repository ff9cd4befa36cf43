use serde::de::DeserializeOwned;

use storesync_types::{EventKind, JsonCodec};

use crate::error::{StoreError, StoreResult};

/// A process-local mirror of one upstream stream.
///
/// Implementations own their materialized state and decide what `create`
/// versus `update` means (whether `create` must reject an existing key, for
/// instance). The dispatch path only routes: it decodes a payload into
/// [`SyncStore::Value`], derives the key with [`SyncStore::key_of`] and calls
/// the hook matching the event kind.
///
/// Construction has no side effects. A store becomes reachable by dispatch
/// only once it is passed to [`StoreRegistry::register`].
///
/// Any locking needed to keep direct readers (via [`SyncStore::get`])
/// consistent with dispatched writes is the implementation's responsibility.
///
/// [`StoreRegistry::register`]: crate::registry::StoreRegistry::register
pub trait SyncStore: Send + Sync + 'static {
    /// Key of the materialized collection.
    type Key;
    /// Shape payloads are decoded into.
    type Value: DeserializeOwned;

    /// The stream this store subscribes to. Must be stable for the lifetime
    /// of the instance.
    fn identity(&self) -> &str;

    /// Derive the key for a decoded value.
    fn key_of(&self, value: &Self::Value) -> StoreResult<Self::Key>;

    fn create(&self, key: Self::Key, value: Self::Value) -> StoreResult<()>;

    fn update(&self, key: Self::Key, value: Self::Value) -> StoreResult<()>;

    fn delete(&self, key: &Self::Key) -> StoreResult<()>;

    /// Read accessor for callers holding the store directly.
    fn get(&self, key: &Self::Key) -> StoreResult<Option<Self::Value>>;

    /// Bulk-populate from an external source. Never called by the registry
    /// on its own; owners invoke it (or [`StoreRegistry::load_all`]).
    ///
    /// [`StoreRegistry::load_all`]: crate::registry::StoreRegistry::load_all
    fn load(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// What a store did with a routed envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    Created,
    Updated,
    Deleted,
    /// The payload decoded to nothing (e.g. JSON `null`); no hook ran.
    PayloadAbsent,
}

/// Type-erased view of a [`SyncStore`] used by the registry and dispatcher.
///
/// Every `SyncStore` implements this through a blanket impl, so stores of
/// different key and value types can share one registry.
pub trait RoutableStore: Send + Sync {
    /// The stream this store subscribes to.
    fn stream(&self) -> &str;

    /// Decode `payload` into the store's value shape and apply `kind`.
    fn apply(&self, kind: EventKind, payload: &str) -> StoreResult<Applied>;

    /// Run the store's bulk loader.
    fn bulk_load(&self) -> StoreResult<()>;
}

impl<S: SyncStore> RoutableStore for S {
    fn stream(&self) -> &str {
        SyncStore::identity(self)
    }

    fn apply(&self, kind: EventKind, payload: &str) -> StoreResult<Applied> {
        let decoded = JsonCodec::decode::<S::Value>(payload)
            .map_err(|e| StoreError::Decode(e.to_string()))?;
        let Some(value) = decoded else {
            return Ok(Applied::PayloadAbsent);
        };

        let key = self.key_of(&value)?;
        match kind {
            EventKind::Create => {
                self.create(key, value)?;
                Ok(Applied::Created)
            }
            EventKind::Update => {
                self.update(key, value)?;
                Ok(Applied::Updated)
            }
            EventKind::Delete => {
                self.delete(&key)?;
                Ok(Applied::Deleted)
            }
        }
    }

    fn bulk_load(&self) -> StoreResult<()> {
        SyncStore::load(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every hook invocation instead of storing anything.
    #[derive(Default)]
    struct Journal {
        calls: Mutex<Vec<(EventKind, u32)>>,
    }

    impl SyncStore for Journal {
        type Key = u32;
        type Value = serde_json::Value;

        fn identity(&self) -> &str {
            "journal"
        }

        fn key_of(&self, value: &Self::Value) -> StoreResult<u32> {
            value["id"]
                .as_u64()
                .map(|id| id as u32)
                .ok_or_else(|| StoreError::MissingKey { field: "id".into() })
        }

        fn create(&self, key: u32, _value: Self::Value) -> StoreResult<()> {
            self.calls.lock().unwrap().push((EventKind::Create, key));
            Ok(())
        }

        fn update(&self, key: u32, _value: Self::Value) -> StoreResult<()> {
            self.calls.lock().unwrap().push((EventKind::Update, key));
            Ok(())
        }

        fn delete(&self, key: &u32) -> StoreResult<()> {
            self.calls.lock().unwrap().push((EventKind::Delete, *key));
            Ok(())
        }

        fn get(&self, _key: &u32) -> StoreResult<Option<Self::Value>> {
            Ok(None)
        }
    }

    #[test]
    fn apply_routes_each_kind_to_its_hook() {
        let store = Journal::default();
        assert_eq!(store.apply(EventKind::Create, r#"{"id":1}"#).unwrap(), Applied::Created);
        assert_eq!(store.apply(EventKind::Update, r#"{"id":2}"#).unwrap(), Applied::Updated);
        assert_eq!(store.apply(EventKind::Delete, r#"{"id":3}"#).unwrap(), Applied::Deleted);

        let calls = store.calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec![
                (EventKind::Create, 1),
                (EventKind::Update, 2),
                (EventKind::Delete, 3)
            ]
        );
    }

    #[test]
    fn null_payload_runs_no_hook() {
        let store = Journal::default();
        assert_eq!(store.apply(EventKind::Create, "null").unwrap(), Applied::PayloadAbsent);
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn shape_mismatch_is_a_decode_error() {
        #[derive(serde::Deserialize)]
        #[allow(dead_code)]
        struct Strict {
            id: u32,
        }

        struct StrictStore;

        impl SyncStore for StrictStore {
            type Key = u32;
            type Value = Strict;
            fn identity(&self) -> &str {
                "strict"
            }
            fn key_of(&self, value: &Strict) -> StoreResult<u32> {
                Ok(value.id)
            }
            fn create(&self, _: u32, _: Strict) -> StoreResult<()> {
                Ok(())
            }
            fn update(&self, _: u32, _: Strict) -> StoreResult<()> {
                Ok(())
            }
            fn delete(&self, _: &u32) -> StoreResult<()> {
                Ok(())
            }
            fn get(&self, _: &u32) -> StoreResult<Option<Strict>> {
                Ok(None)
            }
        }

        let err = StrictStore.apply(EventKind::Create, r#"{"id":"x"}"#).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn missing_key_propagates() {
        let store = Journal::default();
        let err = store.apply(EventKind::Update, r#"{"name":"no id"}"#).unwrap_err();
        assert!(matches!(err, StoreError::MissingKey { .. }));
        assert!(store.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn default_load_is_a_no_op() {
        assert!(Journal::default().bulk_load().is_ok());
        assert_eq!(Journal::default().stream(), "journal");
    }
}
