//! In-memory store for tests, local mirrors, and ephemeral use.
//!
//! [`InMemoryStore`] keeps its materialized state in a `HashMap` behind a
//! `RwLock` and implements the full [`SyncStore`] contract. `create` and
//! `update` both upsert; `delete` of an absent key succeeds.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};
use crate::store::SyncStore;

type KeyFn<K, V> = Box<dyn Fn(&V) -> StoreResult<K> + Send + Sync>;
type LoaderFn<V> = Box<dyn Fn() -> StoreResult<Vec<V>> + Send + Sync>;

/// A `HashMap`-backed [`SyncStore`].
pub struct InMemoryStore<K, V> {
    identity: String,
    key_fn: KeyFn<K, V>,
    loader: Option<LoaderFn<V>>,
    entries: RwLock<HashMap<K, V>>,
}

/// Schemaless mirror keyed by a top-level JSON field.
pub type JsonDocumentStore = InMemoryStore<String, Value>;

impl<K, V> InMemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + DeserializeOwned + Send + Sync + 'static,
{
    /// Create an empty store for `identity` with an infallible key function.
    pub fn new(
        identity: impl Into<String>,
        key_fn: impl Fn(&V) -> K + Send + Sync + 'static,
    ) -> Self {
        Self::with_key_fn(identity, move |value| Ok(key_fn(value)))
    }

    /// Create an empty store whose key function may reject a value.
    pub fn with_key_fn(
        identity: impl Into<String>,
        key_fn: impl Fn(&V) -> StoreResult<K> + Send + Sync + 'static,
    ) -> Self {
        Self {
            identity: identity.into(),
            key_fn: Box::new(key_fn),
            loader: None,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Attach a bulk loader run by [`SyncStore::load`].
    pub fn with_loader(
        mut self,
        loader: impl Fn() -> StoreResult<Vec<V>> + Send + Sync + 'static,
    ) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, key: &K) -> bool {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    /// Copy of every entry, in no particular order.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    fn upsert(&self, key: K, value: V) -> StoreResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        entries.insert(key, value);
        Ok(())
    }
}

impl InMemoryStore<String, Value> {
    /// A document store keyed by the top-level field `field`.
    ///
    /// String keys are used as-is and numeric keys are rendered as decimal
    /// text. Documents without the field are rejected.
    pub fn keyed_by_field(identity: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        Self::with_key_fn(identity, move |doc: &Value| match doc.get(&field) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            _ => Err(StoreError::MissingKey {
                field: field.clone(),
            }),
        })
    }
}

impl<K, V> SyncStore for InMemoryStore<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + DeserializeOwned + Send + Sync + 'static,
{
    type Key = K;
    type Value = V;

    fn identity(&self) -> &str {
        &self.identity
    }

    fn key_of(&self, value: &V) -> StoreResult<K> {
        (self.key_fn)(value)
    }

    fn create(&self, key: K, value: V) -> StoreResult<()> {
        self.upsert(key, value)
    }

    fn update(&self, key: K, value: V) -> StoreResult<()> {
        self.upsert(key, value)
    }

    fn delete(&self, key: &K) -> StoreResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }

    fn get(&self, key: &K) -> StoreResult<Option<V>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn load(&self) -> StoreResult<()> {
        let Some(loader) = &self.loader else {
            return Ok(());
        };
        let values = loader()?;
        let keyed = values
            .into_iter()
            .map(|v| -> StoreResult<(K, V)> {
                let key = (self.key_fn)(&v)?;
                Ok((key, v))
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Lock(e.to_string()))?;
        entries.extend(keyed);
        Ok(())
    }
}
