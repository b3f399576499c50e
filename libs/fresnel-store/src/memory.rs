use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::RwLock;

use serde_json::{Map, Value};

use fresnel_api::error::BackendError;
use fresnel_api::record::Record;
use fresnel_api::store::DocumentStore;

/// In-memory store with `FileStore` semantics and no persistence.
/// For tests and throwaway setups.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<BTreeMap<String, Vec<Record>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<Record>>> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<Record>>> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DocumentStore for MemoryStore {
    fn collections(&self) -> Vec<String> {
        self.lock_read().keys().cloned().collect()
    }

    fn list(
        &self,
        collection: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, BackendError>> + Send + '_>> {
        let records = self.lock_read().get(collection).cloned().unwrap_or_default();
        Box::pin(async move { Ok(records) })
    }

    fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Record, BackendError>> + Send + '_>> {
        let found = self
            .lock_read()
            .get(collection)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned())
            .ok_or_else(|| BackendError::not_found(format!("{collection}/{id}")));
        Box::pin(async move { found })
    }

    fn create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Record, BackendError>> + Send + '_>> {
        let mut state = self.lock_write();
        let records = state.entry(collection.to_string()).or_default();
        let record = Record::new(crate::next_id(records), fields);
        records.push(record.clone());
        Box::pin(async move { Ok(record) })
    }

    fn replace(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Record, BackendError>> + Send + '_>> {
        let mut state = self.lock_write();
        let result = state
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .map(|slot| {
                *slot = Record::new(id, fields);
                slot.clone()
            })
            .ok_or_else(|| BackendError::not_found(format!("{collection}/{id}")));
        Box::pin(async move { result })
    }

    fn delete(
        &self,
        collection: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let mut state = self.lock_write();
        let result = state
            .get_mut(collection)
            .and_then(|records| {
                records.iter().position(|r| r.id == id).map(|pos| {
                    records.remove(pos);
                })
            })
            .ok_or_else(|| BackendError::not_found(format!("{collection}/{id}")));
        Box::pin(async move { result })
    }

    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        Box::pin(async { Ok(()) })
    }
}
