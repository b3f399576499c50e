use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::error::BackendError;
use crate::record::Record;

/// Primary store — the system of record for CRUD data.
///
/// The engine doesn't enumerate or know concrete implementations.
/// Identifiers are assigned by the store on `create` and are immutable;
/// `replace` keeps the identifier and swaps the full field set.
pub trait DocumentStore: Send + Sync {
    /// Names of all collections currently present in the store.
    fn collections(&self) -> Vec<String>;

    /// All records of a collection. An unknown collection is empty, not an error.
    fn list(
        &self,
        collection: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, BackendError>> + Send + '_>>;

    /// A single record by id. `ErrorKind::NotFound` if absent.
    fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Record, BackendError>> + Send + '_>>;

    /// Insert a new record. The store assigns the identifier and returns
    /// the authoritative record. Any `id` in `fields` is ignored.
    fn create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Record, BackendError>> + Send + '_>>;

    /// Replace the full field set of an existing record, keeping its id.
    /// `ErrorKind::NotFound` if absent.
    fn replace(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Record, BackendError>> + Send + '_>>;

    /// Remove a record. `ErrorKind::NotFound` if absent.
    fn delete(
        &self,
        collection: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>;

    /// Persist buffered state (no-op for ephemeral stores).
    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>;
}
