use std::future::Future;
use std::pin::Pin;

use serde_json::{Map, Value};

use crate::error::BackendError;

/// Search index — the secondary, derived store kept in sync with the
/// primary store. Documents are addressed by logical index name and the
/// same identifier the primary store assigned.
///
/// All three operations are idempotent in intent: `index` overwrites,
/// `update` replaces the document's fields with the given full field set,
/// and `delete` of an absent document succeeds as a no-op.
pub trait SearchIndex: Send + Sync {
    /// Insert or overwrite the document at `id` with the full field set.
    fn index(
        &self,
        index: &str,
        id: &str,
        doc: &Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>;

    /// Replace the document's fields at `id` with the given field set.
    fn update(
        &self,
        index: &str,
        id: &str,
        doc: &Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>;

    /// Remove the document at `id`. Absence is success, not an error.
    fn delete(
        &self,
        index: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>>;
}
