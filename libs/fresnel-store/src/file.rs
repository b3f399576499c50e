use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::RwLock;

use serde_json::{Map, Value};

use fresnel_api::error::BackendError;
use fresnel_api::record::Record;
use fresnel_api::store::DocumentStore;

// ════════════════════════════════════════════════════════════════
//  FileStore
// ════════════════════════════════════════════════════════════════

/// Whole-database JSON file store.
///
/// On-disk layout is one object mapping collection name to an array of
/// records:
///
/// ```text
/// { "blogs": [ {"id":"1","title":"A"}, ... ], "authors": [ ... ] }
/// ```
///
/// The full state is held in memory; every mutation rewrites the file
/// through a temp-file-then-rename so a crash mid-write never leaves a
/// torn database behind.
pub struct FileStore {
    path: PathBuf,
    state: RwLock<BTreeMap<String, Vec<Record>>>,
}

impl FileStore {
    /// Open a store at `path`. A missing file starts empty; the file is
    /// created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let state = match std::fs::read_to_string(&path) {
            Ok(content) => parse_database(&content)
                .map_err(|e| e.with_context(format!("load {}", path.display())))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(BackendError::io(format!("read {}: {e}", path.display())));
            }
        };
        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, Vec<Record>>> {
        match self.state.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("store read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, Vec<Record>>> {
        match self.state.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("store write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Rewrite the database file from the given state.
    fn persist(&self, state: &BTreeMap<String, Vec<Record>>) -> Result<(), BackendError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)
                .map_err(|e| BackendError::io(format!("mkdir {}: {e}", parent.display())))?;
        }

        let mut obj = Map::new();
        for (name, records) in state {
            let arr = records.iter().map(Record::to_value).collect();
            obj.insert(name.clone(), Value::Array(arr));
        }
        let content = serde_json::to_string_pretty(&Value::Object(obj))?;

        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| BackendError::io(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| BackendError::io(format!("rename {}: {e}", self.path.display())))?;
        Ok(())
    }

    // ── Sync cores, wrapped by the boxed-future trait methods ──

    fn do_create(
        &self,
        collection: &str,
        fields: Map<String, Value>,
    ) -> Result<Record, BackendError> {
        let mut state = self.write_state();
        let records = state.entry(collection.to_string()).or_default();
        let record = Record::new(crate::next_id(records), fields);
        records.push(record.clone());
        self.persist(&state)?;
        Ok(record)
    }

    fn do_replace(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Result<Record, BackendError> {
        let mut state = self.write_state();
        let slot = state
            .get_mut(collection)
            .and_then(|records| records.iter_mut().find(|r| r.id == id))
            .ok_or_else(|| BackendError::not_found(format!("{collection}/{id}")))?;
        *slot = Record::new(id, fields);
        let record = slot.clone();
        self.persist(&state)?;
        Ok(record)
    }

    fn do_delete(&self, collection: &str, id: &str) -> Result<(), BackendError> {
        let mut state = self.write_state();
        let records = state
            .get_mut(collection)
            .ok_or_else(|| BackendError::not_found(format!("{collection}/{id}")))?;
        let pos = records
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| BackendError::not_found(format!("{collection}/{id}")))?;
        records.remove(pos);
        self.persist(&state)?;
        Ok(())
    }
}

/// Parse the on-disk database: an object of record arrays.
fn parse_database(content: &str) -> Result<BTreeMap<String, Vec<Record>>, BackendError> {
    let value: Value = serde_json::from_str(content)?;
    let Value::Object(obj) = value else {
        return Err(BackendError::format("database root must be a JSON object"));
    };

    let mut state = BTreeMap::new();
    for (name, entry) in obj {
        let records: Vec<Record> = serde_json::from_value(entry)
            .map_err(|e| BackendError::format(format!("collection '{name}': {e}")))?;
        state.insert(name, records);
    }
    Ok(state)
}

// ════════════════════════════════════════════════════════════════
//  DocumentStore impl
// ════════════════════════════════════════════════════════════════

impl DocumentStore for FileStore {
    fn collections(&self) -> Vec<String> {
        self.read_state().keys().cloned().collect()
    }

    fn list(
        &self,
        collection: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Record>, BackendError>> + Send + '_>> {
        let records = self.read_state().get(collection).cloned().unwrap_or_default();
        Box::pin(async move { Ok(records) })
    }

    fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Record, BackendError>> + Send + '_>> {
        let found = self
            .read_state()
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
        let collection = collection.to_string();
        Box::pin(async move { self.do_create(&collection, fields) })
    }

    fn replace(
        &self,
        collection: &str,
        id: &str,
        fields: Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<Record, BackendError>> + Send + '_>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move { self.do_replace(&collection, &id, fields) })
    }

    fn delete(
        &self,
        collection: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let collection = collection.to_string();
        let id = id.to_string();
        Box::pin(async move { self.do_delete(&collection, &id) })
    }

    fn flush(&self) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let result = self.persist(&self.read_state());
        Box::pin(async move { result })
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").field("path", &self.path).finish()
    }
}

// ════════════════════════════════════════════════════════════════
//  Tests
// ════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use fresnel_api::error::ErrorKind;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("db.json")).unwrap();

        let a = store.create("blogs", fields(json!({"title": "A"}))).await.unwrap();
        let b = store.create("blogs", fields(json!({"title": "B"}))).await.unwrap();
        assert_eq!(a.id, "1");
        assert_eq!(b.id, "2");

        let listed = store.list("blogs").await.unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn replace_swaps_the_full_field_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("db.json")).unwrap();

        store
            .create("blogs", fields(json!({"title": "A", "author": "x"})))
            .await
            .unwrap();
        let updated = store
            .replace("blogs", "1", fields(json!({"title": "B"})))
            .await
            .unwrap();

        assert_eq!(updated.id, "1");
        assert_eq!(updated.to_value(), json!({"id": "1", "title": "B"}));
        // the old "author" field is gone, not merged
        let read_back = store.get("blogs", "1").await.unwrap();
        assert!(!read_back.fields.contains_key("author"));
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path().join("db.json")).unwrap();

        let err = store.get("blogs", "1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = store.replace("blogs", "1", Map::new()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        let err = store.delete("blogs", "1").await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.create("blogs", fields(json!({"title": "A"}))).await.unwrap();
            store.create("authors", fields(json!({"name": "x"}))).await.unwrap();
            store.delete("authors", "1").await.unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.collections(), vec!["authors", "blogs"]);
        let blog = reopened.get("blogs", "1").await.unwrap();
        assert_eq!(blog.fields.get("title"), Some(&json!("A")));
        assert!(reopened.list("authors").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn id_counter_resumes_after_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");

        {
            let store = FileStore::open(&path).unwrap();
            store.create("blogs", fields(json!({"title": "A"}))).await.unwrap();
            store.create("blogs", fields(json!({"title": "B"}))).await.unwrap();
        }

        let reopened = FileStore::open(&path).unwrap();
        let c = reopened.create("blogs", fields(json!({"title": "C"}))).await.unwrap();
        assert_eq!(c.id, "3");
    }

    #[test]
    fn corrupt_database_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        std::fs::write(&path, "[1,2,3]").unwrap();
        let err = FileStore::open(&path).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Format);
    }

    #[tokio::test]
    async fn database_file_is_valid_json_after_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = FileStore::open(&path).unwrap();
        store.create("blogs", fields(json!({"title": "A"}))).await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let value: Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value, json!({"blogs": [{"id": "1", "title": "A"}]}));
    }
}
