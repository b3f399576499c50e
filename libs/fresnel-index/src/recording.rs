use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use serde_json::{Map, Value};

use fresnel_api::error::BackendError;
use fresnel_api::index::SearchIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordedKind {
    Index,
    Update,
    Delete,
}

/// One successfully applied index operation.
#[derive(Debug, Clone)]
pub struct RecordedOp {
    pub kind: RecordedKind,
    pub index: String,
    pub id: String,
    /// Full field set for Index/Update, None for Delete.
    pub doc: Option<Map<String, Value>>,
}

/// SearchIndex test double: records every applied operation in order and
/// can be told to fail the next N calls (injected network failure).
#[derive(Debug, Default)]
pub struct RecordingIndex {
    ops: Mutex<Vec<RecordedOp>>,
    fail_remaining: AtomicU32,
}

impl RecordingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `n` operations with an Io error, then recover.
    pub fn fail_times(&self, n: u32) {
        self.fail_remaining.store(n, Ordering::SeqCst);
    }

    /// Fail every operation from now on.
    pub fn fail_always(&self) {
        self.fail_remaining.store(u32::MAX, Ordering::SeqCst);
    }

    /// Snapshot of all applied operations, in application order.
    pub fn ops(&self) -> Vec<RecordedOp> {
        self.ops.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn apply(&self, op: RecordedOp) -> Result<(), BackendError> {
        let remaining = self.fail_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            if remaining != u32::MAX {
                self.fail_remaining.fetch_sub(1, Ordering::SeqCst);
            }
            return Err(BackendError::io("injected index failure"));
        }
        self.ops.lock().unwrap_or_else(|p| p.into_inner()).push(op);
        Ok(())
    }
}

impl SearchIndex for RecordingIndex {
    fn index(
        &self,
        index: &str,
        id: &str,
        doc: &Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let result = self.apply(RecordedOp {
            kind: RecordedKind::Index,
            index: index.to_string(),
            id: id.to_string(),
            doc: Some(doc.clone()),
        });
        Box::pin(async move { result })
    }

    fn update(
        &self,
        index: &str,
        id: &str,
        doc: &Map<String, Value>,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        let result = self.apply(RecordedOp {
            kind: RecordedKind::Update,
            index: index.to_string(),
            id: id.to_string(),
            doc: Some(doc.clone()),
        });
        Box::pin(async move { result })
    }

    fn delete(
        &self,
        index: &str,
        id: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), BackendError>> + Send + '_>> {
        // Absence is success: deleting a never-indexed id records a no-op
        // delete just like a real one, so double-delete stays idempotent.
        let result = self.apply(RecordedOp {
            kind: RecordedKind::Delete,
            index: index.to_string(),
            id: id.to_string(),
            doc: None,
        });
        Box::pin(async move { result })
    }
}
