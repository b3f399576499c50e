use std::collections::HashMap;

use fresnel_api::record::{Record, WriteOp};

use crate::config::MirrorConfig;
use crate::propagate::{MirrorJob, Propagator};

/// Which collections mirror into which logical index.
#[derive(Debug, Clone, Default)]
pub struct MirrorSet {
    map: HashMap<String, String>,
}

impl MirrorSet {
    pub fn from_config(mirrors: &[MirrorConfig]) -> Self {
        let map = mirrors
            .iter()
            .map(|m| {
                let index = m.index.clone().unwrap_or_else(|| m.collection.clone());
                (m.collection.clone(), index)
            })
            .collect();
        Self { map }
    }

    pub fn index_for(&self, collection: &str) -> Option<&str> {
        self.map.get(collection).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(c, i)| (c.as_str(), i.as_str()))
    }
}

/// Write interceptor.
///
/// Observes each finalized primary-store write response — after the
/// response is already on its way to the client — derives the confirmed
/// record (or identifier, for delete) and enqueues the matching index
/// operation. It never delays or alters the response, and never raises
/// an error back to the request path.
pub struct Interceptor {
    mirrors: MirrorSet,
    propagator: Propagator,
}

impl Interceptor {
    pub fn new(mirrors: MirrorSet, propagator: Propagator) -> Self {
        Self { mirrors, propagator }
    }

    pub fn is_mirrored(&self, collection: &str) -> bool {
        self.mirrors.index_for(collection).is_some()
    }

    /// Finalized create response. `body` is the serialized record as the
    /// primary store returned it, identifier included.
    pub fn observe_create(&self, collection: &str, body: &[u8]) {
        self.observe_write(collection, body, WriteOp::Create);
    }

    /// Finalized update response; same body contract as create.
    pub fn observe_update(&self, collection: &str, body: &[u8]) {
        self.observe_write(collection, body, WriteOp::Update);
    }

    /// Finalized delete. Only the path identifier exists — nothing to parse.
    pub fn observe_delete(&self, collection: &str, id: &str) {
        let Some(index) = self.mirrors.index_for(collection) else {
            return;
        };
        self.propagator.enqueue(MirrorJob {
            index: index.to_string(),
            collection: collection.to_string(),
            op: WriteOp::Delete { id: id.to_string() },
        });
    }

    fn observe_write(&self, collection: &str, body: &[u8], make: fn(Record) -> WriteOp) {
        let Some(index) = self.mirrors.index_for(collection) else {
            return;
        };
        let record = match Record::from_slice(body) {
            Ok(record) => record,
            Err(e) => {
                // The client already has its response; all we can do is log.
                tracing::warn!(
                    collection = %collection,
                    error = %e,
                    "write response is not a valid record, skipping index propagation"
                );
                return;
            }
        };
        self.propagator.enqueue(MirrorJob {
            index: index.to_string(),
            collection: collection.to_string(),
            op: make(record),
        });
    }
}
