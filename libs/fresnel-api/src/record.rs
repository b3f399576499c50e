use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::BackendError;

/// A stored record: unique identifier plus arbitrary JSON fields.
///
/// The identifier is assigned by the primary store on create and never
/// changes afterwards. On the wire a record is a flat JSON object with
/// `id` inlined among the fields: `{"id":"1","title":"A"}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    /// All fields except `id`.
    pub fields: Map<String, Value>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Map<String, Value>) -> Self {
        let mut fields = fields;
        // The id lives in its own slot, never duplicated inside fields.
        fields.remove("id");
        Self { id: id.into(), fields }
    }

    /// Full field map with `id` inlined — the document form written to
    /// the wire and to the search index.
    pub fn to_doc(&self) -> Map<String, Value> {
        let mut obj = Map::with_capacity(self.fields.len() + 1);
        obj.insert("id".to_string(), Value::String(self.id.clone()));
        for (k, v) in &self.fields {
            obj.insert(k.clone(), v.clone());
        }
        obj
    }

    /// Full JSON object form with `id` inlined.
    pub fn to_value(&self) -> Value {
        Value::Object(self.to_doc())
    }

    /// Parse a serialized record (e.g. a finalized write response body).
    ///
    /// Requires an `id` field; anything else is a format error.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, BackendError> {
        serde_json::from_slice(bytes).map_err(BackendError::from)
    }
}

impl Serialize for Record {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.fields.len() + 1))?;
        map.serialize_entry("id", &self.id)?;
        for (k, v) in &self.fields {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Object(mut obj) = value else {
            return Err(serde::de::Error::custom("record must be a JSON object"));
        };
        // Accept string or integer ids; the store always writes strings,
        // but hand-edited data files may carry numbers.
        let id = match obj.remove("id") {
            Some(Value::String(s)) => s,
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => {
                return Err(serde::de::Error::custom(format!(
                    "record id must be a string or number, got {other}"
                )));
            }
            None => return Err(serde::de::Error::custom("record has no id field")),
        };
        Ok(Record { id, fields: obj })
    }
}

/// A finalized write against the primary store, tagged with the record
/// identifier it applies to. The payload for Create/Update is the
/// confirmed record as the primary store returned it.
#[derive(Debug, Clone)]
pub enum WriteOp {
    Create(Record),
    Update(Record),
    Delete { id: String },
}

impl WriteOp {
    pub fn id(&self) -> &str {
        match self {
            WriteOp::Create(r) | WriteOp::Update(r) => &r.id,
            WriteOp::Delete { id } => id,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            WriteOp::Create(_) => "create",
            WriteOp::Update(_) => "update",
            WriteOp::Delete { .. } => "delete",
        }
    }
}
