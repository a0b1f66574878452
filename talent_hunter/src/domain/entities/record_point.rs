use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};
use std::collections::BTreeMap;

pub type Embeddings = Vec<f32>;

/// A record ready to be persisted in a vector collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPoint {
    pub id: u64,
    pub vector: Embeddings,
    pub payload: RecordPointPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPointPayload {
    /// Identity fields, displayed without decoding `content`
    pub metadata: BTreeMap<String, String>,
    /// The full record, string-encoded
    pub content: String,
}

impl From<RecordPointPayload> for JsonValue {
    fn from(payload: RecordPointPayload) -> Self {
        json!({
            "metadata": payload.metadata,
            "content": payload.content,
        })
    }
}

/// A point returned by a similarity search, closest first.
///
/// The payload is passed through as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMatch {
    pub id: u64,
    pub score: f32,
    pub payload: JsonValue,
}

impl RecordMatch {
    pub fn metadata(&self, key: &str) -> Option<&str> {
        self.payload.get("metadata")?.get(key)?.as_str()
    }

    pub fn content(&self) -> Option<&str> {
        self.payload.get("content")?.as_str()
    }
}
