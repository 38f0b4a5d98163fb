//! Document types returned by models.

use crate::{
    schema::{CREATED_AT, UPDATED_AT},
    DocumentId,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A stored document: its fields plus the backend-assigned identifier.
///
/// Documents are plain values. Every read produces a fresh copy, so mutating a
/// returned document never affects the store or other callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Identifier assigned by the persistence adapter
    pub id: DocumentId,
    /// Field values, including `createdAt`/`updatedAt`
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Create a document from an identifier and its fields.
    pub fn new(id: impl Into<DocumentId>, fields: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Get a field value.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn created_at(&self) -> Option<&Value> {
        self.fields.get(CREATED_AT)
    }

    pub fn updated_at(&self) -> Option<&Value> {
        self.fields.get(UPDATED_AT)
    }

    /// Shallow-merge a patch into this document's fields.
    pub fn merge(&mut self, patch: &Map<String, Value>) {
        for (key, value) in patch {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// Flatten into a JSON object with `id` first.
    pub fn into_value(self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert("id".to_string(), Value::String(self.id));
        object.extend(self.fields);
        Value::Object(object)
    }
}
