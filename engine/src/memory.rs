//! In-memory document store.
//!
//! A schemaless, non-transactional backend: every write inside a unit of work
//! is applied immediately and cannot be rolled back. Timestamps are stored as
//! integer milliseconds since epoch. Reads always hand out clones.

use crate::{
    adapter::{Capabilities, DocumentStream, PersistenceAdapter, UnitOfWork},
    error::Result,
    schema::UPDATED_AT,
    timestamps::TimestampEncoding,
    CollectionName, Document, DocumentId, Error, Filter, Schema,
};
use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Documents of one collection, kept in insertion order.
#[derive(Debug, Default)]
struct Collection {
    documents: BTreeMap<u64, Document>,
    positions: HashMap<DocumentId, u64>,
    unique_fields: Vec<String>,
}

impl Collection {
    fn get(&self, id: &str) -> Option<&Document> {
        self.positions.get(id).and_then(|seq| self.documents.get(seq))
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Document> {
        let seq = *self.positions.get(id)?;
        self.documents.get_mut(&seq)
    }

    fn select(&self, filter: &Filter) -> Vec<Document> {
        let matched = self
            .documents
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        filter.arrange(matched)
    }

    /// Reject values that would duplicate a unique field held by another document.
    fn check_unique(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        for name in &self.unique_fields {
            let Some(value) = fields.get(name).filter(|v| !v.is_null()) else {
                continue;
            };
            let taken = self
                .documents
                .values()
                .any(|d| Some(d.id.as_str()) != id && d.get(name) == Some(value));
            if taken {
                return Err(Error::conflict(
                    collection,
                    format!("duplicate value for unique field '{name}'"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Inner {
    collections: DashMap<CollectionName, Collection>,
    next_seq: AtomicU64,
}

impl Inner {
    fn insert(&self, collection: &str, fields: Map<String, Value>) -> Result<Document> {
        let mut entry = self.collections.entry(collection.to_string()).or_default();
        entry.check_unique(collection, None, &fields)?;

        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let document = Document::new(uuid::Uuid::new_v4().to_string(), fields);
        entry.positions.insert(document.id.clone(), seq);
        entry.documents.insert(seq, document.clone());
        Ok(document)
    }

    fn get(&self, collection: &str, id: &str) -> Result<Document> {
        self.collections
            .get(collection)
            .and_then(|c| c.get(id).cloned())
            .ok_or_else(|| Error::not_found(collection, id))
    }

    fn select(&self, collection: &str, filter: &Filter) -> Vec<Document> {
        self.collections
            .get(collection)
            .map(|c| c.select(filter))
            .unwrap_or_default()
    }

    fn update(&self, collection: &str, id: &str, patch: &Map<String, Value>) -> Result<Document> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::not_found(collection, id))?;
        if entry.get(id).is_none() {
            return Err(Error::not_found(collection, id));
        }
        entry.check_unique(collection, Some(id), patch)?;

        let document = entry
            .get_mut(id)
            .ok_or_else(|| Error::not_found(collection, id))?;
        document.merge(patch);
        Ok(document.clone())
    }

    fn update_many(&self, collection: &str, filter: &Filter, patch: &Map<String, Value>) -> Result<u64> {
        let Some(mut entry) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let ids: Vec<DocumentId> = entry
            .documents
            .values()
            .filter(|d| filter.matches(d))
            .map(|d| d.id.clone())
            .collect();

        for id in &ids {
            entry.check_unique(collection, Some(id), patch)?;
        }
        for id in &ids {
            if let Some(document) = entry.get_mut(id) {
                let previous = document.updated_at().cloned();
                document.merge(patch);
                keep_latest_updated_at(document, previous);
            }
        }
        Ok(ids.len() as u64)
    }

    fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let mut entry = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| Error::not_found(collection, id))?;
        let seq = entry
            .positions
            .remove(id)
            .ok_or_else(|| Error::not_found(collection, id))?;
        entry.documents.remove(&seq);
        Ok(())
    }
}

/// Restore `previous` when the merged `updatedAt` would move backwards.
fn keep_latest_updated_at(document: &mut Document, previous: Option<Value>) {
    let Some(previous) = previous else { return };
    let Some(before) = TimestampEncoding::decode(&previous) else { return };
    let moved_back = document
        .updated_at()
        .and_then(TimestampEncoding::decode)
        .is_some_and(|after| after < before);
    if moved_back {
        document.fields.insert(UPDATED_AT.to_string(), previous);
    }
}

/// Non-transactional in-memory backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.inner
            .collections
            .get(collection)
            .map(|c| c.documents.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, collection: &str) -> bool {
        self.len(collection) == 0
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactional: false,
            timestamps: TimestampEncoding::EpochMillis,
        }
    }

    async fn prepare(&self, schema: &Schema) -> Result<()> {
        let mut entry = self
            .inner
            .collections
            .entry(schema.collection().to_string())
            .or_default();
        entry.unique_fields = schema.unique_fields().map(|f| f.name.clone()).collect();
        Ok(())
    }

    async fn begin(&self, collection: &str) -> Result<Box<dyn UnitOfWork>> {
        Ok(Box::new(MemoryWork {
            inner: self.inner.clone(),
            collection: collection.to_string(),
            writes: 0,
        }))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Document> {
        self.inner.get(collection, id)
    }

    fn find_many(&self, collection: &str, filter: Filter) -> DocumentStream {
        let inner = self.inner.clone();
        let collection = collection.to_string();
        stream::once(async move { inner.select(&collection, &filter) })
            .flat_map(|documents| stream::iter(documents.into_iter().map(Ok)))
            .boxed()
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.inner.delete(collection, id)
    }
}

/// Unit of work whose writes are applied as they happen.
struct MemoryWork {
    inner: Arc<Inner>,
    collection: String,
    writes: u64,
}

#[async_trait]
impl UnitOfWork for MemoryWork {
    fn is_atomic(&self) -> bool {
        false
    }

    async fn insert(&mut self, fields: Map<String, Value>) -> Result<Document> {
        let document = self.inner.insert(&self.collection, fields)?;
        self.writes += 1;
        Ok(document)
    }

    async fn find_by_id(&mut self, id: &str) -> Result<Document> {
        self.inner.get(&self.collection, id)
    }

    async fn find_many(&mut self, filter: &Filter) -> Result<Vec<Document>> {
        Ok(self.inner.select(&self.collection, filter))
    }

    async fn update(&mut self, id: &str, patch: Map<String, Value>) -> Result<Document> {
        let document = self.inner.update(&self.collection, id, &patch)?;
        self.writes += 1;
        Ok(document)
    }

    async fn update_many(&mut self, filter: &Filter, patch: Map<String, Value>) -> Result<u64> {
        let count = self.inner.update_many(&self.collection, filter, &patch)?;
        self.writes += count;
        Ok(count)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        if self.writes > 0 {
            tracing::warn!(
                collection = %self.collection,
                writes = self.writes,
                "memory store cannot roll back applied writes"
            );
        }
        Ok(())
    }
}
