//! The persistence adapter contract.
//!
//! Models talk to storage only through [`PersistenceAdapter`]. Each backend
//! implements it once; schemas, validation and invariants stay in the shared
//! core. Writes that must be grouped (a hook's sibling updates plus the
//! triggering write) go through a [`UnitOfWork`] opened with
//! [`PersistenceAdapter::begin`].

use crate::{error::Result, timestamps::TimestampEncoding, Document, Filter, Schema};
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde_json::{Map, Value};
use std::fmt;

/// A lazy, finite, single-pass sequence of documents.
pub type DocumentStream = BoxStream<'static, Result<Document>>;

/// What a backend can guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether a unit of work commits or rolls back as a whole
    pub transactional: bool,
    /// How timestamps are represented in stored documents
    pub timestamps: TimestampEncoding,
}

/// A group of operations against one collection.
///
/// On a transactional backend nothing is visible to others until
/// [`commit`](UnitOfWork::commit), and dropping the unit of work without
/// committing rolls it back. On a non-transactional backend every write lands
/// immediately and `rollback` cannot undo anything.
#[async_trait]
pub trait UnitOfWork: Send {
    fn is_atomic(&self) -> bool;

    /// Insert new fields and return the stored document with its identifier.
    async fn insert(&mut self, fields: Map<String, Value>) -> Result<Document>;

    async fn find_by_id(&mut self, id: &str) -> Result<Document>;

    async fn find_many(&mut self, filter: &Filter) -> Result<Vec<Document>>;

    /// Shallow-merge `patch` into one document.
    async fn update(&mut self, id: &str, patch: Map<String, Value>) -> Result<Document>;

    /// Shallow-merge `patch` into every matching document. Returns the count.
    async fn update_many(&mut self, filter: &Filter, patch: Map<String, Value>) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Backend-specific translation of document operations.
///
/// Failures use [`Error::NotFound`](crate::Error::NotFound) for missing
/// identifiers, [`Error::Conflict`](crate::Error::Conflict) for backend
/// uniqueness violations and
/// [`Error::BackendUnavailable`](crate::Error::BackendUnavailable) for
/// transport failures. Adapters never retry.
#[async_trait]
pub trait PersistenceAdapter: Send + Sync + fmt::Debug {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    fn capabilities(&self) -> Capabilities;

    /// Set up backend structures a schema needs (e.g. unique indexes).
    async fn prepare(&self, schema: &Schema) -> Result<()>;

    /// Open a unit of work on one collection.
    async fn begin(&self, collection: &str) -> Result<Box<dyn UnitOfWork>>;

    async fn create(&self, collection: &str, fields: Map<String, Value>) -> Result<Document> {
        let mut work = self.begin(collection).await?;
        let document = work.insert(fields).await?;
        work.commit().await?;
        Ok(document)
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Document>;

    /// Matching documents in insertion order unless the filter sorts.
    fn find_many(&self, collection: &str, filter: Filter) -> DocumentStream;

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Map<String, Value>,
    ) -> Result<Document> {
        let mut work = self.begin(collection).await?;
        let document = work.update(id, patch).await?;
        work.commit().await?;
        Ok(document)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()>;
}
