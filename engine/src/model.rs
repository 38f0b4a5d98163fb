//! Models: the public face of the mapping layer.
//!
//! A [`Model`] binds one compiled [`Schema`] to one [`PersistenceAdapter`] and
//! its invariant hooks. `create` runs validation, default resolution,
//! timestamping and the before-create hooks, then writes through the adapter,
//! all inside one unit of work.

use crate::{
    adapter::{DocumentStream, PersistenceAdapter, UnitOfWork},
    error::{Result, SchemaDefinitionError},
    field::FieldDef,
    hooks::{Candidate, HookPipeline, InvariantHook, InvariantScope, ReconciliationNeeded, Trigger},
    timestamps::{Clock, SystemClock, TimestampManager},
    CollectionName, Document, Error, Filter, Schema,
};
use futures::TryStreamExt;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Outcome of a write, including invariant work that still needs reconciling.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteReport {
    pub document: Document,
    /// Hook failures tolerated on a non-transactional backend
    pub reconciliation: Vec<ReconciliationNeeded>,
}

impl WriteReport {
    /// Whether every invariant was fully enforced.
    pub fn is_clean(&self) -> bool {
        self.reconciliation.is_empty()
    }
}

/// Builder for a [`Model`].
#[derive(Debug)]
pub struct ModelBuilder {
    schema: Schema,
    adapter: Arc<dyn PersistenceAdapter>,
    hooks: HookPipeline,
    clock: Arc<dyn Clock>,
}

impl ModelBuilder {
    /// Register an invariant hook. Hooks run in registration order.
    pub fn hook(mut self, hook: impl InvariantHook + 'static) -> Self {
        self.hooks.register(Arc::new(hook));
        self
    }

    /// Replace the wall clock used for timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Model {
        let capabilities = self.adapter.capabilities();
        Model {
            schema: self.schema,
            adapter: self.adapter,
            hooks: self.hooks,
            timestamps: TimestampManager::new(capabilities.timestamps, self.clock),
        }
    }
}

/// A named collection of documents governed by a schema.
#[derive(Debug)]
pub struct Model {
    schema: Schema,
    adapter: Arc<dyn PersistenceAdapter>,
    hooks: HookPipeline,
    timestamps: TimestampManager,
}

impl Model {
    /// Start building a model from a compiled schema.
    pub fn builder(schema: Schema, adapter: Arc<dyn PersistenceAdapter>) -> ModelBuilder {
        ModelBuilder {
            schema,
            adapter,
            hooks: HookPipeline::new(),
            clock: Arc::new(SystemClock),
        }
    }

    /// Compile `fields` for `collection` and start building a model.
    pub fn define(
        collection: impl Into<CollectionName>,
        fields: impl IntoIterator<Item = FieldDef>,
        adapter: Arc<dyn PersistenceAdapter>,
    ) -> std::result::Result<ModelBuilder, SchemaDefinitionError> {
        Ok(Self::builder(Schema::compile(collection, fields)?, adapter))
    }

    /// Collection name.
    pub fn name(&self) -> &str {
        self.schema.collection()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn hooks(&self) -> &HookPipeline {
        &self.hooks
    }

    pub fn adapter(&self) -> &Arc<dyn PersistenceAdapter> {
        &self.adapter
    }

    pub(crate) fn timestamps(&self) -> &TimestampManager {
        &self.timestamps
    }

    /// Let the backend set up what this schema needs.
    pub async fn prepare(&self) -> Result<()> {
        self.adapter.prepare(&self.schema).await
    }

    /// Validate, default, stamp and persist a new document.
    pub async fn create(&self, input: Value) -> Result<Document> {
        Ok(self.create_reported(input).await?.document)
    }

    /// Like [`create`](Self::create), also reporting tolerated hook failures.
    pub async fn create_reported(&self, input: Value) -> Result<WriteReport> {
        let mut fields = self.schema.validate(input)?.into_fields();
        self.timestamps.stamp_create(&self.schema, &mut fields);

        let mut work = self.adapter.begin(self.name()).await?;
        let atomic = work.is_atomic();

        let reconciliation = if self.hooks.is_empty() {
            Vec::new()
        } else {
            if !atomic {
                if let Err(e) = self.check_unique(work.as_mut(), None, &fields).await {
                    return Err(abort(work, e).await);
                }
            }
            let candidate = Candidate {
                trigger: Trigger::BeforeCreate,
                id: None,
                fields: &fields,
            };
            let mut scope = InvariantScope::new(work.as_mut(), &self.timestamps);
            match self.hooks.run(self.name(), &candidate, &mut scope, atomic).await {
                Ok(tolerated) => tolerated,
                Err(e) => return Err(abort(work, e).await),
            }
        };

        let document = match work.insert(fields).await {
            Ok(document) => document,
            Err(e) => {
                if !atomic {
                    self.warn_stranded_hook_writes(&e);
                }
                return Err(abort(work, e).await);
            }
        };
        work.commit().await?;

        tracing::debug!(collection = %self.name(), id = %document.id, "created document");
        Ok(WriteReport {
            document,
            reconciliation,
        })
    }

    /// Fetch one document.
    pub async fn find_by_id(&self, id: &str) -> Result<Document> {
        self.adapter.find_by_id(self.name(), id).await
    }

    /// Stream matching documents.
    pub fn find_many(&self, filter: Filter) -> DocumentStream {
        self.adapter.find_many(self.name(), filter)
    }

    /// Collect matching documents.
    pub async fn find_all(&self, filter: Filter) -> Result<Vec<Document>> {
        self.find_many(filter).try_collect().await
    }

    /// First matching document, if any.
    pub async fn find_one(&self, filter: Filter) -> Result<Option<Document>> {
        let mut stream = self.find_many(filter.limit(1));
        stream.try_next().await
    }

    /// All documents whose `key` equals `value`, e.g. the addresses of a store.
    pub async fn find_by_parent(&self, key: &str, value: impl Into<Value>) -> Result<Vec<Document>> {
        self.find_all(Filter::new().eq(key, value)).await
    }

    /// Validate and apply a partial update.
    pub async fn update(&self, id: &str, patch: Value) -> Result<Document> {
        Ok(self.update_reported(id, patch).await?.document)
    }

    /// Like [`update`](Self::update), also reporting tolerated hook failures.
    pub async fn update_reported(&self, id: &str, patch: Value) -> Result<WriteReport> {
        let mut patch = self.schema.validate_patch(patch)?;

        let mut work = self.adapter.begin(self.name()).await?;
        let atomic = work.is_atomic();
        let current = match work.find_by_id(id).await {
            Ok(current) => current,
            Err(e) => return Err(abort(work, e).await),
        };
        self.timestamps
            .stamp_update(&self.schema, &mut patch, current.updated_at());

        let reconciliation = if self.hooks.is_empty() {
            Vec::new()
        } else {
            if !atomic {
                if let Err(e) = self.check_unique(work.as_mut(), Some(id), &patch).await {
                    return Err(abort(work, e).await);
                }
            }
            let mut merged = current;
            merged.merge(&patch);
            let candidate = Candidate {
                trigger: Trigger::BeforeUpdate,
                id: Some(id),
                fields: &merged.fields,
            };
            let mut scope = InvariantScope::new(work.as_mut(), &self.timestamps);
            match self.hooks.run(self.name(), &candidate, &mut scope, atomic).await {
                Ok(tolerated) => tolerated,
                Err(e) => return Err(abort(work, e).await),
            }
        };

        let document = match work.update(id, patch).await {
            Ok(document) => document,
            Err(e) => {
                if !atomic {
                    self.warn_stranded_hook_writes(&e);
                }
                return Err(abort(work, e).await);
            }
        };
        work.commit().await?;

        tracing::debug!(collection = %self.name(), id = %document.id, "updated document");
        Ok(WriteReport {
            document,
            reconciliation,
        })
    }

    /// Look for unique-field clashes before best-effort hooks touch siblings.
    async fn check_unique(
        &self,
        work: &mut (dyn UnitOfWork + 'static),
        id: Option<&str>,
        fields: &Map<String, Value>,
    ) -> Result<()> {
        for field in self.schema.unique_fields() {
            let Some(value) = fields.get(&field.name).filter(|v| !v.is_null()) else {
                continue;
            };
            let mut filter = Filter::new().eq(field.name.clone(), value.clone()).limit(1);
            if let Some(id) = id {
                filter = filter.excluding(id);
            }
            if !work.find_many(&filter).await?.is_empty() {
                return Err(Error::conflict(
                    self.name(),
                    format!("duplicate value for unique field '{}'", field.name),
                ));
            }
        }
        Ok(())
    }

    /// Hook writes on a non-transactional backend outlive a failed write.
    fn warn_stranded_hook_writes(&self, error: &Error) {
        for hook in self.hooks.hooks() {
            tracing::warn!(
                event = "reconciliation_needed",
                collection = %self.name(),
                hook = hook.name(),
                error = %error,
                "write failed after hook changes were applied"
            );
        }
    }

    /// Remove a document.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.adapter.delete(self.name(), id).await?;
        tracing::debug!(collection = %self.name(), id, "deleted document");
        Ok(())
    }
}

/// Roll back after a failure and hand the original error back.
async fn abort(work: Box<dyn UnitOfWork>, error: crate::Error) -> crate::Error {
    if let Err(rollback) = work.rollback().await {
        tracing::warn!(error = %rollback, "rollback failed");
    }
    error
}
