//! # Shelf Engine
//!
//! A schema-driven document mapping layer for schemaless and relational-style
//! backends.
//!
//! The engine gives every backend the same data-integrity guarantees: required
//! fields, typed defaults, automatic timestamps and cross-document invariants.
//! Domain rules are declared once; each backend only implements the
//! [`PersistenceAdapter`] contract.
//!
//! ## Core Concepts
//!
//! ### Schemas
//!
//! A [`Schema`] is compiled from [`FieldDef`]s (or a raw JSON field map) and is
//! immutable afterwards. Compilation rejects conflicting specs, such as a
//! required field with a default, with a [`SchemaDefinitionError`].
//!
//! ### Defaults
//!
//! Absent optional fields are filled from their [`DefaultRule`]:
//! - [`DefaultRule::Static`] - a scalar handed out as is
//! - [`DefaultRule::Structured`] - an object or array, deep-copied per document
//! - [`DefaultRule::Factory`] - a function called once per document
//!
//! ### Invariant hooks
//!
//! An [`InvariantHook`] enforces a rule spanning several documents, such as
//! [`SingleDefault`] ("at most one default address per store"). Hooks run in the
//! same unit of work as the triggering write: atomically on transactional
//! backends, best-effort and ahead of the write on the others.
//!
//! ### Backends
//!
//! [`MemoryStore`] is the bundled non-transactional document store. Other
//! backends implement [`PersistenceAdapter`] and [`UnitOfWork`].
//!
//! ## Quick Start
//!
//! ```rust
//! use shelf_engine::{FieldDef, FieldType, MemoryStore, Model, SingleDefault};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! // 1. Define a model
//! let addresses = Model::define(
//!     "addresses",
//!     vec![
//!         FieldDef::required("storeId", FieldType::String),
//!         FieldDef::optional("isDefault", FieldType::Boolean).with_default(json!(false)),
//!     ],
//!     Arc::new(MemoryStore::new()),
//! )
//! .unwrap()
//! .hook(SingleDefault::new("storeId", "isDefault"))
//! .build();
//!
//! // 2. Create documents
//! addresses.create(json!({"storeId": "S1", "isDefault": true})).await.unwrap();
//! let second = addresses.create(json!({"storeId": "S1", "isDefault": true})).await.unwrap();
//!
//! // 3. Only the latest default survives
//! let defaults = addresses
//!     .find_all(shelf_engine::Filter::new().eq("storeId", "S1").eq("isDefault", true))
//!     .await
//!     .unwrap();
//! assert_eq!(defaults.len(), 1);
//! assert_eq!(defaults[0].id, second.id);
//! # });
//! ```

pub mod adapter;
pub mod defaults;
pub mod document;
pub mod error;
pub mod field;
pub mod filter;
pub mod hooks;
pub mod memory;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod schema;
pub mod timestamps;
pub mod validator;

// Re-export main types at crate root
pub use adapter::{Capabilities, DocumentStream, PersistenceAdapter, UnitOfWork};
pub use defaults::resolve_defaults;
pub use document::Document;
pub use error::{Error, Result, SchemaDefinitionError, ValidationError};
pub use field::{DefaultFactory, DefaultRule, FieldDef, FieldType};
pub use filter::{Filter, Sort, SortDirection};
pub use hooks::{
    Candidate, HookPipeline, InvariantHook, InvariantScope, ReconciliationNeeded, SingleDefault,
    Trigger,
};
pub use memory::MemoryStore;
pub use model::{Model, ModelBuilder, WriteReport};
pub use reconcile::{ReconcileSummary, Reconciler};
pub use registry::ModelRegistry;
pub use schema::{Schema, CREATED_AT, ID_FIELD, UPDATED_AT};
pub use timestamps::{Clock, ManualClock, SystemClock, TimestampEncoding, TimestampManager};
pub use validator::ValidatedDocument;

/// Type aliases for clarity
pub type DocumentId = String;
pub type CollectionName = String;
