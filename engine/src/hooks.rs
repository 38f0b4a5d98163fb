//! Invariant hooks.
//!
//! Hooks enforce constraints spanning several documents of a collection, which
//! per-document validation cannot express. They run before the triggering
//! write, inside the same unit of work:
//!
//! - On a transactional backend a hook failure aborts the unit of work and the
//!   caller sees [`Error::Invariant`]; nothing is persisted.
//! - On a non-transactional backend hook writes land first and the triggering
//!   write follows. A hook failure is logged as reconciliation-needed and the
//!   write still proceeds. A crash between the two steps can leave the
//!   invariant violated until a [`Reconciler`](crate::Reconciler) sweep runs.
//!
//! Hooks must be idempotent: running one twice on the same input converges to
//! the same state.

use crate::{
    adapter::UnitOfWork,
    error::Result,
    schema::UPDATED_AT,
    timestamps::TimestampManager,
    Document, DocumentId, Error, Filter,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// When a hook fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Trigger {
    BeforeCreate,
    BeforeUpdate,
}

/// The document about to be written.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub trigger: Trigger,
    /// Identifier of the document being updated; `None` on create
    pub id: Option<&'a str>,
    /// Full field set after the write (for updates: current document merged with the patch)
    pub fields: &'a Map<String, Value>,
}

impl Candidate<'_> {
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }
}

/// Reads and writes available to a hook.
///
/// Writes made through the scope are stamped with `updatedAt`.
pub struct InvariantScope<'a> {
    work: &'a mut (dyn UnitOfWork + 'static),
    timestamps: &'a TimestampManager,
}

impl<'a> InvariantScope<'a> {
    pub(crate) fn new(work: &'a mut (dyn UnitOfWork + 'static), timestamps: &'a TimestampManager) -> Self {
        Self { work, timestamps }
    }

    pub async fn find_many(&mut self, filter: &Filter) -> Result<Vec<Document>> {
        self.work.find_many(filter).await
    }

    /// Merge `patch` into every document matching `filter`.
    pub async fn update_many(&mut self, filter: &Filter, mut patch: Map<String, Value>) -> Result<u64> {
        patch.insert(UPDATED_AT.to_string(), self.timestamps.touch(None));
        self.work.update_many(filter, patch).await
    }
}

/// A constraint spanning more than one document.
#[async_trait]
pub trait InvariantHook: Send + Sync + fmt::Debug {
    /// Stable name used in logs and errors.
    fn name(&self) -> &str;

    fn fires_on(&self, trigger: Trigger) -> bool;

    /// Whether the candidate needs enforcement at all.
    fn applies_to(&self, candidate: &Candidate<'_>) -> bool;

    /// Bring sibling documents in line before the candidate is written.
    async fn enforce(&self, candidate: &Candidate<'_>, scope: &mut InvariantScope<'_>) -> Result<()>;

    /// Repair violations left behind by interrupted best-effort writes.
    /// Returns the number of documents changed.
    async fn sweep(&self, _scope: &mut InvariantScope<'_>) -> Result<u64> {
        Ok(0)
    }
}

/// A hook failure that was tolerated on a non-transactional backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationNeeded {
    pub hook: String,
    pub reason: String,
}

/// Hooks of one model, run in registration order.
#[derive(Debug, Clone, Default)]
pub struct HookPipeline {
    hooks: Vec<Arc<dyn InvariantHook>>,
}

impl HookPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn InvariantHook>) {
        self.hooks.push(hook);
    }

    pub fn hooks(&self) -> &[Arc<dyn InvariantHook>] {
        &self.hooks
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook that fires on the candidate's trigger.
    ///
    /// `atomic` selects the failure policy described in the module docs.
    pub async fn run(
        &self,
        collection: &str,
        candidate: &Candidate<'_>,
        scope: &mut InvariantScope<'_>,
        atomic: bool,
    ) -> Result<Vec<ReconciliationNeeded>> {
        let mut tolerated = Vec::new();

        for hook in &self.hooks {
            if !hook.fires_on(candidate.trigger) || !hook.applies_to(candidate) {
                continue;
            }

            match hook.enforce(candidate, scope).await {
                Ok(()) => {}
                Err(e) if atomic => {
                    return Err(Error::Invariant {
                        hook: hook.name().to_string(),
                        reason: e.to_string(),
                    })
                }
                Err(e) => {
                    tracing::warn!(
                        event = "reconciliation_needed",
                        collection,
                        hook = hook.name(),
                        error = %e,
                        "invariant not fully enforced"
                    );
                    tolerated.push(ReconciliationNeeded {
                        hook: hook.name().to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(tolerated)
    }
}

/// At most one document per parent key carries `flag = true`.
///
/// Setting the flag on one document clears it on all siblings that share the
/// same parent key value.
#[derive(Debug, Clone)]
pub struct SingleDefault {
    name: String,
    parent_key: String,
    flag: String,
}

impl SingleDefault {
    pub fn new(parent_key: impl Into<String>, flag: impl Into<String>) -> Self {
        let parent_key = parent_key.into();
        let flag = flag.into();
        Self {
            name: format!("single-{flag}-per-{parent_key}"),
            parent_key,
            flag,
        }
    }

    fn siblings(&self, parent: &Value) -> Filter {
        Filter::new()
            .eq(self.parent_key.clone(), parent.clone())
            .eq(self.flag.clone(), true)
    }

    fn cleared(&self) -> Map<String, Value> {
        let mut patch = Map::new();
        patch.insert(self.flag.clone(), Value::Bool(false));
        patch
    }
}

#[async_trait]
impl InvariantHook for SingleDefault {
    fn name(&self) -> &str {
        &self.name
    }

    fn fires_on(&self, _trigger: Trigger) -> bool {
        true
    }

    fn applies_to(&self, candidate: &Candidate<'_>) -> bool {
        candidate.get(&self.flag) == Some(&Value::Bool(true))
            && candidate
                .get(&self.parent_key)
                .is_some_and(|parent| !parent.is_null())
    }

    async fn enforce(&self, candidate: &Candidate<'_>, scope: &mut InvariantScope<'_>) -> Result<()> {
        let Some(parent) = candidate.get(&self.parent_key) else {
            return Ok(());
        };

        let mut filter = self.siblings(parent);
        if let Some(id) = candidate.id {
            filter = filter.excluding(id);
        }

        let cleared = scope.update_many(&filter, self.cleared()).await?;
        if cleared > 0 {
            tracing::info!(
                hook = %self.name,
                parent = %parent,
                cleared,
                "cleared flag on sibling documents"
            );
        }
        Ok(())
    }

    async fn sweep(&self, scope: &mut InvariantScope<'_>) -> Result<u64> {
        let flagged = scope
            .find_many(&Filter::new().eq(self.flag.clone(), true))
            .await?;

        // Keeper per parent: latest updatedAt, later insertion on ties.
        let mut keepers: HashMap<String, (Option<chrono::DateTime<chrono::Utc>>, DocumentId)> =
            HashMap::new();
        let mut counts: HashMap<String, usize> = HashMap::new();
        for document in &flagged {
            let Some(parent) = document.get(&self.parent_key).filter(|p| !p.is_null()) else {
                continue;
            };
            let key = parent.to_string();
            let updated = document
                .updated_at()
                .and_then(crate::timestamps::TimestampEncoding::decode);
            *counts.entry(key.clone()).or_default() += 1;
            match keepers.get(&key) {
                Some((best, _)) if *best > updated => {}
                _ => {
                    keepers.insert(key, (updated, document.id.clone()));
                }
            }
        }

        let mut repaired = 0;
        for document in &flagged {
            let Some(parent) = document.get(&self.parent_key).filter(|p| !p.is_null()) else {
                continue;
            };
            let key = parent.to_string();
            if counts.get(&key).copied().unwrap_or(0) < 2 {
                continue;
            }
            let Some((_, keeper)) = keepers.remove(&key) else {
                continue;
            };
            let filter = self.siblings(parent).excluding(keeper.clone());
            let cleared = scope.update_many(&filter, self.cleared()).await?;
            tracing::info!(
                hook = %self.name,
                parent = %parent,
                keeper = %keeper,
                cleared,
                "reconciled duplicate flags"
            );
            repaired += cleared;
        }

        Ok(repaired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn single_default_predicate() {
        let hook = SingleDefault::new("storeId", "isDefault");
        assert_eq!(hook.name(), "single-isDefault-per-storeId");

        let set = fields(json!({"storeId": "S1", "isDefault": true}));
        let unset = fields(json!({"storeId": "S1", "isDefault": false}));
        let orphan = fields(json!({"storeId": null, "isDefault": true}));

        fn candidate(fields: &Map<String, Value>) -> Candidate<'_> {
            Candidate {
                trigger: Trigger::BeforeCreate,
                id: None,
                fields,
            }
        }
        assert!(hook.applies_to(&candidate(&set)));
        assert!(!hook.applies_to(&candidate(&unset)));
        assert!(!hook.applies_to(&candidate(&orphan)));
    }

    #[test]
    fn trigger_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_value(Trigger::BeforeCreate).unwrap(),
            json!("before-create")
        );
    }
}
