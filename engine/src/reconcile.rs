//! Reconciliation sweeps.
//!
//! Non-transactional backends enforce invariants with best-effort sequential
//! writes. If a process dies between a hook's sibling writes and the
//! triggering write, or a hook fails and the write proceeds anyway, the
//! invariant can be left violated. A sweep asks every hook to repair its
//! collection; the [`Reconciler`] runs sweeps once or on an interval.

use crate::{error::Result, hooks::InvariantScope, Model};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

impl Model {
    /// Run every hook's sweep over this collection. Returns documents changed.
    pub async fn reconcile(&self) -> Result<u64> {
        if self.hooks().is_empty() {
            return Ok(0);
        }

        let mut work = self.adapter().begin(self.name()).await?;
        let mut repaired = 0;
        {
            let mut scope = InvariantScope::new(work.as_mut(), self.timestamps());
            for hook in self.hooks().hooks() {
                match hook.sweep(&mut scope).await {
                    Ok(changed) => repaired += changed,
                    Err(e) => {
                        drop(scope);
                        if let Err(rollback) = work.rollback().await {
                            tracing::warn!(error = %rollback, "rollback failed");
                        }
                        return Err(e);
                    }
                }
            }
        }
        work.commit().await?;
        Ok(repaired)
    }
}

/// Result of one pass over all models.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileSummary {
    /// Documents changed across all models
    pub repaired: u64,
    /// Collections whose sweep failed
    pub failed: Vec<String>,
}

/// Runs hook sweeps for a set of models.
#[derive(Debug, Clone)]
pub struct Reconciler {
    models: Vec<Arc<Model>>,
}

impl Reconciler {
    /// Keep only models that have hooks to sweep.
    pub fn new<'a>(models: impl IntoIterator<Item = &'a Arc<Model>>) -> Self {
        Self {
            models: models
                .into_iter()
                .filter(|m| !m.hooks().is_empty())
                .cloned()
                .collect(),
        }
    }

    /// Names of the collections covered.
    pub fn collections(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name()).collect()
    }

    /// Sweep every model once. Failures are logged and reported, not raised.
    pub async fn run_once(&self) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        for model in &self.models {
            match model.reconcile().await {
                Ok(repaired) => {
                    if repaired > 0 {
                        tracing::info!(collection = %model.name(), repaired, "reconciled invariants");
                    }
                    summary.repaired += repaired;
                }
                Err(e) => {
                    tracing::error!(collection = %model.name(), error = %e, "reconciliation sweep failed");
                    summary.failed.push(model.name().to_string());
                }
            }
        }
        summary
    }

    /// Sweep on a fixed interval until the task is aborted.
    pub fn spawn(self, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.run_once().await;
            }
        })
    }
}
