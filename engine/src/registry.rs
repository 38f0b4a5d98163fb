//! Process-wide set of models, built once at startup and passed by reference.

use crate::{error::Result, error::SchemaDefinitionError, Model};
use std::sync::Arc;

/// Models by collection name.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: Vec<Arc<Model>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a model. Two models may not share a collection.
    pub fn register(&mut self, model: Model) -> std::result::Result<Arc<Model>, SchemaDefinitionError> {
        if self.get(model.name()).is_some() {
            return Err(SchemaDefinitionError::DuplicateModel(model.name().to_string()));
        }
        let model = Arc::new(model);
        self.models.push(model.clone());
        Ok(model)
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Model>> {
        self.models.iter().find(|m| m.name() == name)
    }

    /// Models in registration order.
    pub fn models(&self) -> impl Iterator<Item = &Arc<Model>> {
        self.models.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Run backend preparation (indexes and the like) for every model.
    pub async fn prepare_all(&self) -> Result<()> {
        for model in &self.models {
            model.prepare().await?;
            tracing::debug!(collection = %model.name(), backend = model.adapter().name(), "prepared model");
        }
        Ok(())
    }
}
