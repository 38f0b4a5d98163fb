use serde_json::json;
use shelf_engine::{
    Clock, FieldDef, FieldType, Model, PersistenceAdapter, SchemaDefinitionError, SingleDefault,
};
use std::sync::Arc;

/// Shipping and billing addresses. A store has at most one default address.
pub fn model(
    adapter: Arc<dyn PersistenceAdapter>,
    clock: Arc<dyn Clock>,
) -> Result<Model, SchemaDefinitionError> {
    Ok(Model::define(
        "addresses",
        vec![
            FieldDef::required("storeId", FieldType::String),
            FieldDef::optional("label", FieldType::String),
            FieldDef::optional("line1", FieldType::String),
            FieldDef::optional("line2", FieldType::String),
            FieldDef::optional("city", FieldType::String),
            FieldDef::optional("postalCode", FieldType::String),
            FieldDef::optional("country", FieldType::String),
            FieldDef::optional("location", FieldType::Object),
            FieldDef::optional("isDefault", FieldType::Boolean).with_default(json!(false)),
        ],
        adapter,
    )?
    .clock(clock)
    .hook(SingleDefault::new("storeId", "isDefault"))
    .build())
}
