use serde_json::json;
use shelf_engine::{Clock, FieldDef, FieldType, Model, PersistenceAdapter, SchemaDefinitionError};
use std::sync::Arc;

pub fn model(
    adapter: Arc<dyn PersistenceAdapter>,
    clock: Arc<dyn Clock>,
) -> Result<Model, SchemaDefinitionError> {
    Ok(Model::define(
        "users",
        vec![
            FieldDef::required("email", FieldType::String).unique(),
            FieldDef::required("password", FieldType::String),
            FieldDef::optional("name", FieldType::String),
            FieldDef::optional("phone", FieldType::String),
            // Shoppers belong to the store they registered with
            FieldDef::optional("storeId", FieldType::String),
            FieldDef::optional("role", FieldType::String).with_default(json!("customer")),
        ],
        adapter,
    )?
    .clock(clock)
    .build())
}
