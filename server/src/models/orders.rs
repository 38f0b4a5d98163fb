use serde_json::json;
use shelf_engine::{
    Clock, DefaultFactory, FieldDef, FieldType, Model, PersistenceAdapter, SchemaDefinitionError,
};
use std::sync::Arc;

pub fn model(
    adapter: Arc<dyn PersistenceAdapter>,
    clock: Arc<dyn Clock>,
) -> Result<Model, SchemaDefinitionError> {
    Ok(Model::define(
        "orders",
        vec![
            FieldDef::required("storeId", FieldType::String),
            FieldDef::optional("userId", FieldType::String),
            FieldDef::required("items", FieldType::Array),
            FieldDef::required("total", FieldType::Number),
            FieldDef::optional("shippingAddressId", FieldType::String),
            FieldDef::optional("status", FieldType::String).with_default(json!("pending")),
            FieldDef::optional("placedAt", FieldType::Timestamp).with_factory(DefaultFactory::now()),
            FieldDef::optional("reference", FieldType::String).with_factory(DefaultFactory::uuid()),
        ],
        adapter,
    )?
    .clock(clock)
    .build())
}
