use serde_json::json;
use shelf_engine::{Clock, FieldDef, FieldType, Model, PersistenceAdapter, SchemaDefinitionError};
use std::sync::Arc;

/// Payments. The backend enforces one payment per order.
pub fn model(
    adapter: Arc<dyn PersistenceAdapter>,
    clock: Arc<dyn Clock>,
) -> Result<Model, SchemaDefinitionError> {
    Ok(Model::define(
        "payments",
        vec![
            FieldDef::required("orderId", FieldType::String).unique(),
            FieldDef::required("amount", FieldType::Number),
            FieldDef::optional("method", FieldType::String).with_default(json!("card")),
            FieldDef::optional("status", FieldType::String).with_default(json!("pending")),
            FieldDef::optional("paidAt", FieldType::Timestamp),
        ],
        adapter,
    )?
    .clock(clock)
    .build())
}
