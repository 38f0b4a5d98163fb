use serde_json::json;
use shelf_engine::{Clock, Model, PersistenceAdapter, Schema, SchemaDefinitionError};
use std::sync::Arc;

pub fn model(
    adapter: Arc<dyn PersistenceAdapter>,
    clock: Arc<dyn Clock>,
) -> Result<Model, SchemaDefinitionError> {
    let schema = Schema::from_json(
        "products",
        &json!({
            "storeId": {"type": "string", "required": true},
            "name": {"type": "string", "required": true},
            "price": {"type": "number", "required": true},
            "description": "string",
            "sku": {"type": "string", "factory": "uuid"},
            "stock": {"type": "number", "default": 0},
            "rating": {"type": "number", "default": 0},
            "images": {"type": "array", "default": []},
            "tags": {"type": "array", "default": []},
            "isPublished": {"type": "boolean", "default": false}
        }),
    )?;
    Ok(Model::builder(schema, adapter).clock(clock).build())
}
