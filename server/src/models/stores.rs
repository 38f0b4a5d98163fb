use serde_json::json;
use shelf_engine::{Clock, Model, PersistenceAdapter, Schema, SchemaDefinitionError};
use std::sync::Arc;

pub fn model(
    adapter: Arc<dyn PersistenceAdapter>,
    clock: Arc<dyn Clock>,
) -> Result<Model, SchemaDefinitionError> {
    let schema = Schema::from_json(
        "stores",
        &json!({
            "name": {"type": "string", "required": true},
            "email": {"type": "string", "required": true, "unique": true},
            "password": {"type": "string", "required": true},
            "ownerId": "string",
            "description": "string",
            "currency": {"type": "string", "default": "USD"},
            "isActive": {"type": "boolean", "default": true},
            "landingPage": {
                "type": "object",
                "default": {
                    "hero": {"title": "Welcome to our store", "subtitle": "", "image": null},
                    "sections": [],
                    "theme": {"primaryColor": "#111827", "font": "Inter"}
                }
            }
        }),
    )?;
    Ok(Model::builder(schema, adapter).clock(clock).build())
}
