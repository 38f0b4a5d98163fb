//! Default resolution for absent fields.

use crate::{
    error::SchemaDefinitionError,
    field::{json_type_name, DefaultRule},
    Schema,
};
use serde_json::{Map, Value};

impl DefaultRule {
    /// Produce the value for one document.
    ///
    /// Structured literals are cloned, so every document owns its copy.
    pub fn resolve(&self) -> Value {
        match self {
            DefaultRule::Static(value) => value.clone(),
            DefaultRule::Structured(literal) => literal.clone(),
            DefaultRule::Factory(factory) => factory.call(),
        }
    }
}

/// Fill every absent, non-required field that declares a default.
///
/// Present fields (including explicit `null`) are left alone. Required fields
/// are never defaulted.
pub fn resolve_defaults(
    schema: &Schema,
    document: &mut Map<String, Value>,
) -> Result<(), SchemaDefinitionError> {
    for field in schema.fields() {
        if field.required || document.contains_key(&field.name) {
            continue;
        }
        let Some(rule) = &field.default else {
            continue;
        };

        let value = rule.resolve();
        if value.is_null() {
            continue;
        }
        if let DefaultRule::Factory(_) = rule {
            if !field.field_type.accepts(&value) {
                return Err(SchemaDefinitionError::FactoryTypeMismatch {
                    field: field.name.clone(),
                    expected: field.field_type,
                    actual: json_type_name(&value).to_string(),
                });
            }
        }
        document.insert(field.name.clone(), value);
    }
    Ok(())
}
