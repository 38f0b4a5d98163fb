//! Schema compilation.
//!
//! A [`Schema`] is the compiled, immutable set of field descriptors for one
//! collection. Compilation rejects conflicting or unrecognized specs up front so
//! a model never starts with a schema it cannot honor.

use crate::{
    error::SchemaDefinitionError,
    field::{DefaultFactory, DefaultRule, FieldDef, FieldType},
    CollectionName,
};
use serde_json::{Map, Value};

/// Identifier field, owned by the persistence adapter.
pub const ID_FIELD: &str = "id";
/// Creation timestamp, owned by the timestamp manager.
pub const CREATED_AT: &str = "createdAt";
/// Update timestamp, owned by the timestamp manager.
pub const UPDATED_AT: &str = "updatedAt";

/// Field names a schema may not declare.
pub const RESERVED_FIELDS: [&str; 3] = [ID_FIELD, CREATED_AT, UPDATED_AT];

/// Compiled schema for a collection.
#[derive(Debug, Clone)]
pub struct Schema {
    collection: CollectionName,
    fields: Vec<FieldDef>,
}

impl Schema {
    /// Compile a schema from field definitions, in declaration order.
    pub fn compile(
        collection: impl Into<CollectionName>,
        fields: impl IntoIterator<Item = FieldDef>,
    ) -> Result<Self, SchemaDefinitionError> {
        let collection = collection.into();
        check_name(&collection)?;

        let mut compiled: Vec<FieldDef> = Vec::new();
        for field in fields {
            check_name(&field.name)?;
            if RESERVED_FIELDS.contains(&field.name.as_str()) {
                return Err(SchemaDefinitionError::ReservedField(field.name));
            }
            if compiled.iter().any(|f| f.name == field.name) {
                return Err(SchemaDefinitionError::DuplicateField(field.name));
            }
            check_default(&field)?;
            compiled.push(field);
        }

        Ok(Self {
            collection,
            fields: compiled,
        })
    }

    /// Compile a schema from a raw JSON field map.
    ///
    /// Each entry is either a type name (`"string"`) or an object with `type`,
    /// and optionally `required`, `default`, `factory` and `unique`.
    pub fn from_json(
        collection: impl Into<CollectionName>,
        spec: &Value,
    ) -> Result<Self, SchemaDefinitionError> {
        let collection = collection.into();
        let entries = spec
            .as_object()
            .ok_or_else(|| SchemaDefinitionError::MalformedSpec {
                field: collection.clone(),
                reason: "field map must be an object".into(),
            })?;

        let fields = entries
            .iter()
            .map(|(name, raw)| parse_field(name, raw))
            .collect::<Result<Vec<_>, _>>()?;

        Self::compile(collection, fields)
    }

    /// Collection this schema describes.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Field definitions in declaration order.
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields the backend must keep unique.
    pub fn unique_fields(&self) -> impl Iterator<Item = &FieldDef> {
        self.fields.iter().filter(|f| f.unique)
    }
}

/// Names end up in SQL index names and filters, so keep them to identifiers.
fn check_name(name: &str) -> Result<(), SchemaDefinitionError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SchemaDefinitionError::InvalidName(name.to_string()))
    }
}

fn check_default(field: &FieldDef) -> Result<(), SchemaDefinitionError> {
    let Some(rule) = &field.default else {
        return Ok(());
    };

    if field.required {
        return Err(SchemaDefinitionError::RequiredWithDefault {
            field: field.name.clone(),
        });
    }

    match rule {
        DefaultRule::Static(value) | DefaultRule::Structured(value) => {
            if field.field_type.accepts(value) {
                Ok(())
            } else {
                Err(SchemaDefinitionError::DefaultTypeMismatch {
                    field: field.name.clone(),
                    expected: field.field_type,
                })
            }
        }
        // Checked per call by the default resolver.
        DefaultRule::Factory(_) => Ok(()),
    }
}

fn parse_field(name: &str, raw: &Value) -> Result<FieldDef, SchemaDefinitionError> {
    let malformed = |reason: &str| SchemaDefinitionError::MalformedSpec {
        field: name.to_string(),
        reason: reason.to_string(),
    };

    let spec: Map<String, Value> = match raw {
        Value::String(type_name) => {
            let mut spec = Map::new();
            spec.insert("type".into(), Value::String(type_name.clone()));
            spec
        }
        Value::Object(spec) => spec.clone(),
        _ => return Err(malformed("expected a type name or an object")),
    };

    if let Some(key) = spec
        .keys()
        .find(|k| !matches!(k.as_str(), "type" | "required" | "default" | "factory" | "unique"))
    {
        return Err(malformed(&format!("unknown key '{key}'")));
    }

    let type_name = spec
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing 'type'"))?;
    let field_type: FieldType =
        type_name
            .parse()
            .map_err(|_| SchemaDefinitionError::UnknownType {
                field: name.to_string(),
                type_name: type_name.to_string(),
            })?;

    let flag = |key: &str| -> Result<bool, SchemaDefinitionError> {
        match spec.get(key) {
            None => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(malformed(&format!("'{key}' must be a boolean"))),
        }
    };

    let mut field = if flag("required")? {
        FieldDef::required(name, field_type)
    } else {
        FieldDef::optional(name, field_type)
    };
    if flag("unique")? {
        field = field.unique();
    }

    match (spec.get("default"), spec.get("factory")) {
        (Some(_), Some(_)) => return Err(malformed("'default' and 'factory' are exclusive")),
        (Some(value), None) => field = field.with_default(value.clone()),
        (None, Some(Value::String(factory))) => {
            let built = DefaultFactory::builtin(factory).ok_or_else(|| {
                SchemaDefinitionError::UnknownFactory {
                    field: name.to_string(),
                    factory: factory.clone(),
                }
            })?;
            field = field.with_factory(built);
        }
        (None, Some(_)) => return Err(malformed("'factory' must be a string")),
        (None, None) => {}
    }

    Ok(field)
}
