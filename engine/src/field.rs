//! Field descriptors.
//!
//! A [`FieldDef`] declares one attribute of a document: its type, whether the
//! caller must supply it, and how it is filled in when absent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Field types supported in schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    /// Milliseconds since epoch or an RFC 3339 string
    Timestamp,
    Object,
    Array,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::String => write!(f, "String"),
            FieldType::Number => write!(f, "Number"),
            FieldType::Boolean => write!(f, "Boolean"),
            FieldType::Timestamp => write!(f, "Timestamp"),
            FieldType::Object => write!(f, "Object"),
            FieldType::Array => write!(f, "Array"),
        }
    }
}

/// Returned when a type name is not one of the recognized field types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownFieldType(pub String);

impl FromStr for FieldType {
    type Err = UnknownFieldType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "string" => Ok(FieldType::String),
            "number" => Ok(FieldType::Number),
            "boolean" | "bool" => Ok(FieldType::Boolean),
            "timestamp" | "date" => Ok(FieldType::Timestamp),
            "object" => Ok(FieldType::Object),
            "array" => Ok(FieldType::Array),
            _ => Err(UnknownFieldType(s.to_string())),
        }
    }
}

impl FieldType {
    /// Check whether a non-null JSON value is compatible with this type.
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Timestamp => match value {
                Value::Number(n) => n.is_i64() || n.is_u64(),
                Value::String(s) => chrono::DateTime::parse_from_rfc3339(s).is_ok(),
                _ => false,
            },
            FieldType::Object => value.is_object(),
            FieldType::Array => value.is_array(),
        }
    }
}

/// Runtime type name of a JSON value, as reported in validation errors.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

/// A zero-argument function producing a fresh default on every call.
#[derive(Clone)]
pub struct DefaultFactory {
    name: String,
    produce: Arc<dyn Fn() -> Value + Send + Sync>,
}

impl DefaultFactory {
    pub fn new(name: impl Into<String>, produce: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        Self {
            name: name.into(),
            produce: Arc::new(produce),
        }
    }

    /// Current time as an RFC 3339 string. Normalized to the backend's
    /// encoding before it is persisted.
    pub fn now() -> Self {
        Self::new("now", || {
            Value::String(
                chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            )
        })
    }

    /// A random v4 UUID string.
    pub fn uuid() -> Self {
        Self::new("uuid", || Value::String(uuid::Uuid::new_v4().to_string()))
    }

    /// Look up a built-in factory by the name used in raw field specs.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "now" => Some(Self::now()),
            "uuid" => Some(Self::uuid()),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self) -> Value {
        (self.produce)()
    }
}

impl fmt::Debug for DefaultFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DefaultFactory").field(&self.name).finish()
    }
}

/// How a field is filled in when the caller omits it.
#[derive(Debug, Clone)]
pub enum DefaultRule {
    /// Immutable scalar, safe to hand out directly.
    Static(Value),
    /// Object or array literal, deep-copied for every document.
    Structured(Value),
    /// Invoked once per resolution.
    Factory(DefaultFactory),
}

impl DefaultRule {
    /// Classify a literal default. Objects and arrays become structured.
    pub fn literal(value: Value) -> Self {
        match value {
            Value::Object(_) | Value::Array(_) => DefaultRule::Structured(value),
            scalar => DefaultRule::Static(scalar),
        }
    }
}

/// Definition of a field in a collection.
#[derive(Debug, Clone)]
pub struct FieldDef {
    /// Field name
    pub name: String,
    /// Field type
    pub field_type: FieldType,
    /// Whether the caller must supply this field
    pub required: bool,
    /// Default rule applied when the field is absent
    pub default: Option<DefaultRule>,
    /// Whether the backend enforces uniqueness of this field per collection
    pub unique: bool,
}

impl FieldDef {
    /// Create a new required field definition.
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            default: None,
            unique: false,
        }
    }

    /// Create a new optional field definition.
    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            default: None,
            unique: false,
        }
    }

    /// Attach a literal default. `null` means no default.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = match value {
            Value::Null => None,
            value => Some(DefaultRule::literal(value)),
        };
        self
    }

    /// Attach a factory default.
    pub fn with_factory(mut self, factory: DefaultFactory) -> Self {
        self.default = Some(DefaultRule::Factory(factory));
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}
