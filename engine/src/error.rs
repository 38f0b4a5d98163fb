//! Error types for the Shelf engine.

use crate::{field::FieldType, CollectionName, DocumentId};
use thiserror::Error;

/// Errors raised while compiling a schema or defining a model.
///
/// These are fatal: a model whose schema fails to compile must not be started.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaDefinitionError {
    #[error("field '{field}' is required and cannot carry a default")]
    RequiredWithDefault { field: String },

    #[error("field '{field}' has unknown type '{type_name}'")]
    UnknownType { field: String, type_name: String },

    #[error("default for field '{field}' does not match declared type {expected}")]
    DefaultTypeMismatch { field: String, expected: FieldType },

    #[error("default factory for field '{field}' produced {actual}, expected {expected}")]
    FactoryTypeMismatch {
        field: String,
        expected: FieldType,
        actual: String,
    },

    #[error("unknown default factory '{factory}' for field '{field}'")]
    UnknownFactory { field: String, factory: String },

    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("field '{0}' is reserved and managed by the mapper")]
    ReservedField(String),

    #[error("invalid name '{0}': expected letters, digits and underscores")]
    InvalidName(String),

    #[error("malformed field spec for '{field}': {reason}")]
    MalformedSpec { field: String, reason: String },

    #[error("model already defined for collection: {0}")]
    DuplicateModel(CollectionName),
}

/// A caller-input error. Always recoverable: the operation is rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field: {field}")]
    Missing { field: String },

    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: String,
    },

    #[error("document must be an object, got {actual}")]
    NotAnObject { actual: String },

    #[error("field '{field}' is reserved and cannot be written")]
    ReservedField { field: String },
}

impl ValidationError {
    /// The offending field, if the failure is tied to one.
    pub fn field(&self) -> Option<&str> {
        match self {
            ValidationError::Missing { field }
            | ValidationError::TypeMismatch { field, .. }
            | ValidationError::ReservedField { field } => Some(field),
            ValidationError::NotAnObject { .. } => None,
        }
    }

    /// Machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::Missing { .. } => "missing",
            ValidationError::TypeMismatch { .. } => "type-mismatch",
            ValidationError::NotAnObject { .. } => "not-an-object",
            ValidationError::ReservedField { .. } => "reserved-field",
        }
    }
}

/// All possible errors from the Shelf engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("schema definition error: {0}")]
    SchemaDefinition(#[from] SchemaDefinitionError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    // Backend errors
    #[error("conflict in {collection}: {detail}")]
    Conflict {
        collection: CollectionName,
        detail: String,
    },

    #[error("document not found in {collection}: {id}")]
    NotFound {
        collection: CollectionName,
        id: DocumentId,
    },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// An invariant hook failed and the whole operation was aborted.
    #[error("invariant '{hook}' could not be enforced: {reason}")]
    Invariant { hook: String, reason: String },
}

impl Error {
    pub fn not_found(collection: impl Into<CollectionName>, id: impl Into<DocumentId>) -> Self {
        Error::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn conflict(collection: impl Into<CollectionName>, detail: impl Into<String>) -> Self {
        Error::Conflict {
            collection: collection.into(),
            detail: detail.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    /// Whether a caller may reasonably retry. The engine itself never does.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::BackendUnavailable(_))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::not_found("addresses", "a-1");
        assert_eq!(err.to_string(), "document not found in addresses: a-1");

        let err = Error::Validation(ValidationError::TypeMismatch {
            field: "price".into(),
            expected: FieldType::Number,
            actual: "String".into(),
        });
        assert_eq!(
            err.to_string(),
            "validation failed: type mismatch for field 'price': expected Number, got String"
        );

        let err = SchemaDefinitionError::RequiredWithDefault {
            field: "storeId".into(),
        };
        assert_eq!(
            err.to_string(),
            "field 'storeId' is required and cannot carry a default"
        );
    }

    #[test]
    fn validation_reason_codes() {
        let missing = ValidationError::Missing {
            field: "storeId".into(),
        };
        assert_eq!(missing.reason(), "missing");
        assert_eq!(missing.field(), Some("storeId"));

        let not_object = ValidationError::NotAnObject {
            actual: "Array".into(),
        };
        assert_eq!(not_object.reason(), "not-an-object");
        assert_eq!(not_object.field(), None);
    }

    #[test]
    fn retryable_only_for_transport_failures() {
        assert!(Error::BackendUnavailable("pool timed out".into()).is_retryable());
        assert!(!Error::conflict("payments", "orderId").is_retryable());
        assert!(Error::conflict("payments", "orderId").is_conflict());
    }
}
