//! Validation of caller input against a compiled [`Schema`].

use crate::{
    defaults::resolve_defaults,
    error::{Result, ValidationError},
    field::json_type_name,
    schema::{CREATED_AT, ID_FIELD, UPDATED_AT},
    Schema,
};
use serde_json::{Map, Value};

/// A document that passed validation and has its defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDocument(Map<String, Value>);

impl ValidatedDocument {
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_fields(self) -> Map<String, Value> {
        self.0
    }
}

impl Schema {
    /// Validate a full document for insertion.
    ///
    /// Required fields are checked before defaults are resolved, then the type
    /// of every present field is checked. Fields the schema does not declare
    /// are passed through unchanged. Caller-supplied timestamps are dropped.
    pub fn validate(&self, input: Value) -> Result<ValidatedDocument> {
        let mut document = into_object(input)?;
        strip_managed(&mut document)?;

        for field in self.fields().iter().filter(|f| f.required) {
            match document.get(&field.name) {
                None | Some(Value::Null) => {
                    return Err(ValidationError::Missing {
                        field: field.name.clone(),
                    }
                    .into())
                }
                Some(_) => {}
            }
        }

        self.check_types(&document)?;
        resolve_defaults(self, &mut document)?;

        Ok(ValidatedDocument(document))
    }

    /// Validate a partial update.
    ///
    /// Only fields present in the patch are checked; defaults are not applied
    /// and required fields may not be cleared.
    pub fn validate_patch(&self, patch: Value) -> Result<Map<String, Value>> {
        let mut patch = into_object(patch)?;
        strip_managed(&mut patch)?;

        for field in self.fields().iter().filter(|f| f.required) {
            if let Some(Value::Null) = patch.get(&field.name) {
                return Err(ValidationError::Missing {
                    field: field.name.clone(),
                }
                .into());
            }
        }

        self.check_types(&patch)?;
        Ok(patch)
    }

    fn check_types(&self, document: &Map<String, Value>) -> std::result::Result<(), ValidationError> {
        for field in self.fields() {
            let Some(value) = document.get(&field.name) else {
                continue;
            };
            if value.is_null() || field.field_type.accepts(value) {
                continue;
            }
            return Err(ValidationError::TypeMismatch {
                field: field.name.clone(),
                expected: field.field_type,
                actual: json_type_name(value).to_string(),
            });
        }
        Ok(())
    }
}

fn into_object(input: Value) -> std::result::Result<Map<String, Value>, ValidationError> {
    match input {
        Value::Object(map) => Ok(map),
        other => Err(ValidationError::NotAnObject {
            actual: json_type_name(&other).to_string(),
        }),
    }
}

fn strip_managed(document: &mut Map<String, Value>) -> std::result::Result<(), ValidationError> {
    if document.contains_key(ID_FIELD) {
        return Err(ValidationError::ReservedField {
            field: ID_FIELD.to_string(),
        });
    }
    document.remove(CREATED_AT);
    document.remove(UPDATED_AT);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FieldDef, FieldType};
    use crate::Error;
    use serde_json::json;

    fn address_schema() -> Schema {
        Schema::compile(
            "addresses",
            vec![
                FieldDef::required("storeId", FieldType::String),
                FieldDef::optional("isDefault", FieldType::Boolean).with_default(json!(false)),
                FieldDef::optional("postalCode", FieldType::String),
                FieldDef::optional("location", FieldType::Object),
            ],
        )
        .unwrap()
    }

    fn reason(result: Result<impl std::fmt::Debug>) -> (Option<String>, &'static str) {
        match result {
            Err(Error::Validation(e)) => (e.field().map(str::to_string), e.reason()),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn valid_document_gets_defaults() {
        let doc = address_schema()
            .validate(json!({"storeId": "S1"}))
            .unwrap()
            .into_fields();
        assert_eq!(doc["storeId"], json!("S1"));
        assert_eq!(doc["isDefault"], json!(false));
    }

    #[test]
    fn missing_required_field() {
        let (field, code) = reason(address_schema().validate(json!({})));
        assert_eq!(field.as_deref(), Some("storeId"));
        assert_eq!(code, "missing");
    }

    #[test]
    fn null_required_field_is_missing() {
        let (field, code) = reason(address_schema().validate(json!({"storeId": null})));
        assert_eq!(field.as_deref(), Some("storeId"));
        assert_eq!(code, "missing");
    }

    #[test]
    fn wrong_type() {
        let result = address_schema().validate(json!({"storeId": "S1", "isDefault": "yes"}));
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::TypeMismatch { field, expected: FieldType::Boolean, actual }))
                if field == "isDefault" && actual == "String"
        ));
    }

    #[test]
    fn unknown_fields_pass_through() {
        let doc = address_schema()
            .validate(json!({"storeId": "S1", "legacyCode": 42, "extra": {"a": 1}}))
            .unwrap()
            .into_fields();
        assert_eq!(doc["legacyCode"], json!(42));
        assert_eq!(doc["extra"], json!({"a": 1}));
        assert_eq!(doc.len(), 4);
    }

    #[test]
    fn non_object_input_is_rejected() {
        let (field, code) = reason(address_schema().validate(json!(["S1"])));
        assert_eq!(field, None);
        assert_eq!(code, "not-an-object");
    }

    #[test]
    fn identifier_cannot_be_supplied() {
        let (field, code) = reason(address_schema().validate(json!({"storeId": "S1", "id": "x"})));
        assert_eq!(field.as_deref(), Some("id"));
        assert_eq!(code, "reserved-field");
    }

    #[test]
    fn caller_timestamps_are_dropped() {
        let doc = address_schema()
            .validate(json!({"storeId": "S1", "createdAt": 1, "updatedAt": 2}))
            .unwrap()
            .into_fields();
        assert!(!doc.contains_key("createdAt"));
        assert!(!doc.contains_key("updatedAt"));
    }

    #[test]
    fn optional_null_is_allowed() {
        let doc = address_schema()
            .validate(json!({"storeId": "S1", "postalCode": null}))
            .unwrap()
            .into_fields();
        assert_eq!(doc["postalCode"], Value::Null);
    }

    #[test]
    fn patch_checks_present_fields_only() {
        let schema = address_schema();
        let patch = schema.validate_patch(json!({"isDefault": true})).unwrap();
        assert_eq!(patch.len(), 1);
        assert!(!patch.contains_key("storeId"));

        let (field, code) = reason(schema.validate_patch(json!({"storeId": null})));
        assert_eq!(field.as_deref(), Some("storeId"));
        assert_eq!(code, "missing");

        let (field, code) = reason(schema.validate_patch(json!({"location": "north"})));
        assert_eq!(field.as_deref(), Some("location"));
        assert_eq!(code, "type-mismatch");
    }

    #[test]
    fn patch_never_carries_timestamps() {
        let patch = address_schema()
            .validate_patch(json!({"createdAt": 0, "isDefault": false}))
            .unwrap();
        assert!(!patch.contains_key("createdAt"));
    }

    // Property-based tests using proptest
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_scalar() -> impl Strategy<Value = Value> {
            prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::from),
                any::<i64>().prop_map(Value::from),
                "[a-z]{0,8}".prop_map(Value::from),
            ]
        }

        fn arb_extra_fields() -> impl Strategy<Value = Map<String, Value>> {
            prop::collection::btree_map("x[a-z]{1,6}", arb_scalar(), 0..6)
                .prop_map(|fields| fields.into_iter().collect())
        }

        proptest! {
            #[test]
            fn prop_missing_required_always_rejected(extra in arb_extra_fields()) {
                let (field, code) = reason(address_schema().validate(Value::Object(extra)));
                prop_assert_eq!(field.as_deref(), Some("storeId"));
                prop_assert_eq!(code, "missing");
            }

            #[test]
            fn prop_unknown_fields_pass_through(
                store in "[A-Z][0-9]{1,4}",
                extra in arb_extra_fields(),
            ) {
                let mut input = extra.clone();
                input.insert("storeId".into(), Value::from(store.clone()));
                let doc = address_schema().validate(Value::Object(input)).unwrap().into_fields();

                prop_assert_eq!(&doc["storeId"], &Value::from(store));
                prop_assert_eq!(&doc["isDefault"], &json!(false));
                for (key, value) in &extra {
                    prop_assert_eq!(doc.get(key), Some(value));
                }
            }
        }
    }
}
