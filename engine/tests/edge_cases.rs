//! Edge case tests for shelf-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use serde_json::{json, Value};
use shelf_engine::{
    Error, FieldDef, FieldType, Filter, MemoryStore, Model, ModelRegistry, Schema,
    SchemaDefinitionError, SingleDefault,
};
use std::sync::Arc;

fn items(store: &MemoryStore) -> Model {
    Model::define(
        "items",
        vec![
            FieldDef::required("name", FieldType::String),
            FieldDef::optional("count", FieldType::Number),
            FieldDef::optional("data", FieldType::Object),
        ],
        Arc::new(store.clone()),
    )
    .unwrap()
    .build()
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[tokio::test]
async fn empty_string_satisfies_required() {
    let store = MemoryStore::new();
    let model = items(&store);

    let doc = model.create(json!({"name": ""})).await.unwrap();
    assert_eq!(doc.get("name"), Some(&json!("")));
}

#[tokio::test]
async fn unicode_strings() {
    let store = MemoryStore::new();
    let model = items(&store);

    let names = [
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Hello\nWorld\tTab",
        "Null\0Test",
    ];

    for name in names {
        let created = model.create(json!({"name": name})).await.unwrap();
        let found = model.find_by_id(&created.id).await.unwrap();
        assert_eq!(found.get("name"), Some(&json!(name)), "failed for {name:?}");
    }
}

#[tokio::test]
async fn very_long_strings() {
    let store = MemoryStore::new();
    let model = items(&store);

    let name = "x".repeat(1_000_000);
    let doc = model.create(json!({"name": name})).await.unwrap();
    assert_eq!(doc.get("name").and_then(Value::as_str).map(str::len), Some(1_000_000));
}

// ============================================================================
// Number and Nesting Edge Cases
// ============================================================================

#[tokio::test]
async fn number_boundaries() {
    let store = MemoryStore::new();
    let model = items(&store);

    for count in [json!(i64::MAX), json!(i64::MIN), json!(0), json!(-0.5), json!(1e300)] {
        let doc = model
            .create(json!({"name": "n", "count": count.clone()}))
            .await
            .unwrap();
        assert_eq!(doc.get("count"), Some(&count));
    }
}

#[tokio::test]
async fn deeply_nested_objects() {
    let store = MemoryStore::new();
    let model = items(&store);

    let mut data = json!({"leaf": true});
    for depth in 0..50 {
        data = json!({ format!("level{depth}"): data });
    }

    let doc = model
        .create(json!({"name": "deep", "data": data.clone()}))
        .await
        .unwrap();
    assert_eq!(doc.get("data"), Some(&data));
}

#[tokio::test]
async fn array_is_not_an_object() {
    let store = MemoryStore::new();
    let model = items(&store);

    let err = model
        .create(json!({"name": "n", "data": [1, 2, 3]}))
        .await
        .unwrap_err();
    match err {
        Error::Validation(e) => {
            assert_eq!(e.field(), Some("data"));
            assert_eq!(e.reason(), "type-mismatch");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

// ============================================================================
// Input Shape Edge Cases
// ============================================================================

#[tokio::test]
async fn non_object_inputs_are_rejected() {
    let store = MemoryStore::new();
    let model = items(&store);

    for input in [json!(null), json!([]), json!("name"), json!(42)] {
        let err = model.create(input.clone()).await.unwrap_err();
        match err {
            Error::Validation(e) => assert_eq!(e.reason(), "not-an-object", "input {input}"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }
    assert!(store.is_empty("items"));
}

#[tokio::test]
async fn caller_cannot_choose_identifier() {
    let store = MemoryStore::new();
    let model = items(&store);

    let err = model
        .create(json!({"id": "mine", "name": "n"}))
        .await
        .unwrap_err();
    match err {
        Error::Validation(e) => {
            assert_eq!(e.field(), Some("id"));
            assert_eq!(e.reason(), "reserved-field");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn caller_timestamps_are_replaced() {
    let store = MemoryStore::new();
    let model = items(&store);

    let doc = model
        .create(json!({"name": "n", "createdAt": 1, "updatedAt": "yesterday"}))
        .await
        .unwrap();
    assert_ne!(doc.created_at(), Some(&json!(1)));
    assert!(doc.updated_at().is_some_and(Value::is_i64));
}

#[tokio::test]
async fn empty_patch_still_touches_updated_at() {
    let store = MemoryStore::new();
    let model = items(&store);

    let doc = model.create(json!({"name": "n"})).await.unwrap();
    let updated = model.update(&doc.id, json!({})).await.unwrap();
    assert_eq!(updated.get("name"), Some(&json!("n")));
    assert!(updated.updated_at().is_some());
    assert_eq!(updated.created_at(), doc.created_at());
}

// ============================================================================
// Hook Edge Cases
// ============================================================================

#[tokio::test]
async fn null_parent_is_not_a_sibling_group() {
    let store = MemoryStore::new();
    let model = Model::define(
        "addresses",
        vec![
            FieldDef::optional("storeId", FieldType::String),
            FieldDef::optional("isDefault", FieldType::Boolean).with_default(json!(false)),
        ],
        Arc::new(store.clone()),
    )
    .unwrap()
    .hook(SingleDefault::new("storeId", "isDefault"))
    .build();

    model
        .create(json!({"storeId": null, "isDefault": true}))
        .await
        .unwrap();
    model.create(json!({"isDefault": true})).await.unwrap();

    let flagged = model
        .find_all(Filter::new().eq("isDefault", true))
        .await
        .unwrap();
    assert_eq!(flagged.len(), 2);
}

#[tokio::test]
async fn clearing_the_flag_touches_no_siblings() {
    let store = MemoryStore::new();
    let model = Model::define(
        "addresses",
        vec![
            FieldDef::required("storeId", FieldType::String),
            FieldDef::optional("isDefault", FieldType::Boolean).with_default(json!(false)),
        ],
        Arc::new(store.clone()),
    )
    .unwrap()
    .hook(SingleDefault::new("storeId", "isDefault"))
    .build();

    let keeper = model
        .create(json!({"storeId": "S1", "isDefault": true}))
        .await
        .unwrap();
    let other = model.create(json!({"storeId": "S1"})).await.unwrap();
    model
        .update(&other.id, json!({"isDefault": false}))
        .await
        .unwrap();

    let keeper = model.find_by_id(&keeper.id).await.unwrap();
    assert_eq!(keeper.get("isDefault"), Some(&json!(true)));
}

// ============================================================================
// Schema Definition Edge Cases
// ============================================================================

#[test]
fn schema_from_raw_specs() {
    let schema = Schema::from_json(
        "orders",
        &json!({
            "storeId": {"type": "string", "required": true},
            "status": {"type": "string", "default": "pending"},
            "placedAt": {"type": "timestamp", "factory": "now"},
            "notes": "string",
        }),
    )
    .unwrap();

    assert_eq!(schema.fields().len(), 4);
    assert!(schema.field("storeId").is_some_and(|f| f.required));
    assert!(schema.field("notes").is_some_and(|f| !f.required));
}

#[test]
fn conflicting_specs_fail_at_definition() {
    let err = Schema::from_json(
        "orders",
        &json!({"storeId": {"type": "string", "required": true, "default": "S1"}}),
    )
    .unwrap_err();
    assert!(matches!(err, SchemaDefinitionError::RequiredWithDefault { .. }));

    let err = Schema::from_json("orders", &json!({"total": {"type": "money"}})).unwrap_err();
    assert!(matches!(err, SchemaDefinitionError::UnknownType { .. }));

    let err = Schema::from_json("orders", &json!({"total": {"type": "number", "default": "0"}}))
        .unwrap_err();
    assert!(matches!(err, SchemaDefinitionError::DefaultTypeMismatch { .. }));
}

#[test]
fn many_models_share_one_store() {
    let store = MemoryStore::new();
    let mut registry = ModelRegistry::new();

    for i in 0..100 {
        let model = Model::define(
            format!("collection_{i}"),
            vec![FieldDef::required("name", FieldType::String)],
            Arc::new(store.clone()),
        )
        .unwrap()
        .build();
        registry.register(model).unwrap();
    }

    assert_eq!(registry.len(), 100);
    assert!(registry.get("collection_42").is_some());
}
