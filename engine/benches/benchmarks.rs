//! Performance benchmarks for shelf-engine

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Map, Value};
use shelf_engine::{
    resolve_defaults, FieldDef, FieldType, Filter, MemoryStore, Model, Schema, SingleDefault,
};
use std::sync::Arc;
use tokio::runtime::Runtime;

fn create_test_schema() -> Schema {
    Schema::compile(
        "stores",
        vec![
            FieldDef::required("name", FieldType::String),
            FieldDef::optional("email", FieldType::String),
            FieldDef::optional("rating", FieldType::Number).with_default(json!(0)),
            FieldDef::optional("landingPage", FieldType::Object).with_default(json!({
                "hero": {"title": "Welcome", "image": null},
                "sections": [{"kind": "featured", "limit": 8}],
            })),
        ],
    )
    .unwrap()
}

fn bench_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");
    let schema = create_test_schema();

    group.bench_function("validate_minimal", |b| {
        b.iter(|| schema.validate(black_box(json!({"name": "Shop"}))))
    });

    group.bench_function("validate_full", |b| {
        let input = json!({
            "name": "Shop",
            "email": "owner@example.com",
            "rating": 4.5,
            "landingPage": {"hero": {"title": "Hi"}, "sections": []},
        });
        b.iter(|| schema.validate(black_box(input.clone())))
    });

    group.bench_function("validate_rejected", |b| {
        b.iter(|| schema.validate(black_box(json!({"email": "owner@example.com"}))))
    });

    group.bench_function("resolve_defaults", |b| {
        b.iter(|| {
            let mut fields = Map::new();
            fields.insert("name".into(), Value::from("Shop"));
            resolve_defaults(&schema, black_box(&mut fields))
        })
    });

    group.finish();
}

fn address_model(store: &MemoryStore) -> Model {
    Model::define(
        "addresses",
        vec![
            FieldDef::required("storeId", FieldType::String),
            FieldDef::optional("isDefault", FieldType::Boolean).with_default(json!(false)),
        ],
        Arc::new(store.clone()),
    )
    .unwrap()
    .hook(SingleDefault::new("storeId", "isDefault"))
    .build()
}

fn bench_model_operations(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("model_operations");

    group.bench_function("create_without_hook", |b| {
        let store = MemoryStore::new();
        let model = address_model(&store);
        b.iter(|| rt.block_on(model.create(black_box(json!({"storeId": "S1"})))))
    });

    for size in [10usize, 100, 1000].iter() {
        group.bench_with_input(BenchmarkId::new("create_default", size), size, |b, &size| {
            let store = MemoryStore::new();
            let model = address_model(&store);
            rt.block_on(async {
                for _ in 0..size {
                    model.create(json!({"storeId": "S1"})).await.unwrap();
                }
            });
            b.iter(|| {
                rt.block_on(model.create(black_box(json!({"storeId": "S1", "isDefault": true}))))
            })
        });

        group.bench_with_input(BenchmarkId::new("find_by_parent", size), size, |b, &size| {
            let store = MemoryStore::new();
            let model = address_model(&store);
            rt.block_on(async {
                for i in 0..size {
                    model
                        .create(json!({"storeId": format!("S{}", i % 10)}))
                        .await
                        .unwrap();
                }
            });
            b.iter(|| rt.block_on(model.find_all(black_box(Filter::new().eq("storeId", "S3")))))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_validation, bench_model_operations);
criterion_main!(benches);
