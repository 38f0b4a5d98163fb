//! CRUD endpoints over the model catalog.
//!
//! ```text
//! GET    /api/{collection}        list (query parameters filter)
//! POST   /api/{collection}        create
//! GET    /api/{collection}/{id}   fetch
//! PATCH  /api/{collection}/{id}   partial update
//! DELETE /api/{collection}/{id}   delete
//! ```

use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::Value;
use shelf_engine::{FieldType, Filter, Model, Schema, SortDirection, WriteReport};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::AppState;

/// Names the hooks that still need reconciling after a best-effort write.
pub const RECONCILIATION_HEADER: &str = "x-reconciliation-needed";

/// Create collection routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/{collection}", get(list).post(create))
        .route(
            "/api/{collection}/{id}",
            get(fetch).patch(update).delete(remove),
        )
}

fn model<'a>(state: &'a AppState, collection: &str) -> Result<&'a Arc<Model>> {
    state
        .registry
        .get(collection)
        .ok_or_else(|| AppError::UnknownCollection(collection.to_string()))
}

/// Build a filter from list query parameters.
///
/// `_sort`, `_order`, `_limit` and `_skip` are reserved. Every other parameter
/// is an equality condition. Values of string fields are kept verbatim; any
/// other value is parsed as JSON when it can be (`true`, `12`, `null`) and
/// taken as a string otherwise.
pub fn filter_from_query(schema: &Schema, params: Vec<(String, String)>) -> Result<Filter> {
    let mut filter = Filter::new();
    let mut sort = None;
    let mut direction = SortDirection::Asc;

    for (key, raw) in params {
        match key.as_str() {
            "_sort" => sort = Some(raw),
            "_order" => {
                direction = match raw.to_ascii_lowercase().as_str() {
                    "asc" => SortDirection::Asc,
                    "desc" => SortDirection::Desc,
                    _ => return Err(AppError::BadRequest(format!("invalid _order '{raw}'"))),
                }
            }
            "_limit" => filter = filter.limit(parse_count(&key, &raw)?),
            "_skip" => filter = filter.skip(parse_count(&key, &raw)?),
            _ => {
                let value = condition_value(schema, &key, raw);
                filter = filter.eq(key, value);
            }
        }
    }

    if let Some(field) = sort {
        filter = filter.sort_by(field, direction);
    }
    Ok(filter)
}

fn condition_value(schema: &Schema, field: &str, raw: String) -> Value {
    match schema.field(field).map(|f| f.field_type) {
        Some(FieldType::String) => Value::String(raw),
        _ => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
    }
}

fn parse_count(key: &str, raw: &str) -> Result<usize> {
    raw.parse()
        .map_err(|_| AppError::BadRequest(format!("{key} must be a non-negative integer")))
}

/// Redacted document body, flagged when invariants need reconciling.
fn written(state: &AppState, collection: &str, status: StatusCode, report: WriteReport) -> Response {
    let hooks: Vec<&str> = report
        .reconciliation
        .iter()
        .map(|r| r.hook.as_str())
        .collect();
    let header = (!hooks.is_empty())
        .then(|| HeaderValue::from_str(&hooks.join(",")).ok())
        .flatten();

    let mut response = (
        status,
        Json(state.accounts.redact(collection, report.document)),
    )
        .into_response();
    if let Some(value) = header {
        response.headers_mut().insert(RECONCILIATION_HEADER, value);
    }
    response
}

/// GET /api/{collection} - List matching documents.
async fn list(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Value>>> {
    let model = model(&state, &collection)?;
    let filter = filter_from_query(model.schema(), params)?;
    let documents = model.find_all(filter).await?;
    Ok(Json(
        documents
            .into_iter()
            .map(|d| state.accounts.redact(&collection, d))
            .collect(),
    ))
}

/// POST /api/{collection} - Create a document.
async fn create(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(input): Json<Value>,
) -> Result<Response> {
    let model = model(&state, &collection)?;
    let report = if state.accounts.guards(&collection) {
        state.accounts.register(model, input).await?
    } else {
        model.create_reported(input).await?
    };
    Ok(written(&state, &collection, StatusCode::CREATED, report))
}

/// GET /api/{collection}/{id} - Fetch one document.
async fn fetch(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let document = model(&state, &collection)?.find_by_id(&id).await?;
    Ok(Json(state.accounts.redact(&collection, document)))
}

/// PATCH /api/{collection}/{id} - Apply a partial update.
async fn update(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<Value>,
) -> Result<Response> {
    let model = model(&state, &collection)?;
    let report = if state.accounts.guards(&collection) {
        state.accounts.update(model, &id, patch).await?
    } else {
        model.update_reported(&id, patch).await?
    };
    Ok(written(&state, &collection, StatusCode::OK, report))
}

/// DELETE /api/{collection}/{id} - Remove a document.
async fn remove(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<StatusCode> {
    model(&state, &collection)?.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
