//! Row mapping and SQL building for the documents table.
//!
//! A document is stored as its identifier, a JSONB body and two native
//! timestamp columns. `createdAt`/`updatedAt` are split out of the fields on
//! write and put back, as RFC 3339 strings, on read.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use shelf_engine::{Document, Error, Filter, SortDirection, TimestampEncoding, CREATED_AT, UPDATED_AT};
use sqlx::{Postgres, QueryBuilder, Row};

/// Columns selected for every document read.
pub const DOCUMENT_COLUMNS: &str = "id, body, created_at, updated_at";

/// A stored document row from the database.
#[derive(Debug)]
pub struct StoredDocument {
    pub id: String,
    pub body: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredDocument {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredDocument {
            id: row.try_get("id")?,
            body: row.try_get("body")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredDocument {
    /// Convert a database row to an engine document.
    pub fn into_document(self) -> Document {
        let mut fields = match self.body {
            Value::Object(fields) => fields,
            _ => Map::new(),
        };
        fields.insert(CREATED_AT.to_string(), TimestampEncoding::Rfc3339.encode(self.created_at));
        fields.insert(UPDATED_AT.to_string(), TimestampEncoding::Rfc3339.encode(self.updated_at));
        Document::new(self.id, fields)
    }
}

/// Document fields with the managed timestamps taken out.
#[derive(Debug, Default, PartialEq)]
pub struct SplitFields {
    pub body: Map<String, Value>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub fn split_fields(mut fields: Map<String, Value>) -> SplitFields {
    let created_at = fields.remove(CREATED_AT).as_ref().and_then(TimestampEncoding::decode);
    let updated_at = fields.remove(UPDATED_AT).as_ref().and_then(TimestampEncoding::decode);
    SplitFields {
        body: fields,
        created_at,
        updated_at,
    }
}

fn timestamp_column(field: &str) -> Option<&'static str> {
    match field {
        CREATED_AT => Some("created_at"),
        UPDATED_AT => Some("updated_at"),
        _ => None,
    }
}

/// Append `WHERE ...` for one collection and a filter's conditions.
///
/// Scalar conditions become one JSONB containment test so the GIN index
/// applies. Arrays and objects compare with `=` since containment would also
/// accept supersets.
pub fn push_where(qb: &mut QueryBuilder<'_, Postgres>, collection: &str, filter: &Filter) {
    qb.push(" WHERE collection = ").push_bind(collection.to_string());

    let mut contained = Map::new();
    for (field, expected) in &filter.conditions {
        if let Some(column) = timestamp_column(field) {
            match TimestampEncoding::decode(expected) {
                Some(at) => {
                    qb.push(format!(" AND {column} = ")).push_bind(at);
                }
                None => {
                    qb.push(" AND FALSE");
                }
            }
            continue;
        }
        match expected {
            Value::Array(_) | Value::Object(_) => {
                qb.push(" AND body -> ")
                    .push_bind(field.clone())
                    .push(" = ")
                    .push_bind(expected.clone());
            }
            _ => {
                contained.insert(field.clone(), expected.clone());
            }
        }
    }
    if !contained.is_empty() {
        qb.push(" AND body @> ").push_bind(Value::Object(contained));
    }

    if let Some(id) = &filter.exclude_id {
        qb.push(" AND id <> ").push_bind(id.clone());
    }
}

/// Append `ORDER BY`, `LIMIT` and `OFFSET`.
///
/// Insertion order breaks ties. Missing fields sort first ascending, last
/// descending, matching the in-memory store.
pub fn push_order(qb: &mut QueryBuilder<'_, Postgres>, filter: &Filter) {
    qb.push(" ORDER BY ");
    if let Some(sort) = &filter.sort {
        let direction = match sort.direction {
            SortDirection::Asc => "ASC NULLS FIRST",
            SortDirection::Desc => "DESC NULLS LAST",
        };
        match timestamp_column(&sort.field) {
            Some(column) => {
                qb.push(format!("{column} {direction}, "));
            }
            None => {
                qb.push("body -> ")
                    .push_bind(sort.field.clone())
                    .push(format!(" {direction}, "));
            }
        }
    }
    qb.push("seq ASC");

    if let Some(limit) = filter.limit {
        qb.push(" LIMIT ").push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
    }
    if let Some(skip) = filter.skip {
        qb.push(" OFFSET ").push_bind(i64::try_from(skip).unwrap_or(i64::MAX));
    }
}

/// `SELECT` for a filtered read, optionally locking the rows.
pub fn select_query<'a>(collection: &str, filter: &Filter, for_update: bool) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT {DOCUMENT_COLUMNS} FROM documents"));
    push_where(&mut qb, collection, filter);
    push_order(&mut qb, filter);
    if for_update {
        qb.push(" FOR UPDATE");
    }
    qb
}

/// `UPDATE` merging `patch` into every matching row.
///
/// `updated_at` only moves forward, whatever the caller's clock says.
pub fn update_many_query<'a>(collection: &str, filter: &Filter, patch: SplitFields) -> QueryBuilder<'a, Postgres> {
    let mut qb = QueryBuilder::new("UPDATE documents SET body = body || ");
    qb.push_bind(Value::Object(patch.body));
    qb.push(", updated_at = GREATEST(COALESCE(")
        .push_bind(patch.updated_at)
        .push(", updated_at), updated_at)");
    push_where(&mut qb, collection, filter);
    qb
}

/// Name of the partial unique index backing a unique field.
pub fn unique_index_name(collection: &str, field: &str) -> String {
    format!("uniq_{collection}_{field}")
}

/// DDL for a unique field of one collection.
///
/// Collection and field names are validated identifiers, so they can be
/// spliced into the statement.
pub fn unique_index_sql(collection: &str, field: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS {} ON documents ((body ->> '{field}')) WHERE collection = '{collection}'",
        unique_index_name(collection, field)
    )
}

/// Check if an error is a unique constraint violation.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = e {
        // PostgreSQL unique violation code is "23505"
        db_err.code().map(|c| c == "23505").unwrap_or(false)
    } else {
        false
    }
}

/// Translate a sqlx error into the engine's taxonomy.
pub fn storage_error(collection: &str, e: sqlx::Error) -> Error {
    if is_unique_violation(&e) {
        let detail = match &e {
            sqlx::Error::Database(db_err) => db_err
                .constraint()
                .map(str::to_string)
                .unwrap_or_else(|| db_err.message().to_string()),
            _ => e.to_string(),
        };
        return Error::conflict(collection, detail);
    }
    match e {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_) => Error::BackendUnavailable(e.to_string()),
        other => Error::Storage(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn split_takes_out_managed_timestamps() {
        let mut fields = Map::new();
        fields.insert("storeId".into(), json!("S1"));
        fields.insert(CREATED_AT.into(), json!("2024-02-01T00:00:00.000Z"));
        fields.insert(UPDATED_AT.into(), json!(1_706_745_600_000i64));

        let split = split_fields(fields);
        assert_eq!(split.body.len(), 1);
        assert_eq!(split.created_at, split.updated_at);
        assert!(split.created_at.is_some());
    }

    #[test]
    fn row_round_trips_into_document() {
        let at = DateTime::from_timestamp_millis(1_706_745_600_123).unwrap();
        let row = StoredDocument {
            id: "a-1".into(),
            body: json!({"storeId": "S1"}),
            created_at: at,
            updated_at: at,
        };
        let document = row.into_document();
        assert_eq!(document.id, "a-1");
        assert_eq!(document.created_at(), Some(&json!("2024-02-01T00:00:00.123Z")));
    }

    #[test]
    fn where_clause_for_hook_filter() {
        let filter = Filter::new()
            .eq("storeId", "S1")
            .eq("isDefault", true)
            .excluding("a-1");
        let qb = select_query("addresses", &filter, true);
        assert_eq!(
            qb.sql(),
            "SELECT id, body, created_at, updated_at FROM documents \
             WHERE collection = $1 AND body @> $2 AND id <> $3 ORDER BY seq ASC FOR UPDATE"
        );
    }

    #[test]
    fn structured_and_timestamp_conditions() {
        let filter = Filter::new()
            .eq("tags", json!(["a"]))
            .eq(CREATED_AT, "not a timestamp");
        let qb = select_query("products", &filter, false);
        assert_eq!(
            qb.sql(),
            "SELECT id, body, created_at, updated_at FROM documents \
             WHERE collection = $1 AND body -> $2 = $3 AND FALSE ORDER BY seq ASC"
        );
    }

    #[test]
    fn order_limit_and_offset() {
        let filter = Filter::new()
            .sort_by("price", SortDirection::Desc)
            .limit(10)
            .skip(20);
        let qb = select_query("products", &filter, false);
        assert!(qb.sql().ends_with(
            "ORDER BY body -> $2 DESC NULLS LAST, seq ASC LIMIT $3 OFFSET $4"
        ));

        let by_creation = Filter::new().sort_by(CREATED_AT, SortDirection::Asc);
        let qb = select_query("products", &by_creation, false);
        assert!(qb.sql().ends_with("ORDER BY created_at ASC NULLS FIRST, seq ASC"));
    }

    #[test]
    fn update_many_statement() {
        let mut patch = Map::new();
        patch.insert("isDefault".into(), json!(false));
        patch.insert(UPDATED_AT.into(), json!("2024-02-01T00:00:00.000Z"));
        let filter = Filter::new().eq("storeId", "S1").eq("isDefault", true);

        let qb = update_many_query("addresses", &filter, split_fields(patch));
        assert_eq!(
            qb.sql(),
            "UPDATE documents SET body = body || $1, \
             updated_at = GREATEST(COALESCE($2, updated_at), updated_at) \
             WHERE collection = $3 AND body @> $4"
        );
    }

    #[test]
    fn unique_index_ddl() {
        assert_eq!(
            unique_index_sql("payments", "orderId"),
            "CREATE UNIQUE INDEX IF NOT EXISTS uniq_payments_orderId ON documents \
             ((body ->> 'orderId')) WHERE collection = 'payments'"
        );
    }

    #[test]
    fn transport_errors_are_retryable() {
        assert!(storage_error("orders", sqlx::Error::PoolTimedOut).is_retryable());
        assert!(matches!(
            storage_error("orders", sqlx::Error::RowNotFound),
            Error::Storage(_)
        ));
    }
}
