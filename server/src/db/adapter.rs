//! PostgreSQL persistence adapter.
//!
//! Every unit of work is one database transaction. Hook writes and the
//! triggering write commit together or not at all; dropping an uncommitted
//! [`PgWork`] rolls the transaction back.

use super::documents::{
    select_query, split_fields, storage_error, unique_index_sql, update_many_query,
    StoredDocument, DOCUMENT_COLUMNS,
};
use super::pool::Pool;
use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use serde_json::{Map, Value};
use shelf_engine::{
    Capabilities, Document, DocumentStream, Error, Filter, PersistenceAdapter, Schema,
    TimestampEncoding, UnitOfWork,
};
use sqlx::{PgConnection, Postgres, Transaction};

/// Documents stored in the `documents` table.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

async fn fetch_one(
    conn: &mut PgConnection,
    collection: &str,
    id: &str,
    for_update: bool,
) -> shelf_engine::Result<Document> {
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE collection = $1 AND id = $2{}",
        if for_update { " FOR UPDATE" } else { "" }
    );
    sqlx::query_as::<_, StoredDocument>(&sql)
        .bind(collection)
        .bind(id)
        .fetch_optional(conn)
        .await
        .map_err(|e| storage_error(collection, e))?
        .map(StoredDocument::into_document)
        .ok_or_else(|| Error::not_found(collection, id))
}

async fn fetch_many(
    conn: &mut PgConnection,
    collection: &str,
    filter: &Filter,
    for_update: bool,
) -> shelf_engine::Result<Vec<Document>> {
    let mut qb = select_query(collection, filter, for_update);
    let rows = qb
        .build_query_as::<StoredDocument>()
        .fetch_all(conn)
        .await
        .map_err(|e| storage_error(collection, e))?;
    Ok(rows.into_iter().map(StoredDocument::into_document).collect())
}

#[async_trait]
impl PersistenceAdapter for PgStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            transactional: true,
            timestamps: TimestampEncoding::Rfc3339,
        }
    }

    async fn prepare(&self, schema: &Schema) -> shelf_engine::Result<()> {
        for field in schema.unique_fields() {
            let sql = unique_index_sql(schema.collection(), &field.name);
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| storage_error(schema.collection(), e))?;
            tracing::debug!(collection = %schema.collection(), field = %field.name, "ensured unique index");
        }
        Ok(())
    }

    async fn begin(&self, collection: &str) -> shelf_engine::Result<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| storage_error(collection, e))?;
        Ok(Box::new(PgWork {
            tx,
            collection: collection.to_string(),
        }))
    }

    async fn find_by_id(&self, collection: &str, id: &str) -> shelf_engine::Result<Document> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| storage_error(collection, e))?;
        fetch_one(&mut conn, collection, id, false).await
    }

    fn find_many(&self, collection: &str, filter: Filter) -> DocumentStream {
        let pool = self.pool.clone();
        let collection = collection.to_string();
        stream::once(async move {
            let mut conn = pool
                .acquire()
                .await
                .map_err(|e| storage_error(&collection, e))?;
            fetch_many(&mut conn, &collection, &filter, false).await
        })
        .map_ok(|documents| stream::iter(documents.into_iter().map(Ok)))
        .try_flatten()
        .boxed()
    }

    async fn delete(&self, collection: &str, id: &str) -> shelf_engine::Result<()> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error(collection, e))?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(collection, id));
        }
        Ok(())
    }
}

/// One transaction on one collection.
pub struct PgWork {
    tx: Transaction<'static, Postgres>,
    collection: String,
}

#[async_trait]
impl UnitOfWork for PgWork {
    fn is_atomic(&self) -> bool {
        true
    }

    async fn insert(&mut self, fields: Map<String, Value>) -> shelf_engine::Result<Document> {
        let split = split_fields(fields);
        let now = chrono::Utc::now();
        let created_at = split.created_at.unwrap_or(now);
        let updated_at = split.updated_at.unwrap_or(created_at);

        let sql = format!(
            "INSERT INTO documents (id, collection, body, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {DOCUMENT_COLUMNS}"
        );
        let row = sqlx::query_as::<_, StoredDocument>(&sql)
            .bind(uuid::Uuid::new_v4().to_string())
            .bind(&self.collection)
            .bind(Value::Object(split.body))
            .bind(created_at)
            .bind(updated_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| storage_error(&self.collection, e))?;
        Ok(row.into_document())
    }

    async fn find_by_id(&mut self, id: &str) -> shelf_engine::Result<Document> {
        fetch_one(&mut *self.tx, &self.collection, id, true).await
    }

    async fn find_many(&mut self, filter: &Filter) -> shelf_engine::Result<Vec<Document>> {
        fetch_many(&mut *self.tx, &self.collection, filter, true).await
    }

    async fn update(&mut self, id: &str, patch: Map<String, Value>) -> shelf_engine::Result<Document> {
        let split = split_fields(patch);
        let sql = format!(
            "UPDATE documents SET body = body || $1, \
             updated_at = GREATEST(COALESCE($2, updated_at), updated_at) \
             WHERE collection = $3 AND id = $4 RETURNING {DOCUMENT_COLUMNS}"
        );
        sqlx::query_as::<_, StoredDocument>(&sql)
            .bind(Value::Object(split.body))
            .bind(split.updated_at)
            .bind(&self.collection)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| storage_error(&self.collection, e))?
            .map(StoredDocument::into_document)
            .ok_or_else(|| Error::not_found(&self.collection, id))
    }

    async fn update_many(&mut self, filter: &Filter, patch: Map<String, Value>) -> shelf_engine::Result<u64> {
        let mut qb = update_many_query(&self.collection, filter, split_fields(patch));
        let result = qb
            .build()
            .execute(&mut *self.tx)
            .await
            .map_err(|e| storage_error(&self.collection, e))?;
        Ok(result.rows_affected())
    }

    async fn commit(self: Box<Self>) -> shelf_engine::Result<()> {
        let PgWork { tx, collection } = *self;
        tx.commit()
            .await
            .map_err(|e| storage_error(&collection, e))
    }

    async fn rollback(self: Box<Self>) -> shelf_engine::Result<()> {
        let PgWork { tx, collection } = *self;
        tx.rollback()
            .await
            .map_err(|e| storage_error(&collection, e))
    }
}
