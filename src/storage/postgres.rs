use async_trait::async_trait;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Jsonb};
use serde_json::Value;

use crate::db::PgPool;
use crate::models::{JsonRow, Record};
use crate::schema::{EntitySchema, Relation, CONVERSATIONS, ID_COLUMN, MESSAGES};

use super::{RecordStore, StoreError, StoreResult};

/// Postgres-backed store. Values travel as one `jsonb` parameter and are
/// coerced to column types by `jsonb_populate_record`; rows come back as
/// `to_jsonb(row)`. Table and column names only ever come from the static
/// entity catalog.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

fn into_records(schema: &'static EntitySchema, rows: Vec<JsonRow>) -> StoreResult<Vec<Record>> {
    rows.into_iter()
        .map(|row| {
            row.into_record()
                .ok_or(StoreError::MalformedRow(schema.table))
        })
        .collect()
}

#[async_trait]
impl RecordStore for PgStore {
    async fn list(&self, schema: &'static EntitySchema) -> StoreResult<Vec<Record>> {
        self.with_conn(move |conn| {
            let rows: Vec<JsonRow> = diesel::sql_query(select_sql(schema, None)).load(conn)?;
            into_records(schema, rows)
        })
        .await
    }

    async fn list_related(
        &self,
        schema: &'static EntitySchema,
        relation: &'static Relation,
        parent_id: i64,
    ) -> StoreResult<Vec<Record>> {
        self.with_conn(move |conn| {
            let rows: Vec<JsonRow> = diesel::sql_query(select_sql(schema, Some(relation.column)))
                .bind::<BigInt, _>(parent_id)
                .load(conn)?;
            into_records(schema, rows)
        })
        .await
    }

    async fn find(&self, schema: &'static EntitySchema, id: i64) -> StoreResult<Option<Record>> {
        self.with_conn(move |conn| {
            let row: Option<JsonRow> = diesel::sql_query(find_sql(schema))
                .bind::<BigInt, _>(id)
                .get_result(conn)
                .optional()?;
            row.map(|row| row.into_record().ok_or(StoreError::MalformedRow(schema.table)))
                .transpose()
        })
        .await
    }

    async fn insert(&self, schema: &'static EntitySchema, fields: Record) -> StoreResult<Record> {
        self.with_conn(move |conn| {
            let row: JsonRow = diesel::sql_query(insert_sql(schema))
                .bind::<Jsonb, _>(Value::Object(fields))
                .get_result(conn)?;
            row.into_record()
                .ok_or(StoreError::MalformedRow(schema.table))
        })
        .await
    }

    async fn update(
        &self,
        schema: &'static EntitySchema,
        id: i64,
        fields: Record,
    ) -> StoreResult<Option<Record>> {
        self.with_conn(move |conn| {
            let row: Option<JsonRow> = diesel::sql_query(update_sql(schema))
                .bind::<Jsonb, _>(Value::Object(fields))
                .bind::<BigInt, _>(id)
                .get_result(conn)
                .optional()?;
            row.map(|row| row.into_record().ok_or(StoreError::MalformedRow(schema.table)))
                .transpose()
        })
        .await
    }

    async fn delete(&self, schema: &'static EntitySchema, id: i64) -> StoreResult<u64> {
        self.with_conn(move |conn| {
            let deleted = diesel::sql_query(delete_sql(schema))
                .bind::<BigInt, _>(id)
                .execute(conn)?;
            Ok(deleted as u64)
        })
        .await
    }

    async fn conversation_summaries(&self) -> StoreResult<Vec<Record>> {
        self.with_conn(|conn| {
            let rows: Vec<JsonRow> = diesel::sql_query(conversation_summaries_sql()).load(conn)?;
            into_records(&CONVERSATIONS, rows)
        })
        .await
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn column_list(schema: &EntitySchema) -> String {
    schema
        .columns
        .iter()
        .map(|column| quote(column))
        .collect::<Vec<_>>()
        .join(", ")
}

fn order_clause(schema: &EntitySchema, alias: &str) -> String {
    let direction = schema.order.direction.as_sql();
    if schema.order.column == ID_COLUMN {
        format!("ORDER BY {alias}.{} {direction}", quote(ID_COLUMN))
    } else {
        format!(
            "ORDER BY {alias}.{} {direction}, {alias}.{} {direction}",
            quote(schema.order.column),
            quote(ID_COLUMN)
        )
    }
}

pub(crate) fn select_sql(schema: &EntitySchema, filter_column: Option<&str>) -> String {
    let filter = filter_column
        .map(|column| format!(" WHERE t.{} = $1", quote(column)))
        .unwrap_or_default();
    format!(
        "SELECT to_jsonb(t) AS record FROM {} t{filter} {}",
        quote(schema.table),
        order_clause(schema, "t")
    )
}

pub(crate) fn find_sql(schema: &EntitySchema) -> String {
    format!(
        "SELECT to_jsonb(t) AS record FROM {} t WHERE t.{} = $1",
        quote(schema.table),
        quote(ID_COLUMN)
    )
}

pub(crate) fn insert_sql(schema: &EntitySchema) -> String {
    let table = quote(schema.table);
    let columns = column_list(schema);
    format!(
        "WITH t AS (INSERT INTO {table} ({columns}) \
         SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
         RETURNING *) \
         SELECT to_jsonb(t) AS record FROM t"
    )
}

pub(crate) fn update_sql(schema: &EntitySchema) -> String {
    let table = quote(schema.table);
    let columns = column_list(schema);
    format!(
        "WITH t AS (UPDATE {table} SET ({columns}) = \
         (SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1)) \
         WHERE {} = $2 RETURNING *) \
         SELECT to_jsonb(t) AS record FROM t",
        quote(ID_COLUMN)
    )
}

pub(crate) fn delete_sql(schema: &EntitySchema) -> String {
    format!(
        "DELETE FROM {} WHERE {} = $1",
        quote(schema.table),
        quote(ID_COLUMN)
    )
}

pub(crate) fn conversation_summaries_sql() -> String {
    format!(
        "SELECT to_jsonb(s) AS record FROM ( \
         SELECT c.id, c.candidate_id, c.subject, c.created_at, \
         (ARRAY_AGG(m.message ORDER BY m.created_at DESC, m.id DESC))[1] AS last_message, \
         MAX(m.created_at) AS last_message_at, \
         COUNT(m.id) AS message_count \
         FROM {conversations} c \
         LEFT JOIN {messages} m ON m.{fk} = c.id \
         GROUP BY c.id \
         ) s \
         ORDER BY s.last_message_at DESC NULLS LAST, s.id DESC",
        conversations = quote(CONVERSATIONS.table),
        messages = quote(MESSAGES.table),
        fk = quote(crate::schema::CONVERSATION_MESSAGES.column),
    )
}
