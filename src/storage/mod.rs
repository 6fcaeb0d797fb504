use async_trait::async_trait;
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use crate::models::Record;
use crate::schema::{EntitySchema, Relation};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("database error: {0}")]
    Query(DieselError),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("invalid value: {0}")]
    InvalidValue(String),
    #[error("storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("malformed row returned from {0}")]
    MalformedRow(&'static str),
}

impl From<DieselError> for StoreError {
    fn from(value: DieselError) -> Self {
        match value {
            DieselError::DatabaseError(
                DatabaseErrorKind::UniqueViolation
                | DatabaseErrorKind::ForeignKeyViolation
                | DatabaseErrorKind::NotNullViolation
                | DatabaseErrorKind::CheckViolation,
                info,
            ) => StoreError::Constraint(info.message().to_string()),
            other => StoreError::Query(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Row storage behind the HTTP handlers. Each method is one atomic statement
/// against the backing database; identity and `created_at` are assigned by
/// the store.
#[async_trait]
pub trait RecordStore: Send + Sync + 'static {
    async fn list(&self, schema: &'static EntitySchema) -> StoreResult<Vec<Record>>;

    async fn list_related(
        &self,
        schema: &'static EntitySchema,
        relation: &'static Relation,
        parent_id: i64,
    ) -> StoreResult<Vec<Record>>;

    /// Raw row lookup, secrets included. Never hand the result to a client
    /// without passing it through [`EntitySchema::present`].
    async fn find(&self, schema: &'static EntitySchema, id: i64) -> StoreResult<Option<Record>>;

    async fn insert(&self, schema: &'static EntitySchema, fields: Record) -> StoreResult<Record>;

    /// `Ok(None)` when no row has this id.
    async fn update(
        &self,
        schema: &'static EntitySchema,
        id: i64,
        fields: Record,
    ) -> StoreResult<Option<Record>>;

    /// Returns the number of rows removed from `schema`'s table.
    async fn delete(&self, schema: &'static EntitySchema, id: i64) -> StoreResult<u64>;

    /// One row per conversation with its latest message, most recent
    /// activity first.
    async fn conversation_summaries(&self) -> StoreResult<Vec<Record>>;
}
