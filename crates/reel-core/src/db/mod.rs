// ── Database seam ──
//
// `Database` is the raw, JSON-level contract a storage client implements.
// `Table<R>` layers typed (de)serialization for one table on top of it.
// Neither adds semantics: ids, uniqueness, and constraints belong to the
// implementation.

mod memory;

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

pub use memory::MemoryDatabase;

/// Numeric primary key.
pub type RecordId = i64;

/// Failures reported by a database client.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("{table} record {id} not found")]
    NotFound { table: String, id: RecordId },

    #[error("invalid payload for {table}: {reason}")]
    InvalidPayload { table: String, reason: String },

    #[error("constraint violation on {table}: {message}")]
    Constraint { table: String, message: String },

    #[error("database unavailable: {0}")]
    Connection(String),

    #[error("record (de)serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DbError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Raw storage client.
///
/// Records are JSON objects carrying a numeric `id` field.
#[async_trait]
pub trait Database: Send + Sync {
    async fn find_all(&self, table: &str) -> Result<Vec<Value>, DbError>;

    async fn find_by_id(&self, table: &str, id: RecordId) -> Result<Option<Value>, DbError>;

    /// Insert `data` and return the stored record (with its generated id).
    async fn create(&self, table: &str, data: Value) -> Result<Value, DbError>;

    /// Apply the fields in `data` to record `id` and return the result.
    async fn update(&self, table: &str, id: RecordId, data: Value) -> Result<Value, DbError>;

    async fn delete(&self, table: &str, id: RecordId) -> Result<(), DbError>;
}

/// Typed view of one table.
pub struct Table<R> {
    db: Arc<dyn Database>,
    name: &'static str,
    _record: PhantomData<fn() -> R>,
}

impl<R> Clone for Table<R> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            name: self.name,
            _record: PhantomData,
        }
    }
}

impl<R: DeserializeOwned> Table<R> {
    pub fn new(db: Arc<dyn Database>, name: &'static str) -> Self {
        Self {
            db,
            name,
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub async fn find_all(&self) -> Result<Vec<R>, DbError> {
        let rows = self.db.find_all(self.name).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(DbError::from))
            .collect()
    }

    pub async fn find_by_id(&self, id: RecordId) -> Result<Option<R>, DbError> {
        match self.db.find_by_id(self.name, id).await? {
            Some(row) => Ok(Some(serde_json::from_value(row)?)),
            None => Ok(None),
        }
    }

    pub async fn create<D: Serialize + Sync>(&self, data: &D) -> Result<R, DbError> {
        let payload = serde_json::to_value(data)?;
        let row = self.db.create(self.name, payload).await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn update<D: Serialize + Sync>(&self, id: RecordId, data: &D) -> Result<R, DbError> {
        let payload = serde_json::to_value(data)?;
        let row = self.db.update(self.name, id, payload).await?;
        Ok(serde_json::from_value(row)?)
    }

    pub async fn delete(&self, id: RecordId) -> Result<(), DbError> {
        self.db.delete(self.name, id).await
    }
}
