// ── In-memory database ──
//
// Concurrent per-table storage for tests and local development.
// Ids are assigned per table from a monotonically increasing counter.

use std::collections::BTreeMap;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value};

use super::{Database, DbError, RecordId};

#[derive(Default)]
struct MemoryTable {
    last_id: RecordId,
    rows: BTreeMap<RecordId, Map<String, Value>>,
}

/// `Database` backed by process memory.
///
/// Listing order is ascending id. `update` merges the given fields into the
/// stored record; `id` itself is never overwritten.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: DashMap<String, MemoryTable>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of rows currently stored in `table`.
    pub fn len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |t| t.rows.len())
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

fn into_object(table: &str, data: Value) -> Result<Map<String, Value>, DbError> {
    match data {
        Value::Object(map) => Ok(map),
        other => Err(DbError::InvalidPayload {
            table: table.to_owned(),
            reason: format!("expected a JSON object, got {}", json_kind(&other)),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn find_all(&self, table: &str) -> Result<Vec<Value>, DbError> {
        Ok(self
            .tables
            .get(table)
            .map(|t| t.rows.values().cloned().map(Value::Object).collect())
            .unwrap_or_default())
    }

    async fn find_by_id(&self, table: &str, id: RecordId) -> Result<Option<Value>, DbError> {
        Ok(self
            .tables
            .get(table)
            .and_then(|t| t.rows.get(&id).cloned())
            .map(Value::Object))
    }

    async fn create(&self, table: &str, data: Value) -> Result<Value, DbError> {
        let mut record = into_object(table, data)?;

        let mut entry = self.tables.entry(table.to_owned()).or_default();
        entry.last_id += 1;
        let id = entry.last_id;
        record.insert("id".into(), Value::from(id));
        entry.rows.insert(id, record.clone());

        tracing::debug!(table, id, "record created");
        Ok(Value::Object(record))
    }

    async fn update(&self, table: &str, id: RecordId, data: Value) -> Result<Value, DbError> {
        let changes = into_object(table, data)?;
        let not_found = || DbError::NotFound {
            table: table.to_owned(),
            id,
        };

        let mut entry = self.tables.get_mut(table).ok_or_else(not_found)?;
        let record = entry.rows.get_mut(&id).ok_or_else(not_found)?;
        for (key, value) in changes {
            if key != "id" {
                record.insert(key, value);
            }
        }

        tracing::debug!(table, id, "record updated");
        Ok(Value::Object(record.clone()))
    }

    async fn delete(&self, table: &str, id: RecordId) -> Result<(), DbError> {
        let removed = self
            .tables
            .get_mut(table)
            .and_then(|mut t| t.rows.remove(&id));

        match removed {
            Some(_) => {
                tracing::debug!(table, id, "record deleted");
                Ok(())
            }
            None => Err(DbError::NotFound {
                table: table.to_owned(),
                id,
            }),
        }
    }
}
