// ── Cinema accessor ──
//
// Stateless CRUD facade over the `cinemas` table. Every call is a straight
// pass-through: failures come back exactly as the database reported them.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::db::{Database, DbError, RecordId, Table};

const TABLE: &str = "cinemas";

/// A cinema as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cinema {
    pub id: RecordId,
    pub name: String,
    /// Display color, e.g. `"#1e90ff"`.
    pub color: String,
}

/// Payload for [`Cinemas::create_cinema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCinema {
    pub name: String,
    pub color: String,
}

/// Partial payload for [`Cinemas::update_cinema`]. Absent fields are left as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CinemaPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

/// Data access for cinemas.
#[derive(Clone)]
pub struct Cinemas {
    table: Table<Cinema>,
}

impl Cinemas {
    pub fn new(db: Arc<dyn Database>) -> Self {
        Self {
            table: Table::new(db, TABLE),
        }
    }

    pub async fn all_cinemas(&self) -> Result<Vec<Cinema>, DbError> {
        self.table.find_all().await
    }

    /// `Ok(None)` when no cinema has this id.
    pub async fn cinema_by_id(&self, id: RecordId) -> Result<Option<Cinema>, DbError> {
        self.table.find_by_id(id).await
    }

    pub async fn create_cinema(&self, data: &NewCinema) -> Result<Cinema, DbError> {
        self.table.create(data).await
    }

    pub async fn update_cinema(&self, id: RecordId, data: &CinemaPatch) -> Result<Cinema, DbError> {
        self.table.update(id, data).await
    }

    pub async fn delete_cinema(&self, id: RecordId) -> Result<(), DbError> {
        self.table.delete(id).await
    }
}
