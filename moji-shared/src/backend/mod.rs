/// Persistence backends
///
/// The record store talks to storage only through the [`Backend`] trait, a
/// table/row store keyed by entity descriptors. Two implementations ship:
///
/// - [`MemoryBackend`]: process-local tables, for tests and local development
/// - [`PgBackend`]: PostgreSQL through a shared `sqlx` pool
///
/// Backends only store and retrieve; validation, timestamps, retries and
/// ownership checks happen above them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::record::{Fields, Filter, Record};
use crate::schema::EntityDef;

pub mod memory;
pub mod postgres;

pub use memory::MemoryBackend;
pub use postgres::PgBackend;

/// Backend result type alias
pub type BackendResult<T> = Result<T, BackendError>;

/// SQLSTATE codes worth retrying
const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

/// Backend error types
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Concurrent write conflict; the commit may succeed if repeated
    #[error("Write conflict: {0}")]
    Conflict(String),

    /// Backend temporarily unreachable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// A unique key would be violated
    #[error("Unique constraint {constraint} violated on {table}")]
    UniqueViolation {
        table: &'static str,
        constraint: String,
    },

    /// Row expected by a write does not exist
    #[error("Row {id} missing from {table}")]
    Missing { table: &'static str, id: Uuid },

    /// Stored row cannot be read back
    #[error("Malformed row in {table}: {reason}")]
    Corrupt { table: &'static str, reason: String },

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl BackendError {
    /// Whether repeating the same commit may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            BackendError::Conflict(_) | BackendError::Unavailable(_) => true,
            BackendError::Database(err) => match err {
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => true,
                sqlx::Error::Database(db) => matches!(
                    db.code().as_deref(),
                    Some(SERIALIZATION_FAILURE) | Some(DEADLOCK_DETECTED)
                ),
                _ => false,
            },
            _ => false,
        }
    }
}

/// Upper bound on rows matching a filter, checked atomically with an insert
#[derive(Debug, Clone, PartialEq)]
pub struct InsertBound {
    /// Rows counted against the limit
    pub filter: Filter,

    pub limit: u32,
}

/// Outcome of a bounded insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundedInsert {
    Inserted,

    /// Nothing was written; `current` rows already match the bound's filter
    Rejected { current: u32 },
}

/// Merges a partial write into a stored row
///
/// Shared by the backends so both apply updates the same way: only the
/// given keys change, the stamp hook sees the merged fields, and the
/// soft-delete flag is never touched.
pub(crate) fn apply_patch(def: &'static EntityDef, row: &mut Record, fields: &Fields, updated_at: DateTime<Utc>) {
    row.fields
        .extend(fields.iter().map(|(name, value)| (name.clone(), value.clone())));
    if let Some(stamp) = def.stamp {
        stamp(&mut row.fields, updated_at);
    }
    row.updated_at = updated_at;
}

/// Table/row store driven by entity descriptors
///
/// Implementations must make `purge` atomic: readers never observe a parent
/// removed with some of its descendants still present.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Stores a new row
    async fn insert(&self, def: &'static EntityDef, record: &Record) -> BackendResult<()>;

    /// Stores a new row only if fewer than `bound.limit` rows match `bound.filter`
    async fn insert_bounded(
        &self,
        def: &'static EntityDef,
        record: &Record,
        bound: &InsertBound,
    ) -> BackendResult<BoundedInsert>;

    /// Reads one row by id, soft-deleted or not
    async fn fetch(&self, def: &'static EntityDef, id: Uuid) -> BackendResult<Option<Record>>;

    /// Reads all rows matching an exact-match filter, in no particular order
    async fn select(&self, def: &'static EntityDef, filter: &Filter) -> BackendResult<Vec<Record>>;

    /// Counts rows matching an exact-match filter
    async fn count(&self, def: &'static EntityDef, filter: &Filter) -> BackendResult<u64>;

    /// Merges `fields` into the stored row and returns the row as written
    ///
    /// Only the given keys change. The descriptor's stamp hook runs on the
    /// merged fields, `updated_at` is set, and `is_deleted` is left as
    /// stored. Fails with `Missing` if the row does not exist.
    async fn patch(
        &self,
        def: &'static EntityDef,
        id: Uuid,
        fields: &Fields,
        updated_at: DateTime<Utc>,
    ) -> BackendResult<Record>;

    /// Sets the soft-delete flag and returns the row as stored afterwards
    ///
    /// A row already in the requested state is returned unchanged. Fails
    /// with `Missing` if the row does not exist.
    async fn set_deleted(
        &self,
        def: &'static EntityDef,
        id: Uuid,
        deleted: bool,
        updated_at: DateTime<Utc>,
    ) -> BackendResult<Record>;

    /// Removes a row and every descendant in one transaction
    ///
    /// Returns false if the row did not exist.
    async fn purge(&self, def: &'static EntityDef, id: Uuid) -> BackendResult<bool>;

    /// Verifies the backend is reachable
    async fn health_check(&self) -> BackendResult<()>;
}
