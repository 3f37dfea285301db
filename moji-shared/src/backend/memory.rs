/// In-memory backend
///
/// Keeps every table in a `HashMap` behind a single `tokio` `RwLock`. Each
/// write holds the lock for its whole duration, so cascading purges and
/// bounded inserts are atomic with respect to other callers.
///
/// The backend mirrors the PostgreSQL schema's constraints: unique keys are
/// enforced across all rows of a table (soft-deleted ones included), and a
/// child row cannot be inserted under a parent that does not exist.
///
/// # Fault injection
///
/// [`MemoryBackend::fail_next_commits`] makes the next N commit operations
/// fail with a transient [`BackendError::Conflict`], which is how the retry
/// policy is exercised in tests.
///
/// # Example
///
/// ```
/// use moji_shared::backend::MemoryBackend;
/// use moji_shared::store::RecordStore;
/// use std::sync::Arc;
///
/// let backend = Arc::new(MemoryBackend::new());
/// let store = RecordStore::new(backend.clone());
/// backend.fail_next_commits(1);
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{apply_patch, Backend, BackendError, BackendResult, BoundedInsert, InsertBound};
use crate::record::{Fields, Filter, Record};
use crate::schema::EntityDef;

type Table = HashMap<Uuid, Record>;
type Tables = HashMap<&'static str, Table>;

/// Process-local backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    tables: RwLock<Tables>,
    injected_conflicts: AtomicU32,
    commit_attempts: AtomicU64,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` commits fail with a transient conflict
    pub fn fail_next_commits(&self, n: u32) {
        self.injected_conflicts.store(n, Ordering::SeqCst);
    }

    /// Number of commit operations attempted so far, failed ones included
    pub fn commit_attempts(&self) -> u64 {
        self.commit_attempts.load(Ordering::SeqCst)
    }

    /// Total rows in a table, soft-deleted included
    pub async fn row_count(&self, def: &'static EntityDef) -> usize {
        self.tables
            .read()
            .await
            .get(def.table)
            .map(HashMap::len)
            .unwrap_or(0)
    }

    fn begin_commit(&self) -> BackendResult<()> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);

        let injected = self
            .injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();

        if injected {
            return Err(BackendError::Conflict("injected write conflict".to_string()));
        }
        Ok(())
    }
}

fn check_parent(tables: &Tables, def: &'static EntityDef, record: &Record) -> BackendResult<()> {
    let Some(link) = def.parent else {
        return Ok(());
    };
    let parent_def = link.kind.def();

    let parent_id = record.get_uuid(link.field).ok_or_else(|| BackendError::Corrupt {
        table: def.table,
        reason: format!("missing parent link `{}`", link.field),
    })?;

    let exists = tables
        .get(parent_def.table)
        .map(|t| t.contains_key(&parent_id))
        .unwrap_or(false);

    if exists {
        Ok(())
    } else {
        Err(BackendError::Missing {
            table: parent_def.table,
            id: parent_id,
        })
    }
}

fn check_unique(tables: &Tables, def: &'static EntityDef, record: &Record) -> BackendResult<()> {
    let Some(table) = tables.get(def.table) else {
        return Ok(());
    };

    for key in def.unique {
        let values: Vec<_> = key.fields.iter().map(|f| record.attribute(f)).collect();

        // NULLs never collide, as in SQL
        if values.iter().any(|v| v.is_null()) {
            continue;
        }

        let taken = table.values().any(|other| {
            other.id != record.id
                && key
                    .fields
                    .iter()
                    .zip(&values)
                    .all(|(f, v)| other.attribute(f) == *v)
        });

        if taken {
            return Err(BackendError::UniqueViolation {
                table: def.table,
                constraint: key.name.to_string(),
            });
        }
    }
    Ok(())
}

fn insert_locked(tables: &mut Tables, def: &'static EntityDef, record: &Record) -> BackendResult<()> {
    check_parent(tables, def, record)?;
    check_unique(tables, def, record)?;

    tables
        .entry(def.table)
        .or_default()
        .insert(record.id, record.clone());
    Ok(())
}

fn count_locked(tables: &Tables, def: &'static EntityDef, filter: &Filter) -> u64 {
    tables
        .get(def.table)
        .map(|t| t.values().filter(|r| filter.matches(r)).count() as u64)
        .unwrap_or(0)
}

/// Collects every descendant of a row, deepest first
fn collect_descendants(
    tables: &Tables,
    def: &'static EntityDef,
    id: Uuid,
    out: &mut Vec<(&'static str, Uuid)>,
) {
    let id_value = serde_json::Value::from(id.to_string());

    for child in def.children() {
        let Some(link) = child.parent else { continue };
        let Some(table) = tables.get(child.table) else { continue };

        let child_ids: Vec<Uuid> = table
            .values()
            .filter(|r| r.attribute(link.field) == id_value)
            .map(|r| r.id)
            .collect();

        for child_id in child_ids {
            collect_descendants(tables, child, child_id, out);
            out.push((child.table, child_id));
        }
    }
}

#[async_trait]
impl Backend for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, def: &'static EntityDef, record: &Record) -> BackendResult<()> {
        self.begin_commit()?;
        let mut tables = self.tables.write().await;
        insert_locked(&mut tables, def, record)
    }

    async fn insert_bounded(
        &self,
        def: &'static EntityDef,
        record: &Record,
        bound: &InsertBound,
    ) -> BackendResult<BoundedInsert> {
        self.begin_commit()?;
        let mut tables = self.tables.write().await;

        let current = count_locked(&tables, def, &bound.filter);
        if current >= u64::from(bound.limit) {
            return Ok(BoundedInsert::Rejected {
                current: u32::try_from(current).unwrap_or(u32::MAX),
            });
        }

        insert_locked(&mut tables, def, record)?;
        Ok(BoundedInsert::Inserted)
    }

    async fn fetch(&self, def: &'static EntityDef, id: Uuid) -> BackendResult<Option<Record>> {
        let tables = self.tables.read().await;
        Ok(tables.get(def.table).and_then(|t| t.get(&id)).cloned())
    }

    async fn select(&self, def: &'static EntityDef, filter: &Filter) -> BackendResult<Vec<Record>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(def.table)
            .map(|t| t.values().filter(|r| filter.matches(r)).cloned().collect())
            .unwrap_or_default())
    }

    async fn count(&self, def: &'static EntityDef, filter: &Filter) -> BackendResult<u64> {
        let tables = self.tables.read().await;
        Ok(count_locked(&tables, def, filter))
    }

    async fn patch(
        &self,
        def: &'static EntityDef,
        id: Uuid,
        fields: &Fields,
        updated_at: DateTime<Utc>,
    ) -> BackendResult<Record> {
        self.begin_commit()?;
        let mut tables = self.tables.write().await;

        let mut row = tables
            .get(def.table)
            .and_then(|t| t.get(&id))
            .cloned()
            .ok_or(BackendError::Missing { table: def.table, id })?;

        apply_patch(def, &mut row, fields, updated_at);
        check_unique(&tables, def, &row)?;

        tables.entry(def.table).or_default().insert(id, row.clone());
        Ok(row)
    }

    async fn set_deleted(
        &self,
        def: &'static EntityDef,
        id: Uuid,
        deleted: bool,
        updated_at: DateTime<Utc>,
    ) -> BackendResult<Record> {
        self.begin_commit()?;
        let mut tables = self.tables.write().await;

        let row = tables
            .get_mut(def.table)
            .and_then(|t| t.get_mut(&id))
            .ok_or(BackendError::Missing { table: def.table, id })?;

        if row.is_deleted != deleted {
            row.is_deleted = deleted;
            row.updated_at = updated_at;
        }
        Ok(row.clone())
    }

    async fn purge(&self, def: &'static EntityDef, id: Uuid) -> BackendResult<bool> {
        self.begin_commit()?;
        let mut tables = self.tables.write().await;

        let exists = tables
            .get(def.table)
            .map(|t| t.contains_key(&id))
            .unwrap_or(false);
        if !exists {
            return Ok(false);
        }

        let mut doomed = Vec::new();
        collect_descendants(&tables, def, id, &mut doomed);
        doomed.push((def.table, id));

        for (table, row_id) in doomed {
            if let Some(t) = tables.get_mut(table) {
                t.remove(&row_id);
            }
        }
        Ok(true)
    }

    async fn health_check(&self) -> BackendResult<()> {
        Ok(())
    }
}
