/// PostgreSQL backend
///
/// Every entity table has the same physical layout (see `migrations/`):
///
/// ```sql
/// CREATE TABLE tasks (
///     id UUID PRIMARY KEY,
///     created_at TIMESTAMPTZ NOT NULL,
///     updated_at TIMESTAMPTZ NOT NULL,
///     is_deleted BOOLEAN NOT NULL DEFAULT FALSE,
///     parent_id UUID REFERENCES workspaces(id) ON DELETE CASCADE,
///     data JSONB NOT NULL
/// );
/// ```
///
/// `parent_id` mirrors the descriptor's parent link field so the database
/// cascades hard deletes down the ownership tree. Exact-match filters on
/// entity fields compile to JSONB containment (`data @> $n`), which the GIN
/// index on `data` serves.
///
/// # Example
///
/// ```no_run
/// use moji_shared::backend::PgBackend;
/// use moji_shared::db::pool::{create_pool, DatabaseConfig};
/// use moji_shared::store::RecordStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(&DatabaseConfig::default()).await?;
/// let store = RecordStore::new(Arc::new(PgBackend::new(pool)));
/// # Ok(())
/// # }
/// ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::{apply_patch, Backend, BackendError, BackendResult, BoundedInsert, InsertBound};
use crate::record::{Fields, Filter, Record};
use crate::schema::{EntityDef, LIFECYCLE_FIELD};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

const COLUMNS: &str = "id, created_at, updated_at, is_deleted, data";

/// Backend over a shared PostgreSQL pool
#[derive(Debug, Clone)]
pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    pub fn new(pool: PgPool) -> Self {
        PgBackend { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    is_deleted: bool,
    data: Json<Fields>,
}

impl RecordRow {
    fn into_record(self, def: &'static EntityDef) -> Record {
        Record {
            id: self.id,
            kind: def.kind,
            created_at: self.created_at,
            updated_at: self.updated_at,
            is_deleted: self.is_deleted,
            fields: self.data.0,
        }
    }
}

/// Parameter bound into a generated WHERE clause
#[derive(Debug, Clone, PartialEq)]
enum Bind {
    Uuid(Uuid),
    Bool(bool),
    Json(Value),
}

/// Generated WHERE clause with its parameters
#[derive(Debug, Default)]
struct WhereClause {
    sql: String,
    binds: Vec<Bind>,
}

/// Compiles an exact-match filter
///
/// Placeholders are numbered from `first_param`. Conditions that can never
/// hold (a malformed id, two different values for one field) become `FALSE`.
fn build_where(filter: &Filter, first_param: usize) -> WhereClause {
    let mut predicates = Vec::new();
    let mut binds = Vec::new();
    let mut contains = Fields::new();

    let placeholder = |binds: &mut Vec<Bind>, bind: Bind| {
        binds.push(bind);
        format!("${}", first_param + binds.len() - 1)
    };

    for (name, value) in filter.conditions() {
        match name.as_str() {
            "id" => match value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
                Some(id) => {
                    let p = placeholder(&mut binds, Bind::Uuid(id));
                    predicates.push(format!("id = {}", p));
                }
                None => predicates.push("FALSE".to_string()),
            },
            LIFECYCLE_FIELD => match value.as_bool() {
                Some(flag) => {
                    let p = placeholder(&mut binds, Bind::Bool(flag));
                    predicates.push(format!("is_deleted = {}", p));
                }
                None => predicates.push("FALSE".to_string()),
            },
            _ => match contains.get(name) {
                Some(existing) if existing != value => predicates.push("FALSE".to_string()),
                _ => {
                    contains.insert(name.clone(), value.clone());
                }
            },
        }
    }

    if !contains.is_empty() {
        let p = placeholder(&mut binds, Bind::Json(Value::Object(contains)));
        predicates.push(format!("data @> {}", p));
    }

    if predicates.is_empty() {
        return WhereClause::default();
    }

    WhereClause {
        sql: format!(" WHERE {}", predicates.join(" AND ")),
        binds,
    }
}

fn parent_id(def: &'static EntityDef, record: &Record) -> BackendResult<Option<Uuid>> {
    match def.parent {
        None => Ok(None),
        Some(link) => record
            .get_uuid(link.field)
            .map(Some)
            .ok_or_else(|| BackendError::Corrupt {
                table: def.table,
                reason: format!("missing parent link `{}`", link.field),
            }),
    }
}

/// Maps constraint failures on writes to typed backend errors
fn classify(err: sqlx::Error, def: &'static EntityDef, record: &Record) -> BackendError {
    if let sqlx::Error::Database(db) = &err {
        match db.code().as_deref() {
            Some(UNIQUE_VIOLATION) => {
                return BackendError::UniqueViolation {
                    table: def.table,
                    constraint: db.constraint().unwrap_or("unknown").to_string(),
                };
            }
            Some(FOREIGN_KEY_VIOLATION) => {
                if let Some(link) = def.parent {
                    return BackendError::Missing {
                        table: link.kind.def().table,
                        id: record.get_uuid(link.field).unwrap_or_else(Uuid::nil),
                    };
                }
            }
            _ => {}
        }
    }
    BackendError::Database(err)
}

async fn insert_with<'e, E>(executor: E, def: &'static EntityDef, record: &Record) -> BackendResult<()>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let sql = format!(
        "INSERT INTO {} (id, created_at, updated_at, is_deleted, parent_id, data) \
         VALUES ($1, $2, $3, $4, $5, $6)",
        def.table
    );

    sqlx::query(&sql)
        .bind(record.id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .bind(record.is_deleted)
        .bind(parent_id(def, record)?)
        .bind(Json(record.fields.clone()))
        .execute(executor)
        .await
        .map_err(|err| classify(err, def, record))?;

    Ok(())
}

async fn count_with<'e, E>(executor: E, def: &'static EntityDef, filter: &Filter) -> BackendResult<u64>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let clause = build_where(filter, 1);
    let sql = format!("SELECT COUNT(*) FROM {}{}", def.table, clause.sql);

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for bind in clause.binds {
        query = match bind {
            Bind::Uuid(id) => query.bind(id),
            Bind::Bool(flag) => query.bind(flag),
            Bind::Json(value) => query.bind(Json(value)),
        };
    }

    let count = query.fetch_one(executor).await?;
    Ok(count.max(0) as u64)
}

#[async_trait]
impl Backend for PgBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn insert(&self, def: &'static EntityDef, record: &Record) -> BackendResult<()> {
        insert_with(&self.pool, def, record).await
    }

    async fn insert_bounded(
        &self,
        def: &'static EntityDef,
        record: &Record,
        bound: &InsertBound,
    ) -> BackendResult<BoundedInsert> {
        let mut tx = self.pool.begin().await?;

        // Serialize bounded inserts under the same parent
        if let (Some(link), Some(parent)) = (def.parent, parent_id(def, record)?) {
            let sql = format!(
                "SELECT id FROM {} WHERE id = $1 FOR UPDATE",
                link.kind.def().table
            );
            let locked: Option<Uuid> = sqlx::query_scalar(&sql)
                .bind(parent)
                .fetch_optional(&mut *tx)
                .await?;

            if locked.is_none() {
                tx.rollback().await?;
                return Err(BackendError::Missing {
                    table: link.kind.def().table,
                    id: parent,
                });
            }
        }

        let current = count_with(&mut *tx, def, &bound.filter).await?;
        if current >= u64::from(bound.limit) {
            tx.rollback().await?;
            return Ok(BoundedInsert::Rejected {
                current: u32::try_from(current).unwrap_or(u32::MAX),
            });
        }

        insert_with(&mut *tx, def, record).await?;
        tx.commit().await?;
        Ok(BoundedInsert::Inserted)
    }

    async fn fetch(&self, def: &'static EntityDef, id: Uuid) -> BackendResult<Option<Record>> {
        let sql = format!("SELECT {} FROM {} WHERE id = $1", COLUMNS, def.table);

        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into_record(def)))
    }

    async fn select(&self, def: &'static EntityDef, filter: &Filter) -> BackendResult<Vec<Record>> {
        let clause = build_where(filter, 1);
        let sql = format!("SELECT {} FROM {}{}", COLUMNS, def.table, clause.sql);

        let mut query = sqlx::query_as::<_, RecordRow>(&sql);
        for bind in clause.binds {
            query = match bind {
                Bind::Uuid(id) => query.bind(id),
                Bind::Bool(flag) => query.bind(flag),
                Bind::Json(value) => query.bind(Json(value)),
            };
        }

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(|r| r.into_record(def)).collect())
    }

    async fn count(&self, def: &'static EntityDef, filter: &Filter) -> BackendResult<u64> {
        count_with(&self.pool, def, filter).await
    }

    async fn patch(
        &self,
        def: &'static EntityDef,
        id: Uuid,
        fields: &Fields,
        updated_at: DateTime<Utc>,
    ) -> BackendResult<Record> {
        let mut tx = self.pool.begin().await?;

        // The row lock keeps concurrent patches from losing each other's keys
        let sql = format!("SELECT {} FROM {} WHERE id = $1 FOR UPDATE", COLUMNS, def.table);
        let row = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            tx.rollback().await?;
            return Err(BackendError::Missing { table: def.table, id });
        };

        let mut record = row.into_record(def);
        apply_patch(def, &mut record, fields, updated_at);

        let sql = format!("UPDATE {} SET updated_at = $2, data = $3 WHERE id = $1", def.table);
        sqlx::query(&sql)
            .bind(id)
            .bind(record.updated_at)
            .bind(Json(record.fields.clone()))
            .execute(&mut *tx)
            .await
            .map_err(|err| classify(err, def, &record))?;

        tx.commit().await?;
        Ok(record)
    }

    async fn set_deleted(
        &self,
        def: &'static EntityDef,
        id: Uuid,
        deleted: bool,
        updated_at: DateTime<Utc>,
    ) -> BackendResult<Record> {
        let sql = format!(
            "UPDATE {} SET is_deleted = $2, updated_at = $3 \
             WHERE id = $1 AND is_deleted <> $2 RETURNING {}",
            def.table, COLUMNS
        );

        let changed = sqlx::query_as::<_, RecordRow>(&sql)
            .bind(id)
            .bind(deleted)
            .bind(updated_at)
            .fetch_optional(&self.pool)
            .await?;

        if let Some(row) = changed {
            return Ok(row.into_record(def));
        }

        // Already in the requested state, or gone
        self.fetch(def, id)
            .await?
            .ok_or(BackendError::Missing { table: def.table, id })
    }

    async fn purge(&self, def: &'static EntityDef, id: Uuid) -> BackendResult<bool> {
        let sql = format!("DELETE FROM {} WHERE id = $1", def.table);

        // Descendants go with the row through ON DELETE CASCADE
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(&sql).bind(id).execute(&mut *tx).await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> BackendResult<()> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_where_empty() {
        let clause = build_where(&Filter::new(), 1);
        assert_eq!(clause.sql, "");
        assert!(clause.binds.is_empty());
    }

    #[test]
    fn test_build_where_splits_columns_and_containment() {
        let ws = Uuid::new_v4();
        let filter = Filter::active().eq_id("workspace_id", ws).eq("done", true);
        let clause = build_where(&filter, 1);

        assert_eq!(clause.sql, " WHERE is_deleted = $1 AND data @> $2");
        assert_eq!(
            clause.binds,
            vec![
                Bind::Bool(false),
                Bind::Json(json!({ "workspace_id": ws.to_string(), "done": true })),
            ]
        );
    }

    #[test]
    fn test_build_where_numbers_from_offset() {
        let id = Uuid::new_v4();
        let clause = build_where(&Filter::new().eq_id("id", id), 3);
        assert_eq!(clause.sql, " WHERE id = $3");
        assert_eq!(clause.binds, vec![Bind::Uuid(id)]);
    }

    #[test]
    fn test_build_where_impossible_conditions() {
        let clause = build_where(&Filter::new().eq("id", "not-a-uuid"), 1);
        assert_eq!(clause.sql, " WHERE FALSE");

        let clause = build_where(&Filter::new().eq("name", "a").eq("name", "b"), 1);
        assert_eq!(clause.sql, " WHERE FALSE AND data @> $1");
    }
}
