/// Record persistence primitives
///
/// `RecordStore` gives every entity the same create/read/update/delete
/// semantics, driven entirely by the entity descriptors in `crate::schema`:
///
/// - `create` stamps `id`, `created_at`, `updated_at` and `is_deleted = false`
///   and rejects any caller attempt to set them
/// - `update` validates every key before applying any, then refreshes
///   `updated_at`
/// - `soft_delete`/`restore` flip `is_deleted`; `hard_delete` purges the row
///   and its descendants
/// - updates write only the changed keys, so concurrent updates of
///   different fields both land and an update never revives a soft-deleted
///   row
/// - commits (insert, patch, set_deleted, purge) are retried on transient backend
///   failures according to the [`RetryPolicy`]; reads are not retried
///
/// The store performs no ownership checks. Route code reaches Task, Note,
/// Page and Workspace rows through `crate::scope::OwnershipScope`, which
/// wraps this store.
///
/// # Example
///
/// ```
/// use moji_shared::backend::MemoryBackend;
/// use moji_shared::record::Fields;
/// use moji_shared::schema::EntityKind;
/// use moji_shared::store::RecordStore;
/// use serde_json::json;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RecordStore::new(Arc::new(MemoryBackend::new()));
///
/// let mut fields = Fields::new();
/// fields.insert("name".into(), json!("Starter"));
/// fields.insert("max_projects".into(), json!(3));
/// fields.insert("max_notes".into(), json!(50));
/// fields.insert("max_todos".into(), json!(50));
///
/// let license = store.create(EntityKind::License, fields).await?;
/// assert!(!license.is_deleted);
/// # Ok(())
/// # }
/// ```

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{Backend, BackendError, BackendResult, BoundedInsert, InsertBound};
use crate::error::{StoreError, StoreResult, ValidationReason};
use crate::quota::CapacityKind;
use crate::record::{Fields, Filter, Record};
use crate::schema::{
    EntityDef, EntityKind, FieldAccess, FieldDef, LIFECYCLE_FIELD, PRIVATE_MARKER,
    PROTECTED_FIELDS,
};

/// Commit retry policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per commit, the first one included
    pub max_attempts: u32,

    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 2,
            backoff: Duration::from_millis(25),
        }
    }
}

impl RetryPolicy {
    /// Policy without pauses between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        RetryPolicy {
            max_attempts,
            backoff: Duration::ZERO,
        }
    }
}

/// How a write payload is being applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteMode {
    Create,
    Update,
    /// Writes made by the layer itself; internal fields allowed
    System,
}

/// Generic persistence operations over any entity kind
#[derive(Clone)]
pub struct RecordStore {
    backend: Arc<dyn Backend>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("backend", &self.backend.name())
            .field("retry", &self.retry)
            .finish()
    }
}

/// Checks that a payload key may be written in the given mode
fn check_key(def: &'static EntityDef, name: &str, mode: WriteMode) -> StoreResult<&'static FieldDef> {
    if PROTECTED_FIELDS.contains(&name) {
        return Err(StoreError::validation(name, ValidationReason::Protected));
    }
    if name == LIFECYCLE_FIELD {
        return Err(StoreError::validation(name, ValidationReason::Lifecycle));
    }
    if name.starts_with(PRIVATE_MARKER) {
        return Err(StoreError::validation(name, ValidationReason::Private));
    }

    let field = def
        .field(name)
        .ok_or_else(|| StoreError::validation(name, ValidationReason::Unknown))?;

    match (field.access, mode) {
        (FieldAccess::Internal, WriteMode::Create | WriteMode::Update) => {
            Err(StoreError::validation(name, ValidationReason::Internal))
        }
        (FieldAccess::Immutable, WriteMode::Update | WriteMode::System) => {
            Err(StoreError::validation(name, ValidationReason::Immutable))
        }
        _ => Ok(field),
    }
}

/// Validates every key and value of a payload without applying anything
fn validate_payload(def: &'static EntityDef, fields: &Fields, mode: WriteMode) -> StoreResult<()> {
    for (name, value) in fields {
        let field = check_key(def, name, mode)?;
        field
            .check_value(value)
            .map_err(|msg| StoreError::validation(name.as_str(), ValidationReason::Invalid(msg)))?;
    }
    Ok(())
}

/// Rewrites values into their stored form, e.g. UUIDs in canonical case
fn normalize_payload(def: &'static EntityDef, fields: Fields) -> Fields {
    fields
        .into_iter()
        .map(|(name, value)| {
            let value = match def.field(&name) {
                Some(field) => field.normalize(value),
                None => value,
            };
            (name, value)
        })
        .collect()
}

fn kind_of_table(table: &str) -> Option<EntityKind> {
    EntityKind::ALL.into_iter().find(|k| k.def().table == table)
}

/// Translates a backend failure into the typed outcome callers see
fn map_backend_error(def: &'static EntityDef, operation: &'static str, err: BackendError) -> StoreError {
    match err {
        BackendError::UniqueViolation { constraint, .. } => {
            let field = def
                .unique_key(&constraint)
                .and_then(|key| key.fields.first().copied())
                .map(str::to_string)
                .unwrap_or(constraint);
            StoreError::validation(field, ValidationReason::Duplicate)
        }
        BackendError::Missing { table, .. } => StoreError::not_found(kind_of_table(table).unwrap_or(def.kind)),
        source => StoreError::Storage { operation, source },
    }
}

impl RecordStore {
    /// Creates a store with the default retry policy
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        RecordStore {
            backend,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Runs a commit, repeating it while the backend reports transient failures
    async fn commit<T, F, Fut>(
        &self,
        def: &'static EntityDef,
        operation: &'static str,
        mut op: F,
    ) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    warn!(
                        table = def.table,
                        operation,
                        attempt,
                        error = %err,
                        "Transient commit failure, retrying"
                    );
                    if !self.retry.backoff.is_zero() {
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        warn!(
                            table = def.table,
                            operation,
                            attempts = attempt,
                            error = %err,
                            "Commit retries exhausted"
                        );
                    }
                    return Err(map_backend_error(def, operation, err));
                }
            }
        }
    }

    /// Builds a complete new record from a caller payload
    fn prepare_create(&self, def: &'static EntityDef, fields: Fields) -> StoreResult<Record> {
        validate_payload(def, &fields, WriteMode::Create)?;
        let fields = normalize_payload(def, fields);

        let mut merged = Fields::new();
        for field in def.fields {
            match fields.get(field.name) {
                Some(value) => {
                    merged.insert(field.name.to_string(), value.clone());
                }
                None if field.required => {
                    return Err(StoreError::validation(field.name, ValidationReason::Missing));
                }
                None => {
                    merged.insert(field.name.to_string(), field.default.to_value());
                }
            }
        }

        let now = Utc::now();
        if let Some(stamp) = def.stamp {
            stamp(&mut merged, now);
        }

        Ok(Record {
            id: Uuid::new_v4(),
            kind: def.kind,
            created_at: now,
            updated_at: now,
            is_deleted: false,
            fields: merged,
        })
    }

    /// Creates a record
    ///
    /// # Errors
    ///
    /// - `Validation` if the payload names a protected, lifecycle, private,
    ///   internal or unknown field, omits a required field, carries an
    ///   ill-typed value, or collides with a unique key
    /// - `NotFound` if the parent row does not exist
    /// - `Storage` if the commit keeps failing
    ///
    /// Nothing is persisted when an error is returned.
    pub async fn create(&self, kind: EntityKind, fields: Fields) -> StoreResult<Record> {
        let def = kind.def();
        let record = self.prepare_create(def, fields)?;

        self.commit(def, "creating record", || self.backend.insert(def, &record))
            .await?;

        debug!(table = def.table, id = %record.id, "Record created");
        Ok(record)
    }

    /// Creates a record only if fewer than `bound.limit` rows match `bound.filter`
    ///
    /// The count and the insert happen atomically at the backend.
    ///
    /// # Errors
    ///
    /// As [`RecordStore::create`], plus `LimitExceeded` (reported as
    /// `capacity`) when the bound is reached.
    pub async fn create_bounded(
        &self,
        kind: EntityKind,
        fields: Fields,
        bound: &InsertBound,
        capacity: CapacityKind,
    ) -> StoreResult<Record> {
        let def = kind.def();
        let record = self.prepare_create(def, fields)?;

        let outcome = self
            .commit(def, "creating record", || {
                self.backend.insert_bounded(def, &record, bound)
            })
            .await?;

        match outcome {
            BoundedInsert::Inserted => {
                debug!(table = def.table, id = %record.id, "Record created within bound");
                Ok(record)
            }
            BoundedInsert::Rejected { current } => Err(StoreError::LimitExceeded {
                kind: capacity,
                limit: bound.limit,
                current,
            }),
        }
    }

    /// Looks up a record by id, soft-deleted or not
    pub async fn get_by_id(&self, kind: EntityKind, id: Uuid) -> StoreResult<Option<Record>> {
        let def = kind.def();
        self.backend
            .fetch(def, id)
            .await
            .map_err(|err| map_backend_error(def, "reading record", err))
    }

    /// Like [`RecordStore::get_by_id`], with absence reported as `NotFound`
    pub async fn require(&self, kind: EntityKind, id: Uuid) -> StoreResult<Record> {
        self.get_by_id(kind, id)
            .await?
            .ok_or_else(|| StoreError::not_found(kind))
    }

    fn check_filter(def: &'static EntityDef, filter: &Filter) -> StoreResult<()> {
        for (name, _) in filter.conditions() {
            if !def.is_filterable(name) {
                return Err(StoreError::validation(name.as_str(), ValidationReason::Unknown));
            }
        }
        Ok(())
    }

    /// Lists records matching an exact-match filter
    ///
    /// Soft-deleted rows are included unless the filter says otherwise; pass
    /// [`Filter::active`] for default listings. Order is not guaranteed.
    pub async fn get_all_filtered(&self, kind: EntityKind, filter: &Filter) -> StoreResult<Vec<Record>> {
        let def = kind.def();
        Self::check_filter(def, filter)?;
        self.backend
            .select(def, filter)
            .await
            .map_err(|err| map_backend_error(def, "listing records", err))
    }

    /// Counts records matching an exact-match filter
    pub async fn count(&self, kind: EntityKind, filter: &Filter) -> StoreResult<u64> {
        let def = kind.def();
        Self::check_filter(def, filter)?;
        self.backend
            .count(def, filter)
            .await
            .map_err(|err| map_backend_error(def, "counting records", err))
    }

    async fn apply(&self, record: &Record, fields: Fields, mode: WriteMode) -> StoreResult<Record> {
        let def = record.kind.def();

        if fields.is_empty() {
            return Err(StoreError::validation("payload", ValidationReason::Empty));
        }

        // Nothing is applied unless every key passes
        validate_payload(def, &fields, mode)?;
        let fields = normalize_payload(def, fields);

        let id = record.id;
        let updated = self
            .commit(def, "updating record", || {
                self.backend.patch(def, id, &fields, Utc::now())
            })
            .await?;

        debug!(table = def.table, id = %updated.id, "Record updated");
        Ok(updated)
    }

    async fn set_deleted(&self, record: &Record, deleted: bool, operation: &'static str) -> StoreResult<Record> {
        let def = record.kind.def();
        let id = record.id;

        self.commit(def, operation, || {
            self.backend.set_deleted(def, id, deleted, Utc::now())
        })
        .await
    }

    /// Updates writable fields of a record
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty payload, or if any key is protected,
    ///   lifecycle, private, unknown, immutable or internal, or any value is
    ///   ill-typed. The whole update is rejected; no field is applied.
    /// - `NotFound` if the row has been purged
    /// - `Storage` if the commit keeps failing
    pub async fn update(&self, record: &Record, fields: Fields) -> StoreResult<Record> {
        self.apply(record, fields, WriteMode::Update).await
    }

    /// Writes fields the layer maintains itself (internal fields included)
    pub(crate) async fn update_system(&self, record: &Record, fields: Fields) -> StoreResult<Record> {
        self.apply(record, fields, WriteMode::System).await
    }

    /// Marks a record deleted; it stays reachable through `get_by_id`
    ///
    /// The flag is set on the stored row whatever state `record` was read in.
    pub async fn soft_delete(&self, record: &Record) -> StoreResult<Record> {
        let updated = self.set_deleted(record, true, "soft-deleting record").await?;
        debug!(table = updated.kind.def().table, id = %updated.id, "Record soft-deleted");
        Ok(updated)
    }

    /// Clears the deleted flag; a no-op for active records
    pub async fn restore(&self, record: &Record) -> StoreResult<Record> {
        let updated = self.set_deleted(record, false, "restoring record").await?;
        debug!(table = updated.kind.def().table, id = %updated.id, "Record restored");
        Ok(updated)
    }

    /// Permanently removes a record and all of its descendants
    ///
    /// # Errors
    ///
    /// `NotFound` if the row no longer exists.
    pub async fn hard_delete(&self, record: &Record) -> StoreResult<()> {
        let def = record.kind.def();
        let id = record.id;

        let removed = self
            .commit(def, "deleting record", || self.backend.purge(def, id))
            .await?;

        if !removed {
            return Err(StoreError::not_found(record.kind));
        }

        info!(table = def.table, id = %id, "Record purged with descendants");
        Ok(())
    }

    /// Checks that the backend is reachable
    pub async fn health_check(&self) -> StoreResult<()> {
        self.backend
            .health_check()
            .await
            .map_err(|source| StoreError::Storage {
                operation: "checking backend health",
                source,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{INVITE_LINK, TASK, WORKSPACE};
    use serde_json::json;

    #[test]
    fn test_check_key_rejections() {
        let reason = |name: &str, mode| match check_key(&TASK, name, mode) {
            Err(StoreError::Validation { reason, .. }) => Some(reason),
            _ => None,
        };

        assert_eq!(reason("id", WriteMode::Create), Some(ValidationReason::Protected));
        assert_eq!(reason("updated_at", WriteMode::Update), Some(ValidationReason::Protected));
        assert_eq!(reason("is_deleted", WriteMode::Update), Some(ValidationReason::Lifecycle));
        assert_eq!(reason("_secret", WriteMode::Update), Some(ValidationReason::Private));
        assert_eq!(reason("title", WriteMode::Update), Some(ValidationReason::Unknown));
        assert_eq!(reason("completed_at", WriteMode::Update), Some(ValidationReason::Internal));
        assert_eq!(reason("workspace_id", WriteMode::Update), Some(ValidationReason::Immutable));
        assert_eq!(reason("workspace_id", WriteMode::Create), None);
        assert_eq!(reason("completed_at", WriteMode::System), None);
        assert_eq!(reason("content", WriteMode::Update), None);
    }

    #[test]
    fn test_validate_payload_reports_bad_value() {
        let mut fields = Fields::new();
        fields.insert("priority".into(), json!(9));
        let err = validate_payload(&TASK, &fields, WriteMode::Update).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation { ref field, reason: ValidationReason::Invalid(_) } if field == "priority"
        ));
    }

    #[test]
    fn test_unique_violation_maps_to_first_key_field() {
        let err = map_backend_error(
            &WORKSPACE,
            "creating record",
            BackendError::UniqueViolation {
                table: "workspaces",
                constraint: "workspaces_name_owner_key".into(),
            },
        );
        assert!(matches!(
            err,
            StoreError::Validation { ref field, reason: ValidationReason::Duplicate } if field == "name"
        ));
    }

    #[test]
    fn test_missing_parent_maps_to_parent_kind() {
        let err = map_backend_error(
            &INVITE_LINK,
            "creating record",
            BackendError::Missing {
                table: "owners",
                id: Uuid::nil(),
            },
        );
        assert!(matches!(err, StoreError::NotFound { entity: EntityKind::Owner }));
    }

    #[test]
    fn test_other_errors_are_storage_faults() {
        let err = map_backend_error(
            &TASK,
            "updating record",
            BackendError::Conflict("serialization failure".into()),
        );
        assert!(err.is_fault());
    }

    #[test]
    fn test_normalize_payload_canonicalises_links() {
        let ws = Uuid::new_v4();
        let mut fields = Fields::new();
        fields.insert("workspace_id".into(), json!(ws.to_string().to_uppercase()));
        fields.insert("content".into(), json!("Keep CASE"));

        let fields = normalize_payload(&TASK, fields);
        assert_eq!(fields["workspace_id"], json!(ws.to_string()));
        assert_eq!(fields["content"], json!("Keep CASE"));
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 2);
        assert_eq!(policy.backoff, Duration::from_millis(25));
        assert_eq!(RetryPolicy::immediate(3).backoff, Duration::ZERO);
    }
}
