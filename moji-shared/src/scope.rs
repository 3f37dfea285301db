/// Ownership-scoped access to workspaces and their contents
///
/// Every operation that can reach a Workspace, Task, Note or Page row goes
/// through [`OwnershipScope`]. The caller's owner id is an explicit argument
/// on every call; nothing is inferred from ambient state and nothing is
/// cached, so ownership is re-read from the backend each time.
///
/// Guard failures never reveal other owners' data:
/// - collection operations (`scoped_list`, `scoped_create`) report
///   `NotFound(Workspace)`
/// - item operations report `NotFound(<child kind>)`
///
/// A soft-deleted workspace is treated as absent by the guard, which hides
/// its whole subtree until it is restored. Its children are not rewritten.
///
/// # Example
///
/// ```
/// use moji_shared::backend::MemoryBackend;
/// use moji_shared::models::{owner::CreateOwner, task::CreateTask, workspace::CreateWorkspace, WriteInput};
/// use moji_shared::quota::{CapacityLimits, CapacityMode};
/// use moji_shared::scope::{ChildKind, OwnershipScope};
/// use moji_shared::schema::EntityKind;
/// use moji_shared::store::RecordStore;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RecordStore::new(Arc::new(MemoryBackend::new()));
/// let owner = store
///     .create(
///         EntityKind::Owner,
///         CreateOwner {
///             display_name: "Ada".into(),
///             handle: "ada".into(),
///             email: "ada@example.com".into(),
///         }
///         .into_fields()?,
///     )
///     .await?;
///
/// let scope = OwnershipScope::new(store, CapacityLimits::default(), CapacityMode::Soft);
/// let ws = scope
///     .create_workspace(owner.id, CreateWorkspace { name: "Inbox".into(), description: None }.into_fields()?)
///     .await?;
///
/// let task = CreateTask { content: "Call the bank".into(), done: None, priority: None };
/// scope.scoped_create(ChildKind::Task, ws.id, owner.id, task.into_fields()?).await?;
///
/// let tasks = scope.scoped_list(ChildKind::Task, ws.id, owner.id).await?;
/// assert_eq!(tasks.len(), 1);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult, ValidationReason};
use crate::models::license::License;
use crate::quota::{self, CapacityCheck, CapacityKind, CapacityLimits, CapacityMode};
use crate::record::{Fields, Filter, Record};
use crate::schema::EntityKind;
use crate::store::RecordStore;

/// Link fields injected by the scope, never accepted from callers
const WORKSPACE_LINK: &str = "workspace_id";
const OWNER_LINK: &str = "owner_id";

/// Entity types that live inside a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildKind {
    Task,
    Note,
    Page,
}

impl ChildKind {
    pub const ALL: [ChildKind; 3] = [ChildKind::Task, ChildKind::Note, ChildKind::Page];

    pub fn entity(&self) -> EntityKind {
        match self {
            ChildKind::Task => EntityKind::Task,
            ChildKind::Note => EntityKind::Note,
            ChildKind::Page => EntityKind::Page,
        }
    }

    pub fn capacity(&self) -> CapacityKind {
        match self {
            ChildKind::Task => CapacityKind::Tasks,
            ChildKind::Note => CapacityKind::Notes,
            ChildKind::Page => CapacityKind::Pages,
        }
    }

    /// Whether rows carry a denormalized `owner_id`
    pub fn carries_owner(&self) -> bool {
        self.entity().def().field(OWNER_LINK).is_some()
    }
}

impl fmt::Display for ChildKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity().as_str())
    }
}

/// Mandatory gatekeeper for workspace-scoped data
///
/// The wrapped store stays inside the crate; callers cannot reach rows
/// around the ownership checks.
///
/// ```compile_fail
/// fn unscoped(scope: &moji_shared::scope::OwnershipScope) {
///     let _ = scope.store();
/// }
/// ```
#[derive(Debug, Clone)]
pub struct OwnershipScope {
    store: RecordStore,
    limits: CapacityLimits,
    mode: CapacityMode,
}

fn owned_by(record: &Record, owner_id: Uuid) -> bool {
    record.get_uuid(OWNER_LINK) == Some(owner_id)
}

fn reject_link_fields(fields: &Fields) -> StoreResult<()> {
    for link in [WORKSPACE_LINK, OWNER_LINK] {
        if fields.contains_key(link) {
            return Err(StoreError::validation(link, ValidationReason::Scoped));
        }
    }
    Ok(())
}

impl OwnershipScope {
    pub fn new(store: RecordStore, limits: CapacityLimits, mode: CapacityMode) -> Self {
        OwnershipScope { store, limits, mode }
    }

    pub(crate) fn store(&self) -> &RecordStore {
        &self.store
    }

    /// Configured default limits, before any license override
    pub fn limits(&self) -> CapacityLimits {
        self.limits
    }

    pub fn mode(&self) -> CapacityMode {
        self.mode
    }

    // ---- guards ----

    /// Loads a workspace if it belongs to `owner_id`
    ///
    /// With `include_deleted` false, a soft-deleted workspace counts as absent.
    async fn owned_workspace(
        &self,
        workspace_id: Uuid,
        owner_id: Uuid,
        include_deleted: bool,
    ) -> StoreResult<Option<Record>> {
        let workspace = self
            .store
            .get_by_id(EntityKind::Workspace, workspace_id)
            .await?
            .filter(|ws| owned_by(ws, owner_id))
            .filter(|ws| include_deleted || !ws.is_deleted);

        if workspace.is_none() {
            debug!(workspace_id = %workspace_id, owner_id = %owner_id, "Workspace ownership check failed");
        }
        Ok(workspace)
    }

    /// True only if the workspace exists, is not soft-deleted and belongs to the owner
    pub async fn verify_workspace_ownership(&self, workspace_id: Uuid, owner_id: Uuid) -> StoreResult<bool> {
        Ok(self.owned_workspace(workspace_id, owner_id, false).await?.is_some())
    }

    async fn require_workspace(&self, workspace_id: Uuid, owner_id: Uuid) -> StoreResult<Record> {
        self.owned_workspace(workspace_id, owner_id, false)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::Workspace))
    }

    /// Loads a child row after checking the workspace guard
    ///
    /// Guard failures and misses both report `NotFound(<child kind>)`.
    async fn require_child(
        &self,
        kind: ChildKind,
        workspace_id: Uuid,
        owner_id: Uuid,
        id: Uuid,
        include_deleted: bool,
    ) -> StoreResult<Record> {
        let not_found = || StoreError::not_found(kind.entity());

        if !self.verify_workspace_ownership(workspace_id, owner_id).await? {
            return Err(not_found());
        }

        self.store
            .get_by_id(kind.entity(), id)
            .await?
            .filter(|r| r.get_uuid(WORKSPACE_LINK) == Some(workspace_id))
            .filter(|r| include_deleted || !r.is_deleted)
            .ok_or_else(not_found)
    }

    async fn active_owner(&self, owner_id: Uuid) -> StoreResult<Record> {
        self.store
            .get_by_id(EntityKind::Owner, owner_id)
            .await?
            .filter(|owner| !owner.is_deleted)
            .ok_or_else(|| StoreError::not_found(EntityKind::Owner))
    }

    // ---- capacity ----

    /// Counts active rows under `scope_id` against `limit`
    pub async fn capacity_check(&self, kind: CapacityKind, scope_id: Uuid, limit: u32) -> StoreResult<CapacityCheck> {
        quota::capacity_check(&self.store, kind, scope_id, limit).await
    }

    /// Limits that apply to an owner: the configured defaults, overridden by
    /// the owner's license when it exists and is active
    pub async fn effective_limits(&self, owner_id: Uuid) -> StoreResult<CapacityLimits> {
        let owner = self.store.require(EntityKind::Owner, owner_id).await?;

        let Some(license_id) = owner.get_uuid("license_id") else {
            return Ok(self.limits);
        };

        match self.store.get_by_id(EntityKind::License, license_id).await? {
            Some(record) if !record.is_deleted => {
                let license = License::from_record(&record)?;
                Ok(self.limits.with_license(&license))
            }
            _ => Ok(self.limits),
        }
    }

    async fn create_capped(
        &self,
        capacity: CapacityKind,
        scope_id: Uuid,
        limit: u32,
        fields: Fields,
    ) -> StoreResult<Record> {
        match self.mode {
            CapacityMode::Soft => {
                let check = self.capacity_check(capacity, scope_id, limit).await?;
                if !check.allowed {
                    return Err(StoreError::LimitExceeded {
                        kind: capacity,
                        limit: check.limit,
                        current: check.current,
                    });
                }
                self.store.create(capacity.entity(), fields).await
            }
            CapacityMode::Strict => {
                let bound = capacity.bound(scope_id, limit);
                self.store
                    .create_bounded(capacity.entity(), fields, &bound, capacity)
                    .await
            }
        }
    }

    // ---- workspaces ----

    /// Lists the owner's active workspaces
    pub async fn list_workspaces(&self, owner_id: Uuid) -> StoreResult<Vec<Record>> {
        self.store
            .get_all_filtered(EntityKind::Workspace, &Filter::active().eq_id(OWNER_LINK, owner_id))
            .await
    }

    pub async fn get_workspace(&self, workspace_id: Uuid, owner_id: Uuid) -> StoreResult<Record> {
        self.require_workspace(workspace_id, owner_id).await
    }

    /// Creates a workspace for an active owner, within the owner's workspace cap
    ///
    /// # Errors
    ///
    /// - `Validation` if the payload carries `owner_id`, or the name is
    ///   already used by one of the owner's workspaces (deleted ones included)
    /// - `NotFound(Owner)` if the owner is missing or deactivated
    /// - `LimitExceeded(Workspaces)` at the cap
    pub async fn create_workspace(&self, owner_id: Uuid, mut fields: Fields) -> StoreResult<Record> {
        reject_link_fields(&fields)?;
        self.active_owner(owner_id).await?;

        let limit = self.effective_limits(owner_id).await?.workspaces;
        fields.insert(OWNER_LINK.to_string(), owner_id.to_string().into());

        let workspace = self
            .create_capped(CapacityKind::Workspaces, owner_id, limit, fields)
            .await?;
        debug!(workspace_id = %workspace.id, owner_id = %owner_id, "Workspace created");
        Ok(workspace)
    }

    pub async fn update_workspace(&self, workspace_id: Uuid, owner_id: Uuid, fields: Fields) -> StoreResult<Record> {
        let workspace = self.require_workspace(workspace_id, owner_id).await?;
        self.store.update(&workspace, fields).await
    }

    /// Hides a workspace and, through the guard, everything inside it
    pub async fn soft_delete_workspace(&self, workspace_id: Uuid, owner_id: Uuid) -> StoreResult<Record> {
        let workspace = self.require_workspace(workspace_id, owner_id).await?;
        self.store.soft_delete(&workspace).await
    }

    pub async fn restore_workspace(&self, workspace_id: Uuid, owner_id: Uuid) -> StoreResult<Record> {
        let workspace = self
            .owned_workspace(workspace_id, owner_id, true)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::Workspace))?;
        self.store.restore(&workspace).await
    }

    /// Permanently removes a workspace with all of its tasks, notes and pages
    ///
    /// Soft-deleted workspaces can be purged too.
    pub async fn delete_workspace(&self, workspace_id: Uuid, owner_id: Uuid) -> StoreResult<()> {
        let workspace = self
            .owned_workspace(workspace_id, owner_id, true)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::Workspace))?;

        self.store.hard_delete(&workspace).await?;
        info!(workspace_id = %workspace_id, owner_id = %owner_id, "Workspace purged");
        Ok(())
    }

    // ---- workspace contents ----

    /// Lists active rows of one kind inside an owned workspace
    pub async fn scoped_list(&self, kind: ChildKind, workspace_id: Uuid, owner_id: Uuid) -> StoreResult<Vec<Record>> {
        self.require_workspace(workspace_id, owner_id).await?;
        self.store
            .get_all_filtered(kind.entity(), &Filter::active().eq_id(WORKSPACE_LINK, workspace_id))
            .await
    }

    /// Gets one active row inside an owned workspace
    pub async fn scoped_get(&self, kind: ChildKind, workspace_id: Uuid, owner_id: Uuid, id: Uuid) -> StoreResult<Record> {
        self.require_child(kind, workspace_id, owner_id, id, false).await
    }

    /// Creates a row inside an owned workspace, within the workspace cap
    ///
    /// `workspace_id` (and `owner_id` for tasks and notes) are injected; the
    /// payload may not carry them.
    ///
    /// # Errors
    ///
    /// - `Validation` for link fields or any store-level field problem
    /// - `NotFound(Workspace)` if the guard fails
    /// - `LimitExceeded` at the cap
    pub async fn scoped_create(
        &self,
        kind: ChildKind,
        workspace_id: Uuid,
        owner_id: Uuid,
        mut fields: Fields,
    ) -> StoreResult<Record> {
        reject_link_fields(&fields)?;
        self.require_workspace(workspace_id, owner_id).await?;

        let capacity = kind.capacity();
        let limit = self.effective_limits(owner_id).await?.get(capacity);

        fields.insert(WORKSPACE_LINK.to_string(), workspace_id.to_string().into());
        if kind.carries_owner() {
            fields.insert(OWNER_LINK.to_string(), owner_id.to_string().into());
        }

        self.create_capped(capacity, workspace_id, limit, fields).await
    }

    pub async fn scoped_update(
        &self,
        kind: ChildKind,
        workspace_id: Uuid,
        owner_id: Uuid,
        id: Uuid,
        fields: Fields,
    ) -> StoreResult<Record> {
        let record = self.require_child(kind, workspace_id, owner_id, id, false).await?;
        self.store.update(&record, fields).await
    }

    pub async fn scoped_soft_delete(&self, kind: ChildKind, workspace_id: Uuid, owner_id: Uuid, id: Uuid) -> StoreResult<Record> {
        let record = self.require_child(kind, workspace_id, owner_id, id, false).await?;
        self.store.soft_delete(&record).await
    }

    pub async fn scoped_restore(&self, kind: ChildKind, workspace_id: Uuid, owner_id: Uuid, id: Uuid) -> StoreResult<Record> {
        let record = self.require_child(kind, workspace_id, owner_id, id, true).await?;
        self.store.restore(&record).await
    }

    pub async fn scoped_hard_delete(&self, kind: ChildKind, workspace_id: Uuid, owner_id: Uuid, id: Uuid) -> StoreResult<()> {
        let record = self.require_child(kind, workspace_id, owner_id, id, true).await?;
        self.store.hard_delete(&record).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_child_kinds() {
        assert!(ChildKind::Task.carries_owner());
        assert!(ChildKind::Note.carries_owner());
        assert!(!ChildKind::Page.carries_owner());
        assert_eq!(ChildKind::Note.capacity(), CapacityKind::Notes);
        assert_eq!(ChildKind::Page.entity(), EntityKind::Page);
        assert_eq!(ChildKind::Task.to_string(), "Task");
    }

    #[test]
    fn test_link_fields_are_rejected() {
        let mut fields = Fields::new();
        fields.insert("content".into(), json!("x"));
        assert!(reject_link_fields(&fields).is_ok());

        fields.insert("owner_id".into(), json!(Uuid::new_v4().to_string()));
        let err = reject_link_fields(&fields).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation { ref field, reason: ValidationReason::Scoped } if field == "owner_id"
        ));
    }
}
