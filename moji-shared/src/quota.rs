/// Capacity limits for workspaces and their contents
///
/// Caps are enforced on:
/// - Active workspaces per owner
/// - Active tasks, notes and pages per workspace
///
/// Soft-deleted rows do not count toward any cap.
///
/// # Default limits
///
/// | Capacity   | Scope         | Default |
/// |------------|---------------|---------|
/// | Workspaces | per owner     | 20      |
/// | Tasks      | per workspace | 200     |
/// | Notes      | per workspace | 200     |
/// | Pages      | per workspace | 100     |
///
/// An active license overrides the workspace, task and note caps with its
/// `max_projects`, `max_todos` and `max_notes`.
///
/// # Example
///
/// ```
/// use moji_shared::quota::{CapacityKind, CapacityLimits};
///
/// let limits = CapacityLimits::default();
/// assert_eq!(limits.get(CapacityKind::Tasks), 200);
/// ```

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::backend::InsertBound;
use crate::error::StoreResult;
use crate::models::license::License;
use crate::record::Filter;
use crate::schema::EntityKind;
use crate::store::RecordStore;

/// Kind of capacity being checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapacityKind {
    /// Active workspaces per owner
    Workspaces,

    /// Active tasks per workspace
    Tasks,

    /// Active notes per workspace
    Notes,

    /// Active pages per workspace
    Pages,
}

impl CapacityKind {
    /// Human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            CapacityKind::Workspaces => "Workspaces",
            CapacityKind::Tasks => "Tasks",
            CapacityKind::Notes => "Notes",
            CapacityKind::Pages => "Pages",
        }
    }

    /// Stable message shown when the cap is hit
    pub fn limit_message(&self) -> &'static str {
        match self {
            CapacityKind::Workspaces => "Workspace limit reached for this account",
            CapacityKind::Tasks => "Task limit reached for this workspace",
            CapacityKind::Notes => "Note limit reached for this workspace",
            CapacityKind::Pages => "Page limit reached for this workspace",
        }
    }

    /// Entity whose rows are counted
    pub fn entity(&self) -> EntityKind {
        match self {
            CapacityKind::Workspaces => EntityKind::Workspace,
            CapacityKind::Tasks => EntityKind::Task,
            CapacityKind::Notes => EntityKind::Note,
            CapacityKind::Pages => EntityKind::Page,
        }
    }

    /// Capacity that bounds an entity, if any
    pub fn for_entity(kind: EntityKind) -> Option<Self> {
        match kind {
            EntityKind::Workspace => Some(CapacityKind::Workspaces),
            EntityKind::Task => Some(CapacityKind::Tasks),
            EntityKind::Note => Some(CapacityKind::Notes),
            EntityKind::Page => Some(CapacityKind::Pages),
            _ => None,
        }
    }

    /// Field linking a counted row to the scope it is counted under
    pub fn scope_field(&self) -> &'static str {
        match self {
            CapacityKind::Workspaces => "owner_id",
            _ => "workspace_id",
        }
    }

    /// Filter selecting the active rows counted under `scope_id`
    pub fn active_filter(&self, scope_id: Uuid) -> Filter {
        Filter::active().eq_id(self.scope_field(), scope_id)
    }

    /// Bound for a conditional insert under `scope_id`
    pub fn bound(&self, scope_id: Uuid, limit: u32) -> InsertBound {
        InsertBound {
            filter: self.active_filter(scope_id),
            limit,
        }
    }
}

impl fmt::Display for CapacityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity limits configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapacityLimits {
    /// Maximum active workspaces per owner
    pub workspaces: u32,

    /// Maximum active tasks per workspace
    pub tasks: u32,

    /// Maximum active notes per workspace
    pub notes: u32,

    /// Maximum active pages per workspace
    pub pages: u32,
}

impl Default for CapacityLimits {
    fn default() -> Self {
        CapacityLimits {
            workspaces: 20,
            tasks: 200,
            notes: 200,
            pages: 100,
        }
    }
}

impl CapacityLimits {
    /// Gets the limit for a capacity kind
    pub fn get(&self, kind: CapacityKind) -> u32 {
        match kind {
            CapacityKind::Workspaces => self.workspaces,
            CapacityKind::Tasks => self.tasks,
            CapacityKind::Notes => self.notes,
            CapacityKind::Pages => self.pages,
        }
    }

    /// Applies a license's caps; inactive licenses change nothing
    pub fn with_license(self, license: &License) -> Self {
        if !license.is_active || license.is_deleted {
            return self;
        }

        CapacityLimits {
            workspaces: license.max_projects,
            tasks: license.max_todos,
            notes: license.max_notes,
            pages: self.pages,
        }
    }
}

/// How capacity caps are enforced on create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapacityMode {
    /// Count, then insert; a concurrent create may exceed the cap by one
    #[default]
    Soft,

    /// Count and insert atomically at the backend
    Strict,
}

/// Capacity check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityCheck {
    /// Whether one more row may be created
    pub allowed: bool,

    /// Active rows counted
    pub current: u32,

    /// Configured cap
    pub limit: u32,

    /// Rows that may still be created
    pub remaining: u32,
}

impl CapacityCheck {
    pub fn new(current: u32, limit: u32) -> Self {
        CapacityCheck {
            allowed: current < limit,
            current,
            limit,
            remaining: limit.saturating_sub(current),
        }
    }
}

/// Counts active rows of `kind` under `scope_id` and compares with `limit`
///
/// `scope_id` is the owner for [`CapacityKind::Workspaces`] and the
/// workspace otherwise. The caller is responsible for the ownership guard.
pub async fn capacity_check(
    store: &RecordStore,
    kind: CapacityKind,
    scope_id: Uuid,
    limit: u32,
) -> StoreResult<CapacityCheck> {
    let count = store
        .count(kind.entity(), &kind.active_filter(scope_id))
        .await?;
    let current = u32::try_from(count).unwrap_or(u32::MAX);

    Ok(CapacityCheck::new(current, limit))
}
