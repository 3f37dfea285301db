/// Starter content for new owners
///
/// [`seed_defaults`] gives an owner the `Welcome`, `Personal` and `Work`
/// workspaces and fills `Welcome` with example tasks, notes and pages. It is
/// safe to call on every workspace listing:
///
/// - It only seeds an owner with no active workspaces, or with nothing but
///   the untouched default `Personal` workspace
/// - Starter workspaces that already exist are reused (and restored if
///   soft-deleted) instead of created again
/// - Each content type is inserted only when `Welcome` has no rows of that
///   type at all, soft-deleted ones included
///
/// Seeding bypasses capacity caps.

use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::record::{Fields, Filter, Record};
use crate::schema::EntityKind;
use crate::scope::{ChildKind, OwnershipScope};

/// Workspace that receives the example content
pub const WELCOME_WORKSPACE: &str = "Welcome";

/// The single default workspace that does not block seeding
const DEFAULT_WORKSPACE: (&str, &str) = ("Personal", "Your personal workspace");

const STARTER_WORKSPACES: [(&str, &str); 3] = [
    (WELCOME_WORKSPACE, "Start here: a short tour of tasks, notes and pages"),
    DEFAULT_WORKSPACE,
    ("Work", "Projects and to-dos for work"),
];

/// (content, done, priority)
const STARTER_TASKS: [(&str, bool, u8); 5] = [
    ("Create your account", true, 1),
    ("Explore the Welcome workspace", false, 3),
    ("Add your first task", false, 2),
    ("Write a note with a tag", false, 1),
    ("Create a workspace for a project", false, 0),
];

/// (title, content, tags)
const STARTER_NOTES: [(&str, &str, &[&str]); 2] = [
    (
        "Quick idea",
        "Notes are for short thoughts. Jot something down and tag it.",
        &["idea"],
    ),
    (
        "Keyboard shortcuts",
        "Remember to learn the shortcuts for common actions.",
        &["tips"],
    ),
];

/// (title, content)
const STARTER_PAGES: [(&str, &str); 2] = [
    (
        "Welcome to Moji",
        "# Welcome to Moji\n\nA workspace-centric productivity app. Each workspace holds its own tasks, notes and pages.",
    ),
    (
        "How workspaces work",
        "# How workspaces work\n\nUse one workspace per area of your life. Deleting a workspace hides everything inside it until you restore it.",
    ),
];

/// What a seeding pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub workspaces_created: usize,
    pub workspaces_restored: usize,
    pub tasks_created: usize,
    pub notes_created: usize,
    pub pages_created: usize,
}

impl SeedReport {
    /// Whether nothing was written
    pub fn is_noop(&self) -> bool {
        *self == SeedReport::default()
    }

    fn record_content(&mut self, kind: ChildKind, count: usize) {
        match kind {
            ChildKind::Task => self.tasks_created += count,
            ChildKind::Note => self.notes_created += count,
            ChildKind::Page => self.pages_created += count,
        }
    }
}

/// Whether an owner's active workspaces call for seeding
pub fn should_seed(active_workspaces: &[Record]) -> bool {
    match active_workspaces {
        [] => true,
        [only] => {
            only.get_str("name") == Some(DEFAULT_WORKSPACE.0)
                && only.get_str("description") == Some(DEFAULT_WORKSPACE.1)
        }
        _ => false,
    }
}

fn fields_of(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        _ => Fields::new(),
    }
}

fn starter_content(kind: ChildKind) -> Vec<Fields> {
    match kind {
        ChildKind::Task => STARTER_TASKS
            .iter()
            .map(|(content, done, priority)| {
                fields_of(json!({ "content": content, "done": done, "priority": priority }))
            })
            .collect(),
        ChildKind::Note => STARTER_NOTES
            .iter()
            .map(|(title, content, tags)| {
                fields_of(json!({ "title": title, "content": content, "tags": tags }))
            })
            .collect(),
        ChildKind::Page => STARTER_PAGES
            .iter()
            .map(|(title, content)| fields_of(json!({ "title": title, "content": content })))
            .collect(),
    }
}

/// Seeds starter workspaces and content for an owner
///
/// Calling it again after a successful pass writes nothing.
///
/// # Errors
///
/// - `NotFound(Owner)` if the owner is missing or deactivated
/// - `Storage` if a write keeps failing; rows written before the failure
///   stay, and the next call completes the rest
pub async fn seed_defaults(scope: &OwnershipScope, owner_id: Uuid) -> StoreResult<SeedReport> {
    let store = scope.store();
    let mut report = SeedReport::default();

    store
        .get_by_id(EntityKind::Owner, owner_id)
        .await?
        .filter(|owner| !owner.is_deleted)
        .ok_or_else(|| StoreError::not_found(EntityKind::Owner))?;

    let active = scope.list_workspaces(owner_id).await?;
    if !should_seed(&active) {
        debug!(owner_id = %owner_id, workspaces = active.len(), "Owner already has workspaces, not seeding");
        return Ok(report);
    }

    // Names are unique per owner across deleted rows too
    let existing = store
        .get_all_filtered(EntityKind::Workspace, &Filter::new().eq_id("owner_id", owner_id))
        .await?;

    let mut welcome = None;
    for (name, description) in STARTER_WORKSPACES {
        let workspace = match existing.iter().find(|ws| ws.get_str("name") == Some(name)) {
            Some(ws) if ws.is_deleted => {
                report.workspaces_restored += 1;
                store.restore(ws).await?
            }
            Some(ws) => ws.clone(),
            None => {
                let fields = fields_of(json!({
                    "name": name,
                    "description": description,
                    "owner_id": owner_id.to_string(),
                }));
                report.workspaces_created += 1;
                store.create(EntityKind::Workspace, fields).await?
            }
        };

        if name == WELCOME_WORKSPACE {
            welcome = Some(workspace);
        }
    }

    if let Some(welcome) = welcome {
        for kind in ChildKind::ALL {
            let existing_rows = store
                .count(kind.entity(), &Filter::new().eq_id("workspace_id", welcome.id))
                .await?;
            if existing_rows > 0 {
                continue;
            }

            let batch = starter_content(kind);
            let created = batch.len();
            for mut fields in batch {
                fields.insert("workspace_id".to_string(), welcome.id.to_string().into());
                if kind.carries_owner() {
                    fields.insert("owner_id".to_string(), owner_id.to_string().into());
                }
                store.create(kind.entity(), fields).await?;
            }
            report.record_content(kind, created);
        }
    }

    info!(
        owner_id = %owner_id,
        workspaces_created = report.workspaces_created,
        workspaces_restored = report.workspaces_restored,
        tasks = report.tasks_created,
        notes = report.notes_created,
        pages = report.pages_created,
        "Seeded default content"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn workspace(name: &str, description: Option<&str>) -> Record {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name));
        fields.insert("description".into(), json!(description));
        fields.insert("owner_id".into(), json!(Uuid::new_v4().to_string()));
        Record {
            id: Uuid::new_v4(),
            kind: EntityKind::Workspace,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            is_deleted: false,
            fields,
        }
    }

    #[test]
    fn test_should_seed_empty() {
        assert!(should_seed(&[]));
    }

    #[test]
    fn test_should_seed_default_personal_only() {
        assert!(should_seed(&[workspace("Personal", Some("Your personal workspace"))]));
        assert!(!should_seed(&[workspace("Personal", Some("Renamed description"))]));
        assert!(!should_seed(&[workspace("Groceries", None)]));
        assert!(!should_seed(&[
            workspace("Personal", Some("Your personal workspace")),
            workspace("Work", None),
        ]));
    }

    #[test]
    fn test_starter_content_fits_schema() {
        for kind in ChildKind::ALL {
            let def = kind.entity().def();
            for fields in starter_content(kind) {
                for (name, value) in &fields {
                    let field = def.field(name).expect("starter field exists");
                    assert!(field.check_value(value).is_ok(), "{}.{} invalid", def.table, name);
                }
            }
        }
    }

    #[test]
    fn test_report_noop() {
        let mut report = SeedReport::default();
        assert!(report.is_noop());
        report.record_content(ChildKind::Note, 2);
        assert_eq!(report.notes_created, 2);
        assert!(!report.is_noop());
    }
}
