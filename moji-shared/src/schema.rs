/// Entity descriptors
///
/// Every entity Moji stores is described here as plain data: its table, its
/// fields and how callers may write them, its parent in the ownership tree,
/// and its unique keys. The record store, the backends and the scoping layer
/// are all driven by these descriptors; there is no per-entity persistence
/// code.
///
/// # Ownership tree
///
/// ```text
/// Owner ─┬─ Workspace ─┬─ Task
///        │             ├─ Note
///        │             └─ Page
///        └─ InviteLink
/// License (detached tier object, referenced by Owner.license_id)
/// ```
///
/// Hard-deleting a node removes every descendant with it.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::record::Fields;

/// Fields only the persistence layer may set
pub const PROTECTED_FIELDS: [&str; 3] = ["id", "created_at", "updated_at"];

/// Soft-delete flag, changed only through soft_delete/restore
pub const LIFECYCLE_FIELD: &str = "is_deleted";

/// Prefix reserved for private attributes
pub const PRIVATE_MARKER: char = '_';

/// Kinds of stored entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Owner,
    Workspace,
    Task,
    Note,
    Page,
    License,
    InviteLink,
}

impl EntityKind {
    /// All kinds, parents before children
    pub const ALL: [EntityKind; 7] = [
        EntityKind::License,
        EntityKind::Owner,
        EntityKind::Workspace,
        EntityKind::Task,
        EntityKind::Note,
        EntityKind::Page,
        EntityKind::InviteLink,
    ];

    /// Returns the descriptor for this kind
    pub fn def(&self) -> &'static EntityDef {
        match self {
            EntityKind::Owner => &OWNER,
            EntityKind::Workspace => &WORKSPACE,
            EntityKind::Task => &TASK,
            EntityKind::Note => &NOTE,
            EntityKind::Page => &PAGE,
            EntityKind::License => &LICENSE,
            EntityKind::InviteLink => &INVITE_LINK,
        }
    }

    /// Human-readable name, used in user-facing messages
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Owner => "Owner",
            EntityKind::Workspace => "Workspace",
            EntityKind::Task => "Task",
            EntityKind::Note => "Note",
            EntityKind::Page => "Page",
            EntityKind::License => "License",
            EntityKind::InviteLink => "Invite link",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value type of a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// UTF-8 text, length counted in characters
    Text { min_len: usize, max_len: Option<usize> },

    Bool,

    /// Integer within an inclusive range
    Int { min: i64, max: i64 },

    /// UUID in its hyphenated string form
    Uuid,

    /// RFC 3339 timestamp
    Timestamp,

    /// List of strings
    Tags,
}

/// Who may write a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccess {
    /// Settable on create and update
    Writable,

    /// Settable on create only
    Immutable,

    /// Maintained by the persistence layer
    Internal,
}

/// Value applied when a create payload omits a field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldDefault {
    Null,
    Bool(bool),
    Int(i64),
    Text(&'static str),
    EmptyTags,
}

impl FieldDefault {
    pub fn to_value(self) -> Value {
        match self {
            FieldDefault::Null => Value::Null,
            FieldDefault::Bool(b) => Value::Bool(b),
            FieldDefault::Int(i) => Value::from(i),
            FieldDefault::Text(s) => Value::from(s),
            FieldDefault::EmptyTags => Value::Array(Vec::new()),
        }
    }
}

/// A single entity field
#[derive(Debug, Clone, Copy)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
    pub required: bool,
    pub nullable: bool,
    pub access: FieldAccess,
    pub default: FieldDefault,
}

impl FieldDef {
    const fn new(name: &'static str, ty: FieldType) -> Self {
        FieldDef {
            name,
            ty,
            required: false,
            nullable: false,
            access: FieldAccess::Writable,
            default: FieldDefault::Null,
        }
    }

    const fn text(name: &'static str, min_len: usize, max_len: Option<usize>) -> Self {
        Self::new(name, FieldType::Text { min_len, max_len })
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    const fn immutable(mut self) -> Self {
        self.access = FieldAccess::Immutable;
        self
    }

    const fn internal(mut self) -> Self {
        self.access = FieldAccess::Internal;
        self.nullable = true;
        self
    }

    const fn default(mut self, default: FieldDefault) -> Self {
        self.default = default;
        self
    }

    /// Checks a value against this field's type
    ///
    /// Returns a short description of the problem when the value does not fit.
    pub fn check_value(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return if self.nullable {
                Ok(())
            } else {
                Err("must not be null".to_string())
            };
        }

        match self.ty {
            FieldType::Text { min_len, max_len } => {
                let s = value.as_str().ok_or_else(|| "expected text".to_string())?;
                let len = s.chars().count();
                if len < min_len {
                    return Err(format!("must be at least {} characters", min_len));
                }
                if let Some(max) = max_len {
                    if len > max {
                        return Err(format!("must be at most {} characters", max));
                    }
                }
                Ok(())
            }
            FieldType::Bool => value
                .as_bool()
                .map(|_| ())
                .ok_or_else(|| "expected a boolean".to_string()),
            FieldType::Int { min, max } => {
                let n = value
                    .as_i64()
                    .ok_or_else(|| "expected an integer".to_string())?;
                if n < min || n > max {
                    return Err(format!("must be between {} and {}", min, max));
                }
                Ok(())
            }
            FieldType::Uuid => {
                let s = value.as_str().ok_or_else(|| "expected a UUID".to_string())?;
                uuid::Uuid::parse_str(s)
                    .map(|_| ())
                    .map_err(|_| "expected a UUID".to_string())
            }
            FieldType::Timestamp => {
                let s = value
                    .as_str()
                    .ok_or_else(|| "expected a timestamp".to_string())?;
                DateTime::parse_from_rfc3339(s)
                    .map(|_| ())
                    .map_err(|_| "expected an RFC 3339 timestamp".to_string())
            }
            FieldType::Tags => {
                let items = value
                    .as_array()
                    .ok_or_else(|| "expected a list of tags".to_string())?;
                if items.iter().all(Value::is_string) {
                    Ok(())
                } else {
                    Err("tags must be strings".to_string())
                }
            }
        }
    }

    /// Rewrites a checked value into the form records store
    ///
    /// UUIDs are kept lowercase and hyphenated so links compare equal in
    /// filters, cascades and JSONB containment whatever form the caller used.
    pub fn normalize(&self, value: Value) -> Value {
        match (self.ty, value.as_str().map(uuid::Uuid::parse_str)) {
            (FieldType::Uuid, Some(Ok(id))) => Value::from(id.to_string()),
            _ => value,
        }
    }
}

/// Link from a child entity to its parent in the ownership tree
#[derive(Debug, Clone, Copy)]
pub struct ParentLink {
    pub kind: EntityKind,
    pub field: &'static str,
}

/// A set of fields whose combined values must be unique within a table
#[derive(Debug, Clone, Copy)]
pub struct UniqueKey {
    /// Constraint name, shared with the database index
    pub name: &'static str,
    pub fields: &'static [&'static str],
}

/// Hook run on the merged field map before every create and update
pub type StampFn = fn(&mut Fields, DateTime<Utc>);

/// Descriptor of one entity type
#[derive(Debug)]
pub struct EntityDef {
    pub kind: EntityKind,
    pub table: &'static str,
    pub fields: &'static [FieldDef],
    pub parent: Option<ParentLink>,
    pub unique: &'static [UniqueKey],
    pub stamp: Option<StampFn>,
}

impl EntityDef {
    /// Looks up a field by name
    pub fn field(&self, name: &str) -> Option<&'static FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether `name` can be used in an exact-match filter
    pub fn is_filterable(&self, name: &str) -> bool {
        name == "id" || name == LIFECYCLE_FIELD || self.field(name).is_some()
    }

    /// Descriptors whose parent is this entity
    pub fn children(&self) -> impl Iterator<Item = &'static EntityDef> + '_ {
        EntityKind::ALL
            .iter()
            .map(|k| k.def())
            .filter(move |d| d.parent.map(|p| p.kind) == Some(self.kind))
    }

    /// Finds a unique key by constraint name
    pub fn unique_key(&self, name: &str) -> Option<&'static UniqueKey> {
        self.unique.iter().find(|k| k.name == name)
    }
}

/// Formats a timestamp the way records store it
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    Value::from(at.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn stamp_task_completion(fields: &mut Fields, now: DateTime<Utc>) {
    let done = fields.get("done").and_then(Value::as_bool).unwrap_or(false);
    let completed = fields
        .get("completed_at")
        .map(|v| !v.is_null())
        .unwrap_or(false);

    if done && !completed {
        fields.insert("completed_at".to_string(), timestamp_value(now));
    } else if !done {
        fields.insert("completed_at".to_string(), Value::Null);
    }
}

pub static OWNER: EntityDef = EntityDef {
    kind: EntityKind::Owner,
    table: "owners",
    fields: &[
        FieldDef::text("display_name", 1, Some(64)).required(),
        FieldDef::text("handle", 1, Some(64)).required(),
        FieldDef::text("email", 3, Some(128)).required(),
        FieldDef::new("license_id", FieldType::Uuid).nullable(),
    ],
    parent: None,
    unique: &[
        UniqueKey { name: "owners_handle_key", fields: &["handle"] },
        UniqueKey { name: "owners_email_key", fields: &["email"] },
    ],
    stamp: None,
};

pub static WORKSPACE: EntityDef = EntityDef {
    kind: EntityKind::Workspace,
    table: "workspaces",
    fields: &[
        FieldDef::text("name", 1, Some(100)).required(),
        FieldDef::text("description", 0, Some(1000)).nullable(),
        FieldDef::new("owner_id", FieldType::Uuid).required().immutable(),
    ],
    parent: Some(ParentLink { kind: EntityKind::Owner, field: "owner_id" }),
    unique: &[UniqueKey { name: "workspaces_name_owner_key", fields: &["name", "owner_id"] }],
    stamp: None,
};

pub static TASK: EntityDef = EntityDef {
    kind: EntityKind::Task,
    table: "tasks",
    fields: &[
        FieldDef::text("content", 1, Some(500)).required(),
        FieldDef::new("done", FieldType::Bool).default(FieldDefault::Bool(false)),
        FieldDef::new("priority", FieldType::Int { min: 0, max: 3 }).default(FieldDefault::Int(0)),
        FieldDef::new("completed_at", FieldType::Timestamp).internal(),
        FieldDef::new("workspace_id", FieldType::Uuid).required().immutable(),
        FieldDef::new("owner_id", FieldType::Uuid).required().immutable(),
    ],
    parent: Some(ParentLink { kind: EntityKind::Workspace, field: "workspace_id" }),
    unique: &[],
    stamp: Some(stamp_task_completion),
};

pub static NOTE: EntityDef = EntityDef {
    kind: EntityKind::Note,
    table: "notes",
    fields: &[
        FieldDef::text("title", 1, Some(100)).required(),
        FieldDef::text("content", 0, None).default(FieldDefault::Text("")),
        FieldDef::new("tags", FieldType::Tags).default(FieldDefault::EmptyTags),
        FieldDef::new("workspace_id", FieldType::Uuid).required().immutable(),
        FieldDef::new("owner_id", FieldType::Uuid).required().immutable(),
    ],
    parent: Some(ParentLink { kind: EntityKind::Workspace, field: "workspace_id" }),
    unique: &[],
    stamp: None,
};

pub static PAGE: EntityDef = EntityDef {
    kind: EntityKind::Page,
    table: "pages",
    fields: &[
        FieldDef::text("title", 1, Some(200)).required(),
        FieldDef::text("content", 0, None).default(FieldDefault::Text("")),
        FieldDef::new("workspace_id", FieldType::Uuid).required().immutable(),
    ],
    parent: Some(ParentLink { kind: EntityKind::Workspace, field: "workspace_id" }),
    unique: &[],
    stamp: None,
};

pub static LICENSE: EntityDef = EntityDef {
    kind: EntityKind::License,
    table: "licenses",
    fields: &[
        FieldDef::text("name", 1, Some(32)).required(),
        FieldDef::text("description", 0, None).default(FieldDefault::Text("")),
        FieldDef::new("price", FieldType::Int { min: 0, max: i64::MAX }).default(FieldDefault::Int(0)),
        FieldDef::new("is_active", FieldType::Bool).default(FieldDefault::Bool(true)),
        FieldDef::new("max_projects", FieldType::Int { min: 0, max: u32::MAX as i64 }).required(),
        FieldDef::new("max_notes", FieldType::Int { min: 0, max: u32::MAX as i64 }).required(),
        FieldDef::new("max_todos", FieldType::Int { min: 0, max: u32::MAX as i64 }).required(),
    ],
    parent: None,
    unique: &[UniqueKey { name: "licenses_name_key", fields: &["name"] }],
    stamp: None,
};

pub static INVITE_LINK: EntityDef = EntityDef {
    kind: EntityKind::InviteLink,
    table: "invite_links",
    fields: &[
        FieldDef::text("link", 1, Some(128)).required().immutable(),
        FieldDef::new("owner_id", FieldType::Uuid).required().immutable(),
        FieldDef::new("is_active", FieldType::Bool).default(FieldDefault::Bool(true)),
        FieldDef::new("redeemed_by", FieldType::Uuid).internal(),
        FieldDef::new("redeemed_at", FieldType::Timestamp).internal(),
    ],
    parent: Some(ParentLink { kind: EntityKind::Owner, field: "owner_id" }),
    unique: &[UniqueKey { name: "invite_links_link_key", fields: &["link"] }],
    stamp: None,
};
