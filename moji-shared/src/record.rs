/// Generic stored record and exact-match filters
///
/// A `Record` is the shape every entity takes inside the persistence layer:
/// the four base attributes shared by all entities plus a JSON map of the
/// entity's own fields, as described by its `EntityDef`. Typed views live in
/// `crate::models` and are produced with [`Record::decode`].

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::backend::BackendError;
use crate::error::{StoreError, StoreResult};
use crate::schema::{EntityKind, LIFECYCLE_FIELD};

/// Field name to value map for one entity
pub type Fields = serde_json::Map<String, Value>;

/// Deletion state of a record
///
/// `Active ⇄ SoftDeleted` through soft_delete/restore. A hard delete removes
/// the row, so a purged record is simply absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionStatus {
    Active,
    SoftDeleted,
}

/// A stored entity row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Server-assigned identifier (UUID v4), never changes
    pub id: Uuid,

    pub kind: EntityKind,

    /// Set once when the record is created
    pub created_at: DateTime<Utc>,

    /// Refreshed on every mutating write
    pub updated_at: DateTime<Utc>,

    /// Hidden from default listings when true
    pub is_deleted: bool,

    /// Entity-specific fields
    pub fields: Fields,
}

impl Record {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_i64)
    }

    pub fn get_uuid(&self, name: &str) -> Option<Uuid> {
        self.get_str(name).and_then(|s| Uuid::parse_str(s).ok())
    }

    pub fn status(&self) -> DeletionStatus {
        if self.is_deleted {
            DeletionStatus::SoftDeleted
        } else {
            DeletionStatus::Active
        }
    }

    /// Value of a filterable attribute, base attributes included
    pub fn attribute(&self, name: &str) -> Value {
        match name {
            "id" => Value::from(self.id.to_string()),
            LIFECYCLE_FIELD => Value::Bool(self.is_deleted),
            _ => self.fields.get(name).cloned().unwrap_or(Value::Null),
        }
    }

    /// Flattens the record into a single JSON object
    pub fn to_json(&self) -> Value {
        let mut map = self.fields.clone();
        map.insert("id".to_string(), Value::from(self.id.to_string()));
        map.insert(
            "created_at".to_string(),
            crate::schema::timestamp_value(self.created_at),
        );
        map.insert(
            "updated_at".to_string(),
            crate::schema::timestamp_value(self.updated_at),
        );
        map.insert(LIFECYCLE_FIELD.to_string(), Value::Bool(self.is_deleted));
        Value::Object(map)
    }

    /// Decodes the record into one of the typed models
    ///
    /// # Errors
    ///
    /// Returns a storage error if the stored fields do not match the model,
    /// which means the row was written outside this layer.
    pub fn decode<T: DeserializeOwned>(&self) -> StoreResult<T> {
        serde_json::from_value(self.to_json()).map_err(|err| StoreError::Storage {
            operation: "decoding record",
            source: BackendError::Corrupt {
                table: self.kind.def().table,
                reason: err.to_string(),
            },
        })
    }
}

/// Exact-match conjunction of attribute conditions
///
/// Soft-deleted rows are not excluded implicitly; listings pass
/// `is_deleted = false` themselves (see [`Filter::active`]).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching non-deleted rows
    pub fn active() -> Self {
        Self::new().eq(LIFECYCLE_FIELD, false)
    }

    /// Adds an equality condition
    pub fn eq(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.conditions.push((name.to_string(), value.into()));
        self
    }

    /// Adds an equality condition on a UUID-valued attribute
    pub fn eq_id(self, name: &str, id: Uuid) -> Self {
        self.eq(name, id.to_string())
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.conditions
            .iter()
            .all(|(name, value)| record.attribute(name) == *value)
    }
}
