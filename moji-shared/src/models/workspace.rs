/// Workspace model
///
/// A workspace belongs to exactly one owner and contains tasks, notes and
/// pages. Names are unique per owner, not globally: two owners may both
/// have a "Personal" workspace.
///
/// # Example
///
/// ```
/// use moji_shared::models::{workspace::CreateWorkspace, WriteInput};
///
/// let input = CreateWorkspace {
///     name: "Side projects".to_string(),
///     description: Some("Weekend hacking".to_string()),
/// };
/// let fields = input.into_fields().unwrap();
/// assert_eq!(fields.len(), 2);
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::WriteInput;
use crate::error::StoreResult;
use crate::record::Record;

/// Workspace view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl Workspace {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        record.decode()
    }
}

/// Input for creating a workspace
///
/// The owner is supplied by the caller identity, never by the payload.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateWorkspace {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl WriteInput for CreateWorkspace {}

/// Input for updating a workspace
///
/// `description: Some(None)` clears the description; `None` leaves it as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateWorkspace {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[validate(length(max = 1000, message = "Description must be at most 1000 characters"))]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "super::explicit_null"
    )]
    pub description: Option<Option<String>>,
}

impl WriteInput for UpdateWorkspace {}
