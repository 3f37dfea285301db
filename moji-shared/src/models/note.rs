/// Note model
///
/// Short free-text notes with a tag list, scoped to a workspace and
/// (denormalized) its owner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::WriteInput;
use crate::error::StoreResult;
use crate::record::Record;

/// Note view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub workspace_id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl Note {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        record.decode()
    }
}

/// Input for creating a note
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateNote {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl WriteInput for CreateNote {}

/// Input for updating a note
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateNote {
    #[validate(length(min = 1, max = 100, message = "Title must be 1-100 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl WriteInput for UpdateNote {}
