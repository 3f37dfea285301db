/// Task model
///
/// Tasks belong to one workspace and, denormalized, to that workspace's
/// owner. `completed_at` is maintained by the store: it is stamped when
/// `done` becomes true and cleared when `done` goes back to false.
///
/// # Fields
///
/// | Field          | Type      | Rules                          |
/// |----------------|-----------|--------------------------------|
/// | `content`      | text      | 1-500 characters, required     |
/// | `done`         | bool      | default false                  |
/// | `priority`     | integer   | 0-3, default 0                 |
/// | `completed_at` | timestamp | internal                       |
/// | `workspace_id` | uuid      | set by the workspace scope     |
/// | `owner_id`     | uuid      | set by the workspace scope     |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::WriteInput;
use crate::error::StoreResult;
use crate::record::Record;

/// Task priority bounds
pub const MIN_PRIORITY: u8 = 0;
pub const MAX_PRIORITY: u8 = 3;

/// Task view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub content: String,
    pub done: bool,
    pub priority: u8,
    pub completed_at: Option<DateTime<Utc>>,
    pub workspace_id: Uuid,
    pub owner_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl Task {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        record.decode()
    }
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateTask {
    #[validate(length(min = 1, max = 500, message = "Content must be 1-500 characters"))]
    pub content: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,

    #[validate(range(min = 0, max = 3, message = "Priority must be between 0 and 3"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

impl WriteInput for CreateTask {}

/// Input for updating a task
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTask {
    #[validate(length(min = 1, max = 500, message = "Content must be 1-500 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,

    #[validate(range(min = 0, max = 3, message = "Priority must be between 0 and 3"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
}

impl WriteInput for UpdateTask {}
