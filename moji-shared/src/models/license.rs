/// License model
///
/// Licenses are capacity tiers. An owner with an active license gets the
/// license's `max_projects` workspaces and `max_todos`/`max_notes` per
/// workspace instead of the configured defaults. All caps are non-negative.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::WriteInput;
use crate::error::StoreResult;
use crate::record::Record;

/// License view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub id: Uuid,
    pub name: String,
    pub description: String,

    /// Price in cents
    pub price: i64,

    pub is_active: bool,
    pub max_projects: u32,
    pub max_notes: u32,
    pub max_todos: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl License {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        record.decode()
    }
}

/// Input for creating a license
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateLicense {
    #[validate(length(min = 1, max = 32, message = "Name must be 1-32 characters"))]
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[validate(range(min = 0, message = "Price must not be negative"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    pub max_projects: u32,
    pub max_notes: u32,
    pub max_todos: u32,
}

impl WriteInput for CreateLicense {}
