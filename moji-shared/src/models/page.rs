/// Page model
///
/// Long-form pages. Unlike tasks and notes, pages carry only their
/// workspace link; ownership is always resolved through the workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::WriteInput;
use crate::error::StoreResult;
use crate::record::Record;

/// Page view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub workspace_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl Page {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        record.decode()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreatePage {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl WriteInput for CreatePage {}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdatePage {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl WriteInput for UpdatePage {}
