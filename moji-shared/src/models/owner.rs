/// Owner model
///
/// Owners are the account holders at the root of the ownership tree. Handle
/// and email are each unique across all owners, deactivated ones included.
/// Deactivating an owner is a soft delete; purging one removes every
/// workspace, task, note, page and invite link underneath.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::WriteInput;
use crate::error::StoreResult;
use crate::record::Record;

/// Owner view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Uuid,
    pub display_name: String,
    pub handle: String,
    pub email: String,
    pub license_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl Owner {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        record.decode()
    }

    /// Whether the owner may hold and create content
    pub fn is_active(&self) -> bool {
        !self.is_deleted
    }
}

/// Input for registering an owner
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateOwner {
    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    pub display_name: String,

    #[validate(length(min = 1, max = 64, message = "Handle must be 1-64 characters"))]
    pub handle: String,

    #[validate(
        email(message = "Invalid email address"),
        length(max = 128, message = "Email must be at most 128 characters")
    )]
    pub email: String,
}

impl WriteInput for CreateOwner {}

/// Input for updating an owner's profile
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateOwner {
    #[validate(length(min = 1, max = 64, message = "Display name must be 1-64 characters"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[validate(email(message = "Invalid email address"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl WriteInput for UpdateOwner {}
