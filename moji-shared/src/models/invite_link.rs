/// Invite link model
///
/// An invite link belongs to the owner who issued it. Redeeming it records
/// the redeeming owner and time, then deactivates the link.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StoreResult;
use crate::record::Record;

/// Invite link view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InviteLink {
    pub id: Uuid,
    pub link: String,
    pub owner_id: Uuid,
    pub is_active: bool,
    pub redeemed_by: Option<Uuid>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub is_deleted: bool,
}

impl InviteLink {
    pub fn from_record(record: &Record) -> StoreResult<Self> {
        record.decode()
    }

    /// Whether the link can still be redeemed
    pub fn is_redeemable(&self) -> bool {
        self.is_active && !self.is_deleted && self.redeemed_by.is_none()
    }
}
