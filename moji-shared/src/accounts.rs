/// Owners, licenses and invite links
///
/// These entities sit outside the workspace tree, so they are not guarded
/// by [`OwnershipScope`](crate::scope::OwnershipScope); the operations here
/// enforce their own rules:
///
/// - Handles and emails are unique across all owners
/// - Deactivating an owner is a soft delete; purging one cascades to every
///   workspace, task, note, page and invite link it holds
/// - Only existing, active licenses can be assigned
/// - Invite links are redeemable once, never by their issuer
///
/// # Invite link format
///
/// `moji_inv_{24_chars}`: a fixed prefix followed by 24 random base62
/// characters.

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{StoreError, StoreResult, ValidationReason};
use crate::models::invite_link::InviteLink;
use crate::models::license::{CreateLicense, License};
use crate::models::owner::{CreateOwner, Owner, UpdateOwner};
use crate::models::WriteInput;
use crate::record::{Fields, Filter, Record};
use crate::schema::{timestamp_value, EntityKind};
use crate::store::RecordStore;

/// Invite link prefix
pub const INVITE_PREFIX: &str = "moji_inv_";

/// Length of the random part of an invite link
const INVITE_RANDOM_LENGTH: usize = 24;

/// Generates a new invite link
pub fn generate_invite_link() -> String {
    let random_part: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(INVITE_RANDOM_LENGTH)
        .map(char::from)
        .collect();

    format!("{}{}", INVITE_PREFIX, random_part)
}

/// Checks the shape of an invite link without touching storage
pub fn is_valid_invite_format(link: &str) -> bool {
    match link.strip_prefix(INVITE_PREFIX) {
        Some(rest) => rest.len() == INVITE_RANDOM_LENGTH && rest.chars().all(|c| c.is_ascii_alphanumeric()),
        None => false,
    }
}

fn invalid(field: &str, message: &str) -> StoreError {
    StoreError::validation(field, ValidationReason::Invalid(message.to_string()))
}

/// Account-level operations
#[derive(Debug, Clone)]
pub struct Accounts {
    store: RecordStore,
}

impl Accounts {
    pub fn new(store: RecordStore) -> Self {
        Accounts { store }
    }

    async fn find_one(&self, kind: EntityKind, filter: Filter) -> StoreResult<Option<Record>> {
        Ok(self.store.get_all_filtered(kind, &filter).await?.into_iter().next())
    }

    async fn active_owner_record(&self, owner_id: Uuid) -> StoreResult<Record> {
        self.store
            .get_by_id(EntityKind::Owner, owner_id)
            .await?
            .filter(|r| !r.is_deleted)
            .ok_or_else(|| StoreError::not_found(EntityKind::Owner))
    }

    // ---- owners ----

    /// Registers a new owner
    ///
    /// # Errors
    ///
    /// `Validation` with reason `Duplicate` on `handle` or `email` if either
    /// is taken, including by a deactivated owner.
    pub async fn register_owner(&self, input: &CreateOwner) -> StoreResult<Owner> {
        let record = self.store.create(EntityKind::Owner, input.into_fields()?).await?;
        info!(owner_id = %record.id, "Owner registered");
        Owner::from_record(&record)
    }

    /// Gets an owner by id, deactivated or not
    pub async fn get_owner(&self, owner_id: Uuid) -> StoreResult<Owner> {
        let record = self.store.require(EntityKind::Owner, owner_id).await?;
        Owner::from_record(&record)
    }

    pub async fn find_owner_by_handle(&self, handle: &str) -> StoreResult<Option<Owner>> {
        self.find_one(EntityKind::Owner, Filter::new().eq("handle", handle))
            .await?
            .map(|r| Owner::from_record(&r))
            .transpose()
    }

    pub async fn find_owner_by_email(&self, email: &str) -> StoreResult<Option<Owner>> {
        self.find_one(EntityKind::Owner, Filter::new().eq("email", email))
            .await?
            .map(|r| Owner::from_record(&r))
            .transpose()
    }

    pub async fn update_owner(&self, owner_id: Uuid, input: &UpdateOwner) -> StoreResult<Owner> {
        let record = self.active_owner_record(owner_id).await?;
        let updated = self.store.update(&record, input.into_fields()?).await?;
        Owner::from_record(&updated)
    }

    /// Soft-deletes an owner; their workspaces become unreachable for new writes
    pub async fn deactivate_owner(&self, owner_id: Uuid) -> StoreResult<Owner> {
        let record = self.store.require(EntityKind::Owner, owner_id).await?;
        let updated = self.store.soft_delete(&record).await?;
        info!(owner_id = %owner_id, "Owner deactivated");
        Owner::from_record(&updated)
    }

    pub async fn reactivate_owner(&self, owner_id: Uuid) -> StoreResult<Owner> {
        let record = self.store.require(EntityKind::Owner, owner_id).await?;
        let updated = self.store.restore(&record).await?;
        Owner::from_record(&updated)
    }

    /// Permanently removes an owner and everything they hold
    pub async fn delete_owner(&self, owner_id: Uuid) -> StoreResult<()> {
        let record = self.store.require(EntityKind::Owner, owner_id).await?;
        self.store.hard_delete(&record).await?;
        info!(owner_id = %owner_id, "Owner purged");
        Ok(())
    }

    // ---- licenses ----

    pub async fn create_license(&self, input: &CreateLicense) -> StoreResult<License> {
        let record = self.store.create(EntityKind::License, input.into_fields()?).await?;
        info!(license_id = %record.id, name = %input.name, "License created");
        License::from_record(&record)
    }

    pub async fn get_license(&self, license_id: Uuid) -> StoreResult<License> {
        let record = self.store.require(EntityKind::License, license_id).await?;
        License::from_record(&record)
    }

    /// Lists licenses available for assignment
    pub async fn list_licenses(&self) -> StoreResult<Vec<License>> {
        self.store
            .get_all_filtered(EntityKind::License, &Filter::active().eq("is_active", true))
            .await?
            .iter()
            .map(License::from_record)
            .collect()
    }

    /// Assigns a license to an owner, or clears it with `None`
    ///
    /// # Errors
    ///
    /// - `NotFound(Owner)` for a missing or deactivated owner
    /// - `NotFound(License)` for a missing or deleted license
    /// - `Validation` on `license_id` for an inactive license
    pub async fn assign_license(&self, owner_id: Uuid, license_id: Option<Uuid>) -> StoreResult<Owner> {
        let owner = self.active_owner_record(owner_id).await?;

        if let Some(license_id) = license_id {
            let license = self
                .store
                .get_by_id(EntityKind::License, license_id)
                .await?
                .filter(|r| !r.is_deleted)
                .ok_or_else(|| StoreError::not_found(EntityKind::License))?;

            if license.get_bool("is_active") != Some(true) {
                return Err(invalid("license_id", "license is not active"));
            }
        }

        let mut fields = Fields::new();
        fields.insert(
            "license_id".to_string(),
            license_id.map_or(Value::Null, |id| Value::from(id.to_string())),
        );

        let updated = self.store.update(&owner, fields).await?;
        info!(owner_id = %owner_id, license_id = ?license_id, "License assigned");
        Owner::from_record(&updated)
    }

    /// The owner's license, if one is assigned and not deleted
    pub async fn license_for_owner(&self, owner_id: Uuid) -> StoreResult<Option<License>> {
        let owner = self.store.require(EntityKind::Owner, owner_id).await?;
        let Some(license_id) = owner.get_uuid("license_id") else {
            return Ok(None);
        };

        self.store
            .get_by_id(EntityKind::License, license_id)
            .await?
            .filter(|r| !r.is_deleted)
            .map(|r| License::from_record(&r))
            .transpose()
    }

    // ---- invite links ----

    /// Issues a new invite link for an active owner
    pub async fn create_invite(&self, owner_id: Uuid) -> StoreResult<InviteLink> {
        self.active_owner_record(owner_id).await?;

        let mut fields = Fields::new();
        fields.insert("link".to_string(), generate_invite_link().into());
        fields.insert("owner_id".to_string(), owner_id.to_string().into());

        let record = self.store.create(EntityKind::InviteLink, fields).await?;
        debug!(invite_id = %record.id, owner_id = %owner_id, "Invite link created");
        InviteLink::from_record(&record)
    }

    /// Lists an owner's invite links, redeemed and revoked ones included
    pub async fn list_invites(&self, owner_id: Uuid) -> StoreResult<Vec<InviteLink>> {
        self.store
            .get_all_filtered(
                EntityKind::InviteLink,
                &Filter::active().eq_id("owner_id", owner_id),
            )
            .await?
            .iter()
            .map(InviteLink::from_record)
            .collect()
    }

    /// Deactivates one of the owner's invite links
    pub async fn revoke_invite(&self, owner_id: Uuid, invite_id: Uuid) -> StoreResult<InviteLink> {
        let record = self
            .store
            .get_by_id(EntityKind::InviteLink, invite_id)
            .await?
            .filter(|r| !r.is_deleted && r.get_uuid("owner_id") == Some(owner_id))
            .ok_or_else(|| StoreError::not_found(EntityKind::InviteLink))?;

        if record.get_bool("is_active") == Some(false) {
            return InviteLink::from_record(&record);
        }

        let mut fields = Fields::new();
        fields.insert("is_active".to_string(), false.into());
        let updated = self.store.update(&record, fields).await?;
        InviteLink::from_record(&updated)
    }

    /// Redeems an invite link on behalf of another owner
    ///
    /// # Errors
    ///
    /// - `NotFound(InviteLink)` if no such link exists
    /// - `NotFound(Owner)` if the redeeming owner is missing or deactivated
    /// - `Validation` on `link` if the link is inactive or was issued by the
    ///   redeeming owner
    pub async fn redeem_invite(&self, link: &str, redeemer_id: Uuid) -> StoreResult<InviteLink> {
        if !is_valid_invite_format(link) {
            return Err(StoreError::not_found(EntityKind::InviteLink));
        }

        let record = self
            .find_one(EntityKind::InviteLink, Filter::active().eq("link", link))
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::InviteLink))?;

        self.active_owner_record(redeemer_id).await?;

        let invite = InviteLink::from_record(&record)?;
        if !invite.is_redeemable() {
            return Err(invalid("link", "invite link is no longer active"));
        }
        if invite.owner_id == redeemer_id {
            return Err(invalid("link", "cannot redeem your own invite link"));
        }

        let mut fields = Fields::new();
        fields.insert("redeemed_by".to_string(), redeemer_id.to_string().into());
        fields.insert("redeemed_at".to_string(), timestamp_value(Utc::now()));
        fields.insert("is_active".to_string(), false.into());

        let updated = self.store.update_system(&record, fields).await?;
        info!(invite_id = %updated.id, redeemer_id = %redeemer_id, "Invite link redeemed");
        InviteLink::from_record(&updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_invite_link_format() {
        let link = generate_invite_link();
        assert!(link.starts_with(INVITE_PREFIX));
        assert_eq!(link.len(), INVITE_PREFIX.len() + INVITE_RANDOM_LENGTH);
        assert!(is_valid_invite_format(&link));
    }

    #[test]
    fn test_generate_invite_link_is_random() {
        assert_ne!(generate_invite_link(), generate_invite_link());
    }

    #[test]
    fn test_invalid_invite_formats() {
        assert!(!is_valid_invite_format(""));
        assert!(!is_valid_invite_format("moji_inv_short"));
        assert!(!is_valid_invite_format("moji_abcdefghijklmnopqrstuvwxyz"));
        assert!(!is_valid_invite_format("moji_inv_abcdefghijklmnopqrstuv-x"));
    }
}
