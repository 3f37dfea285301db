/// Integration tests for owners, licenses and invite links
///
/// Run with: cargo test --test accounts_tests

#[allow(dead_code)]
mod common;

use common::{fields, harness, owner};
use moji_shared::accounts::INVITE_PREFIX;
use moji_shared::error::{StoreError, ValidationReason};
use moji_shared::models::license::CreateLicense;
use moji_shared::models::owner::{CreateOwner, UpdateOwner};
use moji_shared::schema::{EntityKind, INVITE_LINK, NOTE, OWNER, TASK, WORKSPACE};
use moji_shared::scope::ChildKind;
use serde_json::json;
use uuid::Uuid;

fn license_input(name: &str, is_active: bool) -> CreateLicense {
    CreateLicense {
        name: name.to_string(),
        description: Some(format!("{} tier", name)),
        price: Some(500),
        is_active: Some(is_active),
        max_projects: 5,
        max_notes: 50,
        max_todos: 50,
    }
}

#[tokio::test]
async fn test_register_and_find_owner() {
    let h = harness();
    let ada = owner(&h, "ada").await;

    let by_handle = h.accounts.find_owner_by_handle("ada").await.unwrap().unwrap();
    assert_eq!(by_handle.id, ada.id);

    let by_email = h.accounts.find_owner_by_email("ada@example.com").await.unwrap().unwrap();
    assert_eq!(by_email.id, ada.id);

    assert!(h.accounts.find_owner_by_handle("nobody").await.unwrap().is_none());
    assert_eq!(h.accounts.get_owner(ada.id).await.unwrap(), ada);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_bad_input() {
    let h = harness();
    owner(&h, "ada").await;

    let err = h
        .accounts
        .register_owner(&CreateOwner {
            display_name: "Imposter".into(),
            handle: "someone-else".into(),
            email: "ada@example.com".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation { ref field, reason: ValidationReason::Duplicate } if field == "email"
    ));

    let err = h
        .accounts
        .register_owner(&CreateOwner {
            display_name: "Bad".into(),
            handle: "bad".into(),
            email: "not-an-email".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "email"));
    assert_eq!(h.backend.row_count(&OWNER).await, 1);
}

#[tokio::test]
async fn test_update_and_deactivate_owner() {
    let h = harness();
    let ada = owner(&h, "ada").await;

    let updated = h
        .accounts
        .update_owner(
            ada.id,
            &UpdateOwner {
                display_name: Some("Countess".into()),
                email: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.display_name, "Countess");
    assert_eq!(updated.email, "ada@example.com");

    let deactivated = h.accounts.deactivate_owner(ada.id).await.unwrap();
    assert!(!deactivated.is_active());

    let err = h
        .accounts
        .update_owner(ada.id, &UpdateOwner { display_name: Some("x".into()), email: None })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: EntityKind::Owner }));

    let reactivated = h.accounts.reactivate_owner(ada.id).await.unwrap();
    assert!(reactivated.is_active());
}

#[tokio::test]
async fn test_delete_owner_cascades_to_everything() {
    let h = harness();
    let ada = owner(&h, "ada").await;
    let grace = owner(&h, "grace").await;

    for o in [&ada, &grace] {
        let ws = h
            .scope
            .create_workspace(o.id, fields(json!({ "name": "Inbox" })))
            .await
            .unwrap();
        h.scope
            .scoped_create(ChildKind::Task, ws.id, o.id, fields(json!({ "content": "todo" })))
            .await
            .unwrap();
        h.scope
            .scoped_create(ChildKind::Note, ws.id, o.id, fields(json!({ "title": "note" })))
            .await
            .unwrap();
        h.accounts.create_invite(o.id).await.unwrap();
    }

    h.accounts.delete_owner(ada.id).await.unwrap();

    assert_eq!(h.backend.row_count(&OWNER).await, 1);
    assert_eq!(h.backend.row_count(&WORKSPACE).await, 1);
    assert_eq!(h.backend.row_count(&TASK).await, 1);
    assert_eq!(h.backend.row_count(&NOTE).await, 1);
    assert_eq!(h.backend.row_count(&INVITE_LINK).await, 1);
    assert!(h.scope.list_workspaces(ada.id).await.unwrap().is_empty());

    let err = h.accounts.delete_owner(ada.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: EntityKind::Owner }));
}

#[tokio::test]
async fn test_license_assignment() {
    let h = harness();
    let ada = owner(&h, "ada").await;
    let pro = h.accounts.create_license(&license_input("Pro", true)).await.unwrap();
    let legacy = h.accounts.create_license(&license_input("Legacy", false)).await.unwrap();

    let listed = h.accounts.list_licenses().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, pro.id);

    let err = h.accounts.assign_license(ada.id, Some(legacy.id)).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "license_id"));

    let err = h.accounts.assign_license(ada.id, Some(Uuid::new_v4())).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: EntityKind::License }));

    let assigned = h.accounts.assign_license(ada.id, Some(pro.id)).await.unwrap();
    assert_eq!(assigned.license_id, Some(pro.id));
    assert_eq!(h.accounts.license_for_owner(ada.id).await.unwrap().unwrap().id, pro.id);

    let cleared = h.accounts.assign_license(ada.id, None).await.unwrap();
    assert!(cleared.license_id.is_none());
    assert!(h.accounts.license_for_owner(ada.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_license_names_are_unique() {
    let h = harness();
    h.accounts.create_license(&license_input("Pro", true)).await.unwrap();

    let err = h.accounts.create_license(&license_input("Pro", false)).await.unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation { ref field, reason: ValidationReason::Duplicate } if field == "name"
    ));
}

#[tokio::test]
async fn test_invite_lifecycle() {
    let h = harness();
    let ada = owner(&h, "ada").await;
    let grace = owner(&h, "grace").await;

    let invite = h.accounts.create_invite(ada.id).await.unwrap();
    assert!(invite.link.starts_with(INVITE_PREFIX));
    assert!(invite.is_redeemable());

    let err = h.accounts.redeem_invite(&invite.link, ada.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation { ref field, .. } if field == "link"));

    let redeemed = h.accounts.redeem_invite(&invite.link, grace.id).await.unwrap();
    assert_eq!(redeemed.redeemed_by, Some(grace.id));
    assert!(redeemed.redeemed_at.is_some());
    assert!(!redeemed.is_active);

    let err = h.accounts.redeem_invite(&invite.link, grace.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation { .. }));

    let invites = h.accounts.list_invites(ada.id).await.unwrap();
    assert_eq!(invites.len(), 1);
    assert_eq!(invites[0].redeemed_by, Some(grace.id));
}

#[tokio::test]
async fn test_redeem_unknown_link() {
    let h = harness();
    let grace = owner(&h, "grace").await;

    for link in ["garbage", "moji_inv_AAAAAAAAAAAAAAAAAAAAAAAA"] {
        let err = h.accounts.redeem_invite(link, grace.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: EntityKind::InviteLink }));
    }
}

#[tokio::test]
async fn test_revoke_invite() {
    let h = harness();
    let ada = owner(&h, "ada").await;
    let grace = owner(&h, "grace").await;
    let invite = h.accounts.create_invite(ada.id).await.unwrap();

    let err = h.accounts.revoke_invite(grace.id, invite.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: EntityKind::InviteLink }));

    let revoked = h.accounts.revoke_invite(ada.id, invite.id).await.unwrap();
    assert!(!revoked.is_active);

    let err = h.accounts.redeem_invite(&invite.link, grace.id).await.unwrap_err();
    assert!(matches!(err, StoreError::Validation { .. }));
}

#[tokio::test]
async fn test_deactivated_owner_cannot_issue_invites() {
    let h = harness();
    let ada = owner(&h, "ada").await;
    h.accounts.deactivate_owner(ada.id).await.unwrap();

    let err = h.accounts.create_invite(ada.id).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { entity: EntityKind::Owner }));
}
