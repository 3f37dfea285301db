/// Integration tests for admin commands
///
/// Commands run against the in-memory backend, so no database is needed.
/// Run with: cargo test -p moji-admin --test commands_tests

use moji_admin::cli::Command;
use moji_admin::commands::Admin;
use moji_admin::error::AdminError;
use moji_shared::backend::MemoryBackend;
use moji_shared::config::Settings;
use moji_shared::error::StoreError;
use moji_shared::schema::{EntityKind, OWNER, WORKSPACE};
use moji_shared::store::{RecordStore, RetryPolicy};
use std::sync::Arc;
use uuid::Uuid;

fn admin() -> (Arc<MemoryBackend>, Admin) {
    let backend = Arc::new(MemoryBackend::new());
    let store = RecordStore::new(backend.clone()).with_retry(RetryPolicy::immediate(1));
    (backend, Admin::new(store, &Settings::default()))
}

fn create_owner(handle: &str, seed: bool) -> Command {
    Command::CreateOwner {
        handle: handle.to_string(),
        email: format!("{}@example.com", handle),
        display_name: None,
        seed,
    }
}

#[tokio::test]
async fn test_create_owner_with_seed() {
    let (backend, admin) = admin();

    let output = admin.execute(create_owner("ada", true)).await.unwrap();
    assert_eq!(output["owner"]["handle"], "ada");
    assert_eq!(output["owner"]["display_name"], "ada");
    assert_eq!(output["seeded"]["workspaces_created"], 3);
    assert_eq!(backend.row_count(&WORKSPACE).await, 3);

    let listed = admin
        .execute(Command::ListWorkspaces { owner: "ada".into() })
        .await
        .unwrap();
    assert_eq!(listed["workspaces"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_resolve_owner_by_id_or_handle() {
    let (_, admin) = admin();
    admin.execute(create_owner("ada", false)).await.unwrap();

    let by_handle = admin.resolve_owner("ada").await.unwrap();
    let by_id = admin.resolve_owner(&by_handle.id.to_string()).await.unwrap();
    assert_eq!(by_id, by_handle);

    let err = admin.resolve_owner("nobody").await.unwrap_err();
    assert!(matches!(err, AdminError::Store(StoreError::NotFound { entity: EntityKind::Owner })));
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_delete_owner_requires_confirmation() {
    let (backend, admin) = admin();
    admin.execute(create_owner("ada", true)).await.unwrap();

    let err = admin
        .execute(Command::DeleteOwner { owner: "ada".into(), yes: false })
        .await
        .unwrap_err();
    assert!(matches!(err, AdminError::BadRequest(_)));
    assert_eq!(backend.row_count(&OWNER).await, 1);

    admin
        .execute(Command::DeleteOwner { owner: "ada".into(), yes: true })
        .await
        .unwrap();
    assert_eq!(backend.row_count(&OWNER).await, 0);
    assert_eq!(backend.row_count(&WORKSPACE).await, 0);
}

#[tokio::test]
async fn test_license_assignment_changes_limits() {
    let (_, admin) = admin();
    admin.execute(create_owner("ada", false)).await.unwrap();

    let created = admin
        .execute(Command::CreateLicense {
            name: "Pro".into(),
            description: None,
            price: 900,
            max_projects: 50,
            max_notes: 500,
            max_todos: 1000,
            inactive: false,
        })
        .await
        .unwrap();
    let license_id: Uuid = created["license"]["id"].as_str().unwrap().parse().unwrap();

    let assigned = admin
        .execute(Command::AssignLicense {
            owner: "ada".into(),
            license: Some(license_id),
            clear: false,
        })
        .await
        .unwrap();
    assert_eq!(assigned["limits"]["workspaces"], 50);
    assert_eq!(assigned["limits"]["tasks"], 1000);

    let shown = admin.execute(Command::ShowOwner { owner: "ada".into() }).await.unwrap();
    assert_eq!(shown["license"]["name"], "Pro");

    let cleared = admin
        .execute(Command::AssignLicense { owner: "ada".into(), license: None, clear: true })
        .await
        .unwrap();
    assert_eq!(cleared["limits"]["workspaces"], 20);
}

#[tokio::test]
async fn test_capacity_report() {
    let (_, admin) = admin();
    let created = admin.execute(create_owner("ada", true)).await.unwrap();
    let owner_id: Uuid = created["owner"]["id"].as_str().unwrap().parse().unwrap();

    let welcome = admin
        .scope()
        .list_workspaces(owner_id)
        .await
        .unwrap()
        .into_iter()
        .find(|ws| ws.get_str("name") == Some("Welcome"))
        .unwrap();

    let output = admin
        .execute(Command::Capacity { owner: "ada".into(), workspace: welcome.id })
        .await
        .unwrap();
    assert_eq!(output["capacity"]["tasks"]["current"], 5);
    assert_eq!(output["capacity"]["notes"]["current"], 2);
    assert_eq!(output["capacity"]["pages"]["remaining"], 98);

    // Another owner's workspace is not visible
    admin.execute(create_owner("grace", false)).await.unwrap();
    let err = admin
        .execute(Command::Capacity { owner: "grace".into(), workspace: welcome.id })
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[tokio::test]
async fn test_invite_round_trip() {
    let (_, admin) = admin();
    admin.execute(create_owner("ada", false)).await.unwrap();
    admin.execute(create_owner("grace", false)).await.unwrap();

    let issued = admin.execute(Command::CreateInvite { owner: "ada".into() }).await.unwrap();
    let link = issued["invite"]["link"].as_str().unwrap().to_string();

    let redeemed = admin
        .execute(Command::RedeemInvite { link: link.clone(), owner: "grace".into() })
        .await
        .unwrap();
    assert_eq!(redeemed["invite"]["is_active"], false);

    let err = admin
        .execute(Command::RedeemInvite { link, owner: "grace".into() })
        .await
        .unwrap_err();
    assert_eq!(err.exit_code(), 2);
}

#[tokio::test]
async fn test_maintenance_commands_need_a_pool() {
    let (_, admin) = admin();
    let err = admin.execute(Command::Migrate).await.unwrap_err();
    assert!(matches!(err, AdminError::BadRequest(_)));
}
