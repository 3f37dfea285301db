/// Command execution
///
/// [`Admin`] bundles the data layer services a command needs. It only
/// depends on a [`RecordStore`], so every data command can run against the
/// in-memory backend as well as PostgreSQL. The two maintenance commands
/// (`migrate`, `status`) need the pool itself and go through
/// [`run_maintenance`].

use moji_shared::accounts::Accounts;
use moji_shared::config::Settings;
use moji_shared::db::{migrations, pool as db_pool};
use moji_shared::error::StoreError;
use moji_shared::models::license::CreateLicense;
use moji_shared::models::owner::{CreateOwner, Owner};
use moji_shared::models::workspace::Workspace;
use moji_shared::schema::EntityKind;
use moji_shared::scope::{ChildKind, OwnershipScope};
use moji_shared::seed::{seed_defaults, SeedReport};
use moji_shared::store::RecordStore;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::cli::Command;
use crate::error::{AdminError, AdminResult};

/// Data layer services shared by all commands
#[derive(Debug, Clone)]
pub struct Admin {
    scope: OwnershipScope,
    accounts: Accounts,
}

impl Admin {
    pub fn new(store: RecordStore, settings: &Settings) -> Self {
        Admin {
            scope: OwnershipScope::new(store.clone(), settings.limits, settings.capacity_mode),
            accounts: Accounts::new(store),
        }
    }

    pub fn scope(&self) -> &OwnershipScope {
        &self.scope
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    /// Looks an owner up by id or, failing that, by handle
    pub async fn resolve_owner(&self, owner: &str) -> AdminResult<Owner> {
        if let Ok(id) = Uuid::parse_str(owner) {
            return Ok(self.accounts.get_owner(id).await?);
        }

        self.accounts
            .find_owner_by_handle(owner)
            .await?
            .ok_or_else(|| StoreError::not_found(EntityKind::Owner).into())
    }

    /// Runs a data command and returns its JSON output
    pub async fn execute(&self, command: Command) -> AdminResult<Value> {
        match command {
            Command::Migrate | Command::Status => Err(AdminError::BadRequest(
                "maintenance commands need a database connection".to_string(),
            )),

            Command::CreateOwner {
                handle,
                email,
                display_name,
                seed,
            } => {
                let input = CreateOwner {
                    display_name: display_name.unwrap_or_else(|| handle.clone()),
                    handle,
                    email,
                };
                let owner = self.accounts.register_owner(&input).await?;

                let seeded = if seed {
                    Some(seed_json(&seed_defaults(&self.scope, owner.id).await?))
                } else {
                    None
                };

                Ok(json!({ "owner": owner, "seeded": seeded }))
            }

            Command::ShowOwner { owner } => {
                let owner = self.resolve_owner(&owner).await?;
                let license = self.accounts.license_for_owner(owner.id).await?;
                let limits = self.scope.effective_limits(owner.id).await?;

                Ok(json!({ "owner": owner, "license": license, "limits": limits }))
            }

            Command::DeactivateOwner { owner } => {
                let owner = self.resolve_owner(&owner).await?;
                let owner = self.accounts.deactivate_owner(owner.id).await?;
                Ok(json!({ "owner": owner }))
            }

            Command::ReactivateOwner { owner } => {
                let owner = self.resolve_owner(&owner).await?;
                let owner = self.accounts.reactivate_owner(owner.id).await?;
                Ok(json!({ "owner": owner }))
            }

            Command::DeleteOwner { owner, yes } => {
                let owner = self.resolve_owner(&owner).await?;
                if !yes {
                    return Err(AdminError::BadRequest(format!(
                        "refusing to purge owner `{}` without --yes",
                        owner.handle
                    )));
                }

                self.accounts.delete_owner(owner.id).await?;
                warn!(owner_id = %owner.id, handle = %owner.handle, "Owner purged by admin");
                Ok(json!({ "deleted": owner.id }))
            }

            Command::CreateLicense {
                name,
                description,
                price,
                max_projects,
                max_notes,
                max_todos,
                inactive,
            } => {
                let input = CreateLicense {
                    name,
                    description,
                    price: Some(price),
                    is_active: Some(!inactive),
                    max_projects,
                    max_notes,
                    max_todos,
                };
                let license = self.accounts.create_license(&input).await?;
                Ok(json!({ "license": license }))
            }

            Command::ListLicenses => {
                let licenses = self.accounts.list_licenses().await?;
                Ok(json!({ "licenses": licenses }))
            }

            Command::AssignLicense { owner, license, .. } => {
                let owner = self.resolve_owner(&owner).await?;
                let owner = self.accounts.assign_license(owner.id, license).await?;
                let limits = self.scope.effective_limits(owner.id).await?;
                Ok(json!({ "owner": owner, "limits": limits }))
            }

            Command::Seed { owner } => {
                let owner = self.resolve_owner(&owner).await?;
                let report = seed_defaults(&self.scope, owner.id).await?;
                if report.is_noop() {
                    info!(owner_id = %owner.id, "Nothing to seed");
                }
                Ok(seed_json(&report))
            }

            Command::ListWorkspaces { owner } => {
                let owner = self.resolve_owner(&owner).await?;
                let workspaces = self
                    .scope
                    .list_workspaces(owner.id)
                    .await?
                    .iter()
                    .map(Workspace::from_record)
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(json!({ "workspaces": workspaces }))
            }

            Command::Capacity { owner, workspace } => {
                let owner = self.resolve_owner(&owner).await?;
                self.scope.get_workspace(workspace, owner.id).await?;
                let limits = self.scope.effective_limits(owner.id).await?;

                let mut usage = serde_json::Map::new();
                for kind in ChildKind::ALL {
                    let capacity = kind.capacity();
                    let check = self
                        .scope
                        .capacity_check(capacity, workspace, limits.get(capacity))
                        .await?;
                    usage.insert(
                        capacity.as_str().to_lowercase(),
                        json!({
                            "allowed": check.allowed,
                            "current": check.current,
                            "limit": check.limit,
                            "remaining": check.remaining,
                        }),
                    );
                }

                Ok(json!({ "workspace": workspace, "capacity": usage }))
            }

            Command::CreateInvite { owner } => {
                let owner = self.resolve_owner(&owner).await?;
                let invite = self.accounts.create_invite(owner.id).await?;
                Ok(json!({ "invite": invite }))
            }

            Command::RedeemInvite { link, owner } => {
                let owner = self.resolve_owner(&owner).await?;
                let invite = self.accounts.redeem_invite(&link, owner.id).await?;
                Ok(json!({ "invite": invite }))
            }
        }
    }
}

fn seed_json(report: &SeedReport) -> Value {
    json!({
        "workspaces_created": report.workspaces_created,
        "workspaces_restored": report.workspaces_restored,
        "tasks_created": report.tasks_created,
        "notes_created": report.notes_created,
        "pages_created": report.pages_created,
    })
}

/// Runs `migrate` or `status` against the pool
pub async fn run_maintenance(pool: &PgPool, command: &Command) -> AdminResult<Value> {
    match command {
        Command::Migrate => {
            migrations::run_migrations(pool).await?;
            let status = migrations::get_migration_status(pool).await?;
            Ok(json!({
                "applied_migrations": status.applied_migrations,
                "latest_version": status.latest_version,
            }))
        }
        Command::Status => {
            db_pool::health_check(pool).await?;
            let stats = db_pool::get_pool_stats(pool);
            let status = migrations::get_migration_status(pool).await?;
            Ok(json!({
                "database": "ok",
                "pool": {
                    "active": stats.active_connections,
                    "idle": stats.idle_connections,
                    "total": stats.total_connections,
                },
                "migrations": {
                    "applied": status.applied_migrations,
                    "known": status.known_migrations,
                    "latest_version": status.latest_version,
                    "up_to_date": status.is_up_to_date,
                },
            }))
        }
        other => Err(AdminError::BadRequest(format!("{:?} is not a maintenance command", other))),
    }
}
