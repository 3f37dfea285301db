/// Schema migrations
///
/// Migrations live in `moji-shared/migrations/` and are embedded into the
/// binary at compile time. Each one has an up file (`{version}_{name}.sql`)
/// and a down file (`{version}_{name}.down.sql`).
///
/// # Example
///
/// ```no_run
/// use moji_shared::db::migrations::{get_migration_status, run_migrations};
/// use moji_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(&DatabaseConfig::default()).await?;
/// run_migrations(&pool).await?;
///
/// let status = get_migration_status(&pool).await?;
/// assert!(status.is_up_to_date);
/// # Ok(())
/// # }
/// ```

use sqlx::migrate::{MigrateDatabase, Migrator};
use sqlx::postgres::PgPool;
use sqlx::Postgres;
use tracing::{debug, info, warn};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Migration status information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// Migrations recorded as applied
    pub applied_migrations: usize,

    /// Migrations embedded in this build
    pub known_migrations: usize,

    /// Latest applied version
    pub latest_version: Option<i64>,

    pub is_up_to_date: bool,
}

impl MigrationStatus {
    fn new(applied_migrations: usize, known_migrations: usize, latest_version: Option<i64>) -> Self {
        MigrationStatus {
            applied_migrations,
            known_migrations,
            latest_version,
            is_up_to_date: applied_migrations >= known_migrations,
        }
    }
}

fn known_migrations() -> usize {
    MIGRATOR
        .iter()
        .filter(|m| !m.migration_type.is_down_migration())
        .count()
}

/// Applies every pending migration
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!(known = known_migrations(), "Running database migrations");

    MIGRATOR.run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        e
    })?;

    info!("Database schema is up to date");
    Ok(())
}

/// Compares applied migrations with the ones embedded in this build
pub async fn get_migration_status(pool: &PgPool) -> Result<MigrationStatus, sqlx::Error> {
    let table_exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (
            SELECT FROM information_schema.tables
            WHERE table_schema = 'public'
            AND table_name = '_sqlx_migrations'
        )",
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        debug!("Migrations table does not exist yet");
        return Ok(MigrationStatus::new(0, known_migrations(), None));
    }

    let (count, latest_version): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), MAX(version) FROM _sqlx_migrations WHERE success = true",
    )
    .fetch_one(pool)
    .await?;

    Ok(MigrationStatus::new(
        usize::try_from(count).unwrap_or(0),
        known_migrations(),
        latest_version,
    ))
}

/// Creates the database if it doesn't exist (development and tests)
pub async fn ensure_database_exists(database_url: &str) -> Result<(), sqlx::Error> {
    if Postgres::database_exists(database_url).await? {
        debug!("Database already exists");
        return Ok(());
    }

    info!("Database does not exist, creating it");
    Postgres::create_database(database_url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_migrations_present() {
        assert!(known_migrations() >= 1);
    }

    #[test]
    fn test_status_up_to_date() {
        assert!(MigrationStatus::new(1, 1, Some(20250101000000)).is_up_to_date);
        assert!(!MigrationStatus::new(0, 1, None).is_up_to_date);
    }
}
