/// Database plumbing for the PostgreSQL backend
///
/// # Modules
///
/// - `pool`: connection pool creation, health checks and stats
/// - `migrations`: embedded schema migrations and status
///
/// # Example
///
/// ```no_run
/// use moji_shared::backend::PgBackend;
/// use moji_shared::db::pool::{create_pool, DatabaseConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = DatabaseConfig {
///         url: std::env::var("DATABASE_URL")?,
///         ..Default::default()
///     };
///
///     let backend = PgBackend::new(create_pool(&config).await?);
///     Ok(())
/// }
/// ```

pub mod migrations;
pub mod pool;
