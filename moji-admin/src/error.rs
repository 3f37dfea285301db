/// Error handling for the admin CLI
///
/// Every command returns `AdminResult<T>`. Failures are reported on stderr
/// with a stable message and the process exits with a code derived from the
/// error kind, so scripts can tell a rejected request from a broken
/// database.
///
/// | Exit code | Meaning                               |
/// |-----------|---------------------------------------|
/// | 2         | Bad input or validation failure       |
/// | 3         | Record not found                      |
/// | 4         | Capacity limit reached                |
/// | 69        | Database or migration failure         |
/// | 78        | Configuration error                   |

use moji_shared::error::StoreError;

/// Admin result type alias
pub type AdminResult<T> = Result<T, AdminError>;

/// Unified admin error type
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    /// Settings could not be loaded
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Connection or query failure outside the record store
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Data layer outcome
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Command arguments that parsed but make no sense together
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AdminError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AdminError::Config(_) => 78,
            AdminError::Database(_) | AdminError::Migration(_) => 69,
            AdminError::BadRequest(_) => 2,
            AdminError::Store(err) => match err {
                StoreError::Validation { .. } => 2,
                StoreError::NotFound { .. } => 3,
                StoreError::LimitExceeded { .. } => 4,
                StoreError::Storage { .. } => 69,
            },
        }
    }

    /// Message printed to the operator
    ///
    /// Storage faults only carry their cause when `debug` is set.
    pub fn report(&self, debug: bool) -> String {
        match self {
            AdminError::Store(err) => err.public_message(debug),
            other => other.to_string(),
        }
    }
}
