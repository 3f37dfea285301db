/// Typed outcomes of the data layer
///
/// Every data-layer operation returns `StoreResult<T>`. The four variants of
/// [`StoreError`] are the whole failure taxonomy the route layer has to
/// translate:
///
/// - `Validation`: bad, protected, unknown or ill-typed field in a write
///   payload. Caller-correctable, never retried.
/// - `NotFound`: id or ownership-scoped lookup miss. Reported the same way
///   whether the row is absent or belongs to someone else.
/// - `LimitExceeded`: a capacity cap was hit. A rejected operation, not a fault.
/// - `Storage`: backend failure that survived the commit retry policy.
///
/// # Example
///
/// ```
/// use moji_shared::error::StoreError;
/// use moji_shared::schema::EntityKind;
///
/// let err = StoreError::not_found(EntityKind::Workspace);
/// assert_eq!(err.status_code(), 404);
/// assert_eq!(err.public_message(false), "Workspace not found");
/// ```

use crate::backend::BackendError;
use crate::quota::CapacityKind;
use crate::schema::EntityKind;

/// Data layer result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Why a field failed validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationReason {
    #[error("field is protected")]
    Protected,

    #[error("field is private")]
    Private,

    #[error("use soft delete or restore to change deletion state")]
    Lifecycle,

    #[error("unknown field")]
    Unknown,

    #[error("field cannot be changed after creation")]
    Immutable,

    #[error("field is maintained by the system")]
    Internal,

    #[error("field is assigned by the workspace scope")]
    Scoped,

    #[error("field is required")]
    Missing,

    #[error("value is already in use")]
    Duplicate,

    #[error("no fields to update")]
    Empty,

    #[error("{0}")]
    Invalid(String),
}

/// Data layer error
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Write payload rejected before anything was persisted
    #[error("Invalid field `{field}`: {reason}")]
    Validation {
        field: String,
        reason: ValidationReason,
    },

    /// Lookup miss, including ownership-scope misses
    #[error("{entity} not found")]
    NotFound { entity: EntityKind },

    /// Capacity cap reached
    #[error("{kind} limit reached ({current}/{limit})")]
    LimitExceeded {
        kind: CapacityKind,
        limit: u32,
        current: u32,
    },

    /// Backend failure
    #[error("Storage failure while {operation}: {source}")]
    Storage {
        operation: &'static str,
        #[source]
        source: BackendError,
    },
}

impl StoreError {
    pub fn validation(field: impl Into<String>, reason: ValidationReason) -> Self {
        StoreError::Validation {
            field: field.into(),
            reason,
        }
    }

    pub fn not_found(entity: EntityKind) -> Self {
        StoreError::NotFound { entity }
    }

    /// Whether this error is a system fault rather than a rejected request
    pub fn is_fault(&self) -> bool {
        matches!(self, StoreError::Storage { .. })
    }

    /// HTTP-equivalent status for the route layer
    pub fn status_code(&self) -> u16 {
        match self {
            StoreError::Validation { .. } => 400,
            StoreError::NotFound { .. } => 404,
            StoreError::LimitExceeded { .. } => 400,
            StoreError::Storage { .. } => 500,
        }
    }

    /// Message safe to show the caller
    ///
    /// Validation, not-found and limit messages are stable and never reveal
    /// whether rows owned by someone else exist. Storage faults get a generic
    /// message unless `debug` is set.
    pub fn public_message(&self, debug: bool) -> String {
        match self {
            StoreError::Validation { field, reason } => {
                format!("Invalid field `{}`: {}", field, reason)
            }
            StoreError::NotFound { entity } => format!("{} not found", entity),
            StoreError::LimitExceeded { kind, .. } => kind.limit_message().to_string(),
            StoreError::Storage { operation, source } => {
                if debug {
                    format!("{} failed: {}", operation, source)
                } else {
                    format!("An internal error occurred while {}", operation)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            StoreError::validation("id", ValidationReason::Protected).status_code(),
            400
        );
        assert_eq!(StoreError::not_found(EntityKind::Task).status_code(), 404);
        assert_eq!(
            StoreError::LimitExceeded {
                kind: CapacityKind::Tasks,
                limit: 3,
                current: 3,
            }
            .status_code(),
            400
        );
        let storage = StoreError::Storage {
            operation: "creating record",
            source: BackendError::Conflict("serialization failure".into()),
        };
        assert_eq!(storage.status_code(), 500);
        assert!(storage.is_fault());
    }

    #[test]
    fn test_error_display() {
        let err = StoreError::validation("created_at", ValidationReason::Protected);
        assert_eq!(err.to_string(), "Invalid field `created_at`: field is protected");

        let err = StoreError::LimitExceeded {
            kind: CapacityKind::Notes,
            limit: 10,
            current: 10,
        };
        assert_eq!(err.to_string(), "Notes limit reached (10/10)");
    }

    #[test]
    fn test_public_message_hides_storage_details() {
        let err = StoreError::Storage {
            operation: "updating record",
            source: BackendError::Unavailable("connection refused to 10.0.0.5".into()),
        };
        let public = err.public_message(false);
        assert_eq!(public, "An internal error occurred while updating record");
        assert!(!public.contains("10.0.0.5"));

        let debug = err.public_message(true);
        assert!(debug.contains("10.0.0.5"));
    }

    #[test]
    fn test_limit_message_is_stable() {
        let err = StoreError::LimitExceeded {
            kind: CapacityKind::Tasks,
            limit: 3,
            current: 4,
        };
        assert_eq!(err.public_message(true), "Task limit reached for this workspace");
    }
}
