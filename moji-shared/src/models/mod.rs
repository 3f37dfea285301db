/// Typed views and write inputs for every entity
///
/// Records come out of the store as generic field maps. The structs here
/// give route code a typed view of each entity (decoded with
/// [`Record::decode`](crate::record::Record::decode)) and typed write
/// inputs that check lengths and ranges with `validator` before being
/// turned into field maps.
///
/// # Models
///
/// - `owner`: account holders
/// - `workspace`: named containers scoped to one owner
/// - `task`: to-do items with completion tracking
/// - `note`: short notes with tags
/// - `page`: long-form pages
/// - `license`: capacity tiers
/// - `invite_link`: single-use invitations
///
/// # Example
///
/// ```
/// use moji_shared::models::{task::CreateTask, WriteInput};
///
/// let input = CreateTask {
///     content: "Write the quarterly report".to_string(),
///     done: None,
///     priority: Some(2),
/// };
///
/// let fields = input.into_fields().unwrap();
/// assert_eq!(fields["priority"], 2);
/// assert!(!fields.contains_key("done"));
/// ```

pub mod invite_link;
pub mod license;
pub mod note;
pub mod owner;
pub mod page;
pub mod task;
pub mod workspace;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::error::{StoreError, StoreResult, ValidationReason};
use crate::record::Fields;

/// A validated write payload
///
/// Optional fields skip serialization when `None`, so an update only touches
/// what the caller supplied. Nullable fields are `Option<Option<T>>`, and
/// `Some(None)` reaches the store as an explicit `null` that clears them.
pub trait WriteInput: Serialize + Validate {
    /// Validates the input and converts it into a store payload
    ///
    /// # Errors
    ///
    /// Returns `Validation` naming the first offending field (in field-name
    /// order) if any rule fails.
    fn into_fields(&self) -> StoreResult<Fields> {
        if let Err(errors) = self.validate() {
            let mut failures: Vec<(String, String)> = errors
                .field_errors()
                .into_iter()
                .map(|(field, errs)| {
                    let message = errs
                        .first()
                        .map(|e| match &e.message {
                            Some(msg) => msg.to_string(),
                            None => e.code.to_string(),
                        })
                        .unwrap_or_else(|| "invalid value".to_string());
                    (field.to_string(), message)
                })
                .collect();
            failures.sort();

            if let Some((field, message)) = failures.into_iter().next() {
                return Err(StoreError::validation(field, ValidationReason::Invalid(message)));
            }
        }

        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(StoreError::validation(
                "payload",
                ValidationReason::Invalid("expected an object".to_string()),
            )),
            Err(err) => Err(StoreError::validation(
                "payload",
                ValidationReason::Invalid(err.to_string()),
            )),
        }
    }
}

/// Reads a present field as `Some`, even when its value is `null`
///
/// Paired with `#[serde(default)]` so an absent key stays `None`.
pub(crate) fn explicit_null<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}
