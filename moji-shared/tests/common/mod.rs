/// Shared fixtures for the integration tests
///
/// Every test gets its own `MemoryBackend`, so tests never share rows.

use moji_shared::accounts::Accounts;
use moji_shared::backend::MemoryBackend;
use moji_shared::models::owner::{CreateOwner, Owner};
use moji_shared::quota::{CapacityLimits, CapacityMode};
use moji_shared::record::Fields;
use moji_shared::scope::OwnershipScope;
use moji_shared::store::{RecordStore, RetryPolicy};
use serde_json::Value;
use std::sync::Arc;

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub store: RecordStore,
    pub scope: OwnershipScope,
    pub accounts: Accounts,
}

pub fn harness() -> Harness {
    harness_with(CapacityLimits::default(), CapacityMode::Soft)
}

pub fn harness_with(limits: CapacityLimits, mode: CapacityMode) -> Harness {
    let backend = Arc::new(MemoryBackend::new());
    let store = RecordStore::new(backend.clone()).with_retry(RetryPolicy::immediate(2));

    Harness {
        backend,
        scope: OwnershipScope::new(store.clone(), limits, mode),
        accounts: Accounts::new(store.clone()),
        store,
    }
}

pub fn task_limit(tasks: u32) -> CapacityLimits {
    CapacityLimits {
        tasks,
        ..CapacityLimits::default()
    }
}

/// Builds a field map from a JSON object literal
pub fn fields(value: Value) -> Fields {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {}", other),
    }
}

pub async fn owner(h: &Harness, handle: &str) -> Owner {
    h.accounts
        .register_owner(&CreateOwner {
            display_name: handle.to_uppercase(),
            handle: handle.to_string(),
            email: format!("{}@example.com", handle),
        })
        .await
        .expect("register owner")
}
