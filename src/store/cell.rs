//! Versioned JSON values on top of [`KvStore`].
//!
//! A read-modify-write against a plain get/put store silently drops one of
//! two concurrent updates. Here the raw string returned by `get` acts as the
//! version: the transformed value is written with `compare_and_swap` against
//! it, and a conflicting writer forces a re-read and another attempt.

use serde::{de::DeserializeOwned, Serialize};

use super::{KvStore, StoreError};

/// Conflicting writes tolerated before `update_json` gives up.
pub const MAX_CAS_ATTEMPTS: usize = 16;

fn decode<T: DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

pub async fn read_json<T: DeserializeOwned>(
    store: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match store.get(key).await? {
        Some(raw) => decode(key, &raw).map(Some),
        None => Ok(None),
    }
}

/// Apply `f` to the current value (None if the key was never written) and
/// store the result, retrying from a fresh read whenever another writer got
/// there first. Returns the value that was finally written.
pub async fn update_json<T, F>(store: &dyn KvStore, key: &str, mut f: F) -> Result<T, StoreError>
where
    T: Serialize + DeserializeOwned,
    F: FnMut(Option<T>) -> T,
{
    for attempt in 1..=MAX_CAS_ATTEMPTS {
        let raw = store.get(key).await?;
        let current = raw.as_deref().map(|r| decode(key, r)).transpose()?;
        let next = f(current);
        let encoded = encode(key, &next)?;

        if store
            .compare_and_swap(key, raw.as_deref(), &encoded)
            .await?
        {
            return Ok(next);
        }
        tracing::debug!(key = %key, attempt, "conditional write lost a race, retrying");
    }

    Err(StoreError::Contention {
        key: key.to_string(),
        attempts: MAX_CAS_ATTEMPTS,
    })
}

/// Write `value` only if `key` has never been written. Returns whether this
/// call performed the write.
pub async fn init_json_if_absent<T: Serialize>(
    store: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<bool, StoreError> {
    let encoded = encode(key, value)?;
    store.compare_and_swap(key, None, &encoded).await
}
