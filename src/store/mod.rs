pub mod cell;
pub mod memory;
pub mod redis;

use async_trait::async_trait;
use thiserror::Error;

pub use cell::{init_json_if_absent, read_json, update_json, MAX_CAS_ATTEMPTS};
pub use memory::MemoryStore;
pub use self::redis::RedisStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("corrupt value under '{key}': {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("gave up on '{key}' after {attempts} conflicting writes")]
    Contention { key: String, attempts: usize },
}

impl From<::redis::RedisError> for StoreError {
    fn from(e: ::redis::RedisError) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// String key/value store with single-key conditional writes.
/// Implementations: MemoryStore (DashMap), RedisStore.
///
/// There is no multi-key transaction. Callers that mutate a value they
/// have read must go through `compare_and_swap` (see [`cell`]).
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditional overwrite.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Write `new` only if the current value equals `expected`.
    /// `expected = None` means the key must not exist yet.
    /// Returns `false` when the precondition did not hold.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StoreError>;
}
