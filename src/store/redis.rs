use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::{KvStore, StoreError};

/// Check-and-set in one round trip. ARGV[1] is "1" when an expected value
/// is supplied in ARGV[2]; ARGV[3] is the new value.
const CAS_SCRIPT: &str = r#"
    local current = redis.call("GET", KEYS[1])
    if ARGV[1] == "1" then
        if current ~= ARGV[2] then
            return 0
        end
    elseif current then
        return 0
    end
    redis.call("SET", KEYS[1], ARGV[3])
    return 1
"#;

/// Redis-backed store. Every key is namespaced with `prefix` so the
/// status relay and the approval ledger never collide.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    prefix: String,
}

impl RedisStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        Self {
            conn,
            prefix: prefix.into(),
        }
    }

    pub async fn connect(url: &str, prefix: impl Into<String>) -> anyhow::Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::new(conn, prefix))
    }

    /// Same connection, different namespace.
    pub fn with_prefix(&self, prefix: impl Into<String>) -> Self {
        Self::new(self.conn.clone(), prefix)
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.get::<_, Option<String>>(self.key(key)).await?)
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(self.key(key), value).await?;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: Option<&str>,
        new: &str,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(CAS_SCRIPT);
        let swapped: i64 = script
            .key(self.key(key))
            .arg(if expected.is_some() { "1" } else { "0" })
            .arg(expected.unwrap_or(""))
            .arg(new)
            .invoke_async(&mut conn)
            .await?;
        Ok(swapped == 1)
    }
}
