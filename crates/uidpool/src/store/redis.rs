use crate::{PoolStore, Uid};
use core::time::Duration;
use redis::{RedisError, RedisResult, Script, aio::ConnectionManager};
use std::sync::LazyLock;

/// Deletes `KEYS[1]` only while it still holds `ARGV[1]`.
static DELETE_IF_EQUALS: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
end
return 0
",
    )
});

/// A [`PoolStore`] backed by Redis.
///
/// Wraps a [`ConnectionManager`], which multiplexes commands over a single
/// connection and reconnects transparently. Cloning is cheap and clones share
/// the connection.
///
/// | operation          | command                        |
/// |--------------------|--------------------------------|
/// | `pop_back`         | `RPOP`                         |
/// | `push_front_batch` | `MULTI` / `LPUSH k v..` / `EXEC` |
/// | `len`              | `LLEN`                         |
/// | `set_if_absent`    | `SET k v NX PX ttl`            |
/// | `delete`           | `DEL`                          |
/// | `delete_if_equals` | Lua compare-and-delete         |
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    /// Opens a managed connection to the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the initial connection
    /// fails.
    pub async fn connect(url: &str) -> RedisResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self::from_manager(conn))
    }

    /// Wraps an existing connection manager.
    pub const fn from_manager(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Returns a handle to the underlying connection.
    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

impl core::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl PoolStore for RedisStore {
    type Err = RedisError;

    async fn pop_back(&self, key: &str) -> Result<Option<Uid>, Self::Err> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("RPOP");
        cmd.arg(key);
        let value: Option<Uid> = cmd.query_async(&mut conn).await?;
        Ok(value)
    }

    async fn push_front_batch(&self, key: &str, values: &[Uid]) -> Result<(), Self::Err> {
        // LPUSH with no values is a Redis error.
        if values.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic().cmd("LPUSH").arg(key).arg(values).ignore();
        let () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn len(&self, key: &str) -> Result<u64, Self::Err> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("LLEN");
        cmd.arg(key);
        let len: u64 = cmd.query_async(&mut conn).await?;
        Ok(len)
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, Self::Err> {
        let mut conn = self.conn.clone();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX").arg("PX").arg(ttl_ms);
        // "OK" when set, nil when the key already exists.
        let reply: Option<String> = cmd.query_async(&mut conn).await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<(), Self::Err> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("DEL");
        cmd.arg(key);
        let _removed: u64 = cmd.query_async(&mut conn).await?;
        Ok(())
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> Result<bool, Self::Err> {
        let mut conn = self.conn.clone();
        let mut invocation = DELETE_IF_EQUALS.prepare_invoke();
        invocation.key(key).arg(expected);
        let removed: u64 = invocation.invoke_async(&mut conn).await?;
        Ok(removed > 0)
    }
}
