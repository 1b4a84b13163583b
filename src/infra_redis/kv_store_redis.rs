use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, RedisResult};
use std::future::Future;
use std::time::Duration;

// PTTL is -1 for a key without expiry, so a counter that lost its deadline
// gets one back on the next call.
const INCR_WITH_EXPIRY: &str = r"
local count = redis.call('INCR', KEYS[1])
if redis.call('PTTL', KEYS[1]) < 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[1])
end
return count
";

pub struct RedisKvStore {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl RedisKvStore {
    pub fn new(conn: ConnectionManager, op_timeout: Duration) -> Self {
        RedisKvStore { conn, op_timeout }
    }

    pub async fn connect(url: &str, op_timeout: Duration) -> Result<Self, KvError> {
        let client = redis::Client::open(url).map_err(|e| KvError::Unavailable(e.to_string()))?;
        let conn = tokio::time::timeout(op_timeout, client.get_connection_manager())
            .await
            .map_err(|_| KvError::Unavailable(format!("connect timed out after {:?}", op_timeout)))?
            .map_err(|e| KvError::Unavailable(e.to_string()))?;
        Ok(Self::new(conn, op_timeout))
    }

    async fn run<T, F>(&self, fut: F) -> Result<T, KvError>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(|e| KvError::Unavailable(e.to_string())),
            Err(_) => Err(KvError::Unavailable(format!(
                "operation timed out after {:?}",
                self.op_timeout
            ))),
        }
    }
}

#[async_trait::async_trait]
impl KvStore for RedisKvStore {
    async fn get(&self, key: &str) -> Result<String, KvError> {
        let mut conn = self.conn.clone();
        let val: Option<String> = self.run(conn.get(key)).await?;
        val.ok_or(KvError::NotFound)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let _: () = self
            .run(conn.pset_ex(key, value, ttl_millis(ttl)))
            .await?;
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl));
        let written: Option<String> = self.run(cmd.query_async(&mut conn)).await?;
        Ok(written.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        let removed: i64 = self.run(conn.del(key)).await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let mut conn = self.conn.clone();
        self.run(conn.exists(key)).await
    }

    async fn increment(&self, key: &str) -> Result<i64, KvError> {
        let mut conn = self.conn.clone();
        self.run(conn.incr(key, 1i64)).await
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(INCR_WITH_EXPIRY);
        let mut invocation = script.key(key);
        invocation.arg(ttl_millis(ttl));
        self.run(invocation.invoke_async(&mut conn)).await
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let mut conn = self.conn.clone();
        let millis = i64::try_from(ttl_millis(ttl)).unwrap_or(i64::MAX);
        let applied: bool = self.run(conn.pexpire(key, millis)).await?;
        if applied {
            Ok(())
        } else {
            Err(KvError::NotFound)
        }
    }
}
