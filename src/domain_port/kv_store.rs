use std::time::Duration;

/// Single-key primitives against a remote in-memory store.
///
/// Every operation is atomic at the store; implementations add no locking.
#[async_trait::async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<String, KvError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    /// Writes only if the key is absent. Returns `true` when this call wrote it.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration)
    -> Result<bool, KvError>;

    /// Returns `true` when a key was actually removed.
    async fn delete(&self, key: &str) -> Result<bool, KvError>;

    async fn exists(&self, key: &str) -> Result<bool, KvError>;

    /// Creates the key at 1 when absent.
    async fn increment(&self, key: &str) -> Result<i64, KvError>;

    /// Increments and, in the same atomic step, attaches `ttl` if the key has
    /// no expiry yet. An existing expiry is left alone.
    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, KvError>;

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), KvError>;
}

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("key not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Millisecond TTL as the stores expect it, never zero.
pub fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}
