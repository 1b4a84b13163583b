use crate::domain_port::*;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use crate::logger::debug;

struct Slot {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// Process-local store with the same single-key semantics as the Redis backend.
/// Entries expire lazily against the injected clock.
pub struct MemoryKvStore {
    map: DashMap<String, Slot>,
    clock: Arc<dyn Clock>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        MemoryKvStore {
            map: DashMap::new(),
            clock,
        }
    }

    fn deadline(&self, now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
        let ttl = Duration::from_millis(ttl_millis(ttl));
        TimeDelta::from_std(ttl)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    fn bump(&self, key: &str, ttl: Option<Duration>) -> Result<i64, KvError> {
        let now = self.clock.now();
        let deadline = ttl.map(|ttl| self.deadline(now, ttl));
        match self.map.entry(key.to_string()) {
            Entry::Occupied(mut occupied) if occupied.get().is_live(now) => {
                let slot = occupied.get_mut();
                let current: i64 = slot.value.parse().map_err(|_| KvError::Corrupt {
                    key: key.to_string(),
                    reason: "value is not an integer".to_string(),
                })?;
                let next = current.checked_add(1).ok_or_else(|| KvError::Corrupt {
                    key: key.to_string(),
                    reason: "increment would overflow".to_string(),
                })?;
                slot.value = next.to_string();
                if slot.expires_at.is_none() {
                    slot.expires_at = deadline;
                }
                Ok(next)
            }
            Entry::Occupied(mut occupied) => {
                occupied.insert(Slot {
                    value: "1".to_string(),
                    expires_at: deadline,
                });
                Ok(1)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(Slot {
                    value: "1".to_string(),
                    expires_at: deadline,
                });
                Ok(1)
            }
        }
    }

    /// Drops every entry whose deadline has passed. Returns how many went.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.map.len();
        self.map.retain(|_, slot| slot.is_live(now));
        before.saturating_sub(self.map.len())
    }

    /// Entries held, expired ones included until the next purge.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Purges on a fixed period for as long as the store is alive.
    pub fn spawn_sweeper(self: &Arc<Self>, every: Duration) -> JoinHandle<()> {
        let weak = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                let purged = store.purge_expired();
                if purged > 0 {
                    debug!(purged, remaining = store.len(), "expired entries purged");
                }
            }
        })
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<String, KvError> {
        let now = self.clock.now();
        match self.map.get(key) {
            Some(slot) if slot.is_live(now) => Ok(slot.value.clone()),
            _ => Err(KvError::NotFound),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError> {
        let now = self.clock.now();
        let slot = Slot {
            value: value.to_string(),
            expires_at: Some(self.deadline(now, ttl)),
        };
        self.map.insert(key.to_string(), slot);
        Ok(())
    }

    async fn set_if_absent(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, KvError> {
        let now = self.clock.now();
        let slot = Slot {
            value: value.to_string(),
            expires_at: Some(self.deadline(now, ttl)),
        };
        match self.map.entry(key.to_string()) {
            Entry::Occupied(occupied) if occupied.get().is_live(now) => Ok(false),
            Entry::Occupied(mut occupied) => {
                occupied.insert(slot);
                Ok(true)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(slot);
                Ok(true)
            }
        }
    }

    async fn delete(&self, key: &str) -> Result<bool, KvError> {
        let now = self.clock.now();
        Ok(self
            .map
            .remove(key)
            .is_some_and(|(_, slot)| slot.is_live(now)))
    }

    async fn exists(&self, key: &str) -> Result<bool, KvError> {
        let now = self.clock.now();
        Ok(self.map.get(key).is_some_and(|slot| slot.is_live(now)))
    }

    async fn increment(&self, key: &str) -> Result<i64, KvError> {
        self.bump(key, None)
    }

    async fn increment_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, KvError> {
        self.bump(key, Some(ttl))
    }

    async fn set_expiry(&self, key: &str, ttl: Duration) -> Result<(), KvError> {
        let now = self.clock.now();
        let deadline = self.deadline(now, ttl);
        match self.map.get_mut(key) {
            Some(mut slot) if slot.is_live(now) => {
                slot.expires_at = Some(deadline);
                Ok(())
            }
            _ => Err(KvError::NotFound),
        }
    }
}
