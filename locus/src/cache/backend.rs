use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::{LocusError, Result};

/// Entry count at which the in-process backend sweeps old entries.
const MEMORY_SWEEP_THRESHOLD: usize = 1000;
/// The sweep drops entries older than this, regardless of category TTL.
const MEMORY_SWEEP_MAX_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug)]
pub(crate) struct MemoryEntry {
    pub(crate) value: String,
    pub(crate) stored_at: Instant,
}

/// Storage strategy behind [`super::CacheService`], fixed at process start.
/// `Redis` delegates expiry to the store via SETEX; `Memory` checks the
/// category TTL on read and self-bounds its size on write.
pub enum CacheBackend {
    Redis(ConnectionManager),
    Memory(Mutex<HashMap<String, MemoryEntry>>),
}

impl CacheBackend {
    pub fn in_memory() -> Self {
        CacheBackend::Memory(Mutex::new(HashMap::new()))
    }

    pub async fn get(&self, key: &str, ttl: Duration) -> Result<Option<String>> {
        match self {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                let value: Option<String> = conn
                    .get(key)
                    .await
                    .map_err(|e| LocusError::Cache(e.to_string()))?;
                Ok(value)
            }
            CacheBackend::Memory(map) => {
                let mut map = map
                    .lock()
                    .map_err(|_| LocusError::Cache("memory cache lock poisoned".to_string()))?;
                match map.get(key) {
                    Some(entry) if entry.stored_at.elapsed() < ttl => {
                        Ok(Some(entry.value.clone()))
                    }
                    Some(_) => {
                        map.remove(key);
                        Ok(None)
                    }
                    None => Ok(None),
                }
            }
        }
    }

    pub async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<()> {
        match self {
            CacheBackend::Redis(manager) => {
                let mut conn = manager.clone();
                let _: () = conn
                    .set_ex(key, value, ttl.as_secs())
                    .await
                    .map_err(|e| LocusError::Cache(e.to_string()))?;
                Ok(())
            }
            CacheBackend::Memory(map) => {
                let mut map = map
                    .lock()
                    .map_err(|_| LocusError::Cache("memory cache lock poisoned".to_string()))?;
                map.insert(
                    key.to_string(),
                    MemoryEntry {
                        value,
                        stored_at: Instant::now(),
                    },
                );
                if map.len() > MEMORY_SWEEP_THRESHOLD {
                    map.retain(|_, entry| entry.stored_at.elapsed() <= MEMORY_SWEEP_MAX_AGE);
                }
                Ok(())
            }
        }
    }
}
