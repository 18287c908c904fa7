//! Keyed, TTL-governed memoization for the three upstream services.
//!
//! Caching here is a performance optimization, never a correctness
//! dependency: every backend failure is logged and treated as a miss (on
//! get) or a no-op (on set). Values are idempotent functions of their keys,
//! so concurrent last-writer-wins races are harmless.

mod backend;

pub use backend::CacheBackend;

use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::CacheConfig;

const KEY_NAMESPACE: &str = "locus";

/// Cache category names. Each category is a key namespace partition with
/// its own TTL.
pub mod category {
    pub const GEOCODING: &str = "geocoding";
    pub const AMENITIES: &str = "amenities";
    pub const CATEGORIZATION: &str = "categorization";
    pub const ANALYSIS: &str = "analysis";
}

/// TTL for a cache category; categories not in the table get one hour.
fn ttl_for(category: &str) -> Duration {
    let secs = match category {
        category::GEOCODING => 24 * 60 * 60,
        category::AMENITIES => 6 * 60 * 60,
        category::CATEGORIZATION | category::ANALYSIS => 12 * 60 * 60,
        _ => 60 * 60,
    };
    Duration::from_secs(secs)
}

#[derive(Clone)]
pub struct CacheService {
    backend: Arc<CacheBackend>,
}

impl CacheService {
    /// Negotiate the backend once at startup: a reachable Redis wins,
    /// anything else falls back to the in-process map. The choice is fixed
    /// for the process lifetime.
    pub async fn connect(config: &CacheConfig) -> Self {
        match Self::try_redis(&config.redis_url).await {
            Ok(manager) => {
                tracing::info!(url = %config.redis_url, "Redis cache connected");
                Self {
                    backend: Arc::new(CacheBackend::Redis(manager)),
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Redis not available, using in-process cache");
                Self::in_memory()
            }
        }
    }

    pub fn in_memory() -> Self {
        Self {
            backend: Arc::new(CacheBackend::in_memory()),
        }
    }

    async fn try_redis(url: &str) -> std::result::Result<ConnectionManager, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let mut manager = ConnectionManager::new(client).await?;
        let _pong: String = redis::cmd("PING").query_async(&mut manager).await?;
        Ok(manager)
    }

    pub fn backend_name(&self) -> &'static str {
        match &*self.backend {
            CacheBackend::Redis(_) => "redis",
            CacheBackend::Memory(_) => "memory",
        }
    }

    /// Look up the memoized value for `payload` in `category`. Any backend
    /// or decoding failure is reported as a miss.
    pub async fn get<T, P>(&self, category: &str, payload: &P) -> Option<T>
    where
        T: DeserializeOwned,
        P: Serialize,
    {
        let key = derive_key(category, payload)?;
        match self.backend.get(&key, ttl_for(category)).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => Some(value),
                Err(e) => {
                    tracing::warn!(%key, error = %e, "Dropping undecodable cache entry");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(%key, error = %e, "Cache get failed");
                None
            }
        }
    }

    /// Memoize `value` under `payload` in `category`. Failures are logged
    /// and swallowed.
    pub async fn set<T, P>(&self, category: &str, payload: &P, value: &T)
    where
        T: Serialize,
        P: Serialize,
    {
        let Some(key) = derive_key(category, payload) else {
            return;
        };
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(%key, error = %e, "Could not serialize value for cache");
                return;
            }
        };
        if let Err(e) = self.backend.set(&key, raw, ttl_for(category)).await {
            tracing::warn!(%key, error = %e, "Cache set failed");
        }
    }
}

/// Derive the canonical cache key: namespace, category, and a SHA-256 over
/// the payload rendered as canonical JSON. Routing through
/// `serde_json::Value` sorts map keys at every nesting level, so payloads
/// that differ only in field order collide to the same key.
fn derive_key<P: Serialize>(category: &str, payload: &P) -> Option<String> {
    let value = serde_json::to_value(payload).ok()?;
    let canonical = serde_json::to_string(&value).ok()?;
    let digest = Sha256::digest(canonical.as_bytes());
    Some(format!("{KEY_NAMESPACE}:{category}:{digest:x}"))
}
