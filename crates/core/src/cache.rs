//! Single-flight TTL cache of price snapshots.
//!
//! One async mutex guards the whole cache. A miss fetches from the provider
//! while holding it, so concurrent callers for a cold id share one upstream
//! fetch. Relation lookups run inside the same critical section through
//! [`LockedCache`] instead of re-acquiring the lock.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::PriceError;
use crate::provider::{PriceProvider, DEFAULT_CURRENCY};
use crate::registry::TokenRegistry;
use crate::relation::{RelationResolver, RelationTable};
use ticker_presence_types::{PriceSnapshot, PriceSnapshotRaw, TokenIdentity};

/// Default snapshot time-to-live (60 seconds).
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Cache settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age of a snapshot before it is refetched
    pub ttl: Duration,

    /// Quote currency passed to the provider
    pub currency: String,

    /// Correlated pairs for relation computation, by any registered key
    pub relations: RelationTable,

    /// Circulating supply per token key, used when upstream market cap is zero
    pub market_cap_fallback: HashMap<String, f64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            currency: DEFAULT_CURRENCY.to_string(),
            relations: RelationTable::default(),
            market_cap_fallback: HashMap::new(),
        }
    }
}

struct CacheEntry {
    snapshot: PriceSnapshot,
    inserted_at: Instant,
}

type EntryMap = HashMap<String, CacheEntry>;

/// Price snapshot cache keyed by canonical id.
pub struct PriceCache {
    registry: Arc<TokenRegistry>,
    provider: Arc<dyn PriceProvider>,
    config: CacheConfig,
    entries: Mutex<EntryMap>,
}

impl PriceCache {
    /// Create a cache. Relation pairs and market-cap fallbacks are keyed by
    /// canonical id here; keys the registry does not know are logged and dropped.
    pub fn new(
        registry: Arc<TokenRegistry>,
        provider: Arc<dyn PriceProvider>,
        config: CacheConfig,
    ) -> Self {
        let relations = config.relations.resolved(&registry);

        let mut market_cap_fallback = HashMap::new();
        for (key, supply) in &config.market_cap_fallback {
            match registry.resolve(key) {
                Ok(id) => {
                    market_cap_fallback.insert(id.to_string(), *supply);
                }
                Err(_) => warn!("Skipping market cap fallback for unknown token {}", key),
            }
        }

        let config = CacheConfig {
            relations,
            market_cap_fallback,
            ..config
        };

        Self {
            registry,
            provider,
            config,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &TokenRegistry {
        &self.registry
    }

    /// Get the snapshot for `key`, fetching if missing or stale.
    pub async fn get(&self, key: &str) -> Result<PriceSnapshot, PriceError> {
        let id = self.registry.resolve(key)?;
        let token = self.token(id)?;

        let mut entries = self.entries.lock().await;

        if let Some(snapshot) = self.fresh(&entries, id) {
            return Ok(snapshot);
        }

        let raw = self.fetch(token).await?;

        let relations = if self.config.relations.is_empty() {
            BTreeMap::new()
        } else {
            let locked = LockedCache {
                cache: self,
                entries: &*entries,
            };
            RelationResolver::new(&self.config.relations)
                .resolve(id, raw.current_price, &locked)
                .await
        };

        let snapshot = self.build(token, raw, relations);
        info!(
            "Cached {} at {:?} ({} relations)",
            id,
            snapshot.current_price,
            snapshot.relations.len()
        );

        entries.insert(
            id.to_string(),
            CacheEntry {
                snapshot: snapshot.clone(),
                inserted_at: Instant::now(),
            },
        );

        Ok(snapshot)
    }

    /// The cached snapshot for `key` if still fresh. Never fetches.
    pub async fn cached(&self, key: &str) -> Option<PriceSnapshot> {
        let id = self.registry.resolve(key).ok()?;
        let entries = self.entries.lock().await;
        self.fresh(&entries, id)
    }

    /// Drop the cached entry for `key`, forcing the next `get` to fetch.
    pub async fn invalidate(&self, key: &str) -> Result<(), PriceError> {
        let id = self.registry.resolve(key)?;
        self.entries.lock().await.remove(id);
        Ok(())
    }

    fn token(&self, id: &str) -> Result<&TokenIdentity, PriceError> {
        self.registry
            .identity(id)
            .ok_or_else(|| PriceError::NotFound(id.to_string()))
    }

    fn fresh(&self, entries: &EntryMap, id: &str) -> Option<PriceSnapshot> {
        entries
            .get(id)
            .filter(|entry| entry.inserted_at.elapsed() < self.config.ttl)
            .map(|entry| entry.snapshot.clone())
    }

    async fn fetch(&self, token: &TokenIdentity) -> Result<PriceSnapshotRaw, PriceError> {
        debug!("Fetching {} from {}", token.canonical_id, self.provider.name());
        let mut raw = self
            .provider
            .fetch_price(token, &self.config.currency)
            .await?;

        if let Some(supply) = self.config.market_cap_fallback.get(&token.canonical_id) {
            let missing = raw.market_cap.map(|m| m == 0.0).unwrap_or(true);
            if missing {
                raw.market_cap = raw.current_price.map(|p| p * supply);
            }
        }

        Ok(raw)
    }

    fn build(
        &self,
        token: &TokenIdentity,
        raw: PriceSnapshotRaw,
        relations: BTreeMap<String, f64>,
    ) -> PriceSnapshot {
        PriceSnapshot::from_raw(token, raw, Utc::now(), relations)
    }
}

/// A view of the cache for code already running under the cache lock.
pub struct LockedCache<'a> {
    cache: &'a PriceCache,
    entries: &'a EntryMap,
}

impl LockedCache<'_> {
    /// Look up a canonical id from inside an in-progress `get`.
    ///
    /// Returns the fresh cached snapshot if there is one, otherwise fetches
    /// without computing relations and without storing the result.
    pub async fn get_nested(&self, id: &str) -> Result<PriceSnapshot, PriceError> {
        if let Some(snapshot) = self.cache.fresh(self.entries, id) {
            return Ok(snapshot);
        }

        let token = self.cache.token(id)?;
        let raw = self.cache.fetch(token).await?;
        Ok(self.cache.build(token, raw, BTreeMap::new()))
    }
}
