//! Ticker Presence Service
//!
//! Resolves token aliases, caches market snapshots from CoinGecko or
//! CoinMarketCap, and rotates them onto a presence channel.
//!
//! # Features
//!
//! - **Alias resolution** by id, symbol, name or slug (case-insensitive)
//! - **Single-flight TTL cache** with cross-token relations
//! - **Rotation scheduler** with start/stop lifecycle
//! - **WebSocket presence feed** for dashboard clients
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ticker_presence::{
//!     BroadcastPresenceSink, CacheConfig, CoinGeckoProvider, PriceCache, PriceProvider,
//!     RotationScheduler, SchedulerConfig, TokenRegistry,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let provider = Arc::new(CoinGeckoProvider::new());
//!     let registry = Arc::new(TokenRegistry::new(provider.list_tokens().await?));
//!     let cache = Arc::new(PriceCache::new(registry, provider, CacheConfig::default()));
//!
//!     let snapshot = cache.get("miota").await?;
//!     println!("{}: ${:?}", snapshot.name, snapshot.current_price);
//!
//!     let sink = Arc::new(BroadcastPresenceSink::new(vec!["dashboard".to_string()]));
//!     let config = SchedulerConfig {
//!         token_set: vec!["iota".to_string(), "shimmer".to_string()],
//!         ..Default::default()
//!     };
//!     let scheduler = RotationScheduler::new(cache, sink, config);
//!     scheduler.start().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod server;

pub use config::{AppConfig, DataSource};
pub use server::{run_server, BroadcastPresenceSink};
pub use ticker_presence_core::{
    CacheConfig, CoinGeckoProvider, CoinMarketCapProvider, LifecycleError, PresenceSink,
    PriceCache, PriceError, PriceProvider, ProviderError, RotationScheduler, RotationState,
    SchedulerConfig, TokenRegistry,
};
pub use ticker_presence_types::{Mood, PresenceEvent, PriceSnapshot, PriceSnapshotRaw, TokenIdentity};
