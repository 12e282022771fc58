//! Core domain logic for the ticker presence service.
//!
//! - [`TokenRegistry`] resolves user-entered keys to canonical ids
//! - [`PriceCache`] serves snapshots with a TTL and single-flight fetches
//! - [`RelationResolver`] prices correlated tokens in units of each other
//! - [`RotationScheduler`] rotates snapshots onto a [`PresenceSink`]

pub mod cache;
pub mod coingecko;
pub mod coinmarketcap;
pub mod error;
pub mod presence;
pub mod provider;
pub mod registry;
pub mod relation;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::{CacheConfig, LockedCache, PriceCache, DEFAULT_TTL};
pub use coingecko::{CoinGeckoProvider, COINGECKO_URL};
pub use coinmarketcap::{CoinMarketCapProvider, HighLowTracker, COINMARKETCAP_URL};
pub use error::{LifecycleError, PresenceError, PriceError, ProviderError};
pub use presence::{Presence, PresenceSink};
pub use provider::{PriceProvider, DEFAULT_CURRENCY};
pub use registry::TokenRegistry;
pub use relation::{relation_value, RelationResolver, RelationTable};
pub use scheduler::{RotationScheduler, RotationState, SchedulerConfig, DEFAULT_DWELL, DEFAULT_TICK};
