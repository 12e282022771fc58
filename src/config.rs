//! Service configuration from `TICKER_*` environment variables.

use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context};

use ticker_presence_core::{CacheConfig, RelationTable, SchedulerConfig, DEFAULT_CURRENCY};

/// Which upstream price provider to use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    CoinGecko,
    CoinMarketCap { api_key: String },
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// WebSocket server address for presence clients
    pub bind_addr: String,

    pub data_source: DataSource,

    /// Whether to run the rotation scheduler at startup
    pub rotation_enabled: bool,

    /// Presence targets the display name is published to
    pub presence_targets: Vec<String>,

    /// Extra static aliases as (alias, canonical id)
    pub aliases: Vec<(String, String)>,

    pub cache: CacheConfig,

    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let data_source = match get("TICKER_DATA_SOURCE").as_deref().map(str::to_lowercase) {
            None => DataSource::CoinGecko,
            Some(s) if s == "0" || s == "coingecko" => DataSource::CoinGecko,
            Some(s) if s == "1" || s == "coinmarketcap" => {
                let api_key = get("TICKER_API_KEY")
                    .ok_or_else(|| anyhow!("TICKER_API_KEY is required for CoinMarketCap"))?;
                DataSource::CoinMarketCap { api_key }
            }
            Some(other) => bail!("Unknown TICKER_DATA_SOURCE: {}", other),
        };

        let ttl_secs: u64 = parse_or(get("TICKER_CACHE_TTL_SECS"), "TICKER_CACHE_TTL_SECS", 60)?;
        let dwell_secs: u64 = parse_or(get("TICKER_DWELL_SECS"), "TICKER_DWELL_SECS", 15)?;
        let tick_ms: u64 = parse_or(get("TICKER_TICK_MS"), "TICKER_TICK_MS", 500)?;
        let rotation_enabled = parse_or(get("TICKER_ROTATION_ENABLED"), "TICKER_ROTATION_ENABLED", true)?;

        let pairs = parse_pairs(
            &get("TICKER_PAIRS").unwrap_or_else(|| "iota:shimmer".to_string()),
            ':',
        )
        .context("TICKER_PAIRS")?;
        let aliases = parse_pairs(
            &get("TICKER_ALIASES").unwrap_or_else(|| "s=shimmer,shimmie=shimmer,i=iota".to_string()),
            '=',
        )
        .context("TICKER_ALIASES")?;

        let mut market_cap_fallback = HashMap::new();
        for (id, supply) in parse_pairs(&get("TICKER_MARKET_CAP_FALLBACK").unwrap_or_default(), '=')
            .context("TICKER_MARKET_CAP_FALLBACK")?
        {
            let supply: f64 = supply
                .parse()
                .with_context(|| format!("Invalid circulating supply for {}", id))?;
            market_cap_fallback.insert(id, supply);
        }

        let mut dwell_overrides = HashMap::new();
        for (id, secs) in parse_pairs(&get("TICKER_DWELL_OVERRIDES").unwrap_or_default(), '=')
            .context("TICKER_DWELL_OVERRIDES")?
        {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("Invalid dwell seconds for {}", id))?;
            dwell_overrides.insert(id, Duration::from_secs(secs));
        }

        Ok(Self {
            bind_addr: get("TICKER_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8083".to_string()),
            data_source,
            rotation_enabled,
            presence_targets: split_list(&get("TICKER_PRESENCE_TARGETS").unwrap_or_else(|| "dashboard".to_string())),
            aliases,
            cache: CacheConfig {
                ttl: Duration::from_secs(ttl_secs),
                currency: get("TICKER_CURRENCY").unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
                relations: RelationTable::new(pairs),
                market_cap_fallback,
            },
            scheduler: SchedulerConfig {
                token_set: split_list(&get("TICKER_ROTATION").unwrap_or_else(|| "iota,shimmer".to_string())),
                dwell: Duration::from_secs(dwell_secs),
                dwell_overrides,
                tick: Duration::from_millis(tick_ms),
            },
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, v)),
        None => Ok(default),
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `"a:b,c:d"` style lists.
fn parse_pairs(value: &str, separator: char) -> anyhow::Result<Vec<(String, String)>> {
    split_list(value)
        .into_iter()
        .map(|item| {
            let (left, right) = item
                .split_once(separator)
                .ok_or_else(|| anyhow!("Expected `left{}right`, got {}", separator, item))?;
            Ok((left.trim().to_string(), right.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(vars: &[(&str, &str)]) -> anyhow::Result<AppConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8083");
        assert_eq!(config.data_source, DataSource::CoinGecko);
        assert!(config.rotation_enabled);
        assert_eq!(config.cache.ttl, Duration::from_secs(60));
        assert_eq!(config.cache.currency, "USD");
        assert!(config.cache.market_cap_fallback.is_empty());
        assert_eq!(config.scheduler.token_set, vec!["iota", "shimmer"]);
        assert_eq!(config.scheduler.dwell, Duration::from_secs(15));
        assert_eq!(config.scheduler.tick, Duration::from_millis(500));
        assert_eq!(config.cache.relations.partners("iota").collect::<Vec<_>>(), vec!["shimmer"]);
        assert!(config.aliases.contains(&("s".to_string(), "shimmer".to_string())));
    }

    #[test]
    fn test_coinmarketcap_requires_key() {
        assert!(config_from(&[("TICKER_DATA_SOURCE", "1")]).is_err());

        let config = config_from(&[
            ("TICKER_DATA_SOURCE", "CoinMarketCap"),
            ("TICKER_API_KEY", "secret"),
        ])
        .unwrap();
        assert_eq!(
            config.data_source,
            DataSource::CoinMarketCap {
                api_key: "secret".to_string()
            }
        );
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("TICKER_CACHE_TTL_SECS", "30"),
            ("TICKER_ROTATION", "bitcoin, ethereum ,"),
            ("TICKER_MARKET_CAP_FALLBACK", "shimmer=1813620509"),
            ("TICKER_DWELL_OVERRIDES", "bitcoin=5"),
            ("TICKER_ROTATION_ENABLED", "false"),
        ])
        .unwrap();

        assert_eq!(config.cache.ttl, Duration::from_secs(30));
        assert_eq!(config.scheduler.token_set, vec!["bitcoin", "ethereum"]);
        assert_eq!(config.cache.market_cap_fallback["shimmer"], 1_813_620_509.0);
        assert_eq!(config.scheduler.dwell_overrides["bitcoin"], Duration::from_secs(5));
        assert!(!config.rotation_enabled);
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[("TICKER_DATA_SOURCE", "binance")]).is_err());
        assert!(config_from(&[("TICKER_DWELL_SECS", "soon")]).is_err());
        assert!(config_from(&[("TICKER_PAIRS", "iota")]).is_err());
    }
}
