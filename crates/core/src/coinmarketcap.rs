//! CoinMarketCap price provider.
//!
//! CoinMarketCap's quote endpoint does not report a 24h high/low, so the
//! provider keeps a rolling window of the prices it has observed per token
//! and derives high/low from that.

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{check_status, PriceProvider};
use ticker_presence_types::{PriceSnapshotRaw, TokenIdentity};

/// Default CoinMarketCap API endpoint.
pub const COINMARKETCAP_URL: &str = "https://pro-api.coinmarketcap.com";

/// Window over which observed prices count towards high/low.
pub const HIGH_LOW_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct MapEntry {
    id: u64,
    name: String,
    symbol: String,
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QuoteEntry {
    cmc_rank: Option<u32>,
    #[serde(default)]
    quote: HashMap<String, Quote>,
}

#[derive(Debug, Deserialize)]
struct Quote {
    price: Option<f64>,
    volume_24h: Option<f64>,
    percent_change_1h: Option<f64>,
    percent_change_24h: Option<f64>,
    market_cap: Option<f64>,
}

/// Rolling window of observed prices per token.
#[derive(Debug)]
pub struct HighLowTracker {
    window: Duration,
    samples: HashMap<String, VecDeque<(DateTime<Utc>, f64)>>,
}

impl HighLowTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: HashMap::new(),
        }
    }

    /// Record an observed price and return the window's (low, high).
    pub fn record(&mut self, id: &str, price: f64, at: DateTime<Utc>) -> (f64, f64) {
        let samples = self.samples.entry(id.to_string()).or_default();
        samples.push_back((at, price));

        let cutoff = at - self.window;
        while samples.front().map(|(t, _)| *t < cutoff).unwrap_or(false) {
            samples.pop_front();
        }

        samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, p)| {
                (lo.min(*p), hi.max(*p))
            })
    }

    /// Number of samples currently retained for a token.
    pub fn sample_count(&self, id: &str) -> usize {
        self.samples.get(id).map(|s| s.len()).unwrap_or(0)
    }
}

/// Client for the CoinMarketCap Pro API.
pub struct CoinMarketCapProvider {
    client: Client,
    base_url: String,
    api_key: String,
    high_low: Mutex<HighLowTracker>,
}

impl CoinMarketCapProvider {
    /// Create a new CoinMarketCap provider.
    pub fn new(api_key: &str) -> Self {
        Self::with_url(api_key, COINMARKETCAP_URL)
    }

    /// Create a new CoinMarketCap provider with a custom API URL.
    pub fn with_url(api_key: &str, url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            high_low: Mutex::new(HighLowTracker::new(Duration::hours(HIGH_LOW_WINDOW_HOURS))),
        }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ProviderError> {
        debug!("Fetching from: {}", url);
        let response = self
            .client
            .get(url)
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?;
        let envelope: Envelope<T> = check_status(response)?.json().await?;
        envelope
            .data
            .ok_or_else(|| ProviderError::MissingData("data".to_string()))
    }

    fn to_raw(
        &self,
        token: &TokenIdentity,
        entry: QuoteEntry,
        currency: &str,
    ) -> Result<PriceSnapshotRaw, ProviderError> {
        let key = currency.to_uppercase();
        let quote = entry
            .quote
            .get(&key)
            .ok_or_else(|| ProviderError::MissingData(format!("{} quote", key)))?;

        let (low_24h, high_24h) = match quote.price {
            Some(price) => {
                let mut tracker = self.high_low.lock();
                let (lo, hi) = tracker.record(&token.canonical_id, price, Utc::now());
                debug!(
                    "High/low for {} from {} samples: {} / {}",
                    token.canonical_id,
                    tracker.sample_count(&token.canonical_id),
                    lo,
                    hi
                );
                (Some(lo), Some(hi))
            }
            None => (None, None),
        };

        Ok(PriceSnapshotRaw {
            rank: entry.cmc_rank,
            current_price: quote.price,
            market_cap: quote.market_cap,
            high_24h,
            low_24h,
            pct_change_1h: quote.percent_change_1h,
            pct_change_24h: quote.percent_change_24h,
            total_volume: quote.volume_24h,
            ath_price: None,
            ath_date: None,
        })
    }
}

#[async_trait]
impl PriceProvider for CoinMarketCapProvider {
    fn name(&self) -> &str {
        "CoinMarketCap"
    }

    async fn list_tokens(&self) -> Result<Vec<TokenIdentity>, ProviderError> {
        let url = format!("{}/v1/cryptocurrency/map", self.base_url);
        let entries: Vec<MapEntry> = self.get(&url).await?;

        Ok(entries
            .into_iter()
            .map(|e| TokenIdentity {
                canonical_id: e.id.to_string(),
                name: e.name,
                symbol: e.symbol,
                slug: e.slug,
            })
            .collect())
    }

    async fn fetch_price(
        &self,
        token: &TokenIdentity,
        currency: &str,
    ) -> Result<PriceSnapshotRaw, ProviderError> {
        if token.canonical_id.parse::<u64>().is_err() {
            return Err(ProviderError::UnknownToken(token.canonical_id.clone()));
        }

        let url = format!(
            "{}/v2/cryptocurrency/quotes/latest?id={}&convert={}",
            self.base_url,
            token.canonical_id,
            currency.to_uppercase()
        );
        let mut data: HashMap<String, QuoteEntry> = self.get(&url).await?;
        let entry = data
            .remove(&token.canonical_id)
            .ok_or_else(|| ProviderError::UnknownToken(token.canonical_id.clone()))?;

        self.to_raw(token, entry, currency)
    }

    fn token_link(&self, token: &TokenIdentity) -> Option<String> {
        token
            .slug
            .as_ref()
            .map(|slug| format!("https://coinmarketcap.com/currencies/{}/", slug))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUOTE_JSON: &str = r#"{
        "status": {"error_code": 0},
        "data": {
            "1720": {
                "id": 1720,
                "name": "IOTA",
                "symbol": "MIOTA",
                "cmc_rank": 60,
                "quote": {
                    "USD": {
                        "price": 0.2,
                        "volume_24h": 9000000.0,
                        "percent_change_1h": 0.1,
                        "percent_change_24h": -1.5,
                        "market_cap": 556000000.0
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_high_low_tracks_extremes() {
        let mut tracker = HighLowTracker::new(Duration::hours(24));
        let t0 = Utc::now();

        assert_eq!(tracker.record("1720", 0.20, t0), (0.20, 0.20));
        assert_eq!(tracker.record("1720", 0.25, t0 + Duration::minutes(1)), (0.20, 0.25));
        assert_eq!(tracker.record("1720", 0.15, t0 + Duration::minutes(2)), (0.15, 0.25));
        assert_eq!(tracker.record("2", 90.0, t0), (90.0, 90.0));
    }

    #[test]
    fn test_high_low_drops_old_samples() {
        let mut tracker = HighLowTracker::new(Duration::hours(24));
        let t0 = Utc::now();

        tracker.record("1720", 0.50, t0);
        tracker.record("1720", 0.20, t0 + Duration::hours(1));
        let (lo, hi) = tracker.record("1720", 0.30, t0 + Duration::hours(25));

        assert_eq!((lo, hi), (0.20, 0.30));
        assert_eq!(tracker.sample_count("1720"), 2);
    }

    #[test]
    fn test_quote_to_raw() {
        let provider = CoinMarketCapProvider::with_url("key", "http://localhost:1");
        let token = TokenIdentity::new("1720", "IOTA", "MIOTA").with_slug("iota");
        let envelope: Envelope<HashMap<String, QuoteEntry>> = serde_json::from_str(QUOTE_JSON).unwrap();
        let entry = envelope.data.unwrap().remove("1720").unwrap();

        let raw = provider.to_raw(&token, entry, "usd").unwrap();

        assert_eq!(raw.rank, Some(60));
        assert_eq!(raw.current_price, Some(0.2));
        assert_eq!(raw.low_24h, Some(0.2));
        assert_eq!(raw.high_24h, Some(0.2));
        assert_eq!(raw.pct_change_24h, Some(-1.5));
        assert_eq!(
            provider.token_link(&token).as_deref(),
            Some("https://coinmarketcap.com/currencies/iota/")
        );
    }

    #[test]
    fn test_missing_currency_quote() {
        let provider = CoinMarketCapProvider::with_url("key", "http://localhost:1");
        let token = TokenIdentity::new("1720", "IOTA", "MIOTA");
        let envelope: Envelope<HashMap<String, QuoteEntry>> = serde_json::from_str(QUOTE_JSON).unwrap();
        let entry = envelope.data.unwrap().remove("1720").unwrap();

        let result = provider.to_raw(&token, entry, "EUR");
        assert!(matches!(result, Err(ProviderError::MissingData(_))));
    }

    #[tokio::test]
    async fn test_non_numeric_id_rejected() {
        let provider = CoinMarketCapProvider::with_url("key", "http://localhost:1");
        let token = TokenIdentity::new("iota", "IOTA", "MIOTA");

        let result = provider.fetch_price(&token, "USD").await;
        assert!(matches!(result, Err(ProviderError::UnknownToken(_))));
    }
}
