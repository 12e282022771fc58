//! CoinGecko price provider.
//!
//! Uses the public `/coins/list` endpoint for the token list and
//! `/coins/{id}` for market data. No API key required.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::error::ProviderError;
use crate::provider::{check_status, PriceProvider};
use ticker_presence_types::{PriceSnapshotRaw, TokenIdentity};

/// Default CoinGecko API endpoint.
pub const COINGECKO_URL: &str = "https://api.coingecko.com/api/v3";

#[derive(Debug, Deserialize)]
struct CoinListEntry {
    id: String,
    symbol: String,
    name: String,
}

/// `/coins/{id}` response, reduced to the fields we use.
#[derive(Debug, Deserialize)]
struct CoinData {
    market_cap_rank: Option<u32>,
    market_data: Option<MarketData>,
}

/// Per-currency values keyed by lower-case currency code.
type CurrencyMap<T> = HashMap<String, Option<T>>;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MarketData {
    current_price: CurrencyMap<f64>,
    market_cap: CurrencyMap<f64>,
    high_24h: CurrencyMap<f64>,
    low_24h: CurrencyMap<f64>,
    total_volume: CurrencyMap<f64>,
    ath: CurrencyMap<f64>,
    ath_date: CurrencyMap<DateTime<Utc>>,
    price_change_percentage_1h_in_currency: CurrencyMap<f64>,
    price_change_percentage_24h_in_currency: CurrencyMap<f64>,
}

fn pick<T: Copy>(map: &CurrencyMap<T>, currency: &str) -> Option<T> {
    map.get(currency).copied().flatten()
}

/// Client for the CoinGecko API.
pub struct CoinGeckoProvider {
    client: Client,
    base_url: String,
}

impl CoinGeckoProvider {
    /// Create a new CoinGecko provider.
    pub fn new() -> Self {
        Self::with_url(COINGECKO_URL)
    }

    /// Create a new CoinGecko provider with a custom API URL.
    pub fn with_url(url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: url.trim_end_matches('/').to_string(),
        }
    }

    fn parse_coin_data(data: CoinData, currency: &str) -> Result<PriceSnapshotRaw, ProviderError> {
        let market = data
            .market_data
            .ok_or_else(|| ProviderError::MissingData("market_data".to_string()))?;
        let cur = currency.to_lowercase();

        Ok(PriceSnapshotRaw {
            rank: data.market_cap_rank,
            current_price: pick(&market.current_price, &cur),
            market_cap: pick(&market.market_cap, &cur),
            high_24h: pick(&market.high_24h, &cur),
            low_24h: pick(&market.low_24h, &cur),
            pct_change_1h: pick(&market.price_change_percentage_1h_in_currency, &cur),
            pct_change_24h: pick(&market.price_change_percentage_24h_in_currency, &cur),
            total_volume: pick(&market.total_volume, &cur),
            ath_price: pick(&market.ath, &cur),
            ath_date: pick(&market.ath_date, &cur),
        })
    }
}

impl Default for CoinGeckoProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceProvider for CoinGeckoProvider {
    fn name(&self) -> &str {
        "CoinGecko"
    }

    async fn list_tokens(&self) -> Result<Vec<TokenIdentity>, ProviderError> {
        let url = format!("{}/coins/list", self.base_url);
        debug!("Fetching token list from: {}", url);

        let response = check_status(self.client.get(&url).send().await?)?;
        let entries: Vec<CoinListEntry> = response.json().await?;

        Ok(entries
            .into_iter()
            .map(|e| TokenIdentity::new(&e.id, &e.name, &e.symbol))
            .collect())
    }

    async fn fetch_price(
        &self,
        token: &TokenIdentity,
        currency: &str,
    ) -> Result<PriceSnapshotRaw, ProviderError> {
        let url = format!(
            "{}/coins/{}?localization=false&tickers=false&community_data=false&developer_data=false",
            self.base_url, token.canonical_id
        );
        debug!("Fetching market data from: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::UnknownToken(token.canonical_id.clone()));
        }
        let data: CoinData = check_status(response)?.json().await?;

        Self::parse_coin_data(data, currency)
    }

    fn token_link(&self, token: &TokenIdentity) -> Option<String> {
        Some(format!("https://www.coingecko.com/en/coins/{}", token.canonical_id))
    }
}
