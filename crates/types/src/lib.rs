//! Token and price data types for the ticker presence service.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A token as listed by an upstream price provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenIdentity {
    /// The provider's authoritative id (e.g., "iota" on CoinGecko, "1720" on CoinMarketCap)
    pub canonical_id: String,

    /// Human readable name (e.g., "IOTA")
    pub name: String,

    /// Ticker symbol (e.g., "miota")
    pub symbol: String,

    /// URL slug, if the provider has one
    pub slug: Option<String>,
}

impl TokenIdentity {
    pub fn new(canonical_id: &str, name: &str, symbol: &str) -> Self {
        Self {
            canonical_id: canonical_id.to_string(),
            name: name.to_string(),
            symbol: symbol.to_string(),
            slug: None,
        }
    }

    pub fn with_slug(mut self, slug: &str) -> Self {
        self.slug = Some(slug.to_string());
        self
    }
}

/// Market data exactly as returned by a provider, before caching.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshotRaw {
    /// Market cap rank
    pub rank: Option<u32>,

    /// Price in the quote currency
    pub current_price: Option<f64>,

    pub market_cap: Option<f64>,

    pub high_24h: Option<f64>,

    pub low_24h: Option<f64>,

    /// Percent change over the last hour (e.g., -1.25 for -1.25%)
    pub pct_change_1h: Option<f64>,

    /// Percent change over the last 24 hours
    pub pct_change_24h: Option<f64>,

    /// 24h traded volume in the quote currency
    pub total_volume: Option<f64>,

    /// All-time high price
    pub ath_price: Option<f64>,

    /// When the all-time high was reached
    pub ath_date: Option<DateTime<Utc>>,
}

/// A point-in-time market snapshot for one canonical token.
///
/// Snapshots are never mutated once built; a refresh produces a new one with
/// a later `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub canonical_id: String,

    pub name: String,

    pub symbol: String,

    pub rank: Option<u32>,

    pub current_price: Option<f64>,

    pub market_cap: Option<f64>,

    pub high_24h: Option<f64>,

    pub low_24h: Option<f64>,

    pub pct_change_1h: Option<f64>,

    pub pct_change_24h: Option<f64>,

    pub total_volume: Option<f64>,

    pub ath_price: Option<f64>,

    pub ath_date: Option<DateTime<Utc>>,

    /// When this snapshot was fetched from upstream
    pub created_at: DateTime<Utc>,

    /// Price of this token in units of another, keyed by upper-cased symbol
    pub relations: BTreeMap<String, f64>,
}

impl PriceSnapshot {
    /// Build a snapshot from raw provider data, stamped with `created_at`.
    pub fn from_raw(
        token: &TokenIdentity,
        raw: PriceSnapshotRaw,
        created_at: DateTime<Utc>,
        relations: BTreeMap<String, f64>,
    ) -> Self {
        Self {
            canonical_id: token.canonical_id.clone(),
            name: token.name.clone(),
            symbol: token.symbol.clone(),
            rank: raw.rank,
            current_price: raw.current_price,
            market_cap: raw.market_cap,
            high_24h: raw.high_24h,
            low_24h: raw.low_24h,
            pct_change_1h: raw.pct_change_1h,
            pct_change_24h: raw.pct_change_24h,
            total_volume: raw.total_volume,
            ath_price: raw.ath_price,
            ath_date: raw.ath_date,
            created_at,
            relations,
        }
    }

    /// Whether the 24h change is negative. Missing data counts as not down.
    pub fn is_trending_down(&self) -> bool {
        self.pct_change_24h.map(|p| p < 0.0).unwrap_or(false)
    }
}

/// Presence mood shown next to the status text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Online,
    DoNotDisturb,
}

impl std::fmt::Display for Mood {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mood::Online => write!(f, "online"),
            Mood::DoNotDisturb => write!(f, "dnd"),
        }
    }
}

/// Events published to presence clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    /// Display name changed on one target
    DisplayName { target: String, text: String },

    /// Status line changed
    Status { text: String, mood: Mood },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_copies_identity() {
        let token = TokenIdentity::new("iota", "IOTA", "miota").with_slug("iota");
        let raw = PriceSnapshotRaw {
            rank: Some(60),
            current_price: Some(0.2),
            pct_change_24h: Some(-3.5),
            ..Default::default()
        };

        let snapshot = PriceSnapshot::from_raw(&token, raw, Utc::now(), BTreeMap::new());

        assert_eq!(snapshot.canonical_id, "iota");
        assert_eq!(snapshot.symbol, "miota");
        assert_eq!(snapshot.rank, Some(60));
        assert!(snapshot.is_trending_down());
    }

    #[test]
    fn test_missing_change_is_not_down() {
        let token = TokenIdentity::new("iota", "IOTA", "miota");
        let snapshot =
            PriceSnapshot::from_raw(&token, PriceSnapshotRaw::default(), Utc::now(), BTreeMap::new());
        assert!(!snapshot.is_trending_down());
    }

    #[test]
    fn test_presence_event_serialization() {
        let event = PresenceEvent::Status {
            text: "$0.2000 ⬈24H: 1.00%".to_string(),
            mood: Mood::DoNotDisturb,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"status\""));
        assert!(json.contains("\"mood\":\"do_not_disturb\""));
    }
}
