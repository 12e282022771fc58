//! In-memory provider and sink used by unit tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{PresenceError, ProviderError};
use crate::presence::PresenceSink;
use crate::provider::PriceProvider;
use ticker_presence_types::{Mood, PriceSnapshotRaw, TokenIdentity};

pub struct MockProvider {
    tokens: Vec<TokenIdentity>,
    quotes: Mutex<HashMap<String, PriceSnapshotRaw>>,
    failing: Mutex<HashSet<String>>,
    fetches: Mutex<HashMap<String, usize>>,
    delay: Duration,
}

impl MockProvider {
    /// IOTA at $0.20 (+1.5% 24h) and Shimmer at $0.015 (-4% 24h).
    pub fn new() -> Self {
        let iota = PriceSnapshotRaw {
            rank: Some(61),
            current_price: Some(0.20),
            market_cap: Some(556_000_000.0),
            pct_change_24h: Some(1.5),
            ..Default::default()
        };
        let shimmer = PriceSnapshotRaw {
            rank: Some(450),
            current_price: Some(0.015),
            market_cap: Some(27_000_000.0),
            pct_change_24h: Some(-4.0),
            ..Default::default()
        };

        Self {
            tokens: vec![
                TokenIdentity::new("iota", "IOTA", "miota"),
                TokenIdentity::new("shimmer", "Shimmer", "shimmer"),
            ],
            quotes: Mutex::new(HashMap::from([
                ("iota".to_string(), iota),
                ("shimmer".to_string(), shimmer),
            ])),
            failing: Mutex::new(HashSet::new()),
            fetches: Mutex::new(HashMap::new()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn tokens(&self) -> Vec<TokenIdentity> {
        self.tokens.clone()
    }

    pub fn set_price(&self, id: &str, price: f64) {
        if let Some(quote) = self.quotes.lock().get_mut(id) {
            quote.current_price = Some(price);
        }
    }

    pub fn set_market_cap(&self, id: &str, market_cap: f64) {
        if let Some(quote) = self.quotes.lock().get_mut(id) {
            quote.market_cap = Some(market_cap);
        }
    }

    pub fn fail(&self, id: &str) {
        self.failing.lock().insert(id.to_string());
    }

    pub fn recover(&self, id: &str) {
        self.failing.lock().remove(id);
    }

    pub fn fetch_count(&self, id: &str) -> usize {
        self.fetches.lock().get(id).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().values().sum()
    }
}

#[async_trait]
impl PriceProvider for MockProvider {
    fn name(&self) -> &str {
        "Mock"
    }

    async fn list_tokens(&self) -> Result<Vec<TokenIdentity>, ProviderError> {
        Ok(self.tokens.clone())
    }

    async fn fetch_price(
        &self,
        token: &TokenIdentity,
        _currency: &str,
    ) -> Result<PriceSnapshotRaw, ProviderError> {
        *self.fetches.lock().entry(token.canonical_id.clone()).or_default() += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        if self.failing.lock().contains(&token.canonical_id) {
            return Err(ProviderError::Status {
                status: 503,
                url: format!("mock://{}", token.canonical_id),
            });
        }

        self.quotes
            .lock()
            .get(&token.canonical_id)
            .cloned()
            .ok_or_else(|| ProviderError::UnknownToken(token.canonical_id.clone()))
    }
}

/// Calls recorded by [`MockSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    DisplayName { target: String, text: String },
    Status { text: String, mood: Mood },
}

pub struct MockSink {
    targets: Vec<String>,
    names: Mutex<HashMap<String, String>>,
    unreachable: Mutex<HashSet<String>>,
    calls: Mutex<Vec<SinkCall>>,
}

impl MockSink {
    pub fn new(targets: &[&str]) -> Self {
        Self {
            targets: targets.iter().map(|t| t.to_string()).collect(),
            names: Mutex::new(HashMap::new()),
            unreachable: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn make_unreachable(&self, target: &str) {
        self.unreachable.lock().insert(target.to_string());
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().clone()
    }

    pub fn display_name_calls(&self) -> Vec<(String, String)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::DisplayName { target, text } => Some((target.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn status_calls(&self) -> Vec<(String, Mood)> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                SinkCall::Status { text, mood } => Some((text.clone(), *mood)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl PresenceSink for MockSink {
    async fn targets(&self) -> Vec<String> {
        self.targets.clone()
    }

    async fn display_name(&self, target: &str) -> Option<String> {
        self.names.lock().get(target).cloned()
    }

    async fn set_display_name(&self, target: &str, text: &str) -> Result<(), PresenceError> {
        self.calls.lock().push(SinkCall::DisplayName {
            target: target.to_string(),
            text: text.to_string(),
        });

        if self.unreachable.lock().contains(target) {
            return Err(PresenceError::Unreachable(target.to_string()));
        }

        self.names.lock().insert(target.to_string(), text.to_string());
        Ok(())
    }

    async fn set_status(&self, text: &str, mood: Mood) -> Result<(), PresenceError> {
        self.calls.lock().push(SinkCall::Status {
            text: text.to_string(),
            mood,
        });
        Ok(())
    }
}
