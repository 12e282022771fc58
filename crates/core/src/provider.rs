//! Upstream price provider abstraction.

use async_trait::async_trait;

use crate::error::ProviderError;
use ticker_presence_types::{PriceSnapshotRaw, TokenIdentity};

/// Quote currency used when none is given.
pub const DEFAULT_CURRENCY: &str = "USD";

/// A source of token listings and market data.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Display name of the source (e.g., "CoinGecko").
    fn name(&self) -> &str;

    /// All tokens the provider knows about, in the provider's list order.
    async fn list_tokens(&self) -> Result<Vec<TokenIdentity>, ProviderError>;

    /// Latest market data for one token, quoted in `currency`.
    async fn fetch_price(
        &self,
        token: &TokenIdentity,
        currency: &str,
    ) -> Result<PriceSnapshotRaw, ProviderError>;

    /// Public page for the token on the provider's site, if any.
    fn token_link(&self, _token: &TokenIdentity) -> Option<String> {
        None
    }
}

/// Turn a non-success response into a [`ProviderError::Status`].
pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ProviderError::Status {
            status: status.as_u16(),
            url: response.url().to_string(),
        })
    }
}
