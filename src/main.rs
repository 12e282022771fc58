//! Ticker Presence Service
//!
//! Rotates token prices onto the presence WebSocket feed.
//!
//! # Usage
//!
//! ```bash
//! TICKER_ROTATION=iota,shimmer cargo run
//! ```

use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ticker_presence::{
    run_server, AppConfig, BroadcastPresenceSink, CoinGeckoProvider, CoinMarketCapProvider,
    DataSource, PriceCache, PriceProvider, RotationScheduler, TokenRegistry,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Ticker Presence Service");

    let config = AppConfig::from_env()?;

    let provider: Arc<dyn PriceProvider> = match &config.data_source {
        DataSource::CoinGecko => Arc::new(CoinGeckoProvider::new()),
        DataSource::CoinMarketCap { api_key } => Arc::new(CoinMarketCapProvider::new(api_key)),
    };
    info!("Using price data from {}", provider.name());

    let tokens = provider.list_tokens().await?;
    let registry = Arc::new(TokenRegistry::with_aliases(tokens, &config.aliases));
    info!("Registered {} tokens", registry.len());

    for key in &config.scheduler.token_set {
        let link = registry
            .resolve(key)
            .ok()
            .and_then(|id| registry.identity(id))
            .and_then(|token| provider.token_link(token));
        match link {
            Some(link) => info!("Rotation token {}: {}", key, link),
            None if !registry.exists(key) => {
                warn!("Rotation token {} is not known to {}", key, provider.name())
            }
            None => {}
        }
    }

    let cache = Arc::new(PriceCache::new(registry, provider, config.cache.clone()));

    // Start WebSocket server
    let sink = Arc::new(BroadcastPresenceSink::new(config.presence_targets.clone()));
    let server_sink = sink.clone();
    let addr = config.bind_addr.clone();
    tokio::spawn(async move {
        run_server(&addr, server_sink).await;
    });

    let scheduler = RotationScheduler::new(cache, sink, config.scheduler.clone());
    if config.rotation_enabled {
        scheduler.start().await?;
        info!(
            "Rotating: {} (dwell {:?})",
            config.scheduler.token_set.join(", "),
            config.scheduler.dwell
        );
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    if scheduler.is_running().await {
        scheduler.shutdown().await?;
    }

    Ok(())
}
